use anyhow::{Result, anyhow};
use rayon::prelude::*;

use crate::draft::{CommitOutcome, DraftStore};
use crate::gateway::PredictionGateway;
use crate::model::MatchKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitTarget {
    Create,
    Update { remote_id: String },
}

/// One create-or-update, with the values captured at planning time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitJob {
    pub match_key: MatchKey,
    pub home: u8,
    pub away: u8,
    pub target: CommitTarget,
}

impl CommitJob {
    /// `None` while the buffer for `key` is empty or partial.
    pub fn capture(store: &DraftStore, key: &MatchKey) -> Option<Self> {
        let (home, away) = store.draft(key)?.parsed()?;
        let target = match store.saved(key) {
            Some(saved) => CommitTarget::Update {
                remote_id: saved.remote_id.clone(),
            },
            None => CommitTarget::Create,
        };
        Some(Self {
            match_key: key.clone(),
            home,
            away,
            target,
        })
    }

    pub fn run(&self, gateway: &dyn PredictionGateway) -> CommitOutcome {
        let result = match &self.target {
            CommitTarget::Create => gateway
                .create(&self.match_key, self.home, self.away)
                .map(Some),
            CommitTarget::Update { remote_id } => gateway
                .update(remote_id, self.home, self.away)
                .map(|_| Some(remote_id.clone())),
        };
        match result {
            Ok(remote_id) => CommitOutcome {
                match_key: self.match_key.clone(),
                home: self.home,
                away: self.away,
                success: true,
                remote_id,
                error: None,
            },
            Err(err) => {
                log::warn!("[COMMIT] {} failed: {err:#}", self.match_key);
                CommitOutcome {
                    match_key: self.match_key.clone(),
                    home: self.home,
                    away: self.away,
                    success: false,
                    remote_id: None,
                    error: Some(format!("{err:#}")),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub jobs: Vec<CommitJob>,
}

impl CommitBatch {
    /// Captures every dirty key and clears its previous failure.
    pub fn plan(store: &mut DraftStore) -> Self {
        Self::plan_where(store, |_| true)
    }

    /// Like `plan`, restricted to the dirty keys accepted by `include`.
    pub fn plan_where(store: &mut DraftStore, include: impl Fn(&MatchKey) -> bool) -> Self {
        let view: &DraftStore = store;
        let jobs: Vec<CommitJob> = view
            .dirty_keys()
            .iter()
            .filter(|key| include(*key))
            .filter_map(|key| CommitJob::capture(view, key))
            .collect();
        for job in &jobs {
            store.begin_attempt(&job.match_key);
        }
        Self { jobs }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Runs every job on its own worker and waits for all of them. A failing or
/// slow job only produces its own outcome; it never stops or holds back the others.
pub fn execute_batch(
    batch: &CommitBatch,
    gateway: &dyn PredictionGateway,
) -> Vec<CommitOutcome> {
    if batch.is_empty() {
        return Vec::new();
    }
    log::debug!("[COMMIT] starting {} worker(s)", batch.jobs.len());
    with_commit_pool(batch.jobs.len(), || {
        batch
            .jobs
            .par_iter()
            .with_max_len(1)
            .map(|job| job.run(gateway))
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSummary {
    Nothing,
    AllSucceeded { count: usize },
    Partial { succeeded: usize, failed: usize },
    AllFailed { count: usize },
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[CommitOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;
        match (succeeded, failed) {
            (0, 0) => BatchSummary::Nothing,
            (count, 0) => BatchSummary::AllSucceeded { count },
            (0, count) => BatchSummary::AllFailed { count },
            (succeeded, failed) => BatchSummary::Partial { succeeded, failed },
        }
    }

    pub fn message(&self) -> String {
        match self {
            BatchSummary::Nothing => "No changes to save".to_string(),
            BatchSummary::AllSucceeded { count } => format!("Saved {count} prediction(s)"),
            BatchSummary::Partial { succeeded, failed } => {
                format!("Saved {succeeded} prediction(s); {failed} failed, retry them")
            }
            BatchSummary::AllFailed { count } => {
                format!("Could not save {count} prediction(s), retry them")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<CommitOutcome>,
    pub summary: BatchSummary,
}

/// Plans, executes and reconciles one batch of all dirty drafts.
pub fn commit_all(store: &mut DraftStore, gateway: &dyn PredictionGateway) -> BatchReport {
    let batch = CommitBatch::plan(store);
    settle(store, gateway, batch)
}

/// Executes an already planned batch and reconciles the store with its outcomes.
pub fn settle(
    store: &mut DraftStore,
    gateway: &dyn PredictionGateway,
    batch: CommitBatch,
) -> BatchReport {
    log::info!("[COMMIT] submitting {} prediction(s)", batch.jobs.len());
    let outcomes = execute_batch(&batch, gateway);
    store.reconcile(&outcomes);
    let summary = BatchSummary::from_outcomes(&outcomes);
    log::info!("[COMMIT] batch settled: {summary:?}");
    BatchReport { outcomes, summary }
}

/// Re-issues one commit using the current buffer for `key`.
pub fn retry(
    store: &mut DraftStore,
    gateway: &dyn PredictionGateway,
    key: &MatchKey,
) -> Result<CommitOutcome> {
    let job = CommitJob::capture(store, key)
        .ok_or_else(|| anyhow!("nothing to retry for {key}: prediction is incomplete"))?;
    log::info!("[COMMIT] retrying {key} ({:?})", job.target);
    store.begin_attempt(key);
    let outcome = job.run(gateway);
    log::debug!("[COMMIT] retry of {key} settled: success={}", outcome.success);
    store.reconcile(std::slice::from_ref(&outcome));
    Ok(outcome)
}

fn with_commit_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
