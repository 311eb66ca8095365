use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use crate::commit::{self, BatchReport, CommitBatch};
use crate::draft::{CommitOutcome, DraftStore};
use crate::gateway::PredictionGateway;
use crate::lock::{DeadlineSettings, DraftStatus, LockClassifier, classify};
use crate::model::{CollectionKey, Match, MatchKey, ScoreField};
use crate::standings::{Standing, derive_standings};

/// One prediction-editing session for a league + tournament selection.
///
/// Owns the draft store for its whole lifetime; callers read and edit through it.
pub struct PredictionSession<'g> {
    gateway: &'g dyn PredictionGateway,
    collection: CollectionKey,
    matches: Vec<Match>,
    locks: LockClassifier,
    store: DraftStore,
}

impl<'g> PredictionSession<'g> {
    /// Fetches matches and saved predictions concurrently and seeds the store.
    pub fn load(
        gateway: &'g dyn PredictionGateway,
        collection: CollectionKey,
        settings: DeadlineSettings,
    ) -> Result<Self> {
        let (matches, saved) = rayon::join(
            || gateway.list_matches(&collection.tournament_id),
            || gateway.list_predictions(&collection),
        );
        let matches = matches.context("failed to load matches")?;
        let saved = saved.context("failed to load saved predictions")?;
        log::info!(
            "[SESSION] loaded {} match(es), {} saved prediction(s) for league {} / tournament {}",
            matches.len(),
            saved.len(),
            collection.league_id,
            collection.tournament_id
        );

        let mut store = DraftStore::new();
        store.initialize(saved);
        Ok(Self {
            gateway,
            locks: LockClassifier::new(settings.into(), &matches),
            collection,
            matches,
            store,
        })
    }

    pub fn collection(&self) -> &CollectionKey {
        &self.collection
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    pub fn locks(&self) -> &LockClassifier {
        &self.locks
    }

    pub fn edit(
        &mut self,
        key: &MatchKey,
        field: ScoreField,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.locks.is_locked(key, now) {
            bail!("predictions for {key} are locked");
        }
        if !self.store.set_value(key, field, value) {
            bail!("invalid score {value:?}: use up to two digits");
        }
        Ok(())
    }

    pub fn clear(&mut self, key: &MatchKey, now: DateTime<Utc>) -> Result<()> {
        if self.locks.is_locked(key, now) {
            bail!("predictions for {key} are locked");
        }
        self.store.clear(key);
        Ok(())
    }

    pub fn status_of(&self, key: &MatchKey, now: DateTime<Utc>) -> DraftStatus {
        classify(&self.store, &self.locks, key, now)
    }

    pub fn editable_keys(&self, now: DateTime<Utc>) -> Vec<MatchKey> {
        self.matches
            .iter()
            .filter(|m| !self.locks.is_locked(&m.key, now))
            .map(|m| m.key.clone())
            .collect()
    }

    /// Commits every dirty draft. Drafts of matches that locked meanwhile stay
    /// staged but are not sent.
    pub fn submit(&mut self, now: DateTime<Utc>) -> BatchReport {
        let locks = &self.locks;
        let batch = CommitBatch::plan_where(&mut self.store, |key| !locks.is_locked(key, now));
        let skipped = self.store.dirty_keys().len() - batch.jobs.len();
        if skipped > 0 {
            log::warn!("[SESSION] skipping {skipped} locked draft(s)");
        }
        commit::settle(&mut self.store, self.gateway, batch)
    }

    pub fn retry(&mut self, key: &MatchKey, now: DateTime<Utc>) -> Result<CommitOutcome> {
        if self.locks.is_locked(key, now) {
            bail!("predictions for {key} are locked");
        }
        commit::retry(&mut self.store, self.gateway, key)
    }

    pub fn revert_all(&mut self) {
        log::info!("[SESSION] reverting unsaved edits");
        self.store.revert_all();
    }

    /// Table from the live drafts, saved or not.
    pub fn live_standings(&self) -> Vec<Standing> {
        derive_standings(&self.matches, self.store.drafts())
    }

    /// Table from the last confirmed values only.
    pub fn saved_standings(&self) -> Vec<Standing> {
        derive_standings(&self.matches, &self.store.saved_drafts())
    }
}
