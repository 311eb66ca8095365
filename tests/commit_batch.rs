use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use league_predictions::commit::{
    BatchSummary, CommitBatch, CommitTarget, commit_all, execute_batch, retry,
};
use league_predictions::draft::DraftStore;
use league_predictions::fake_gateway::{FakeGateway, GatewayCall};
use league_predictions::gateway::PredictionGateway;
use league_predictions::model::{
    CollectionKey, Match, MatchKey, SavedPrediction, ScoreDraft, ScoreField,
};

/// Every create blocks for `delay` and tracks how many calls overlap.
struct SlowGateway {
    delay: Duration,
    fail_key: Option<MatchKey>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    issued: AtomicUsize,
}

impl SlowGateway {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_key: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }
}

impl PredictionGateway for SlowGateway {
    fn create(&self, match_key: &MatchKey, _home: u8, _away: u8) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_key.as_ref() == Some(match_key) {
            return Err(anyhow!("timed out"));
        }
        Ok(format!("slow-{id}"))
    }

    fn update(&self, _remote_id: &str, _home: u8, _away: u8) -> Result<()> {
        Ok(())
    }

    fn list_predictions(&self, _collection: &CollectionKey) -> Result<Vec<SavedPrediction>> {
        Ok(Vec::new())
    }

    fn list_matches(&self, _tournament_id: &str) -> Result<Vec<Match>> {
        Ok(Vec::new())
    }
}

fn key(raw: &str) -> MatchKey {
    MatchKey::from(raw)
}

fn saved(match_key: &str, remote_id: &str, home: u8, away: u8) -> SavedPrediction {
    SavedPrediction {
        match_key: key(match_key),
        remote_id: remote_id.to_string(),
        home,
        away,
    }
}

fn set(store: &mut DraftStore, k: &str, home: &str, away: &str) {
    assert!(store.set_value(&key(k), ScoreField::Home, home));
    assert!(store.set_value(&key(k), ScoreField::Away, away));
}

#[test]
fn unsaved_key_creates_and_saved_key_updates() {
    let baseline = vec![saved("m1", "p-77", 0, 0)];
    let gateway = FakeGateway::new().with_saved(baseline.clone());
    let mut store = DraftStore::new();
    store.initialize(baseline);
    set(&mut store, "m1", "1", "0");
    set(&mut store, "m2", "2", "2");

    let report = commit_all(&mut store, &gateway);
    assert_eq!(report.summary, BatchSummary::AllSucceeded { count: 2 });

    let mut calls = gateway.calls();
    calls.sort_by_key(|c| format!("{c:?}"));
    assert_eq!(
        calls,
        vec![
            GatewayCall::Create {
                match_key: key("m2"),
                home: 2,
                away: 2
            },
            GatewayCall::Update {
                remote_id: "p-77".to_string(),
                home: 1,
                away: 0
            },
        ]
    );

    let m1 = store.saved(&key("m1")).expect("m1 saved");
    assert_eq!((m1.remote_id.as_str(), m1.home, m1.away), ("p-77", 1, 0));
    let m2 = store.saved(&key("m2")).expect("m2 saved");
    assert_eq!((m2.remote_id.as_str(), m2.home, m2.away), ("pred-1", 2, 2));
    assert!(store.dirty_keys().is_empty());
}

#[test]
fn plan_routes_by_baseline() {
    let mut store = DraftStore::new();
    store.initialize(vec![saved("m1", "p-1", 3, 0)]);
    set(&mut store, "m1", "3", "1");
    set(&mut store, "m2", "0", "0");
    let batch = CommitBatch::plan(&mut store);
    assert_eq!(batch.jobs.len(), 2);
    assert_eq!(
        batch.jobs[0].target,
        CommitTarget::Update {
            remote_id: "p-1".to_string()
        }
    );
    assert_eq!(batch.jobs[1].target, CommitTarget::Create);
}

#[test]
fn one_failure_does_not_affect_the_others() {
    let gateway = FakeGateway::new();
    gateway.fail_for(&key("m2"));
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");
    set(&mut store, "m2", "2", "1");
    set(&mut store, "m3", "0", "3");

    let report = commit_all(&mut store, &gateway);

    assert_eq!(
        report.summary,
        BatchSummary::Partial {
            succeeded: 2,
            failed: 1
        }
    );
    assert_eq!(gateway.calls().len(), 3);
    assert!(store.saved(&key("m1")).is_some());
    assert!(store.saved(&key("m3")).is_some());
    assert!(store.saved(&key("m2")).is_none());
    assert_eq!(store.failed_keys().into_iter().collect::<Vec<_>>(), vec![key("m2")]);
    assert_eq!(store.draft(&key("m2")), Some(&ScoreDraft::new("2", "1")));
    let failure = report
        .outcomes
        .iter()
        .find(|o| o.match_key == key("m2"))
        .expect("m2 outcome");
    assert!(!failure.success);
    assert!(
        failure
            .error
            .as_deref()
            .is_some_and(|e| e.contains("simulated failure"))
    );
}

#[test]
fn total_failure_still_attempts_every_key() {
    let gateway = FakeGateway::new().with_failure_rate(1.0);
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");
    set(&mut store, "m2", "2", "1");

    let report = commit_all(&mut store, &gateway);

    assert_eq!(report.summary, BatchSummary::AllFailed { count: 2 });
    assert_eq!(gateway.calls().len(), 2);
    assert_eq!(store.failed_keys().len(), 2);
    assert_eq!(store.dirty_keys().len(), 2);
}

#[test]
fn empty_batch_touches_nothing() {
    let gateway = FakeGateway::new();
    let mut store = DraftStore::new();
    store.set_value(&key("m1"), ScoreField::Home, "1");
    let report = commit_all(&mut store, &gateway);
    assert_eq!(report.summary, BatchSummary::Nothing);
    assert!(gateway.calls().is_empty());
}

#[test]
fn new_batch_clears_stale_failure_on_success() {
    let gateway = FakeGateway::new();
    gateway.fail_for(&key("m1"));
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "1");
    commit_all(&mut store, &gateway);
    assert!(store.is_failed(&key("m1")));

    gateway.heal(&key("m1"));
    let report = commit_all(&mut store, &gateway);
    assert_eq!(report.summary, BatchSummary::AllSucceeded { count: 1 });
    assert!(!store.is_failed(&key("m1")));
}

#[test]
fn edit_during_flight_survives_reconciliation() {
    let gateway = FakeGateway::new();
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");

    let batch = CommitBatch::plan(&mut store);
    // The user keeps typing while the request is in flight.
    set(&mut store, "m1", "3", "0");
    let outcomes = execute_batch(&batch, &gateway);
    store.reconcile(&outcomes);

    let baseline = store.saved(&key("m1")).expect("saved");
    assert_eq!((baseline.home, baseline.away), (1, 0));
    assert_eq!(store.draft(&key("m1")), Some(&ScoreDraft::new("3", "0")));
    assert!(store.is_dirty(&key("m1")));
    assert_eq!(
        gateway.stored(&baseline.remote_id).map(|p| (p.home, p.away)),
        Some((1, 0))
    );
}

#[test]
fn retry_sends_current_buffer() {
    let gateway = FakeGateway::new();
    gateway.fail_for(&key("m1"));
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");
    commit_all(&mut store, &gateway);
    assert!(store.is_failed(&key("m1")));

    set(&mut store, "m1", "2", "2");
    gateway.heal(&key("m1"));
    let outcome = retry(&mut store, &gateway, &key("m1")).expect("retry issued");

    assert!(outcome.success);
    assert_eq!((outcome.home, outcome.away), (2, 2));
    assert!(!store.is_failed(&key("m1")));
    let baseline = store.saved(&key("m1")).expect("saved");
    assert_eq!((baseline.home, baseline.away), (2, 2));
    assert_eq!(
        gateway.calls().last(),
        Some(&GatewayCall::Create {
            match_key: key("m1"),
            home: 2,
            away: 2
        })
    );
}

#[test]
fn failed_retry_stays_failed() {
    let gateway = FakeGateway::new();
    gateway.fail_for(&key("m1"));
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");
    commit_all(&mut store, &gateway);

    let outcome = retry(&mut store, &gateway, &key("m1")).expect("retry issued");
    assert!(!outcome.success);
    assert!(store.is_failed(&key("m1")));
}

#[test]
fn retry_after_create_uses_update() {
    let gateway = FakeGateway::new();
    let mut store = DraftStore::new();
    set(&mut store, "m1", "1", "0");
    commit_all(&mut store, &gateway);
    let remote_id = store.saved(&key("m1")).expect("saved").remote_id.clone();

    set(&mut store, "m1", "4", "0");
    retry(&mut store, &gateway, &key("m1")).expect("retry issued");
    assert_eq!(
        gateway.calls().last(),
        Some(&GatewayCall::Update {
            remote_id,
            home: 4,
            away: 0
        })
    );
}

#[test]
fn retry_of_incomplete_buffer_is_refused() {
    let gateway = FakeGateway::new();
    let mut store = DraftStore::new();
    store.set_value(&key("m1"), ScoreField::Home, "1");
    assert!(retry(&mut store, &gateway, &key("m1")).is_err());
    assert!(gateway.calls().is_empty());
}

#[test]
fn summary_messages() {
    assert_eq!(BatchSummary::Nothing.message(), "No changes to save");
    assert_eq!(
        BatchSummary::AllSucceeded { count: 3 }.message(),
        "Saved 3 prediction(s)"
    );
}

#[test]
fn batch_starts_every_commit_at_once() {
    let gateway = SlowGateway::new(Duration::from_millis(200));
    let mut store = DraftStore::new();
    for i in 0..12 {
        set(&mut store, &format!("m{i}"), "1", "0");
    }

    let report = commit_all(&mut store, &gateway);

    assert_eq!(report.summary, BatchSummary::AllSucceeded { count: 12 });
    assert_eq!(gateway.peak.load(Ordering::SeqCst), 12);
    assert_eq!(gateway.issued.load(Ordering::SeqCst), 12);
}

#[test]
fn slow_failure_does_not_hold_back_siblings() {
    let mut gateway = SlowGateway::new(Duration::from_millis(150));
    gateway.fail_key = Some(key("m0"));
    let mut store = DraftStore::new();
    for i in 0..8 {
        set(&mut store, &format!("m{i}"), "2", "1");
    }

    let report = commit_all(&mut store, &gateway);

    assert_eq!(
        report.summary,
        BatchSummary::Partial {
            succeeded: 7,
            failed: 1
        }
    );
    assert_eq!(gateway.peak.load(Ordering::SeqCst), 8);
    assert!(store.is_failed(&key("m0")));
    assert_eq!(store.dirty_keys().len(), 1);
}
