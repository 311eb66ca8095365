use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::{MatchKey, SavedPrediction, ScoreDraft, ScoreField, is_valid_score_input};

/// Result of one commit attempt for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub match_key: MatchKey,
    /// Values that were sent, captured when the batch was planned.
    pub home: u8,
    pub away: u8,
    pub success: bool,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

/// In-memory staging area for one editing session.
///
/// Holds the last confirmed server values, the local edit buffers and the
/// set of keys whose most recent commit attempt failed.
#[derive(Debug, Default, Clone)]
pub struct DraftStore {
    saved: HashMap<MatchKey, SavedPrediction>,
    drafts: HashMap<MatchKey, ScoreDraft>,
    failed: HashSet<MatchKey>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the baseline and the edit buffers with `saved`; clears failures.
    pub fn initialize(&mut self, saved: Vec<SavedPrediction>) {
        self.saved.clear();
        self.drafts.clear();
        self.failed.clear();
        for prediction in saved {
            self.drafts
                .insert(prediction.match_key.clone(), prediction.as_draft());
            self.saved.insert(prediction.match_key.clone(), prediction);
        }
    }

    /// Writes one side of the buffer. Returns `false` (buffer untouched) for
    /// anything other than an empty string or a short run of digits.
    pub fn set_value(&mut self, key: &MatchKey, field: ScoreField, value: &str) -> bool {
        if !is_valid_score_input(value) {
            return false;
        }
        let draft = self.drafts.entry(key.clone()).or_default();
        match field {
            ScoreField::Home => draft.home = value.to_string(),
            ScoreField::Away => draft.away = value.to_string(),
        }
        true
    }

    pub fn clear(&mut self, key: &MatchKey) {
        self.drafts.insert(key.clone(), ScoreDraft::default());
    }

    pub fn draft(&self, key: &MatchKey) -> Option<&ScoreDraft> {
        self.drafts.get(key)
    }

    pub fn saved(&self, key: &MatchKey) -> Option<&SavedPrediction> {
        self.saved.get(key)
    }

    pub fn drafts(&self) -> &HashMap<MatchKey, ScoreDraft> {
        &self.drafts
    }

    /// Baseline values shaped like edit buffers, for standings derivation.
    pub fn saved_drafts(&self) -> HashMap<MatchKey, ScoreDraft> {
        self.saved
            .iter()
            .map(|(key, saved)| (key.clone(), saved.as_draft()))
            .collect()
    }

    pub fn is_dirty(&self, key: &MatchKey) -> bool {
        let Some((home, away)) = self.drafts.get(key).and_then(ScoreDraft::parsed) else {
            return false;
        };
        match self.saved.get(key) {
            Some(saved) => saved.home != home || saved.away != away,
            None => true,
        }
    }

    pub fn dirty_keys(&self) -> BTreeSet<MatchKey> {
        self.drafts
            .keys()
            .filter(|key| self.is_dirty(key))
            .cloned()
            .collect()
    }

    pub fn is_failed(&self, key: &MatchKey) -> bool {
        self.failed.contains(key)
    }

    pub fn failed_keys(&self) -> BTreeSet<MatchKey> {
        self.failed.iter().cloned().collect()
    }

    /// A fresh attempt for `key` starts with a clean slate.
    pub fn begin_attempt(&mut self, key: &MatchKey) {
        self.failed.remove(key);
    }

    /// Applies settled outcomes. Only the values captured in each outcome are
    /// written to the baseline; edit buffers are never touched, so an edit made
    /// while the batch was in flight stays (and shows as dirty again).
    pub fn reconcile(&mut self, outcomes: &[CommitOutcome]) {
        for outcome in outcomes {
            if !outcome.success {
                self.failed.insert(outcome.match_key.clone());
                continue;
            }
            let previous_id = self
                .saved
                .get(&outcome.match_key)
                .map(|s| s.remote_id.clone());
            let Some(remote_id) = outcome.remote_id.clone().or(previous_id) else {
                // A success with no id anywhere cannot be updated later; keep it retryable.
                self.failed.insert(outcome.match_key.clone());
                continue;
            };
            self.saved.insert(
                outcome.match_key.clone(),
                SavedPrediction {
                    match_key: outcome.match_key.clone(),
                    remote_id,
                    home: outcome.home,
                    away: outcome.away,
                },
            );
            self.failed.remove(&outcome.match_key);
        }
    }

    /// Drops every unsaved edit: buffers go back to the baseline (or empty) and
    /// failures are forgotten.
    pub fn revert_all(&mut self) {
        for (key, draft) in self.drafts.iter_mut() {
            *draft = self
                .saved
                .get(key)
                .map(SavedPrediction::as_draft)
                .unwrap_or_default();
        }
        for (key, saved) in &self.saved {
            self.drafts
                .entry(key.clone())
                .or_insert_with(|| saved.as_draft());
        }
        self.failed.clear();
    }
}
