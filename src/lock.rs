use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::DraftStore;
use crate::model::{Match, MatchKey, MatchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionMode {
    AllAtOnce,
    PerMatch,
}

/// Per-collection deadline settings as delivered by the league configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineSettings {
    pub prediction_mode: PredictionMode,
    pub deadline_minutes: i64,
    #[serde(default)]
    pub allow_late_edits: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// One shared deadline, measured from the earliest kickoff in the collection.
    Collective {
        deadline: Duration,
        allow_late_edits: bool,
    },
    /// Each match closes `deadline` before its own kickoff.
    PerItem {
        deadline: Duration,
        allow_late_edits: bool,
    },
}

impl From<DeadlineSettings> for LockPolicy {
    fn from(settings: DeadlineSettings) -> Self {
        let deadline =
            Duration::try_minutes(settings.deadline_minutes.max(0)).unwrap_or(Duration::MAX);
        match settings.prediction_mode {
            PredictionMode::AllAtOnce => LockPolicy::Collective {
                deadline,
                allow_late_edits: settings.allow_late_edits,
            },
            PredictionMode::PerMatch => LockPolicy::PerItem {
                deadline,
                allow_late_edits: settings.allow_late_edits,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Schedule {
    kickoff: DateTime<Utc>,
    status: MatchStatus,
}

/// Decides which matches of one collection still accept edits.
#[derive(Debug, Clone)]
pub struct LockClassifier {
    policy: LockPolicy,
    schedule: HashMap<MatchKey, Schedule>,
    earliest_kickoff: Option<DateTime<Utc>>,
}

impl LockClassifier {
    pub fn new(policy: LockPolicy, matches: &[Match]) -> Self {
        let schedule = matches
            .iter()
            .map(|m| {
                (
                    m.key.clone(),
                    Schedule {
                        kickoff: m.kickoff,
                        status: m.status,
                    },
                )
            })
            .collect();
        Self {
            policy,
            schedule,
            earliest_kickoff: matches.iter().map(|m| m.kickoff).min(),
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Keys outside the collection are treated as locked.
    pub fn is_locked(&self, key: &MatchKey, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.schedule.get(key) else {
            return true;
        };
        if entry.status.has_started() {
            return true;
        }
        match self.policy {
            LockPolicy::Collective {
                deadline,
                allow_late_edits,
            } => {
                if allow_late_edits {
                    return false;
                }
                let Some(earliest) = self.earliest_kickoff else {
                    return false;
                };
                cutoff_passed(earliest, deadline, now)
            }
            LockPolicy::PerItem {
                deadline,
                allow_late_edits,
            } => !allow_late_edits && cutoff_passed(entry.kickoff, deadline, now),
        }
    }
}

/// A cutoff earlier than the representable range has always passed.
fn cutoff_passed(kickoff: DateTime<Utc>, deadline: Duration, now: DateTime<Utc>) -> bool {
    kickoff
        .checked_sub_signed(deadline)
        .is_none_or(|cutoff| now >= cutoff)
}

/// Badge state for one match, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStatus {
    Locked,
    Failed,
    Dirty,
    /// Only one side filled in; never submitted.
    Incomplete,
    Saved,
    Empty,
}

pub fn classify(
    store: &DraftStore,
    locks: &LockClassifier,
    key: &MatchKey,
    now: DateTime<Utc>,
) -> DraftStatus {
    if locks.is_locked(key, now) {
        return DraftStatus::Locked;
    }
    if store.is_failed(key) {
        return DraftStatus::Failed;
    }
    if store.is_dirty(key) {
        return DraftStatus::Dirty;
    }
    match store.draft(key) {
        Some(draft) if !draft.is_empty() && !draft.is_complete() => DraftStatus::Incomplete,
        _ if store.saved(key).is_some() => DraftStatus::Saved,
        _ => DraftStatus::Empty,
    }
}
