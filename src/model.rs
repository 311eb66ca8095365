use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores are bounded to two digits (0..=99).
pub const MAX_SCORE_DIGITS: usize = 2;
pub const MAX_SCORE: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchKey(pub String);

impl MatchKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreField {
    Home,
    Away,
}

/// Local edit buffer for one match. Empty strings mean "not predicted yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDraft {
    pub home: String,
    pub away: String,
}

impl ScoreDraft {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
        }
    }

    pub fn from_scores(home: u8, away: u8) -> Self {
        Self {
            home: home.to_string(),
            away: away.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.home.is_empty() && self.away.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.home.is_empty() && !self.away.is_empty()
    }

    pub fn get(&self, field: ScoreField) -> &str {
        match field {
            ScoreField::Home => &self.home,
            ScoreField::Away => &self.away,
        }
    }

    /// Both sides as numbers, or `None` while the pair is partial or empty.
    pub fn parsed(&self) -> Option<(u8, u8)> {
        if !self.is_complete() {
            return None;
        }
        Some((parse_score(&self.home)?, parse_score(&self.away)?))
    }
}

/// Accepts only `""` or up to `MAX_SCORE_DIGITS` ascii digits.
pub fn is_valid_score_input(raw: &str) -> bool {
    raw.len() <= MAX_SCORE_DIGITS && raw.chars().all(|c| c.is_ascii_digit())
}

fn parse_score(raw: &str) -> Option<u8> {
    if raw.is_empty() || !is_valid_score_input(raw) {
        return None;
    }
    raw.parse::<u8>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrediction {
    pub match_key: MatchKey,
    pub remote_id: String,
    pub home: u8,
    pub away: u8,
}

impl SavedPrediction {
    pub fn as_draft(&self) -> ScoreDraft {
        ScoreDraft::from_scores(self.home, self.away)
    }
}

/// League + tournament selection that scopes one editing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub league_id: String,
    pub tournament_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl MatchStatus {
    pub fn has_started(self) -> bool {
        !matches!(self, MatchStatus::NotStarted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub key: MatchKey,
    pub home: TeamRef,
    pub away: TeamRef,
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
}
