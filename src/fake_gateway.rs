use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use rand::Rng;

use crate::gateway::PredictionGateway;
use crate::model::{CollectionKey, Match, MatchKey, MatchStatus, SavedPrediction, TeamRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Create { match_key: MatchKey, home: u8, away: u8 },
    Update { remote_id: String, home: u8, away: u8 },
    ListPredictions,
    ListMatches,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    rows: HashMap<String, SavedPrediction>,
    matches: Vec<Match>,
    failing: HashSet<MatchKey>,
    calls: Vec<GatewayCall>,
}

/// In-memory stand-in for the prediction API, used by the demo mode and tests.
#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    failure_rate: f64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_matches(self, matches: Vec<Match>) -> Self {
        self.lock().matches = matches;
        self
    }

    pub fn with_saved(self, saved: Vec<SavedPrediction>) -> Self {
        {
            let mut state = self.lock();
            for row in saved {
                state.rows.insert(row.remote_id.clone(), row);
            }
        }
        self
    }

    /// Every commit touching `key` fails until `heal` is called.
    pub fn fail_for(&self, key: &MatchKey) {
        self.lock().failing.insert(key.clone());
    }

    pub fn heal(&self, key: &MatchKey) {
        self.lock().failing.remove(key);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn stored(&self, remote_id: &str) -> Option<SavedPrediction> {
        self.lock().rows.get(remote_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake gateway lock poisoned")
    }

    fn should_fail(&self, state: &FakeState, key: &MatchKey) -> bool {
        if state.failing.contains(key) {
            return true;
        }
        self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate)
    }
}

impl PredictionGateway for FakeGateway {
    fn create(&self, match_key: &MatchKey, home: u8, away: u8) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Create {
            match_key: match_key.clone(),
            home,
            away,
        });
        if self.should_fail(&state, match_key) {
            return Err(anyhow!("simulated failure creating {match_key}"));
        }
        state.next_id += 1;
        let remote_id = format!("pred-{}", state.next_id);
        state.rows.insert(
            remote_id.clone(),
            SavedPrediction {
                match_key: match_key.clone(),
                remote_id: remote_id.clone(),
                home,
                away,
            },
        );
        Ok(remote_id)
    }

    fn update(&self, remote_id: &str, home: u8, away: u8) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Update {
            remote_id: remote_id.to_string(),
            home,
            away,
        });
        let Some(key) = state.rows.get(remote_id).map(|row| row.match_key.clone()) else {
            return Err(anyhow!("prediction {remote_id} not found"));
        };
        if self.should_fail(&state, &key) {
            return Err(anyhow!("simulated failure updating {remote_id}"));
        }
        if let Some(row) = state.rows.get_mut(remote_id) {
            row.home = home;
            row.away = away;
        }
        Ok(())
    }

    fn list_predictions(&self, _collection: &CollectionKey) -> Result<Vec<SavedPrediction>> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::ListPredictions);
        let mut rows: Vec<SavedPrediction> = state.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.match_key.cmp(&b.match_key));
        Ok(rows)
    }

    fn list_matches(&self, _tournament_id: &str) -> Result<Vec<Match>> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::ListMatches);
        Ok(state.matches.clone())
    }
}

/// A small group stage kicking off tomorrow, for the demo binary.
pub fn seed_matches() -> Vec<Match> {
    let base = Utc::now() + Duration::days(1);
    let teams = [
        ("mex", "Mexico"),
        ("rsa", "South Africa"),
        ("kor", "Korea Republic"),
        ("cze", "Czechia"),
    ];
    let fixtures = [(0, 1), (2, 3), (0, 2), (3, 1), (3, 0), (1, 2)];
    fixtures
        .iter()
        .enumerate()
        .map(|(i, &(h, a))| Match {
            key: MatchKey(format!("grp-a-{}", i + 1)),
            home: seed_team(teams[h]),
            away: seed_team(teams[a]),
            kickoff: base + Duration::hours(6 * i as i64),
            status: MatchStatus::NotStarted,
        })
        .collect()
}

fn seed_team((id, name): (&str, &str)) -> TeamRef {
    TeamRef {
        id: id.to_string(),
        name: name.to_string(),
        logo: None,
    }
}
