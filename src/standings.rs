use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Match, MatchKey, ScoreDraft, TeamRef};

const POINTS_WIN: u32 = 3;
const POINTS_DRAW: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub team_id: String,
    pub name: String,
    pub logo: Option<String>,
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
}

impl Standing {
    fn new(team: &TeamRef) -> Self {
        Self {
            team_id: team.id.clone(),
            name: team.name.clone(),
            logo: team.logo.clone(),
            matches_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            points: 0,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }

    fn record(&mut self, scored: u8, conceded: u8) {
        self.matches_played += 1;
        self.goals_for += u32::from(scored);
        self.goals_against += u32::from(conceded);
        if scored > conceded {
            self.wins += 1;
            self.points += POINTS_WIN;
        } else if scored < conceded {
            self.losses += 1;
        } else {
            self.draws += 1;
            self.points += POINTS_DRAW;
        }
    }
}

/// Ranks every team referenced by `matches` using the score pairs in `values`.
///
/// Matches without a complete pair are skipped. Order is points, then goal
/// difference, then goals scored; remaining ties keep first-seen order.
pub fn derive_standings(
    matches: &[Match],
    values: &HashMap<MatchKey, ScoreDraft>,
) -> Vec<Standing> {
    let mut table: Vec<Standing> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for m in matches {
        for team in [&m.home, &m.away] {
            if !index.contains_key(team.id.as_str()) {
                index.insert(team.id.as_str(), table.len());
                table.push(Standing::new(team));
            }
        }
    }

    for m in matches {
        let Some((home_goals, away_goals)) = values.get(&m.key).and_then(ScoreDraft::parsed)
        else {
            continue;
        };
        if let Some(&i) = index.get(m.home.id.as_str()) {
            table[i].record(home_goals, away_goals);
        }
        if let Some(&i) = index.get(m.away.id.as_str()) {
            table[i].record(away_goals, home_goals);
        }
    }

    // `sort_by` is stable, which keeps encounter order for full ties.
    table.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then(b.goals_for.cmp(&a.goals_for))
    });
    table
}
