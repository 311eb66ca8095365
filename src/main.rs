use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use league_predictions::config::{GatewayKind, Settings};
use league_predictions::fake_gateway::{self, FakeGateway};
use league_predictions::gateway::{HttpGateway, PredictionGateway};
use league_predictions::lock::{DeadlineSettings, PredictionMode};
use league_predictions::model::{CollectionKey, MatchKey, ScoreField};
use league_predictions::session::PredictionSession;
use league_predictions::standings::Standing;

const DEFAULT_DEADLINE_MINUTES: i64 = 60;

fn main() -> Result<()> {
    env_logger::init();
    let settings = Settings::from_env();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let collection = CollectionKey {
        league_id: arg_value(&args, "--league").unwrap_or_else(|| "default".to_string()),
        tournament_id: arg_value(&args, "--tournament")
            .unwrap_or_else(|| "default".to_string()),
    };
    let deadline = DeadlineSettings {
        prediction_mode: match arg_value(&args, "--mode").as_deref() {
            Some("per-match") | Some("PerMatch") => PredictionMode::PerMatch,
            _ => PredictionMode::AllAtOnce,
        },
        deadline_minutes: arg_value(&args, "--deadline-minutes")
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(DEFAULT_DEADLINE_MINUTES),
        allow_late_edits: args.iter().any(|a| a == "--allow-late"),
    };

    let gateway: Box<dyn PredictionGateway> = match settings.gateway {
        GatewayKind::Http => Box::new(HttpGateway::new(&settings)?),
        GatewayKind::Fake => Box::new(
            FakeGateway::new()
                .with_failure_rate(settings.fake_failure_rate)
                .with_matches(fake_gateway::seed_matches()),
        ),
    };

    let mut session = PredictionSession::load(gateway.as_ref(), collection, deadline)?;

    let now = Utc::now();
    for raw in arg_values(&args, "--set") {
        let (key, home, away) = parse_edit(&raw)?;
        session.edit(&key, ScoreField::Home, &home, now)?;
        session.edit(&key, ScoreField::Away, &away, now)?;
    }

    let report = session.submit(now);
    println!("{}", report.summary.message());
    for outcome in report.outcomes.iter().filter(|o| !o.success) {
        println!(
            "  {} failed: {}",
            outcome.match_key,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    if args.iter().any(|a| a == "--retry") {
        for key in session.store().failed_keys() {
            match session.retry(&key, now) {
                Ok(outcome) if outcome.success => println!("  {key} saved on retry"),
                Ok(outcome) => println!(
                    "  {key} still failing: {}",
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
                Err(err) => println!("  {key} not retried: {err:#}"),
            }
        }
    }

    print_table(&session.live_standings());
    Ok(())
}

fn print_table(rows: &[Standing]) {
    println!(
        "{:<3} {:<20} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>4}",
        "#", "Team", "MP", "W", "D", "L", "GF", "GA", "GD", "Pts"
    );
    for (idx, row) in rows.iter().enumerate() {
        println!(
            "{:<3} {:<20} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>4}",
            idx + 1,
            row.name,
            row.matches_played,
            row.wins,
            row.draws,
            row.losses,
            row.goals_for,
            row.goals_against,
            row.goal_difference(),
            row.points
        );
    }
}

/// `--set grp-a-1=2-1`
fn parse_edit(raw: &str) -> Result<(MatchKey, String, String)> {
    let (key, score) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <match>=<home>-<away>, got {raw:?}"))?;
    let (home, away) = score
        .split_once('-')
        .with_context(|| format!("expected <home>-<away> in {raw:?}"))?;
    Ok((
        MatchKey::from(key.trim()),
        home.trim().to_string(),
        away.trim().to_string(),
    ))
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    arg_values(args, flag).into_iter().next()
}

fn arg_values(args: &[String], flag: &str) -> Vec<String> {
    let prefix = format!("{flag}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            if !raw.trim().is_empty() {
                out.push(raw.trim().to_string());
            }
            continue;
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            out.push(next.trim().to_string());
        }
    }
    out
}
