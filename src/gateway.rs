use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::http_client::http_client;
use crate::model::{
    CollectionKey, MAX_SCORE, Match, MatchKey, MatchStatus, SavedPrediction, TeamRef,
};

/// Remote store for predictions and matches. Implementations are stateless and never retry.
pub trait PredictionGateway: Send + Sync {
    /// Persists a new prediction and returns its remote id.
    fn create(&self, match_key: &MatchKey, home: u8, away: u8) -> Result<String>;

    fn update(&self, remote_id: &str, home: u8, away: u8) -> Result<()>;

    fn list_predictions(&self, collection: &CollectionKey) -> Result<Vec<SavedPrediction>>;

    fn list_matches(&self, tournament_id: &str) -> Result<Vec<Match>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub is_success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<Option<T>> {
        if self.is_success {
            return Ok(self.data);
        }
        let message = self
            .error
            .and_then(|e| e.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        Err(anyhow!(message))
    }
}

pub fn parse_envelope_json<T: DeserializeOwned>(raw: &str) -> Result<Option<T>> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(raw.trim()).context("invalid envelope json")?;
    envelope.into_result()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePrediction {
    id: String,
    match_id: String,
    home_score: u8,
    away_score: u8,
}

#[derive(Debug, Deserialize)]
struct WireCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTeam {
    id: String,
    name: String,
    #[serde(default)]
    logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatch {
    id: String,
    home_team: WireTeam,
    away_team: WireTeam,
    start_time: DateTime<Utc>,
    status: WireStatus,
}

#[derive(Debug, Deserialize)]
enum WireStatus {
    #[serde(alias = "Scheduled")]
    NotStarted,
    #[serde(alias = "Live")]
    InProgress,
    #[serde(alias = "Completed")]
    Finished,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    match_id: &'a str,
    home_score: u8,
    away_score: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    home_score: u8,
    away_score: u8,
}

pub fn parse_predictions_json(raw: &str) -> Result<Vec<SavedPrediction>> {
    let rows: Vec<WirePrediction> = parse_envelope_json(raw)?.unwrap_or_default();
    rows.into_iter()
        .map(|row| {
            if row.home_score > MAX_SCORE || row.away_score > MAX_SCORE {
                bail!(
                    "prediction {} has out-of-range score {}-{}",
                    row.id,
                    row.home_score,
                    row.away_score
                );
            }
            Ok(SavedPrediction {
                match_key: MatchKey(row.match_id),
                remote_id: row.id,
                home: row.home_score,
                away: row.away_score,
            })
        })
        .collect()
}

pub fn parse_matches_json(raw: &str) -> Result<Vec<Match>> {
    let rows: Vec<WireMatch> = parse_envelope_json(raw)?.unwrap_or_default();
    Ok(rows.into_iter().map(match_from_wire).collect())
}

pub fn parse_created_id_json(raw: &str) -> Result<String> {
    let created: Option<WireCreated> = parse_envelope_json(raw)?;
    created
        .map(|c| c.id)
        .ok_or_else(|| anyhow!("create response carried no id"))
}

/// Update responses may come back as an envelope or with no body at all (`204`).
pub fn parse_update_ack_json(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Ok(());
    }
    parse_envelope_json::<serde_json::Value>(raw)?;
    Ok(())
}

fn match_from_wire(row: WireMatch) -> Match {
    Match {
        key: MatchKey(row.id),
        home: team_from_wire(row.home_team),
        away: team_from_wire(row.away_team),
        kickoff: row.start_time,
        status: match row.status {
            WireStatus::NotStarted => MatchStatus::NotStarted,
            WireStatus::InProgress => MatchStatus::InProgress,
            WireStatus::Finished => MatchStatus::Finished,
        },
    }
}

fn team_from_wire(team: WireTeam) -> TeamRef {
    TeamRef {
        id: team.id,
        name: team.name,
        logo: team.logo_url,
    }
}

pub struct HttpGateway {
    client: &'static Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: settings.api_url.clone(),
            token: settings.api_token.clone(),
        })
    }

    fn send(&self, req: RequestBuilder) -> Result<String> {
        let mut req = req.header(ACCEPT, "application/json");
        if let Some(token) = self.token.as_deref() {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let url = resp.url().clone();
        let body = resp.text().context("failed reading body")?;
        log::debug!("[GATEWAY] {url} -> {status} ({} bytes)", body.len());
        if status.is_success() {
            return Ok(body);
        }
        // Error responses usually still carry the envelope with a readable message.
        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body.trim()) {
            envelope
                .into_result()
                .with_context(|| format!("http {status}"))?;
        }
        Err(anyhow!("http {}: {}", status, body.trim()))
    }
}

impl PredictionGateway for HttpGateway {
    fn create(&self, match_key: &MatchKey, home: u8, away: u8) -> Result<String> {
        let url = format!("{}/predictions", self.base_url);
        let body = CreateBody {
            match_id: match_key.as_str(),
            home_score: home,
            away_score: away,
        };
        let raw = self
            .send(self.client.post(&url).json(&body))
            .with_context(|| format!("create prediction for {match_key}"))?;
        parse_created_id_json(&raw)
    }

    fn update(&self, remote_id: &str, home: u8, away: u8) -> Result<()> {
        let url = format!("{}/predictions/{remote_id}", self.base_url);
        let body = UpdateBody {
            home_score: home,
            away_score: away,
        };
        let raw = self
            .send(self.client.put(&url).json(&body))
            .with_context(|| format!("update prediction {remote_id}"))?;
        parse_update_ack_json(&raw)
    }

    fn list_predictions(&self, collection: &CollectionKey) -> Result<Vec<SavedPrediction>> {
        let url = format!("{}/predictions", self.base_url);
        let req = self.client.get(&url).query(&[
            ("leagueId", collection.league_id.as_str()),
            ("tournamentId", collection.tournament_id.as_str()),
        ]);
        let raw = self.send(req).context("list predictions")?;
        parse_predictions_json(&raw)
    }

    fn list_matches(&self, tournament_id: &str) -> Result<Vec<Match>> {
        let url = format!("{}/matches", self.base_url);
        let req = self.client.get(&url).query(&[("tournamentId", tournament_id)]);
        let raw = self.send(req).context("list matches")?;
        parse_matches_json(&raw)
    }
}
