use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Http,
    Fake,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub gateway: GatewayKind,
    pub fake_failure_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(10),
            gateway: GatewayKind::Http,
            fake_failure_rate: 0.0,
        }
    }
}

impl Settings {
    /// Loads `.env.local` then `.env` (both optional) and reads the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let defaults = Self::default();
        let api_url = opt_env("PREDICTIONS_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(10)
                .clamp(1, 120),
        );
        let gateway = match opt_env("PREDICTIONS_GATEWAY")
            .map(|val| val.to_lowercase())
            .as_deref()
        {
            Some("fake") => GatewayKind::Fake,
            _ => GatewayKind::Http,
        };
        let fake_failure_rate = env::var("FAKE_FAILURE_RATE")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .filter(|val| val.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Self {
            api_url,
            api_token: opt_env("PREDICTIONS_API_TOKEN"),
            request_timeout,
            gateway,
            fake_failure_rate,
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
