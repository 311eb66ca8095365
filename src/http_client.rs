use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::config::Settings;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client; the first caller's timeout wins for the life of the process.
pub fn http_client(settings: &Settings) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")
    })
}
