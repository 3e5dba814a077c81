//! Weather data providers.
//!
//! Each adapter is a thin client over one upstream API that normalizes its
//! payload into a [`crate::model::WeatherReport`]. The order in which they
//! are consulted lives in [`crate::pipeline`], not here.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, truncate_body};

pub mod open_meteo;
pub mod power;

/// Per-request timeout for every upstream call in the crate.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client factory for the adapters. Falls back to the default
/// client when the builder cannot be configured.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Upstream sources that can back a weather report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// NASA POWER hourly point climate data.
    #[serde(rename = "nasa-power")]
    PowerClimate,
    /// Open-Meteo forecast and archive APIs.
    #[serde(rename = "open-meteo")]
    OpenMeteoForecast,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::PowerClimate => "nasa-power",
            ProviderKind::OpenMeteoForecast => "open-meteo",
        }
    }

    pub const fn all() -> &'static [ProviderKind] {
        &[ProviderKind::PowerClimate, ProviderKind::OpenMeteoForecast]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared decode path for provider responses: read the body first so a
/// failed status can quote it, then parse the expected shape.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(format!("failed to read {what} response body: {e}")))?;

    if !status.is_success() {
        return Err(ProviderError::Transport(format!(
            "{what} request failed with status {status}: {}",
            truncate_body(&body)
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Transport(format!("failed to parse {what} JSON: {e}")))
}
