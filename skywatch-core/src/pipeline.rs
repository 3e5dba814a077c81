//! The weather resolution pipeline: which provider to ask, in which
//! order, and when to fall back.
//!
//! Order is fixed. A date-addressed request goes to the forecast/archive
//! provider first; the current-conditions path asks the point-climate
//! provider and falls back to the forecast provider. Every report comes
//! from exactly one provider.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::model::{Location, WeatherReport};
use crate::provider::ProviderKind;
use crate::provider::open_meteo::OpenMeteoClient;
use crate::provider::power::PowerClient;

/// Stateless orchestrator over the provider adapters. One resolution per
/// call; nothing is cached between invocations.
#[derive(Debug, Clone)]
pub struct WeatherPipeline {
    power: PowerClient,
    open_meteo: OpenMeteoClient,
}

impl WeatherPipeline {
    pub fn new() -> Self {
        Self {
            power: PowerClient::new(),
            open_meteo: OpenMeteoClient::new(),
        }
    }

    #[cfg(test)]
    fn with_clients(power: PowerClient, open_meteo: OpenMeteoClient) -> Self {
        Self { power, open_meteo }
    }

    /// Resolve a weather report for `location`.
    ///
    /// With a `target_date` the date-addressable provider is consulted
    /// first and any failure falls through to the current-conditions
    /// chain. Only when every provider in the chain has failed does an
    /// error reach the caller.
    pub async fn resolve(
        &self,
        location: &Location,
        target_date: Option<NaiveDate>,
    ) -> Result<WeatherReport> {
        if let Some(date) = target_date {
            match self.open_meteo.for_date(location, date).await {
                Ok(report) => {
                    debug!("resolved weather for {date} from {}", report.source);
                    return Ok(report);
                }
                Err(err) => warn!(
                    "date-mode fetch for ({:.4}, {:.4}) on {date} failed ({}): {err}; \
                     falling back to current conditions",
                    location.latitude,
                    location.longitude,
                    err.kind()
                ),
            }
        }

        match self.power.latest_window(location).await {
            Ok(report) => {
                debug!("resolved weather from {}", report.source);
                Ok(report)
            }
            Err(err) => {
                warn!(
                    "{} fetch for ({:.4}, {:.4}) failed ({}): {err}; falling back to {}",
                    ProviderKind::PowerClimate,
                    location.latitude,
                    location.longitude,
                    err.kind(),
                    ProviderKind::OpenMeteoForecast
                );
                let report = self.open_meteo.current(location).await.with_context(|| {
                    format!(
                        "unable to load weather data for ({:.4}, {:.4}): all providers failed",
                        location.latitude, location.longitude
                    )
                })?;
                debug!("resolved weather from {} after fallback", report.source);
                Ok(report)
            }
        }
    }
}

impl Default for WeatherPipeline {
    fn default() -> Self {
        Self::new()
    }
}
