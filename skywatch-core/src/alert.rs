//! Hazard alerts: the government severe-weather feed and the
//! space-weather feed, normalized into one [`Alert`] shape.

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{Config, ServiceId};
use crate::model::{Alert, Location};

pub mod donki;
pub mod nws;

/// One upstream alert feed. Implementations normalize their payloads and
/// handle their provider's documented "no alerts" responses themselves;
/// anything else may surface as an error for the aggregator to downgrade.
#[async_trait]
pub trait AlertSource: Send + Sync + Debug {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    async fn active_for(&self, location: &Location) -> anyhow::Result<Vec<Alert>>;
}

/// Aggregates every configured alert source. A failing feed contributes
/// nothing; it never blocks the other feeds or the weather snapshot.
#[derive(Debug)]
pub struct AlertFeed {
    sources: Vec<Box<dyn AlertSource>>,
}

impl AlertFeed {
    pub fn new(config: &Config) -> Self {
        Self::with_sources(vec![
            Box::new(nws::NwsSource::new()),
            Box::new(donki::DonkiSource::new(
                config.api_key(ServiceId::SpaceWeather).map(str::to_owned),
            )),
        ])
    }

    pub fn with_sources(sources: Vec<Box<dyn AlertSource>>) -> Self {
        Self { sources }
    }

    /// Active alerts near `location`, in source order.
    pub async fn fetch_alerts(&self, location: &Location) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for source in &self.sources {
            match source.active_for(location).await {
                Ok(batch) => {
                    debug!("{} returned {} alert(s)", source.name(), batch.len());
                    alerts.extend(batch);
                }
                Err(err) => warn!(
                    "{} alert fetch for ({:.4}, {:.4}) failed: {err:#}; continuing without it",
                    source.name(),
                    location.latitude,
                    location.longitude
                ),
            }
        }
        alerts
    }
}
