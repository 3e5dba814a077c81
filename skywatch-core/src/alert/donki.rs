use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::alert::AlertSource;
use crate::model::{Alert, Location, Severity};
use crate::provider::http_client;

const DONKI_BASE_URL: &str = "https://api.nasa.gov";
/// NASA's shared demo key. Heavily rate limited, which is why throttled
/// responses are routine for this feed.
const DEMO_KEY: &str = "DEMO_KEY";
/// How many days of notifications to request.
const LOOKBACK_DAYS: i64 = 3;

/// Recent space-weather notifications from NASA DONKI. The feed is
/// planet-wide; the queried location plays no part in the request.
#[derive(Debug, Clone)]
pub struct DonkiSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl DonkiSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            base_url: DONKI_BASE_URL.to_string(),
            api_key,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.to_string(),
            api_key,
        }
    }

    async fn fetch(&self) -> Result<Vec<Alert>> {
        let key = self.api_key.as_deref().unwrap_or(DEMO_KEY);
        let end = Utc::now().date_naive();
        let start = end - Duration::days(LOOKBACK_DAYS);
        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();
        debug!("requesting DONKI notifications from {start_str} to {end_str}");

        let url = format!("{}/DONKI/alerts", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("startDate", start_str.as_str()),
                ("endDate", end_str.as_str()),
                ("status", "all"),
                ("api_key", key),
            ])
            .send()
            .await
            .context("Failed to send request to the DONKI service")?;

        let status = res.status();
        if !status.is_success() {
            // With the demo key this is usually throttling; the aggregator
            // turns it into an empty contribution.
            bail!("DONKI request failed with status {status}");
        }

        let messages: Vec<DonkiMessage> = res
            .json()
            .await
            .context("Failed to parse DONKI JSON")?;

        Ok(messages.into_iter().map(DonkiMessage::into_alert).collect())
    }
}

#[async_trait]
impl AlertSource for DonkiSource {
    fn name(&self) -> &'static str {
        "donki"
    }

    async fn active_for(&self, _location: &Location) -> Result<Vec<Alert>> {
        self.fetch().await
    }
}

#[derive(Debug, Deserialize)]
struct DonkiMessage {
    #[serde(rename = "messageID", default)]
    message_id: Option<String>,
    #[serde(rename = "messageType", default)]
    message_type: Option<String>,
    #[serde(rename = "messageIssueTime", default)]
    issue_time: Option<String>,
    #[serde(rename = "messageBody", default)]
    body: Option<String>,
    #[serde(default)]
    regions: Option<Vec<String>>,
}

impl DonkiMessage {
    fn into_alert(self) -> Alert {
        let DonkiMessage {
            message_id,
            message_type,
            issue_time,
            body,
            regions,
        } = self;

        let event = message_type.unwrap_or_else(|| "Space Weather Alert".to_string());
        let id = message_id.unwrap_or_else(|| {
            format!("{event}-{}", issue_time.as_deref().unwrap_or_default())
        });
        let area = regions
            .filter(|r| !r.is_empty())
            .map(|r| r.join(", "))
            .unwrap_or_else(|| "Global".to_string());

        Alert {
            id,
            event,
            // DONKI does not grade its notifications.
            severity: Severity::Unknown,
            description: body.unwrap_or_default(),
            instruction: String::new(),
            area,
            onset: issue_time,
            expires: None,
        }
    }
}
