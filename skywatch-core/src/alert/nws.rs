use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::alert::AlertSource;
use crate::error::truncate_body;
use crate::model::{Alert, Location, Severity};
use crate::provider::http_client;

const NWS_BASE_URL: &str = "https://api.weather.gov";
/// The service rejects anonymous clients, so identify ourselves.
const USER_AGENT: &str = "skywatch/0.1";

/// Active severe-weather alerts from the US National Weather Service,
/// addressed by point. Keyless.
#[derive(Debug, Clone)]
pub struct NwsSource {
    http: Client,
    base_url: String,
}

impl NwsSource {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            base_url: NWS_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.to_string(),
        }
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<Alert>> {
        let point = format!("{:.4},{:.4}", location.latitude, location.longitude);
        debug!("requesting NWS active alerts for point {point}");

        let url = format!("{}/alerts/active", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[("point", point.as_str())])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/geo+json")
            .send()
            .await
            .context("Failed to send request to the NWS alert service")?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            // Documented responses for points outside any alert zone, for
            // example coordinates over the open ocean or outside the US.
            debug!("NWS returned {status} for point {point}; treating as no active alerts");
            return Ok(Vec::new());
        }

        let body = res
            .text()
            .await
            .context("Failed to read NWS alert response body")?;

        if !status.is_success() {
            bail!(
                "NWS alert request failed with status {status}: {}",
                truncate_body(&body)
            );
        }

        let parsed: AlertCollection =
            serde_json::from_str(&body).context("Failed to parse NWS alert JSON")?;

        Ok(parsed
            .features
            .into_iter()
            .map(AlertFeature::into_alert)
            .collect())
    }
}

impl Default for NwsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSource for NwsSource {
    fn name(&self) -> &'static str {
        "nws"
    }

    async fn active_for(&self, location: &Location) -> Result<Vec<Alert>> {
        self.fetch(location).await
    }
}

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    id: String,
    #[serde(default)]
    properties: AlertProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertProperties {
    event: Option<String>,
    severity: Option<String>,
    description: Option<String>,
    instruction: Option<String>,
    area_desc: Option<String>,
    onset: Option<String>,
    expires: Option<String>,
}

impl AlertFeature {
    fn into_alert(self) -> Alert {
        let props = self.properties;
        Alert {
            id: self.id,
            event: props.event.unwrap_or_else(|| "Weather Alert".to_string()),
            severity: Severity::normalize(props.severity.as_deref()),
            description: props.description.unwrap_or_default(),
            instruction: props.instruction.unwrap_or_default(),
            area: props.area_desc.unwrap_or_default(),
            onset: props.onset,
            expires: props.expires,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn not_found_means_no_active_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = NwsSource::with_base_url(&server.uri());
        let alerts = source
            .active_for(&Location::new(51.5072, -0.1276))
            .await
            .expect("404 must not be an error");

        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn bad_request_means_no_active_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let source = NwsSource::with_base_url(&server.uri());
        let alerts = source
            .active_for(&Location::new(0.0, 0.0))
            .await
            .expect("400 must not be an error");

        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn alerts_are_normalized_from_the_feature_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .and(query_param("point", "40.7128,-74.0060"))
            .and(header("Accept", "application/geo+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [
                    {
                        "id": "urn:oid:1",
                        "properties": {
                            "event": "Tornado Warning",
                            "severity": "EXTREME",
                            "description": "Take cover now.",
                            "instruction": "Move to a basement.",
                            "areaDesc": "Kings County",
                            "onset": "2024-05-20T12:00:00-04:00",
                            "expires": "2024-05-20T13:00:00-04:00"
                        }
                    },
                    {
                        "id": "urn:oid:2",
                        "properties": {
                            "severity": "apocalyptic",
                            "areaDesc": "Queens County"
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let source = NwsSource::with_base_url(&server.uri());
        let alerts = source
            .active_for(&Location::new(40.7128, -74.006))
            .await
            .expect("alerts must resolve");

        assert_eq!(alerts.len(), 2);

        assert_eq!(alerts[0].id, "urn:oid:1");
        assert_eq!(alerts[0].event, "Tornado Warning");
        assert_eq!(alerts[0].severity, Severity::Extreme);
        assert_eq!(alerts[0].area, "Kings County");
        assert_eq!(alerts[0].onset.as_deref(), Some("2024-05-20T12:00:00-04:00"));

        // Absent fields degrade to defaults, never to errors.
        assert_eq!(alerts[1].event, "Weather Alert");
        assert_eq!(alerts[1].severity, Severity::Unknown);
        assert_eq!(alerts[1].instruction, "");
    }

    #[tokio::test]
    async fn server_errors_surface_for_the_aggregator() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts/active"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let source = NwsSource::with_base_url(&server.uri());
        let err = source
            .active_for(&Location::new(40.7128, -74.006))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }
}
