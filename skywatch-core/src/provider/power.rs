use std::collections::BTreeMap;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::condition;
use crate::error::ProviderError;
use crate::model::{HourlyPoint, Location, WeatherReport, WeatherSnapshot};
use crate::provider::{ProviderKind, http_client, read_json};

const POWER_BASE_URL: &str = "https://power.larc.nasa.gov";
const POWER_PARAMETERS: &str = "T2M,RH2M,WS10M,PRECTOTCORR";
/// Values at or below this are the provider's missing-data sentinels
/// (commonly -999).
const SENTINEL_FLOOR: f64 = -900.0;
/// How far back the request window reaches from now.
const LOOKBACK_HOURS: i64 = 24;
/// Maximum number of hourly points in a report.
const HOURLY_LIMIT: usize = 12;

/// Client for the NASA POWER hourly point API. Keyless; serves recent
/// observed point-climate data rather than a forecast.
#[derive(Debug, Clone)]
pub struct PowerClient {
    http: Client,
    base_url: String,
}

impl PowerClient {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            base_url: POWER_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: &str) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.to_string(),
        }
    }

    /// Latest usable sample from the trailing 24 h window, plus up to the
    /// last 12 hourly samples.
    ///
    /// The snapshot is only produced when all four telemetry values of the
    /// latest sample are real measurements; a missing-data sentinel in any
    /// of them makes the whole attempt invalid so the pipeline can fall
    /// back to a fresher source.
    pub async fn latest_window(&self, location: &Location) -> Result<WeatherReport, ProviderError> {
        let end = Utc::now();
        let start = end - Duration::hours(LOOKBACK_HOURS);

        let lat = format!("{:.4}", location.latitude);
        let lon = format!("{:.4}", location.longitude);
        let start_day = start.format("%Y%m%d").to_string();
        let end_day = end.format("%Y%m%d").to_string();
        debug!("requesting NASA POWER hourly window for ({lat}, {lon})");

        let url = format!("{}/api/temporal/hourly/point", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("parameters", POWER_PARAMETERS),
                ("community", "RE"),
                ("longitude", lon.as_str()),
                ("latitude", lat.as_str()),
                ("start", start_day.as_str()),
                ("end", end_day.as_str()),
                ("format", "JSON"),
            ])
            .send()
            .await?;

        let parsed: PowerResponse = read_json(res, "NASA POWER").await?;
        let parameters = parsed.properties.parameter;

        let Some(latest_key) = parameters.temperature.keys().next_back().cloned() else {
            return Err(ProviderError::Invalid(
                "NASA POWER returned no hourly samples".to_string(),
            ));
        };

        let Some(sample_time) = parse_power_timestamp(&latest_key) else {
            return Err(ProviderError::Invalid(format!(
                "NASA POWER returned unparseable timestamp '{latest_key}'"
            )));
        };

        let Some(sample) = parameters.telemetry(&latest_key) else {
            return Err(ProviderError::Invalid(format!(
                "NASA POWER sample {latest_key} holds missing-data sentinels"
            )));
        };

        // Day/night for the headline condition follows the clock at the
        // time of the request; the report timestamp stays the sample's own.
        let condition = condition::classify(
            sample.temperature,
            sample.precipitation,
            sample.humidity,
            Local::now().hour(),
        );

        let skip = parameters.temperature.len().saturating_sub(HOURLY_LIMIT);
        let hourly: Vec<HourlyPoint> = parameters
            .temperature
            .keys()
            .skip(skip)
            .filter_map(|key| {
                let time = parse_power_timestamp(key)?;
                let temperature = PowerParameterSet::at(&parameters.temperature, key).unwrap_or(0.0);
                let humidity = PowerParameterSet::at(&parameters.humidity, key).unwrap_or(0.0);
                let precipitation =
                    PowerParameterSet::at(&parameters.precipitation, key).unwrap_or(0.0);
                Some(HourlyPoint {
                    hour: time.format("%H:%M").to_string(),
                    temperature_c: temperature,
                    condition: condition::classify(temperature, precipitation, humidity, time.hour()),
                    precipitation_mm: precipitation,
                })
            })
            .collect();

        Ok(WeatherReport {
            source: ProviderKind::PowerClimate,
            current: WeatherSnapshot {
                temperature_c: sample.temperature,
                humidity_pct: sample.humidity,
                wind_speed_mps: sample.wind_speed,
                precipitation_mm: sample.precipitation,
                condition,
                timestamp: sample_time.and_utc().fixed_offset(),
            },
            hourly,
        })
    }
}

impl Default for PowerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// POWER keys its hourly series with `YYYYMMDDHH` strings in UTC.
fn parse_power_timestamp(key: &str) -> Option<NaiveDateTime> {
    if key.len() != 10 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&key[..8], "%Y%m%d").ok()?;
    let hour: u32 = key[8..].parse().ok()?;
    date.and_hms_opt(hour, 0, 0)
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: PowerParameterSet,
}

/// Hourly series keyed by timestamp. `BTreeMap` keeps the keys sorted, so
/// the latest sample is simply the last entry.
#[derive(Debug, Default, Deserialize)]
struct PowerParameterSet {
    #[serde(rename = "T2M", default)]
    temperature: BTreeMap<String, Option<f64>>,
    #[serde(rename = "RH2M", default)]
    humidity: BTreeMap<String, Option<f64>>,
    #[serde(rename = "WS10M", default)]
    wind_speed: BTreeMap<String, Option<f64>>,
    #[serde(rename = "PRECTOTCORR", default)]
    precipitation: BTreeMap<String, Option<f64>>,
}

struct Telemetry {
    temperature: f64,
    humidity: f64,
    wind_speed: f64,
    precipitation: f64,
}

impl PowerParameterSet {
    fn at(series: &BTreeMap<String, Option<f64>>, key: &str) -> Option<f64> {
        series.get(key).copied().flatten()
    }

    /// All four telemetry values for one timestamp. `None` when any value
    /// is absent, null, or at/below the sentinel floor.
    fn telemetry(&self, key: &str) -> Option<Telemetry> {
        let temperature = Self::at(&self.temperature, key)?;
        let humidity = Self::at(&self.humidity, key)?;
        let wind_speed = Self::at(&self.wind_speed, key)?;
        let precipitation = Self::at(&self.precipitation, key)?;

        [temperature, humidity, wind_speed, precipitation]
            .iter()
            .all(|v| *v > SENTINEL_FLOOR)
            .then_some(Telemetry {
                temperature,
                humidity,
                wind_speed,
                precipitation,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionTag;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn power_body(
        t2m: serde_json::Value,
        rh2m: serde_json::Value,
        ws10m: serde_json::Value,
        prectotcorr: serde_json::Value,
    ) -> serde_json::Value {
        json!({
            "properties": {
                "parameter": {
                    "T2M": t2m,
                    "RH2M": rh2m,
                    "WS10M": ws10m,
                    "PRECTOTCORR": prectotcorr,
                }
            }
        })
    }

    #[tokio::test]
    async fn normalizes_the_latest_sample() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .and(query_param("community", "RE"))
            .and(query_param("format", "JSON"))
            .respond_with(ResponseTemplate::new(200).set_body_json(power_body(
                json!({"2024052011": 20.0, "2024052012": 21.5}),
                json!({"2024052011": 40.0, "2024052012": 50.0}),
                json!({"2024052011": 2.0, "2024052012": 3.2}),
                json!({"2024052011": 0.0, "2024052012": 0.0}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let report = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .expect("report must resolve");

        assert_eq!(report.source, ProviderKind::PowerClimate);
        assert_eq!(report.current.temperature_c, 21.5);
        assert_eq!(report.current.humidity_pct, 50.0);
        assert_eq!(report.current.wind_speed_mps, 3.2);
        assert_eq!(report.current.precipitation_mm, 0.0);
        // The timestamp is the sample's own, not the wall clock.
        assert_eq!(
            report.current.timestamp.to_rfc3339(),
            "2024-05-20T12:00:00+00:00"
        );
        assert!(matches!(
            report.current.condition,
            ConditionTag::Sunny | ConditionTag::NightClear
        ));
    }

    #[tokio::test]
    async fn sentinel_values_invalidate_the_sample() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(ResponseTemplate::new(200).set_body_json(power_body(
                json!({"2024052012": -999.0}),
                json!({"2024052012": 50.0}),
                json!({"2024052012": 3.2}),
                json!({"2024052012": 0.0}),
            )))
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let err = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Invalid(_)));
    }

    #[tokio::test]
    async fn zero_readings_are_not_sentinels() {
        // A calm, dry, freezing hour reads 0.0 on every parameter; only
        // values at the sentinel floor mark missing data.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(ResponseTemplate::new(200).set_body_json(power_body(
                json!({"2024052012": 0.0}),
                json!({"2024052012": 0.0}),
                json!({"2024052012": 0.0}),
                json!({"2024052012": 0.0}),
            )))
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let report = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .expect("report must resolve");

        assert_eq!(report.current.temperature_c, 0.0);
        assert_eq!(report.current.humidity_pct, 0.0);
        assert_eq!(report.current.wind_speed_mps, 0.0);
        assert_eq!(report.current.precipitation_mm, 0.0);
        assert!(matches!(
            report.current.condition,
            ConditionTag::Sunny | ConditionTag::NightClear
        ));
    }

    #[tokio::test]
    async fn missing_series_entry_invalidates_the_sample() {
        let server = MockServer::start().await;
        // Humidity has no entry for the latest timestamp.
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(ResponseTemplate::new(200).set_body_json(power_body(
                json!({"2024052011": 20.0, "2024052012": 21.5}),
                json!({"2024052011": 40.0}),
                json!({"2024052011": 2.0, "2024052012": 3.2}),
                json!({"2024052011": 0.0, "2024052012": 0.0}),
            )))
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let err = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Invalid(_)));
    }

    #[tokio::test]
    async fn empty_series_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"properties": {"parameter": {}}})),
            )
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let err = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Invalid(_)));
    }

    #[tokio::test]
    async fn server_errors_are_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let err = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn hourly_series_keeps_the_last_twelve_in_order() {
        let mut t2m = serde_json::Map::new();
        let mut rh2m = serde_json::Map::new();
        let mut ws10m = serde_json::Map::new();
        let mut precip = serde_json::Map::new();
        for hour in 0..15 {
            let key = format!("20240520{hour:02}");
            t2m.insert(key.clone(), json!(hour as f64));
            rh2m.insert(key.clone(), json!(50.0));
            ws10m.insert(key.clone(), json!(1.0));
            precip.insert(key, json!(0.0));
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/temporal/hourly/point"))
            .respond_with(ResponseTemplate::new(200).set_body_json(power_body(
                t2m.into(),
                rh2m.into(),
                ws10m.into(),
                precip.into(),
            )))
            .mount(&server)
            .await;

        let client = PowerClient::with_base_url(&server.uri());
        let report = client
            .latest_window(&Location::new(16.4634, 80.5067))
            .await
            .expect("report must resolve");

        assert_eq!(report.hourly.len(), 12);
        assert_eq!(report.hourly[0].hour, "03:00");
        assert_eq!(report.hourly[11].hour, "14:00");
        let temps: Vec<f64> = report.hourly.iter().map(|p| p.temperature_c).collect();
        let mut sorted = temps.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(temps, sorted);
        // Hour 12 during daytime with dry mid-humidity air classifies clear.
        assert_eq!(report.hourly[9].condition, ConditionTag::Sunny);
    }

    #[test]
    fn power_timestamps_parse_strictly() {
        assert!(parse_power_timestamp("2024052012").is_some());
        assert!(parse_power_timestamp("2024052024").is_none());
        assert!(parse_power_timestamp("20240520").is_none());
        assert!(parse_power_timestamp("2024-05-20").is_none());
    }
}
