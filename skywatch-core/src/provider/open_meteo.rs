use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::condition;
use crate::error::ProviderError;
use crate::model::{HourlyPoint, Location, WeatherReport, WeatherSnapshot};
use crate::provider::{ProviderKind, http_client, read_json};

const FORECAST_BASE_URL: &str = "https://api.open-meteo.com";
const ARCHIVE_BASE_URL: &str = "https://archive-api.open-meteo.com";
const HOURLY_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m";
/// Longest forecast horizon the endpoint serves.
const FORECAST_DAYS: &str = "16";
/// Maximum number of hourly points in a report.
const HOURLY_LIMIT: usize = 12;
/// The representative sample for a whole day is the one at local noon.
const NOON_HOUR: u32 = 12;

/// Client for the Open-Meteo forecast and archive APIs. Keyless; the only
/// provider that can answer for an arbitrary calendar date.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: Client,
    forecast_base: String,
    archive_base: String,
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            forecast_base: FORECAST_BASE_URL.to_string(),
            archive_base: ARCHIVE_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(forecast_base: &str, archive_base: &str) -> Self {
        Self {
            http: http_client(),
            forecast_base: forecast_base.to_string(),
            archive_base: archive_base.to_string(),
        }
    }

    /// Present conditions plus the first hours of the forecast.
    ///
    /// Prefers the dedicated `current` block and falls back per field to
    /// the head of the hourly series, then to zero, so a partial payload
    /// still yields a snapshot. The snapshot timestamp is the wall clock
    /// at resolution time.
    pub async fn current(&self, location: &Location) -> Result<WeatherReport, ProviderError> {
        let lat = format!("{:.4}", location.latitude);
        let lon = format!("{:.4}", location.longitude);
        debug!("requesting Open-Meteo current conditions for ({lat}, {lon})");

        let url = format!("{}/v1/forecast", self.forecast_base);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("hourly", HOURLY_FIELDS),
                ("current", HOURLY_FIELDS),
                ("wind_speed_unit", "ms"),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let parsed: ForecastResponse = read_json(res, "Open-Meteo forecast").await?;
        let hourly = parsed.hourly.unwrap_or_default();

        if parsed.current.is_none() && hourly.time.is_empty() {
            return Err(ProviderError::Invalid(
                "Open-Meteo returned neither current conditions nor an hourly series".to_string(),
            ));
        }

        let current = parsed.current.unwrap_or_default();
        let temperature = current
            .temperature_2m
            .unwrap_or_else(|| hourly.temperature(0));
        let humidity = current
            .relative_humidity_2m
            .unwrap_or_else(|| hourly.humidity(0));
        let precipitation = current
            .precipitation
            .unwrap_or_else(|| hourly.precipitation(0));
        let wind_speed = current
            .wind_speed_10m
            .unwrap_or_else(|| hourly.wind_speed(0));

        let condition =
            condition::classify(temperature, precipitation, humidity, Local::now().hour());
        let points = hourly.points(0..hourly.time.len(), HOURLY_LIMIT);

        Ok(WeatherReport {
            source: ProviderKind::OpenMeteoForecast,
            current: WeatherSnapshot {
                temperature_c: temperature,
                humidity_pct: humidity,
                wind_speed_mps: wind_speed,
                precipitation_mm: precipitation,
                condition,
                timestamp: Utc::now().fixed_offset(),
            },
            hourly: points,
        })
    }

    /// Conditions for one calendar date, past or future.
    ///
    /// Strictly-past days come from the archive endpoint; today and future
    /// days from the forecast endpoint. The snapshot is the sample at
    /// local noon of the requested day when present, else the first sample
    /// on that day, else the head of the series.
    pub async fn for_date(
        &self,
        location: &Location,
        date: NaiveDate,
    ) -> Result<WeatherReport, ProviderError> {
        let today = Utc::now().date_naive();
        let day = date.format("%Y-%m-%d").to_string();
        let lat = format!("{:.4}", location.latitude);
        let lon = format!("{:.4}", location.longitude);

        let is_past = date < today;
        let (endpoint, url) = if is_past {
            ("Open-Meteo archive", format!("{}/v1/archive", self.archive_base))
        } else {
            ("Open-Meteo forecast", format!("{}/v1/forecast", self.forecast_base))
        };
        debug!("requesting {endpoint} data for ({lat}, {lon}) on {day}");

        let mut query: Vec<(&str, &str)> = vec![
            ("latitude", lat.as_str()),
            ("longitude", lon.as_str()),
            ("hourly", HOURLY_FIELDS),
            ("wind_speed_unit", "ms"),
            ("timezone", "auto"),
        ];
        if is_past {
            query.push(("start_date", day.as_str()));
            query.push(("end_date", day.as_str()));
        } else {
            query.push(("forecast_days", FORECAST_DAYS));
        }

        let res = self.http.get(&url).query(&query).send().await?;
        let parsed: ForecastResponse = read_json(res, endpoint).await?;
        let hourly = parsed.hourly.unwrap_or_default();

        if hourly.time.is_empty() {
            return Err(ProviderError::Invalid(format!(
                "Open-Meteo returned no hourly series for {day}"
            )));
        }

        let filtered: Vec<usize> = hourly
            .time
            .iter()
            .enumerate()
            .filter(|(_, time)| time.starts_with(&day))
            .map(|(idx, _)| idx)
            .collect();

        let pick = filtered
            .iter()
            .copied()
            .find(|&idx| {
                parse_local_time(&hourly.time[idx]).is_some_and(|t| t.hour() == NOON_HOUR)
            })
            .or_else(|| filtered.first().copied())
            .unwrap_or(0);

        let offset = FixedOffset::east_opt(parsed.utc_offset_seconds).unwrap_or_else(|| Utc.fix());
        let picked_time = hourly.time.get(pick).map(String::as_str).unwrap_or_default();
        let local = parse_local_time(picked_time).or_else(|| date.and_hms_opt(NOON_HOUR, 0, 0));
        let timestamp = local
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .unwrap_or_else(|| Utc::now().with_timezone(&offset));
        let hour = local.map_or(NOON_HOUR, |naive| naive.hour());

        let temperature = hourly.temperature(pick);
        let precipitation = hourly.precipitation(pick);
        let humidity = hourly.humidity(pick);
        let condition = condition::classify(temperature, precipitation, humidity, hour);

        let points = if filtered.is_empty() {
            hourly.points(0..hourly.time.len(), HOURLY_LIMIT)
        } else {
            hourly.points(filtered.iter().copied(), HOURLY_LIMIT)
        };

        Ok(WeatherReport {
            source: ProviderKind::OpenMeteoForecast,
            current: WeatherSnapshot {
                temperature_c: temperature,
                humidity_pct: humidity,
                wind_speed_mps: hourly.wind_speed(pick),
                precipitation_mm: precipitation,
                condition,
                timestamp,
            },
            hourly: points,
        })
    }
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Open-Meteo local timestamps look like `2024-05-20T13:00`.
fn parse_local_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok()
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    current: Option<CurrentBlock>,
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    wind_speed_10m: Option<f64>,
}

/// Parallel arrays keyed by parameter name; `time` is the shared axis.
#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
}

impl HourlyBlock {
    fn at(series: &[Option<f64>], idx: usize) -> f64 {
        series.get(idx).copied().flatten().unwrap_or(0.0)
    }

    fn temperature(&self, idx: usize) -> f64 {
        Self::at(&self.temperature_2m, idx)
    }

    fn humidity(&self, idx: usize) -> f64 {
        Self::at(&self.relative_humidity_2m, idx)
    }

    fn precipitation(&self, idx: usize) -> f64 {
        Self::at(&self.precipitation, idx)
    }

    fn wind_speed(&self, idx: usize) -> f64 {
        Self::at(&self.wind_speed_10m, idx)
    }

    fn point(&self, idx: usize) -> Option<HourlyPoint> {
        let time = self.time.get(idx)?;
        let local = parse_local_time(time)?;
        let temperature = self.temperature(idx);
        let precipitation = self.precipitation(idx);
        Some(HourlyPoint {
            hour: local.format("%H:%M").to_string(),
            temperature_c: temperature,
            condition: condition::classify(
                temperature,
                precipitation,
                self.humidity(idx),
                local.hour(),
            ),
            precipitation_mm: precipitation,
        })
    }

    fn points<I>(&self, indices: I, limit: usize) -> Vec<HourlyPoint>
    where
        I: IntoIterator<Item = usize>,
    {
        indices
            .into_iter()
            .take(limit)
            .filter_map(|idx| self.point(idx))
            .collect()
    }
}
