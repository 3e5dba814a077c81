use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::condition::ConditionTag;
use crate::provider::ProviderKind;

/// A resolved geographic point. `city` and `region` are only present when
/// the place was resolved through a geocoder; literal coordinate input
/// leaves them unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            city: None,
            region: None,
        }
    }

    /// "City, Region" when both are known, otherwise whatever is known,
    /// otherwise the bare coordinates.
    pub fn label(&self) -> String {
        match (&self.city, &self.region) {
            (Some(city), Some(region)) => format!("{city}, {region}"),
            (Some(city), None) => city.clone(),
            (None, Some(region)) => region.clone(),
            (None, None) => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }
}

/// Instantaneous conditions at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_mps: f64,
    pub precipitation_mm: f64,
    pub condition: ConditionTag,
    pub timestamp: DateTime<FixedOffset>,
}

/// One sample of the short hourly series shown alongside the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPoint {
    /// Local hour label, "HH:MM".
    pub hour: String,
    pub temperature_c: f64,
    pub condition: ConditionTag,
    pub precipitation_mm: f64,
}

/// A fully resolved weather answer. Exactly one provider's data; the
/// pipeline never mixes sources within a single report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub source: ProviderKind,
    pub current: WeatherSnapshot,
    pub hourly: Vec<HourlyPoint>,
}

/// Normalized alert severity. Anything a feed reports outside the four
/// documented levels collapses to `Unknown` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    Unknown,
}

impl Severity {
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("extreme") => Severity::Extreme,
            Some("severe") => Severity::Severe,
            Some("moderate") => Severity::Moderate,
            Some("minor") => Severity::Minor,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Extreme => "Extreme",
            Severity::Severe => "Severe",
            Severity::Moderate => "Moderate",
            Severity::Minor => "Minor",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One active hazard alert, normalized across feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub event: String,
    pub severity: Severity,
    pub description: String,
    pub instruction: String,
    pub area: String,
    pub onset: Option<String>,
    pub expires: Option<String>,
}

/// One weather-related headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub published_at: Option<String>,
}
