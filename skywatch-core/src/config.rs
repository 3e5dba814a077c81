use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fs, path::PathBuf};

/// Placeholder shipped in sample configs. Treated exactly like an absent
/// key so a copied template never reaches a keyed endpoint.
pub const PLACEHOLDER_KEY: &str = "PUT_YOUR_API_KEY_HERE";

/// External services that take an API key. The weather providers proper
/// are keyless and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// Keyed forward geocoding, tried before the keyless fallback.
    Geocoder,
    /// NASA DONKI space-weather notifications.
    SpaceWeather,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Geocoder => "geocoder",
            ServiceId::SpaceWeather => "spaceweather",
        }
    }

    pub const fn all() -> &'static [ServiceId] {
        &[ServiceId::Geocoder, ServiceId::SpaceWeather]
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "geocoder" => Ok(ServiceId::Geocoder),
            "spaceweather" | "space-weather" => Ok(ServiceId::SpaceWeather),
            _ => Err(anyhow!(
                "Unknown service '{value}'.\n\
                 Hint: supported services are `geocoder` and `spaceweather`."
            )),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [keys]
    /// geocoder = "..."
    /// spaceweather = "..."
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skywatch", "skywatch-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace the API key for a service.
    pub fn upsert_api_key(&mut self, service: ServiceId, api_key: String) {
        self.keys.insert(service.as_str().to_string(), api_key);
    }

    /// Usable API key for a service. Empty and placeholder values count as
    /// no key, so callers can branch on `Some` alone.
    pub fn api_key(&self, service: ServiceId) -> Option<&str> {
        self.keys
            .get(service.as_str())
            .map(String::as_str)
            .filter(|key| !key.trim().is_empty() && *key != PLACEHOLDER_KEY)
    }

    pub fn is_configured(&self, service: ServiceId) -> bool {
        self.api_key(service).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_back_an_api_key() {
        let mut cfg = Config::default();

        cfg.upsert_api_key(ServiceId::Geocoder, "GEO_KEY".into());

        assert_eq!(cfg.api_key(ServiceId::Geocoder), Some("GEO_KEY"));
        assert!(cfg.is_configured(ServiceId::Geocoder));
        assert!(!cfg.is_configured(ServiceId::SpaceWeather));
    }

    #[test]
    fn upsert_replaces_an_existing_key() {
        let mut cfg = Config::default();

        cfg.upsert_api_key(ServiceId::SpaceWeather, "OLD".into());
        cfg.upsert_api_key(ServiceId::SpaceWeather, "NEW".into());

        assert_eq!(cfg.api_key(ServiceId::SpaceWeather), Some("NEW"));
    }

    #[test]
    fn placeholder_key_counts_as_unconfigured() {
        let mut cfg = Config::default();

        cfg.upsert_api_key(ServiceId::Geocoder, PLACEHOLDER_KEY.into());

        assert_eq!(cfg.api_key(ServiceId::Geocoder), None);
        assert!(!cfg.is_configured(ServiceId::Geocoder));
    }

    #[test]
    fn blank_key_counts_as_unconfigured() {
        let mut cfg = Config::default();

        cfg.upsert_api_key(ServiceId::Geocoder, "   ".into());

        assert_eq!(cfg.api_key(ServiceId::Geocoder), None);
    }

    #[test]
    fn service_ids_round_trip_through_strings() {
        for &service in ServiceId::all() {
            let parsed = ServiceId::try_from(service.as_str()).expect("known id must parse");
            assert_eq!(parsed, service);
        }
    }

    #[test]
    fn unknown_service_is_rejected_with_a_hint() {
        let err = ServiceId::try_from("mapbox").unwrap_err();
        assert!(err.to_string().contains("Unknown service 'mapbox'"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.upsert_api_key(ServiceId::Geocoder, "GEO_KEY".into());

        let text = toml::to_string_pretty(&cfg).expect("config must serialize");
        let back: Config = toml::from_str(&text).expect("config must parse");

        assert_eq!(back.api_key(ServiceId::Geocoder), Some("GEO_KEY"));
    }
}
