//! Classification of raw telemetry into a discrete weather condition.
//!
//! The classifier is a pure function over one sample; providers call it
//! once per snapshot and once per hourly point so every condition shown
//! anywhere comes from the same rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete weather state used for display and iconography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionTag {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
    NightClear,
    NightCloudy,
}

impl ConditionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionTag::Sunny => "sunny",
            ConditionTag::PartlyCloudy => "partly-cloudy",
            ConditionTag::Cloudy => "cloudy",
            ConditionTag::Rainy => "rainy",
            ConditionTag::Stormy => "stormy",
            ConditionTag::NightClear => "night-clear",
            ConditionTag::NightCloudy => "night-cloudy",
        }
    }

    /// Human-readable name for display.
    pub fn description(&self) -> &'static str {
        match self {
            ConditionTag::Sunny => "Sunny",
            ConditionTag::PartlyCloudy => "Partly Cloudy",
            ConditionTag::Cloudy => "Cloudy",
            ConditionTag::Rainy => "Rainy",
            ConditionTag::Stormy => "Stormy",
            ConditionTag::NightClear => "Clear Night",
            ConditionTag::NightCloudy => "Cloudy Night",
        }
    }
}

impl fmt::Display for ConditionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Precipitation above this many millimetres reads as a storm.
const STORM_PRECIP_MM: f64 = 5.0;
/// Precipitation above this many millimetres reads as rain.
const RAIN_PRECIP_MM: f64 = 1.0;
const OVERCAST_HUMIDITY_PCT: f64 = 80.0;
const HAZY_HUMIDITY_PCT: f64 = 60.0;
/// Hours strictly before this one count as night.
const DAY_FIRST_HOUR: u32 = 6;
/// Hours strictly after this one count as night. 6:00 and 18:00 are day.
const DAY_LAST_HOUR: u32 = 18;

/// One telemetry sample under classification.
#[derive(Debug, Clone, Copy)]
struct Reading {
    precipitation_mm: f64,
    humidity_pct: f64,
    local_hour: u32,
}

impl Reading {
    fn is_night(&self) -> bool {
        self.local_hour < DAY_FIRST_HOUR || self.local_hour > DAY_LAST_HOUR
    }
}

struct Rule {
    applies: fn(&Reading) -> bool,
    day: ConditionTag,
    night: ConditionTag,
}

/// Order is the contract: precipitation outranks humidity, storm outranks
/// rain, and the clear-sky catch-all sits last. The first matching rule
/// decides.
const RULES: [Rule; 5] = [
    Rule {
        applies: |r| r.precipitation_mm > STORM_PRECIP_MM,
        day: ConditionTag::Stormy,
        night: ConditionTag::Stormy,
    },
    Rule {
        applies: |r| r.precipitation_mm > RAIN_PRECIP_MM,
        day: ConditionTag::Rainy,
        night: ConditionTag::Rainy,
    },
    Rule {
        applies: |r| r.humidity_pct > OVERCAST_HUMIDITY_PCT,
        day: ConditionTag::Cloudy,
        night: ConditionTag::NightCloudy,
    },
    Rule {
        applies: |r| r.humidity_pct > HAZY_HUMIDITY_PCT,
        day: ConditionTag::PartlyCloudy,
        night: ConditionTag::NightCloudy,
    },
    Rule {
        applies: |_| true,
        day: ConditionTag::Sunny,
        night: ConditionTag::NightClear,
    },
];

/// Classify one sample. `local_hour` is the hour (0..=23) at the location,
/// which decides the day/night variant of the matched condition.
///
/// Temperature currently influences no rule; it stays in the signature so
/// callers always classify a complete sample.
pub fn classify(
    temperature_c: f64,
    precipitation_mm: f64,
    humidity_pct: f64,
    local_hour: u32,
) -> ConditionTag {
    let _ = temperature_c;
    let reading = Reading {
        precipitation_mm,
        humidity_pct,
        local_hour,
    };
    let night = reading.is_night();
    for rule in &RULES {
        if (rule.applies)(&reading) {
            return if night { rule.night } else { rule.day };
        }
    }
    // The table ends in a catch-all, so this is only for the compiler.
    if night {
        ConditionTag::NightClear
    } else {
        ConditionTag::Sunny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storm_beats_every_other_rule() {
        assert_eq!(classify(20.0, 5.01, 100.0, 12), ConditionTag::Stormy);
        assert_eq!(classify(20.0, 5.01, 100.0, 2), ConditionTag::Stormy);
        assert_eq!(classify(-5.0, 80.0, 0.0, 12), ConditionTag::Stormy);
    }

    #[test]
    fn storm_threshold_is_exclusive() {
        // Exactly 5.0 mm is rain; anything above is a storm.
        assert_eq!(classify(20.0, 5.0, 50.0, 12), ConditionTag::Rainy);
        assert_eq!(classify(20.0, 5.01, 50.0, 12), ConditionTag::Stormy);
    }

    #[test]
    fn rain_threshold_is_exclusive() {
        assert_eq!(classify(20.0, 1.0, 50.0, 12), ConditionTag::Sunny);
        assert_eq!(classify(20.0, 1.01, 50.0, 12), ConditionTag::Rainy);
    }

    #[test]
    fn rain_has_no_night_variant() {
        assert_eq!(classify(20.0, 2.0, 50.0, 23), ConditionTag::Rainy);
    }

    #[test]
    fn humidity_bands_pick_cloud_cover() {
        assert_eq!(classify(20.0, 0.0, 80.01, 12), ConditionTag::Cloudy);
        assert_eq!(classify(20.0, 0.0, 80.0, 12), ConditionTag::PartlyCloudy);
        assert_eq!(classify(20.0, 0.0, 60.01, 12), ConditionTag::PartlyCloudy);
        assert_eq!(classify(20.0, 0.0, 60.0, 12), ConditionTag::Sunny);
    }

    #[test]
    fn night_collapses_cloud_bands() {
        // Both humidity bands map to the same night condition.
        assert_eq!(classify(20.0, 0.0, 85.0, 22), ConditionTag::NightCloudy);
        assert_eq!(classify(20.0, 0.0, 65.0, 22), ConditionTag::NightCloudy);
        assert_eq!(classify(20.0, 0.0, 30.0, 22), ConditionTag::NightClear);
    }

    #[test]
    fn day_night_boundaries() {
        // Hour 5 is night, hour 6 is day; hour 18 is day, hour 19 is night.
        assert_eq!(classify(20.0, 0.0, 30.0, 5), ConditionTag::NightClear);
        assert_eq!(classify(20.0, 0.0, 30.0, 6), ConditionTag::Sunny);
        assert_eq!(classify(20.0, 0.0, 30.0, 18), ConditionTag::Sunny);
        assert_eq!(classify(20.0, 0.0, 30.0, 19), ConditionTag::NightClear);
    }

    #[test]
    fn classification_is_total_and_deterministic() {
        let precip = [0.0, 0.5, 1.0, 1.5, 5.0, 5.5, 40.0];
        let humidity = [0.0, 59.9, 60.0, 60.1, 80.0, 80.1, 100.0];
        for &p in &precip {
            for &h in &humidity {
                for hour in 0..24 {
                    let first = classify(15.0, p, h, hour);
                    let second = classify(15.0, p, h, hour);
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn temperature_does_not_affect_the_outcome() {
        for &t in &[-40.0, 0.0, 15.0, 45.0] {
            assert_eq!(classify(t, 0.0, 50.0, 12), ConditionTag::Sunny);
            assert_eq!(classify(t, 6.0, 90.0, 12), ConditionTag::Stormy);
        }
    }

    #[test]
    fn serde_tags_are_kebab_case() {
        let json = serde_json::to_string(&ConditionTag::NightCloudy).unwrap();
        assert_eq!(json, "\"night-cloudy\"");
        let back: ConditionTag = serde_json::from_str("\"partly-cloudy\"").unwrap();
        assert_eq!(back, ConditionTag::PartlyCloudy);
    }
}
