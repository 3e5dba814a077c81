//! Core library for the `skywatch` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The multi-source weather resolution pipeline and its provider adapters
//! - Condition classification over raw telemetry
//! - Place resolution, hazard alerts and weather news
//! - Refresh scheduling for live views
//!
//! It is used by `skywatch-cli`, but can also be reused by other binaries or services.

pub mod alert;
pub mod condition;
pub mod config;
pub mod error;
pub mod model;
pub mod news;
pub mod pipeline;
pub mod place;
pub mod provider;
pub mod refresh;

pub use alert::{AlertFeed, AlertSource};
pub use condition::{ConditionTag, classify};
pub use config::{Config, ServiceId};
pub use error::ProviderError;
pub use model::{Alert, HourlyPoint, Location, NewsItem, Severity, WeatherReport, WeatherSnapshot};
pub use news::NewsFeed;
pub use pipeline::WeatherPipeline;
pub use place::PlaceResolver;
pub use provider::ProviderKind;
pub use refresh::{DEFAULT_REFRESH_INTERVAL, RefreshTask, SuggestionGate};
