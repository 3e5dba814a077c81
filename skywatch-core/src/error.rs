//! Error types shared by the provider adapters and the pipeline.

use thiserror::Error;

/// Why a provider attempt failed. The pipeline treats both variants as a
/// fallback trigger but logs them differently.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or a non-success HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider answered, but the payload is unusable: missing-data
    /// sentinels in place of measurements, or an empty time series.
    #[error("invalid data: {0}")]
    Invalid(String),
}

impl ProviderError {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transport(_) => "transport",
            ProviderError::Invalid(_) => "invalid-data",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Keeps provider response bodies short enough for error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() > MAX_LEN {
        let prefix: String = body.chars().take(MAX_LEN).collect();
        format!("{prefix}...")
    } else {
        body.to_string()
    }
}
