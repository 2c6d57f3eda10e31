//! Configuration for a limiter store.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, WardenError};

/// Raw limiter configuration, as read from YAML or built by hand.
///
/// Fields are optional so that a missing value is reported as a configuration
/// error rather than silently defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum permits per namespace per window
    #[serde(default)]
    pub threshold: Option<i64>,

    /// Window length in seconds (fractions allowed)
    #[serde(default)]
    pub ttl: Option<f64>,
}

/// Validated limiter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    pub threshold: u64,
    pub window: Duration,
}

impl LimiterConfig {
    pub fn new(threshold: i64, ttl: f64) -> Self {
        Self {
            threshold: Some(threshold),
            ttl: Some(ttl),
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            WardenError::InvalidConfiguration(format!("Failed to parse limiter config: {}", e))
        })
    }

    /// Check the raw values and convert them into settings.
    pub fn validate(&self) -> Result<LimiterSettings> {
        let threshold = self
            .threshold
            .ok_or_else(|| invalid("missing threshold"))?;
        let ttl = self.ttl.ok_or_else(|| invalid("missing ttl"))?;

        Ok(LimiterSettings {
            threshold: validate_threshold(threshold)?,
            window: validate_ttl(ttl)?,
        })
    }
}

fn invalid(reason: &str) -> WardenError {
    WardenError::InvalidConfiguration(reason.to_string())
}

pub(crate) fn validate_threshold(threshold: i64) -> Result<u64> {
    u64::try_from(threshold)
        .map_err(|_| invalid(&format!("threshold must be >= 0, got {}", threshold)))
}

/// Convert a ttl in seconds into a whole-millisecond window.
pub(crate) fn validate_ttl(ttl: f64) -> Result<Duration> {
    if !ttl.is_finite() {
        return Err(invalid(&format!("ttl must be a finite number, got {}", ttl)));
    }
    if ttl < 0.0 {
        return Err(invalid(&format!("ttl must be >= 0, got {}", ttl)));
    }

    let millis = (ttl * 1000.0).round();
    if millis >= u64::MAX as f64 {
        return Err(invalid(&format!("ttl is too large, got {}", ttl)));
    }

    Ok(Duration::from_millis(millis as u64))
}
