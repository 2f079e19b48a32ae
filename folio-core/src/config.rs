//! Preloader configuration.
//!
//! Defaults mirror what the content pages were tuned for: entries live five
//! minutes, each direction warms at most two neighbours, and speculative
//! network work is abandoned after three seconds.

use crate::error::{ConfigError, FolioResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default cache entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);
/// Default speculative fan-out per direction.
pub const DEFAULT_NEXT_MAX: usize = 2;
/// Default deadline for speculative async work.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3_000);
/// Default bound on outstanding local image handles.
pub const DEFAULT_MAX_IMAGE_HANDLES: usize = 64;

/// How background work is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    /// Single FIFO worker that yields to the runtime before every job.
    #[default]
    Idle,
    /// Spawn each job on the next tick.
    Deferred,
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Deferred => f.write_str("deferred"),
        }
    }
}

impl FromStr for SchedulerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "deferred" => Ok(Self::Deferred),
            other => Err(ConfigError::InvalidValue {
                field: "scheduler".to_string(),
                value: other.to_string(),
                reason: "expected \"idle\" or \"deferred\"".to_string(),
            }),
        }
    }
}

/// Configuration for the page preloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Lifetime of a data-cache entry, and freshness window of an `ok` image record.
    pub ttl: Duration,
    /// Maximum number of items speculatively warmed per direction per trigger.
    /// Zero turns entity fan-out off.
    pub next_max: usize,
    /// Deadline for speculative async operations.
    pub timeout: Duration,
    /// Maximum number of outstanding local image handles.
    pub max_image_handles: usize,
    /// Background scheduling strategy.
    pub scheduler: SchedulerMode,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            next_max: DEFAULT_NEXT_MAX,
            timeout: DEFAULT_TIMEOUT,
            max_image_handles: DEFAULT_MAX_IMAGE_HANDLES,
            scheduler: SchedulerMode::default(),
        }
    }
}

impl PreloadConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the per-direction fan-out bound.
    pub fn with_next_max(mut self, next_max: usize) -> Self {
        self.next_max = next_max;
        self
    }

    /// Set the speculative work deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bound on outstanding image handles.
    pub fn with_max_image_handles(mut self, max: usize) -> Self {
        self.max_image_handles = max;
        self
    }

    /// Set the scheduling strategy.
    pub fn with_scheduler(mut self, mode: SchedulerMode) -> Self {
        self.scheduler = mode;
        self
    }

    /// Load configuration from environment variables over the defaults.
    ///
    /// Environment variables:
    /// - `FOLIO_PRELOAD_TTL_MS`: cache lifetime in milliseconds (default: 300000)
    /// - `FOLIO_PRELOAD_NEXT_MAX`: fan-out per direction (default: 2)
    /// - `FOLIO_PRELOAD_TIMEOUT_MS`: speculative deadline in milliseconds (default: 3000)
    /// - `FOLIO_PRELOAD_MAX_IMAGE_HANDLES`: outstanding handle bound (default: 64)
    /// - `FOLIO_PRELOAD_SCHEDULER`: "idle" or "deferred" (default: idle)
    pub fn from_env() -> FolioResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, then validate it.
    pub fn from_lookup<F>(lookup: F) -> FolioResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("FOLIO_PRELOAD_TTL_MS") {
            config.ttl = Duration::from_millis(parse_number("ttl", &raw)?);
        }
        if let Some(raw) = lookup("FOLIO_PRELOAD_NEXT_MAX") {
            config.next_max = parse_number("next_max", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_PRELOAD_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_number("timeout", &raw)?);
        }
        if let Some(raw) = lookup("FOLIO_PRELOAD_MAX_IMAGE_HANDLES") {
            config.max_image_handles = parse_number("max_image_handles", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_PRELOAD_SCHEDULER") {
            config.scheduler = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - ttl and timeout are positive
    /// - max_image_handles >= 1
    ///
    /// Any `next_max` is accepted.
    pub fn validate(&self) -> FolioResult<()> {
        if self.ttl.is_zero() {
            return Err(invalid("ttl", format!("{:?}", self.ttl), "ttl must be positive"));
        }

        if self.timeout.is_zero() {
            return Err(invalid(
                "timeout",
                format!("{:?}", self.timeout),
                "timeout must be positive",
            ));
        }

        if self.max_image_handles == 0 {
            return Err(invalid(
                "max_image_handles",
                "0",
                "max_image_handles must be at least 1",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl Into<String>, reason: &str) -> crate::FolioError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_number<T: FromStr>(field: &str, raw: &str) -> FolioResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, raw, "expected a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FolioError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PreloadConfig::default();
        assert_eq!(config.ttl, Duration::from_millis(300_000));
        assert_eq!(config.next_max, 2);
        assert_eq!(config.timeout, Duration::from_millis(3_000));
        assert_eq!(config.scheduler, SchedulerMode::Idle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PreloadConfig::new()
            .with_ttl(Duration::from_secs(10))
            .with_next_max(4)
            .with_timeout(Duration::from_millis(250))
            .with_max_image_handles(8)
            .with_scheduler(SchedulerMode::Deferred);

        assert_eq!(config.ttl, Duration::from_secs(10));
        assert_eq!(config.next_max, 4);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_image_handles, 8);
        assert_eq!(config.scheduler, SchedulerMode::Deferred);
    }

    #[test]
    fn test_validate_accepts_zero_next_max() {
        assert!(PreloadConfig::new().with_next_max(0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max_image_handles() {
        let result = PreloadConfig::new().with_max_image_handles(0).validate();
        match result {
            Err(FolioError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "max_image_handles");
            }
            other => panic!("expected invalid max_image_handles, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = PreloadConfig::new().with_timeout(Duration::ZERO).validate();
        assert!(matches!(
            result,
            Err(FolioError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "timeout"
        ));
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = PreloadConfig::from_lookup(lookup_from(&[
            ("FOLIO_PRELOAD_TTL_MS", "1000"),
            ("FOLIO_PRELOAD_NEXT_MAX", "3"),
            ("FOLIO_PRELOAD_SCHEDULER", "Deferred"),
        ]))
        .unwrap();

        assert_eq!(config.ttl, Duration::from_secs(1));
        assert_eq!(config.next_max, 3);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.scheduler, SchedulerMode::Deferred);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = PreloadConfig::from_lookup(lookup_from(&[("FOLIO_PRELOAD_TIMEOUT_MS", "soon")]));
        match result {
            Err(FolioError::Config(ConfigError::InvalidValue { field, value, .. })) => {
                assert_eq!(field, "timeout");
                assert_eq!(value, "soon");
            }
            other => panic!("expected invalid timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_from_lookup_runs_validation() {
        let result = PreloadConfig::from_lookup(lookup_from(&[("FOLIO_PRELOAD_TTL_MS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_scheduler_mode_round_trips_through_display() {
        for mode in [SchedulerMode::Idle, SchedulerMode::Deferred] {
            assert_eq!(mode.to_string().parse::<SchedulerMode>().unwrap(), mode);
        }
        assert!("eager".parse::<SchedulerMode>().is_err());
    }
}
