use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lowest accepted speech rate or pitch.
pub const MIN_PARAMETER: f32 = 0.5;
/// Highest accepted speech rate or pitch.
pub const MAX_PARAMETER: f32 = 2.0;

pub const DEFAULT_LANGUAGE: &str = "th-TH";
pub const DEFAULT_RATE: f32 = 0.9;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;
pub const DEFAULT_STALE_AFTER_MS: u64 = 30_000;

/// Returns true if `value` is a usable speech rate or pitch. NaN is not.
pub fn in_parameter_range(value: f32) -> bool {
    (MIN_PARAMETER..=MAX_PARAMETER).contains(&value)
}

/// Start-up configuration for a [`Session`](crate::Session).
///
/// Validated once, when built or when handed to `Session::new`.
///
/// ```
/// use tts_session::SessionConfigBuilder;
///
/// let config = SessionConfigBuilder::default()
///     .language("en-US")
///     .rate(1.2)
///     .build()?;
/// assert_eq!(config.pitch, 1.0);
/// # Ok::<(), tts_session::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(build_fn(private, name = "build_unchecked", error = "ConfigError"))]
#[serde(default)]
pub struct SessionConfig {
    /// Locale identifier passed to the engine, e.g. `"th-TH"`.
    #[builder(setter(into), default = "DEFAULT_LANGUAGE.to_string()")]
    pub language: String,
    /// Speech rate, 0.5–2.0 (normal = 1.0).
    #[builder(default = "DEFAULT_RATE")]
    pub rate: f32,
    /// Pitch, 0.5–2.0 (normal = 1.0).
    #[builder(default = "DEFAULT_PITCH")]
    pub pitch: f32,
    /// Upper bound on utterances in flight before `Append` requests are refused.
    #[builder(default = "DEFAULT_MAX_QUEUE_SIZE")]
    pub max_queue_size: usize,
    /// Age after which a queued utterance that never started is considered lost.
    #[builder(default = "DEFAULT_STALE_AFTER_MS")]
    pub stale_after_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }
}

impl SessionConfigBuilder {
    pub fn build(&self) -> Result<SessionConfig, ConfigError> {
        let config = self.build_unchecked()?;
        config.validate()?;
        Ok(config)
    }
}

impl SessionConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded session config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !in_parameter_range(self.rate) {
            log::error!("Invalid speech rate: {} (must be 0.5-2.0)", self.rate);
            return Err(ConfigError::RateOutOfRange(self.rate));
        }
        if !in_parameter_range(self.pitch) {
            log::error!("Invalid pitch: {} (must be 0.5-2.0)", self.pitch);
            return Err(ConfigError::PitchOutOfRange(self.pitch));
        }
        if self.language.trim().is_empty() {
            log::error!("Language identifier is empty");
            return Err(ConfigError::EmptyLanguage);
        }
        if self.max_queue_size == 0 {
            log::error!("max_queue_size must be at least 1");
            return Err(ConfigError::ZeroQueueSize);
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(SessionConfigBuilder::default().build().unwrap(), config);
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        let err = SessionConfigBuilder::default().rate(2.5).build().unwrap_err();
        assert!(matches!(err, ConfigError::RateOutOfRange(r) if r == 2.5));

        let err = SessionConfigBuilder::default().pitch(0.1).build().unwrap_err();
        assert!(matches!(err, ConfigError::PitchOutOfRange(_)));

        let err = SessionConfigBuilder::default()
            .rate(f32::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::RateOutOfRange(_)));
    }

    #[test]
    fn builder_rejects_blank_language_and_empty_queue() {
        let err = SessionConfigBuilder::default()
            .language("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyLanguage));

        let err = SessionConfigBuilder::default()
            .max_queue_size(0usize)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroQueueSize));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(in_parameter_range(0.5));
        assert!(in_parameter_range(2.0));
        assert!(!in_parameter_range(0.49));
        assert!(!in_parameter_range(2.01));
        assert!(!in_parameter_range(f32::INFINITY));
    }

    #[test]
    fn loads_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "language": "en-GB", "rate": 1.5 }}"#).unwrap();

        let config = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.language, "en-GB");
        assert_eq!(config.rate, 1.5);
        assert_eq!(config.pitch, DEFAULT_PITCH);
        assert_eq!(config.stale_after(), Duration::from_secs(30));
    }

    #[test]
    fn json_file_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pitch": 3.0 }}"#).unwrap();
        assert!(matches!(
            SessionConfig::from_json_file(file.path()),
            Err(ConfigError::PitchOutOfRange(_))
        ));

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "not json").unwrap();
        assert!(matches!(
            SessionConfig::from_json_file(broken.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unset_builder_field_names_the_field() {
        let err = ConfigError::from(derive_builder::UninitializedFieldError::new("language"));
        assert!(matches!(err, ConfigError::MissingField("language")));
        assert_eq!(err.to_string(), "Missing config field: language");
    }
}
