use crate::engine::{ErrorCode, InitStatus, LanguageStatus};

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session not initialized. Call initialize() and wait for it to complete.")]
    NotInitialized,
    #[error("Cannot speak empty text")]
    EmptyText,
    #[error("Engine rejected the speech request")]
    EngineRejected,
    #[error("Language '{language}' is unavailable ({status})")]
    LanguageUnavailable {
        language: String,
        status: LanguageStatus,
    },
    #[error("Engine failed to start: {0}")]
    EngineInitFailed(InitStatus),
    #[error("{0}")]
    SynthesisFailed(ErrorCode),
    #[error("Utterance cancelled before completion")]
    Cancelled,
    #[error("Utterance '{0}' is already in flight")]
    DuplicateUtterance(String),
    #[error("Notification for unknown utterance '{0}'")]
    UnknownUtterance(String),
    #[error("Invalid {parameter}: {value} (must be 0.5-2.0)")]
    ParameterOutOfRange { parameter: &'static str, value: f32 },
    #[error("Speech queue is full ({0} utterances in flight)")]
    QueueFull(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid speech rate: {0} (must be 0.5-2.0)")]
    RateOutOfRange(f32),
    #[error("Invalid pitch: {0} (must be 0.5-2.0)")]
    PitchOutOfRange(f32),
    #[error("Language identifier must not be empty")]
    EmptyLanguage,
    #[error("max_queue_size must be at least 1")]
    ZeroQueueSize,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing config field: {0}")]
    MissingField(&'static str),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        ConfigError::MissingField(err.field_name())
    }
}
