//! Types shared between a [`Session`](crate::Session) and the speech engine it drives.
//!
//! The engine reports everything asynchronous (readiness, utterance progress)
//! through an [`EngineEvents`] handle. Each handle is stamped with the
//! generation of the engine it was issued to, so notifications from an engine
//! that has since been shut down can be told apart and dropped.

use std::fmt;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// Queueing policy for a new utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueMode {
    /// Drop everything queued or playing and speak this utterance now.
    Flush,
    /// Speak this utterance after the ones already queued.
    Append,
}

/// Outcome of engine start-up, delivered through [`EngineEvents::ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Success,
    /// Engine-specific failure status.
    Failed(i32),
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::Success => write!(f, "success"),
            InitStatus::Failed(status) => write!(f, "status {status}"),
        }
    }
}

/// Result of asking the engine to switch language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageStatus {
    Available,
    MissingData,
    Unsupported,
}

impl fmt::Display for LanguageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LanguageStatus::Available => "available",
            LanguageStatus::MissingData => "language data is missing",
            LanguageStatus::Unsupported => "language is not supported",
        };
        f.write_str(text)
    }
}

/// Synchronous answer to a speak request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected,
}

/// Failure code reported by the engine for a single utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Synthesis,
    Service,
    Output,
    Network,
    NetworkTimeout,
    InvalidRequest,
    NotInstalledYet,
    Other(i32),
}

impl ErrorCode {
    /// Map a raw engine error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            -3 => ErrorCode::Synthesis,
            -4 => ErrorCode::Service,
            -5 => ErrorCode::Output,
            -6 => ErrorCode::Network,
            -7 => ErrorCode::NetworkTimeout,
            -8 => ErrorCode::InvalidRequest,
            -9 => ErrorCode::NotInstalledYet,
            other => ErrorCode::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Synthesis => -3,
            ErrorCode::Service => -4,
            ErrorCode::Output => -5,
            ErrorCode::Network => -6,
            ErrorCode::NetworkTimeout => -7,
            ErrorCode::InvalidRequest => -8,
            ErrorCode::NotInstalledYet => -9,
            ErrorCode::Other(code) => *code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Synthesis => write!(f, "Error during speech synthesis"),
            ErrorCode::Service => write!(f, "TTS service error"),
            ErrorCode::Output => write!(f, "Audio output error"),
            ErrorCode::Network => write!(f, "Network error"),
            ErrorCode::NetworkTimeout => write!(f, "Network timeout"),
            ErrorCode::InvalidRequest => write!(f, "Invalid request"),
            ErrorCode::NotInstalledYet => write!(f, "TTS engine not installed"),
            ErrorCode::Other(code) => write!(f, "Unknown error (code: {code})"),
        }
    }
}

/// A notification emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Ready(InitStatus),
    Started(String),
    Completed(String),
    Failed(String, ErrorCode),
}

#[derive(Debug)]
pub(crate) struct Notification {
    pub(crate) generation: u64,
    pub(crate) event: EngineEvent,
}

/// Sending half of the session's notification channel, handed to the engine.
///
/// Cloneable and usable from any thread.
#[derive(Debug, Clone)]
pub struct EngineEvents {
    generation: u64,
    tx: Sender<Notification>,
}

impl EngineEvents {
    pub(crate) fn new(generation: u64, tx: Sender<Notification>) -> Self {
        Self { generation, tx }
    }

    /// Deliver an event. Returns `false` if the session no longer exists.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx
            .send(Notification {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn ready(&self, status: InitStatus) -> bool {
        self.send(EngineEvent::Ready(status))
    }

    pub fn started(&self, utterance_id: &str) -> bool {
        self.send(EngineEvent::Started(utterance_id.to_string()))
    }

    pub fn completed(&self, utterance_id: &str) -> bool {
        self.send(EngineEvent::Completed(utterance_id.to_string()))
    }

    pub fn failed(&self, utterance_id: &str, code: ErrorCode) -> bool {
        self.send(EngineEvent::Failed(utterance_id.to_string(), code))
    }
}
