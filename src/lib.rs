//! # tts-session
//!
//! A control layer for an external text-to-speech engine: it brings the
//! engine up with a language and voice configuration, queues speech requests,
//! tracks every utterance through start and completion, and reports progress
//! to the application.
//!
//! ## Features
//!
//! - **Session state machine**: `Uninitialized → Initializing → Ready ⇄ Speaking`, with `Error` recoverable by re-initializing
//! - **Queue discipline**: `Flush` interrupts, `Append` waits its turn, bounded by a configurable queue size
//! - **Utterance tracking**: engine notifications are matched back to the request that produced them
//! - **Observer hooks**: `on_start`, `on_done`, `on_error`, delivered on the thread you pump events from
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tts_session::{Session, SessionConfigBuilder};
//!
//! let config = SessionConfigBuilder::default().language("th-TH").rate(0.9).build()?;
//! let session = Arc::new(Session::new(MyEngineFactory::default(), config)?);
//!
//! session.on_done(|id| println!("finished {id}"));
//! session.initialize(|ok| println!("engine ready: {ok}"));
//! session.wait_events(Duration::from_secs(5));
//!
//! let id = session.speak("สวัสดีครับ", None)?;
//! session.speak_enqueue("ยินดีต้อนรับ", Some("welcome"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod session;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use engine::{
    EngineEvent, EngineEvents, ErrorCode, InitStatus, LanguageStatus, QueueMode, SubmitStatus,
};
pub use error::{ConfigError, SessionError, SessionResult};
pub use session::{Session, SessionState};

/// A handle to a running speech engine.
///
/// Only the owning [`Session`] calls these methods, always from behind its
/// lock, so implementations do not need their own synchronization for them.
/// Anything asynchronous is reported through the [`EngineEvents`] the engine
/// was created with.
pub trait SpeechEngine: Send {
    /// Select the output language, e.g. `"th-TH"`.
    fn set_language(&mut self, language: &str) -> LanguageStatus;

    fn set_rate(&mut self, rate: f32);

    fn set_pitch(&mut self, pitch: f32);

    /// Start reporting utterance progress through `events`.
    ///
    /// Called once the engine is configured. Progress sent before this point
    /// is ignored by the session.
    fn set_progress_listener(&mut self, events: EngineEvents);

    /// Submit one utterance. Must not block until playback finishes.
    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> SubmitStatus;

    /// Cancel the current utterance and everything queued behind it.
    fn stop(&mut self);

    /// Release the engine. The handle is dropped right after.
    fn teardown(&mut self);
}

/// Creates engine handles for a [`Session`].
///
/// `create` should return promptly; readiness is reported later with
/// [`EngineEvents::ready`].
pub trait EngineFactory: Send + Sync {
    type Engine: SpeechEngine;

    fn create(&self, events: EngineEvents) -> Self::Engine;
}

impl<E, F> EngineFactory for F
where
    E: SpeechEngine,
    F: Fn(EngineEvents) -> E + Send + Sync,
{
    type Engine = E;

    fn create(&self, events: EngineEvents) -> E {
        self(events)
    }
}
