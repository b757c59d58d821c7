//! The speech session state machine.
//!
//! A [`Session`] owns the engine handle for its whole lifetime and is the
//! only thing that talks to it. Commands (`speak`, `stop`, ...) take effect
//! immediately and return without waiting on the engine; everything the
//! engine reports later arrives on the notification channel and is applied
//! by [`Session::process_events`] or [`Session::wait_events`], on whatever
//! thread the application chooses to call them from.
//!
//! Observer calls are made in the order their transitions were applied to
//! the session, whichever thread applied them.

mod dispatcher;
mod tracker;

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::Serialize;

use crate::config::{in_parameter_range, SessionConfig};
use crate::engine::{
    EngineEvent, EngineEvents, ErrorCode, InitStatus, LanguageStatus, Notification, QueueMode,
    SubmitStatus,
};
use crate::error::{ConfigError, SessionError, SessionResult};
use crate::{EngineFactory, SpeechEngine};

pub use dispatcher::{ErrorCallback, InitCallback, UtteranceCallback};
use dispatcher::{Delivery, Observers};
use tracker::UtteranceTracker;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Speaking,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Speaking => "speaking",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Internal state. Variants own the engine handle where one exists.
enum Phase<E> {
    Uninitialized,
    Initializing {
        engine: E,
        events: EngineEvents,
        on_complete: InitCallback,
    },
    Ready {
        engine: E,
    },
    Speaking {
        engine: E,
        utterance_id: String,
    },
    Error {
        reason: SessionError,
    },
}

impl<E: SpeechEngine> Phase<E> {
    fn state(&self) -> SessionState {
        match self {
            Phase::Uninitialized => SessionState::Uninitialized,
            Phase::Initializing { .. } => SessionState::Initializing,
            Phase::Ready { .. } => SessionState::Ready,
            Phase::Speaking { .. } => SessionState::Speaking,
            Phase::Error { .. } => SessionState::Error,
        }
    }

    fn engine_mut(&mut self) -> Option<&mut E> {
        match self {
            Phase::Initializing { engine, .. }
            | Phase::Ready { engine }
            | Phase::Speaking { engine, .. } => Some(engine),
            Phase::Uninitialized | Phase::Error { .. } => None,
        }
    }

    /// Engine handle of a session that accepts speech requests.
    fn active_engine(&mut self) -> Option<&mut E> {
        match self {
            Phase::Ready { engine } | Phase::Speaking { engine, .. } => Some(engine),
            _ => None,
        }
    }
}

struct Inner<E> {
    phase: Phase<E>,
    /// Bumped whenever an engine handle is created or retired.
    generation: u64,
    rate: f32,
    pitch: f32,
    tracker: UtteranceTracker,
}

impl<E: SpeechEngine> Inner<E> {
    /// Stop and tear down the current engine handle, if any.
    ///
    /// Returns the pending initialization callback so the caller can report failure.
    fn retire_engine(&mut self) -> Option<InitCallback> {
        self.generation += 1;
        match mem::replace(&mut self.phase, Phase::Uninitialized) {
            Phase::Initializing {
                mut engine,
                on_complete,
                ..
            } => {
                engine.stop();
                engine.teardown();
                Some(on_complete)
            }
            Phase::Ready { mut engine } | Phase::Speaking { mut engine, .. } => {
                engine.stop();
                engine.teardown();
                None
            }
            Phase::Uninitialized | Phase::Error { .. } => None,
        }
    }

    /// Leave `Speaking` for `Ready`, keeping the engine.
    fn settle(&mut self) {
        if let Phase::Speaking { .. } = self.phase {
            if let Phase::Speaking { engine, .. } =
                mem::replace(&mut self.phase, Phase::Uninitialized)
            {
                self.phase = Phase::Ready { engine };
            }
        }
    }

    /// Forget every tracked utterance. Those that had started get a synthesized cancellation.
    fn abandon_all(&mut self) -> Vec<Delivery> {
        let superseded = self.tracker.len();
        let started = self.tracker.drain();
        self.settle();
        if superseded > 0 {
            log::debug!(
                "Abandoned {superseded} tracked utterance(s), {} already playing",
                started.len()
            );
        }
        started
            .into_iter()
            .map(|id| Delivery::Error(id, SessionError::Cancelled))
            .collect()
    }

    fn complete_initialization(&mut self, status: InitStatus, language: &str) -> Vec<Delivery> {
        let (mut engine, events, on_complete) =
            match mem::replace(&mut self.phase, Phase::Uninitialized) {
                Phase::Initializing {
                    engine,
                    events,
                    on_complete,
                } => (engine, events, on_complete),
                other => {
                    log::warn!("Ignoring engine ready signal while {}", other.state());
                    self.phase = other;
                    return Vec::new();
                }
            };

        if let InitStatus::Failed(_) = status {
            log::error!("TTS initialization failed with {status}");
            engine.teardown();
            self.phase = Phase::Error {
                reason: SessionError::EngineInitFailed(status),
            };
            return vec![Delivery::Initialized(on_complete, false)];
        }

        log::info!("TTS engine initialized successfully");
        match engine.set_language(language) {
            LanguageStatus::Available => {
                engine.set_rate(self.rate);
                engine.set_pitch(self.pitch);
                engine.set_progress_listener(events);
                self.phase = Phase::Ready { engine };
                log::info!("Language {language} configured successfully");
                log::debug!("Speech Rate: {}, Pitch: {}", self.rate, self.pitch);
                vec![Delivery::Initialized(on_complete, true)]
            }
            status => {
                log::error!("Language {language} unavailable: {status}");
                engine.teardown();
                self.phase = Phase::Error {
                    reason: SessionError::LanguageUnavailable {
                        language: language.to_string(),
                        status,
                    },
                };
                vec![Delivery::Initialized(on_complete, false)]
            }
        }
    }

    fn utterance_started(&mut self, id: String) -> Vec<Delivery> {
        if !self.tracker.mark_started(&id) {
            log::debug!("{}", SessionError::UnknownUtterance(id));
            return Vec::new();
        }
        match mem::replace(&mut self.phase, Phase::Uninitialized) {
            Phase::Ready { engine } | Phase::Speaking { engine, .. } => {
                self.phase = Phase::Speaking {
                    engine,
                    utterance_id: id.clone(),
                };
            }
            other => self.phase = other,
        }
        log::info!("Speech started: {id}");
        vec![Delivery::Start(id)]
    }

    fn utterance_finished(&mut self, id: String, failure: Option<ErrorCode>) -> Vec<Delivery> {
        let Some(entry) = self.tracker.finish(&id) else {
            log::debug!("{}", SessionError::UnknownUtterance(id));
            return Vec::new();
        };
        if matches!(&self.phase, Phase::Speaking { utterance_id, .. } if *utterance_id == id) {
            self.settle();
        }
        let elapsed = entry.submitted_at.elapsed();
        match failure {
            None => {
                log::info!("Speech completed: {id} ({elapsed:.2?} after submission)");
                vec![Delivery::Done(id)]
            }
            Some(code) => {
                log::error!("Speech error: {id} - {code} (code: {})", code.code());
                vec![Delivery::Error(id, SessionError::SynthesisFailed(code))]
            }
        }
    }
}

/// Drives one speech engine on behalf of an application.
///
/// `Session` is `Send + Sync`; share it behind an `Arc` between the thread
/// issuing commands and the one pumping engine notifications.
///
/// ```rust,ignore
/// let session = Session::new(factory, SessionConfig::default())?;
/// session.on_done(|id| println!("finished {id}"));
/// session.initialize(|ok| println!("ready: {ok}"));
/// session.wait_events(Duration::from_secs(5));
/// session.speak("สวัสดีครับ", None)?;
/// ```
pub struct Session<F: EngineFactory> {
    factory: F,
    config: SessionConfig,
    inner: Mutex<Inner<F::Engine>>,
    observers: RwLock<Observers>,
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    /// Serializes notification handling so events are applied in arrival order.
    pump: Mutex<()>,
    /// Held from state transition until its observer calls return. Re-entrant
    /// so observers may issue commands on the delivering thread.
    delivery: ReentrantMutex<()>,
}

impl<F: EngineFactory> Session<F> {
    /// Create an uninitialized session. Fails if `config` is invalid.
    pub fn new(factory: F, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok(Self {
            factory,
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                generation: 0,
                rate: config.rate,
                pitch: config.pitch,
                tracker: UtteranceTracker::new(),
            }),
            config,
            observers: RwLock::new(Observers::default()),
            tx,
            rx,
            pump: Mutex::new(()),
            delivery: ReentrantMutex::new(()),
        })
    }

    /// The validated configuration this session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a new engine. `on_complete` runs once readiness has been processed.
    ///
    /// Ignored (with a warning) while a previous initialization is still pending;
    /// the new callback is dropped without being called.
    pub fn initialize<C>(&self, on_complete: C)
    where
        C: FnOnce(bool) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if let Phase::Initializing { .. } = inner.phase {
            log::warn!("initialize() called while already initializing; ignoring");
            return;
        }
        log::info!("Initializing TTS engine...");
        // Never yields a callback here: the Initializing case returned above.
        let _ = inner.retire_engine();
        inner.tracker.drain();
        inner.rate = self.config.rate;
        inner.pitch = self.config.pitch;

        let events = EngineEvents::new(inner.generation, self.tx.clone());
        let engine = self.factory.create(events.clone());
        inner.phase = Phase::Initializing {
            engine,
            events,
            on_complete: Box::new(on_complete),
        };
    }

    /// Speak `text` now, cancelling anything queued or playing.
    ///
    /// Returns the utterance id (generated when `id` is `None`).
    pub fn speak(&self, text: &str, id: Option<&str>) -> SessionResult<String> {
        self.submit(text, id, QueueMode::Flush)
    }

    /// Speak `text` after everything already queued.
    pub fn speak_enqueue(&self, text: &str, id: Option<&str>) -> SessionResult<String> {
        self.submit(text, id, QueueMode::Append)
    }

    /// Submit `text` with an explicit queue mode; `speak` and `speak_enqueue` call this.
    ///
    /// A caller-supplied `id` must not match an utterance still in flight.
    pub fn submit(&self, text: &str, id: Option<&str>, mode: QueueMode) -> SessionResult<String> {
        let _delivery = self.delivery.lock();
        let (outcome, deliveries) = {
            let mut inner = self.inner.lock();
            match self.submit_locked(&mut inner, text, id, mode) {
                Ok((id, deliveries)) => (Ok(id), deliveries),
                Err(err) => (Err(err), Vec::new()),
            }
        };
        self.deliver(deliveries);
        outcome
    }

    fn submit_locked(
        &self,
        inner: &mut Inner<F::Engine>,
        text: &str,
        id: Option<&str>,
        mode: QueueMode,
    ) -> SessionResult<(String, Vec<Delivery>)> {
        if inner.phase.active_engine().is_none() {
            log::error!("Cannot speak: TTS not initialized");
            return Err(SessionError::NotInitialized);
        }
        if text.trim().is_empty() {
            log::warn!("Cannot speak: Empty text");
            return Err(SessionError::EmptyText);
        }

        let now = Instant::now();
        let stale = inner.tracker.discard_stale(self.config.stale_after(), now);
        if stale > 0 {
            log::debug!("Discarded {stale} stale queued utterance(s)");
        }
        if mode == QueueMode::Append && inner.tracker.len() >= self.config.max_queue_size {
            log::warn!(
                "Cannot queue speech: {} utterances already in flight",
                inner.tracker.len()
            );
            return Err(SessionError::QueueFull(self.config.max_queue_size));
        }

        let utterance_id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if inner.tracker.contains(&utterance_id) {
            log::error!("Cannot speak: utterance ID {utterance_id} already in flight");
            return Err(SessionError::DuplicateUtterance(utterance_id));
        }
        match mode {
            QueueMode::Flush => log::info!("Speaking: {text:?} (ID: {utterance_id})"),
            QueueMode::Append => log::info!("Queueing speech: {text:?} (ID: {utterance_id})"),
        }

        let engine = inner
            .phase
            .active_engine()
            .ok_or(SessionError::NotInitialized)?;
        if engine.speak(text, mode, &utterance_id) == SubmitStatus::Rejected {
            log::error!("Failed to queue speech (ID: {utterance_id})");
            return Err(SessionError::EngineRejected);
        }
        log::debug!("Speech queued successfully");

        let deliveries = match mode {
            QueueMode::Flush => inner.abandon_all(),
            QueueMode::Append => Vec::new(),
        };
        inner.tracker.insert(utterance_id.clone(), text, mode, now);
        Ok((utterance_id, deliveries))
    }

    /// Cancel everything queued or playing. Safe in any state.
    pub fn stop(&self) {
        let _delivery = self.delivery.lock();
        let deliveries = {
            let mut inner = self.inner.lock();
            match inner.phase.engine_mut() {
                Some(engine) => {
                    log::info!("Stopping speech");
                    engine.stop();
                }
                None => {
                    log::debug!("stop() with no engine; nothing to do");
                    return;
                }
            }
            inner.abandon_all()
        };
        self.deliver(deliveries);
    }

    /// Change the speech rate. Must lie within `[0.5, 2.0]`.
    pub fn set_rate(&self, rate: f32) -> SessionResult<()> {
        self.set_parameter("speech rate", rate, |inner, value| {
            inner.rate = value;
            if let Some(engine) = inner.phase.active_engine() {
                engine.set_rate(value);
            }
        })
    }

    /// Change the voice pitch. Must lie within `[0.5, 2.0]`.
    pub fn set_pitch(&self, pitch: f32) -> SessionResult<()> {
        self.set_parameter("pitch", pitch, |inner, value| {
            inner.pitch = value;
            if let Some(engine) = inner.phase.active_engine() {
                engine.set_pitch(value);
            }
        })
    }

    fn set_parameter(
        &self,
        parameter: &'static str,
        value: f32,
        apply: impl FnOnce(&mut Inner<F::Engine>, f32),
    ) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        if inner.phase.active_engine().is_none() {
            log::error!("Cannot set {parameter}: TTS not initialized");
            return Err(SessionError::NotInitialized);
        }
        if !in_parameter_range(value) {
            log::warn!("Invalid {parameter}: {value} (must be 0.5-2.0)");
            return Err(SessionError::ParameterOutOfRange { parameter, value });
        }
        apply(&mut inner, value);
        log::debug!("{parameter} updated to: {value}");
        Ok(())
    }

    /// Current speech rate.
    pub fn rate(&self) -> f32 {
        self.inner.lock().rate
    }

    /// Current voice pitch.
    pub fn pitch(&self) -> f32 {
        self.inner.lock().pitch
    }

    /// Configured language tag, e.g. `th-TH`.
    pub fn language(&self) -> &str {
        &self.config.language
    }

    /// True once initialization succeeded and until shutdown or failure.
    pub fn is_ready(&self) -> bool {
        matches!(self.current_state(), SessionState::Ready | SessionState::Speaking)
    }

    /// True while the engine reports an utterance playing.
    pub fn is_speaking(&self) -> bool {
        self.current_state() == SessionState::Speaking
    }

    /// Snapshot of the session state.
    pub fn current_state(&self) -> SessionState {
        self.inner.lock().phase.state()
    }

    /// Why the session is in `Error`, if it is.
    pub fn last_error(&self) -> Option<SessionError> {
        match &self.inner.lock().phase {
            Phase::Error { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    /// Number of accepted utterances that have not reached a terminal event.
    pub fn pending_utterances(&self) -> usize {
        self.inner.lock().tracker.len()
    }

    /// Release the engine. Safe to call repeatedly and in any state.
    ///
    /// A pending `initialize` callback is called with `false`. Utterances in
    /// flight are dropped without terminal notifications.
    pub fn shutdown(&self) {
        let _delivery = self.delivery.lock();
        let deliveries = {
            let mut inner = self.inner.lock();
            if let Phase::Uninitialized = inner.phase {
                log::debug!("shutdown() on an uninitialized session");
            } else {
                log::info!("Shutting down TTS engine");
            }
            let pending = inner.retire_engine();
            inner.tracker.drain();
            inner.rate = self.config.rate;
            inner.pitch = self.config.pitch;
            pending
                .map(|callback| vec![Delivery::Initialized(callback, false)])
                .unwrap_or_default()
        };
        self.deliver(deliveries);
    }

    /// Called when the engine starts playing an utterance. Replaces any earlier hook.
    pub fn on_start<C>(&self, callback: C)
    where
        C: Fn(&str) + Send + Sync + 'static,
    {
        self.observers.write().on_start = Some(Arc::new(callback));
    }

    /// Called when an utterance finishes playing. Replaces any earlier hook.
    pub fn on_done<C>(&self, callback: C)
    where
        C: Fn(&str) + Send + Sync + 'static,
    {
        self.observers.write().on_done = Some(Arc::new(callback));
    }

    /// Called once when a started utterance fails or is cancelled. Replaces any earlier hook.
    pub fn on_error<C>(&self, callback: C)
    where
        C: Fn(&str, &SessionError) + Send + Sync + 'static,
    {
        self.observers.write().on_error = Some(Arc::new(callback));
    }

    /// Apply every notification already received. Never blocks on the engine.
    ///
    /// Returns the number of notifications handled. Returns 0 immediately if
    /// another thread (or an observer further up this stack) is already
    /// pumping; that call will pick up the queued notifications.
    pub fn process_events(&self) -> usize {
        let Some(_pump) = self.pump.try_lock() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(notification) = self.rx.try_recv() {
            self.handle(notification);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a notification, then apply everything received.
    pub fn wait_events(&self, timeout: Duration) -> usize {
        let Some(_pump) = self.pump.try_lock() else {
            return 0;
        };
        let Ok(first) = self.rx.recv_timeout(timeout) else {
            return 0;
        };
        self.handle(first);
        let mut handled = 1;
        while let Ok(notification) = self.rx.try_recv() {
            self.handle(notification);
            handled += 1;
        }
        handled
    }

    fn handle(&self, notification: Notification) {
        let _delivery = self.delivery.lock();
        let deliveries = {
            let mut inner = self.inner.lock();
            if notification.generation != inner.generation {
                log::debug!(
                    "Dropping {:?} from retired engine generation {}",
                    notification.event,
                    notification.generation
                );
                return;
            }
            match notification.event {
                EngineEvent::Ready(status) => {
                    inner.complete_initialization(status, &self.config.language)
                }
                EngineEvent::Started(id) => inner.utterance_started(id),
                EngineEvent::Completed(id) => inner.utterance_finished(id, None),
                EngineEvent::Failed(id, code) => inner.utterance_finished(id, Some(code)),
            }
        };
        self.deliver(deliveries);
    }

    fn deliver(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let observers = self.observers.read().clone();
        observers.deliver(deliveries);
    }
}

impl<F: EngineFactory> Drop for Session<F> {
    fn drop(&mut self) {
        // Callbacks are not run from drop.
        let _ = self.inner.get_mut().retire_engine();
    }
}
