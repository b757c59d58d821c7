//! A scripted in-memory engine for driving `Session` from tests.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tts_session::{
    EngineEvents, EngineFactory, InitStatus, LanguageStatus, QueueMode, Session, SessionConfig,
    SessionError, SpeechEngine, SubmitStatus,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetLanguage(String),
    SetRate(f32),
    SetPitch(f32),
    Listener,
    Speak(String, QueueMode, String),
    Stop,
    Teardown,
}

struct MonitorState {
    calls: Vec<Call>,
    created: Vec<EngineEvents>,
    listener: Option<EngineEvents>,
    language: LanguageStatus,
    accept: bool,
}

/// Shared view of every engine the factory has handed out.
#[derive(Clone)]
pub struct EngineMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl EngineMonitor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                calls: Vec::new(),
                created: Vec::new(),
                listener: None,
                language: LanguageStatus::Available,
                accept: true,
            })),
        }
    }

    pub fn factory(&self) -> ScriptedFactory {
        ScriptedFactory {
            monitor: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn speak_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Speak(..)))
            .count()
    }

    pub fn engines_created(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn set_language_status(&self, status: LanguageStatus) {
        self.state.lock().language = status;
    }

    pub fn set_accept(&self, accept: bool) {
        self.state.lock().accept = accept;
    }

    /// Events handle given to the `n`th engine created (0-based).
    pub fn creation_events(&self, n: usize) -> EngineEvents {
        self.state.lock().created[n].clone()
    }

    /// Report readiness from the most recently created engine.
    pub fn ready(&self, status: InitStatus) {
        let events = self
            .state
            .lock()
            .created
            .last()
            .cloned()
            .expect("no engine created");
        events.ready(status);
    }

    /// Progress listener registered by the session.
    pub fn listener(&self) -> EngineEvents {
        self.state
            .lock()
            .listener
            .clone()
            .expect("progress listener not registered")
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

pub struct ScriptedFactory {
    monitor: EngineMonitor,
}

impl EngineFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    fn create(&self, events: EngineEvents) -> ScriptedEngine {
        self.monitor.state.lock().created.push(events);
        ScriptedEngine {
            monitor: self.monitor.clone(),
        }
    }
}

pub struct ScriptedEngine {
    monitor: EngineMonitor,
}

impl SpeechEngine for ScriptedEngine {
    fn set_language(&mut self, language: &str) -> LanguageStatus {
        self.monitor.record(Call::SetLanguage(language.to_string()));
        self.monitor.state.lock().language
    }

    fn set_rate(&mut self, rate: f32) {
        self.monitor.record(Call::SetRate(rate));
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.monitor.record(Call::SetPitch(pitch));
    }

    fn set_progress_listener(&mut self, events: EngineEvents) {
        self.monitor.record(Call::Listener);
        self.monitor.state.lock().listener = Some(events);
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> SubmitStatus {
        self.monitor.record(Call::Speak(
            text.to_string(),
            mode,
            utterance_id.to_string(),
        ));
        if self.monitor.state.lock().accept {
            SubmitStatus::Accepted
        } else {
            SubmitStatus::Rejected
        }
    }

    fn stop(&mut self) {
        self.monitor.record(Call::Stop);
    }

    fn teardown(&mut self) {
        self.monitor.record(Call::Teardown);
    }
}

/// Collects observer calls as `start:<id>`, `done:<id>`, `error:<id>:<reason>`.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn attach(session: &Session<ScriptedFactory>) -> Self {
        let recorder = Recorder::default();
        let (start, done, error) = (
            recorder.seen.clone(),
            recorder.seen.clone(),
            recorder.seen.clone(),
        );
        session.on_start(move |id| start.lock().push(format!("start:{id}")));
        session.on_done(move |id| done.lock().push(format!("done:{id}")));
        session.on_error(move |id, reason: &SessionError| {
            error.lock().push(format!("error:{id}:{reason}"))
        });
        recorder
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

pub fn new_session(config: SessionConfig) -> (Session<ScriptedFactory>, EngineMonitor, Recorder) {
    let monitor = EngineMonitor::new();
    let session = Session::new(monitor.factory(), config).expect("valid config");
    let recorder = Recorder::attach(&session);
    (session, monitor, recorder)
}

/// A session that has completed initialization successfully.
pub fn ready_session() -> (Session<ScriptedFactory>, EngineMonitor, Recorder) {
    let (session, monitor, recorder) = new_session(SessionConfig::default());
    session.initialize(|ok| assert!(ok, "initialization failed"));
    monitor.ready(InitStatus::Success);
    session.process_events();
    assert!(session.is_ready());
    monitor.clear_calls();
    (session, monitor, recorder)
}
