//! Drives a `Session` against a simulated engine that "speaks" on a worker
//! thread, the way a platform engine delivers callbacks off the caller's thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tts_session::{
    EngineEvents, InitStatus, LanguageStatus, QueueMode, Session, SessionConfigBuilder,
    SpeechEngine, SubmitStatus,
};

/// Pretends to speak each utterance for 20 ms per character, one at a time.
struct SimulatedEngine {
    listener: Arc<Mutex<Option<EngineEvents>>>,
    jobs: Option<Sender<(u64, String, String)>>,
    /// Bumped on `stop()`; queued jobs from an older epoch are skipped.
    epoch: Arc<AtomicU64>,
}

impl SimulatedEngine {
    fn new(events: EngineEvents) -> Self {
        let (jobs, queue) = crossbeam_channel::unbounded::<(u64, String, String)>();
        let listener = Arc::new(Mutex::new(None::<EngineEvents>));
        let epoch = Arc::new(AtomicU64::new(0));

        let (worker_listener, worker_epoch) = (listener.clone(), epoch.clone());
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            events.ready(InitStatus::Success);
            for (job_epoch, id, text) in queue {
                let current = || worker_epoch.load(Ordering::SeqCst) == job_epoch;
                let Some(events) = worker_listener.lock().clone() else {
                    continue;
                };
                if !current() {
                    continue;
                }
                events.started(&id);
                thread::sleep(Duration::from_millis(20 * text.chars().count() as u64));
                if current() {
                    events.completed(&id);
                }
            }
        });

        Self {
            listener,
            jobs: Some(jobs),
            epoch,
        }
    }
}

impl SpeechEngine for SimulatedEngine {
    fn set_language(&mut self, language: &str) -> LanguageStatus {
        if language.starts_with("th") || language.starts_with("en") {
            LanguageStatus::Available
        } else {
            LanguageStatus::Unsupported
        }
    }

    fn set_rate(&mut self, rate: f32) {
        log::debug!("engine rate = {rate}");
    }

    fn set_pitch(&mut self, pitch: f32) {
        log::debug!("engine pitch = {pitch}");
    }

    fn set_progress_listener(&mut self, events: EngineEvents) {
        *self.listener.lock() = Some(events);
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> SubmitStatus {
        if mode == QueueMode::Flush {
            self.stop();
        }
        let Some(jobs) = &self.jobs else {
            return SubmitStatus::Rejected;
        };
        let job = (
            self.epoch.load(Ordering::SeqCst),
            utterance_id.to_string(),
            text.to_string(),
        );
        match jobs.send(job) {
            Ok(()) => SubmitStatus::Accepted,
            Err(_) => SubmitStatus::Rejected,
        }
    }

    fn stop(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn teardown(&mut self) {
        self.stop();
        self.jobs = None;
        *self.listener.lock() = None;
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tts_session::logging::init();

    let config = SessionConfigBuilder::default()
        .language("th-TH")
        .rate(0.9)
        .build()?;
    let session = Arc::new(Session::new(SimulatedEngine::new, config)?);

    session.on_start(|id| println!("▶ started {id}"));
    session.on_done(|id| println!("■ done {id}"));
    session.on_error(|id, reason| println!("✖ {id}: {reason}"));

    session.initialize(|ok| println!("engine ready: {ok}"));
    session.wait_events(Duration::from_secs(2));

    session.speak("สวัสดีครับ", Some("greeting"))?;
    session.speak_enqueue("ยินดีต้อนรับ", Some("welcome"))?;
    session.speak_enqueue("never heard", Some("superseded"))?;
    thread::sleep(Duration::from_millis(300));
    session.process_events();

    session.speak("interrupting", Some("interrupt"))?;
    while session.pending_utterances() > 0 {
        if session.wait_events(Duration::from_secs(2)) == 0 {
            break;
        }
    }

    if let Err(err) = session.set_rate(3.0) {
        println!("rate rejected: {err}");
    }
    println!("state: {}", session.current_state());

    session.shutdown();
    session.shutdown();
    println!("state after shutdown: {}", session.current_state());
    Ok(())
}
