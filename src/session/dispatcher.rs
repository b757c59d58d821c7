use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::SessionError;

/// Called with an utterance id.
pub type UtteranceCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Called with an utterance id and the reason it ended without completing.
pub type ErrorCallback = Arc<dyn Fn(&str, &SessionError) + Send + Sync>;
/// Called once when initialization finishes, with `true` on success.
pub type InitCallback = Box<dyn FnOnce(bool) + Send>;

/// A pending observer call, computed under the session lock and delivered after it is released.
pub(crate) enum Delivery {
    Initialized(InitCallback, bool),
    Start(String),
    Done(String),
    Error(String, SessionError),
}

/// The registered observer set. Registering a hook replaces the previous one.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    pub(crate) on_start: Option<UtteranceCallback>,
    pub(crate) on_done: Option<UtteranceCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl Observers {
    pub(crate) fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            match delivery {
                Delivery::Initialized(callback, ok) => guarded("initialize", || callback(ok)),
                Delivery::Start(id) => {
                    if let Some(callback) = &self.on_start {
                        guarded("on_start", || callback(&id));
                    }
                }
                Delivery::Done(id) => {
                    if let Some(callback) = &self.on_done {
                        guarded("on_done", || callback(&id));
                    }
                }
                Delivery::Error(id, reason) => {
                    if let Some(callback) = &self.on_error {
                        guarded("on_error", || callback(&id, &reason));
                    }
                }
            }
        }
    }
}

// An observer panic must not unwind into the session or skip later deliveries.
fn guarded<F: FnOnce()>(hook: &str, f: F) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::error!("Observer {hook} panicked; continuing");
    }
}
