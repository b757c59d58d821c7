//! Log output setup.
//!
//! The library only emits through the `log` facade. Applications that want
//! the `[timestamp] [LEVEL] [component] message` format call [`init`] once at
//! start-up; `RUST_LOG` overrides the default level.

use std::io::Write;

use log::LevelFilter;

/// Install the formatter at `debug` level unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(LevelFilter::Debug);
}

/// Install the formatter with a default level. Later calls are no-ops.
pub fn init_with_level(level: LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(level.as_str());
    let result = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                component(record.target()),
                record.args()
            )
        })
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}

/// Short component name for a log target: `tts_session::session::tracker` → `tracker`.
fn component(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}
