//! Optional structured trace output, separate from the debug log.
//!
//! Supervision events carry enough context (component, kind, worker name)
//! that a JSON-lines trace file is the cheapest way to audit a restart storm
//! after the fact.

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub(crate) fn tracing_log_path() -> PathBuf {
    match env::var("VOICEBRIDGE_TRACE_LOG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => env::temp_dir().join("voicebridge_trace.jsonl"),
    }
}

/// Install the global JSON subscriber once, if logging is enabled at all.
/// Failure to open the trace file silently disables tracing; the debug log
/// still works.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs || !(config.logs || config.log_timings) {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let Ok(file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(tracing_log_path())
        else {
            return;
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
