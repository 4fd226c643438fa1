//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{ArgAction, Parser};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RESTARTS, MAX_BASE_DELAY_MS, MAX_RESTART_LIMIT,
    MAX_WORKER_ARGS, MAX_WORKER_ARG_BYTES, MIN_BASE_DELAY_MS,
};

/// CLI options for the voicebridge supervisor. Validated values keep the
/// spawned worker subprocess safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "voicebridge recorder supervisor", author, version)]
pub struct AppConfig {
    /// Interpreter used to run the recorder worker
    #[arg(long, default_value = "python3")]
    pub worker_cmd: String,

    /// Path to the recorder worker script
    #[arg(long, default_value = "recorder.py")]
    pub worker_script: PathBuf,

    /// Working directory for the worker (defaults to the script's directory)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Extra arguments appended after the script path (repeatable)
    #[arg(
        long = "worker-arg",
        action = ArgAction::Append,
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    pub worker_args: Vec<String>,

    /// Maximum automatic restarts before the supervisor gives up
    #[arg(long, default_value_t = DEFAULT_MAX_RESTARTS)]
    pub max_restarts: u32,

    /// Base delay for restart backoff (milliseconds, doubles per attempt)
    #[arg(long = "restart-base-delay-ms", default_value_t = DEFAULT_BASE_DELAY_MS)]
    pub restart_base_delay_ms: u64,

    /// Print environment diagnostics and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOICEBRIDGE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOICEBRIDGE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging worker line content (debug log only)
    #[arg(
        long = "log-content",
        env = "VOICEBRIDGE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}
