//! Default values and limits shared by parsing and validation.

/// Restart attempts before the supervisor declares the worker failed.
pub const DEFAULT_MAX_RESTARTS: u32 = 5;

/// First backoff delay; doubles on every consecutive crash.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Hard cap on automatic restarts; beyond this a crash loop only burns CPU.
pub const MAX_RESTART_LIMIT: u32 = 20;

pub const MIN_BASE_DELAY_MS: u64 = 10;
pub const MAX_BASE_DELAY_MS: u64 = 60_000;

/// Keep the worker argv small when forwarding extra arguments.
pub const MAX_WORKER_ARGS: usize = 32;
pub const MAX_WORKER_ARG_BYTES: usize = 4096;

/// Interpreter names accepted without a path lookup.
pub const WORKER_CMD_ALLOWLIST: &[&str] = &["python3", "python"];
