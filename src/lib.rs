mod app;
pub mod config;
pub mod ipc;
pub mod protocol;
pub mod reporter;
pub mod session;
pub mod supervisor;
mod telemetry;

pub use app::logging::{init_logging, log_debug, log_debug_content, log_file_path};
pub use telemetry::init_tracing;
