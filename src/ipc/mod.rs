//! JSON IPC mode for the UI collaborator.
//!
//! Exposes the recording session over a non-blocking JSON-lines protocol on
//! this process's own stdin/stdout, so an Electron shell (or any frontend)
//! can drive the supervised recorder.
//!
//! Architecture:
//! - Stdin reader thread: reads JSON commands, sends to the main loop via
//!   channel
//! - Main event loop: processes commands and drains supervisor events
//! - Notification sink: controller notifications become stdout JSON lines
//!
//! Protocol:
//! - Each line is a JSON object
//! - Events (Rust → client): {"event": "...", ...}
//! - Commands (client → Rust): {"cmd": "...", ...}

mod protocol;
mod session;


pub use protocol::{IpcCommand, IpcEvent};
pub use session::run_ipc_mode;
