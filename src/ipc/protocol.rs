//! JSON message types exchanged with the UI collaborator.
//!
//! Messages are newline-delimited JSON with a tag field for type
//! discrimination.

use crate::session::Notification;
use serde::{Deserialize, Serialize};

// ============================================================================
// IPC Events (Rust → client)
// ============================================================================

/// Events emitted on stdout.
///
/// Serialized as JSON with an `"event"` tag field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum IpcEvent {
    /// Worker printed READY; the recorder is usable
    #[serde(rename = "recorder_ready")]
    RecorderReady,

    /// A recording session began (optimistic, on accepted start command)
    #[serde(rename = "recording_started")]
    RecordingStarted,

    /// A stop command was accepted
    #[serde(rename = "recording_stopped")]
    RecordingStopped,

    /// Capture finished and produced a file; triggers downstream
    /// transcription
    #[serde(rename = "recording_complete")]
    RecordingComplete { filename: String },

    /// Capture finished without audio
    #[serde(rename = "recording_no_audio")]
    RecordingNoAudio,

    /// The worker reported a recoverable error
    #[serde(rename = "recording_error")]
    RecordingError { message: String },

    /// The worker crashed and a restart is scheduled
    #[serde(rename = "recorder_restarting")]
    RecorderRestarting { attempt: u32, delay_ms: u64 },

    /// Restart budget exhausted; manual intervention required
    #[serde(rename = "recorder_failed")]
    RecorderFailed,

    /// Reply to get_status
    #[serde(rename = "status")]
    Status {
        state: String,
        worker_running: bool,
        restart_count: u32,
    },

    /// Command-level failure (bad JSON, rejected transition)
    #[serde(rename = "error")]
    Error { message: String, recoverable: bool },
}

impl From<Notification> for IpcEvent {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::RecorderReady => IpcEvent::RecorderReady,
            Notification::RecordingStarted => IpcEvent::RecordingStarted,
            Notification::RecordingStopped => IpcEvent::RecordingStopped,
            Notification::RecordingComplete { filename } => {
                IpcEvent::RecordingComplete { filename }
            }
            Notification::RecordingNoAudio => IpcEvent::RecordingNoAudio,
            Notification::RecordingError { message } => IpcEvent::RecordingError { message },
            Notification::RecorderRestarting { attempt, delay_ms } => {
                IpcEvent::RecorderRestarting { attempt, delay_ms }
            }
            Notification::RecorderFailed => IpcEvent::RecorderFailed,
        }
    }
}

// ============================================================================
// IPC Commands (client → Rust)
// ============================================================================

/// Commands received on stdin.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum IpcCommand {
    /// Begin a recording session
    #[serde(rename = "start_recording")]
    StartRecording,

    /// End the active recording session
    #[serde(rename = "stop_recording")]
    StopRecording,

    /// Re-emit the current status
    #[serde(rename = "get_status")]
    GetStatus,

    /// Stop the worker and exit the bridge
    #[serde(rename = "shutdown")]
    Shutdown {
        #[serde(default)]
        force: bool,
    },
}
