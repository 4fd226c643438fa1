//! Recording session state machine.
//!
//! Sits between the callers (UI commands) and the supervised worker: it
//! validates start/stop requests against the current session state, forwards
//! them as protocol commands, and folds worker status lines and supervisor
//! lifecycle events back into state changes and UI notifications.

#[cfg(test)]
mod tests;

use crate::log_debug;
use crate::protocol::{decode_event, encode_command, LineFramer, WorkerCommand, WorkerEvent};
use crate::reporter::{report, ErrorLevel, ErrorReporter};
use crate::supervisor::{ProcessSupervisor, SupervisorEvent};
use std::fmt;
use std::sync::Arc;

/// The controller's view of whether a recording is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
        }
    }
}

/// Typed notifications delivered to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    RecorderReady,
    RecordingStarted,
    RecordingStopped,
    /// Capture finished with output; the transcription collaborator reacts
    /// to this one.
    RecordingComplete { filename: String },
    RecordingNoAudio,
    RecordingError { message: String },
    RecorderRestarting { attempt: u32, delay_ms: u64 },
    RecorderFailed,
}

/// Receiver for session notifications; the controller never touches UI
/// state directly.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Command/lifecycle seam over the supervisor, so the controller is
/// testable without a live worker process.
pub trait WorkerLink: Send + Sync {
    fn is_running(&self) -> bool;
    fn send_line(&self, line: &str) -> bool;
    fn reset_restart_count(&self);
}

impl WorkerLink for ProcessSupervisor {
    fn is_running(&self) -> bool {
        ProcessSupervisor::is_running(self)
    }

    fn send_line(&self, line: &str) -> bool {
        self.send(line)
    }

    fn reset_restart_count(&self) {
        ProcessSupervisor::reset_restart_count(self)
    }
}

/// Why a start/stop request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The worker is not running, or the session state forbids the request.
    RecorderNotReady,
    /// The worker is up but the command could not be written.
    SendFailed,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::RecorderNotReady => write!(f, "recorder is not ready"),
            ControlError::SendFailed => write!(f, "could not send command to recorder"),
        }
    }
}

impl std::error::Error for ControlError {}

pub struct RecordingSessionController {
    link: Arc<dyn WorkerLink>,
    sink: Arc<dyn NotificationSink>,
    reporter: Arc<dyn ErrorReporter>,
    state: SessionState,
    framer: LineFramer,
}

impl RecordingSessionController {
    pub fn new(
        link: Arc<dyn WorkerLink>,
        sink: Arc<dyn NotificationSink>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            link,
            sink,
            reporter,
            state: SessionState::Idle,
            framer: LineFramer::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ask the worker to begin capturing.
    ///
    /// The session flips to `Recording` as soon as the command is written;
    /// the worker confirms later with `RECORDING_STARTED`. A worker that
    /// accepts the command but silently fails to capture is corrected by the
    /// eventual `RECORDING_STOPPED:no_audio` or error line.
    pub fn start_recording(&mut self) -> Result<(), ControlError> {
        if !self.link.is_running() {
            self.reporter.report(report(
                ErrorLevel::Warning,
                "session",
                "RecorderNotReady",
                "start requested but the recorder worker is not running",
            ));
            return Err(ControlError::RecorderNotReady);
        }
        if self.state != SessionState::Idle {
            self.reporter.report(report(
                ErrorLevel::Warning,
                "session",
                "RecorderNotReady",
                "start requested while a recording is already active",
            ));
            return Err(ControlError::RecorderNotReady);
        }
        if !self
            .link
            .send_line(encode_command(WorkerCommand::StartRecording))
        {
            return Err(ControlError::SendFailed);
        }
        self.state = SessionState::Recording;
        self.sink.notify(Notification::RecordingStarted);
        Ok(())
    }

    /// Ask the worker to stop capturing.
    ///
    /// A stop while idle is not an error worth surfacing: the state is
    /// forced back to `Idle` and the command is still sent, so a desynced
    /// worker gets stopped regardless.
    pub fn stop_recording(&mut self) -> Result<(), ControlError> {
        if !self.link.is_running() {
            self.reporter.report(report(
                ErrorLevel::Warning,
                "session",
                "RecorderNotReady",
                "stop requested but the recorder worker is not running",
            ));
            return Err(ControlError::RecorderNotReady);
        }
        if self.state != SessionState::Recording {
            log_debug("stop requested while idle, forcing idle and stopping anyway");
        }
        self.state = SessionState::Idle;
        let sent = self
            .link
            .send_line(encode_command(WorkerCommand::StopRecording));
        self.sink.notify(Notification::RecordingStopped);
        if sent {
            Ok(())
        } else {
            Err(ControlError::SendFailed)
        }
    }

    /// Fold one supervisor event into the session.
    pub fn handle_supervisor_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Started => {
                log_debug("recorder worker process started");
            }
            SupervisorEvent::Stdout(bytes) => {
                for line in self.framer.push(&bytes) {
                    self.handle_worker_line(&line);
                }
            }
            SupervisorEvent::Stderr(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                for line in text.lines().filter(|line| !line.trim().is_empty()) {
                    log_debug(&format!("worker stderr: {line}"));
                }
            }
            SupervisorEvent::ProcessError(message) => {
                self.reporter.report(report(
                    ErrorLevel::Error,
                    "session",
                    "ProcessError",
                    message,
                ));
            }
            SupervisorEvent::Exited { code, signal } => {
                log_debug(&format!(
                    "recorder worker exited (code {code:?}, signal {signal:?})"
                ));
                // A dead worker cannot be recording, and a half-received
                // status line will never complete.
                self.framer.clear();
                self.force_idle("worker exited");
            }
            SupervisorEvent::Restarting { attempt, delay_ms } => {
                self.sink
                    .notify(Notification::RecorderRestarting { attempt, delay_ms });
            }
            SupervisorEvent::Failed => {
                self.force_idle("worker failed permanently");
                self.sink.notify(Notification::RecorderFailed);
            }
        }
    }

    /// Fold one decoded worker status line into the session.
    pub fn handle_worker_line(&mut self, line: &str) {
        match decode_event(line) {
            WorkerEvent::Ready => {
                self.link.reset_restart_count();
                self.sink.notify(Notification::RecorderReady);
            }
            WorkerEvent::RecordingStarted => {
                if self.state != SessionState::Recording {
                    // The worker is capturing even though we never asked this
                    // incarnation to; its observed state wins.
                    log_debug("recording confirmation while idle, adopting worker state");
                    self.state = SessionState::Recording;
                }
            }
            WorkerEvent::RecordingStopped { filename } => {
                self.state = SessionState::Idle;
                match filename {
                    Some(filename) => {
                        self.sink
                            .notify(Notification::RecordingComplete { filename });
                    }
                    None => {
                        self.reporter.report(report(
                            ErrorLevel::Warning,
                            "session",
                            "NoAudioData",
                            "recording stopped without producing audio",
                        ));
                        self.sink.notify(Notification::RecordingNoAudio);
                    }
                }
            }
            WorkerEvent::ErrorMessage { text } => {
                self.reporter.report(report(
                    ErrorLevel::Warning,
                    "session",
                    "WorkerError",
                    text.clone(),
                ));
                self.sink
                    .notify(Notification::RecordingError { message: text });
            }
            WorkerEvent::Unrecognized { raw } => {
                self.reporter.report(report(
                    ErrorLevel::Info,
                    "session",
                    "UnrecognizedLine",
                    raw,
                ));
            }
        }
    }

    fn force_idle(&mut self, why: &str) {
        if self.state == SessionState::Recording {
            log_debug(&format!("session forced idle: {why}"));
        }
        self.state = SessionState::Idle;
    }
}
