use crate::config::AppConfig;
use crate::reporter::{ErrorReporter, LogReporter};
use crate::session::{NotificationSink, Notification, RecordingSessionController};
use crate::supervisor::{ProcessSupervisor, SupervisorEvent};
use crate::{log_debug, log_debug_content};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
#[cfg(any(test, feature = "mutants"))]
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::protocol::{IpcCommand, IpcEvent};

/// Idle sleep between main-loop polls.
const LOOP_TICK_MS: u64 = 10;

// ============================================================================
// IPC State
// ============================================================================

pub(super) struct IpcState {
    pub(super) supervisor: Arc<ProcessSupervisor>,
    pub(super) controller: RecordingSessionController,
    pub(super) shutting_down: bool,
}

impl IpcState {
    pub(super) fn new(config: &AppConfig) -> Self {
        let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
        let supervisor = Arc::new(ProcessSupervisor::new(
            config.worker_config(),
            reporter.clone(),
        ));
        let controller = RecordingSessionController::new(
            supervisor.clone(),
            Arc::new(StdoutSink),
            reporter,
        );
        Self {
            supervisor,
            controller,
            shutting_down: false,
        }
    }

    pub(super) fn status_event(&self) -> IpcEvent {
        IpcEvent::Status {
            state: self.controller.state().label().to_string(),
            worker_running: self.supervisor.is_running(),
            restart_count: self.supervisor.restart_count(),
        }
    }
}

// ============================================================================
// Event Sending
// ============================================================================

/// Forwards controller notifications to the client as JSON lines.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn notify(&self, notification: Notification) {
        send_event(&IpcEvent::from(notification));
    }
}

pub(super) fn send_event(event: &IpcEvent) {
    #[cfg(any(test, feature = "mutants"))]
    if capture_test_event(event) {
        return;
    }
    if let Ok(json) = serde_json::to_string(event) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{json}");
        let _ = stdout.flush();
    }
}

#[cfg(any(test, feature = "mutants"))]
static EVENT_SINK: OnceLock<Mutex<Vec<IpcEvent>>> = OnceLock::new();

#[cfg(any(test, feature = "mutants"))]
fn capture_test_event(event: &IpcEvent) -> bool {
    if let Some(sink) = EVENT_SINK.get() {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
            return true;
        }
    }
    false
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn init_event_sink() {
    let _ = EVENT_SINK.get_or_init(|| Mutex::new(Vec::new()));
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn event_snapshot() -> usize {
    init_event_sink();
    EVENT_SINK
        .get()
        .and_then(|sink| sink.lock().ok().map(|events| events.len()))
        .unwrap_or(0)
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn events_since(start: usize) -> Vec<IpcEvent> {
    EVENT_SINK
        .get()
        .and_then(|sink| {
            sink.lock()
                .ok()
                .map(|events| events.iter().skip(start).cloned().collect())
        })
        .unwrap_or_default()
}

// ============================================================================
// Stdin Reader Thread
// ============================================================================

#[cfg_attr(any(test, feature = "mutants"), allow(dead_code))]
fn spawn_stdin_reader(tx: Sender<IpcCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        let stdin_lock = stdin.lock();

        for line in stdin_lock.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<IpcCommand>(trimmed) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break; // Main loop has exited
                    }
                }
                Err(e) => {
                    send_event(&IpcEvent::Error {
                        message: format!("Invalid command: {e}"),
                        recoverable: true,
                    });
                }
            }
        }

        log_debug("stdin reader thread exiting");
    })
}

// ============================================================================
// Main Event Loop
// ============================================================================

pub fn run_ipc_mode(config: AppConfig) -> Result<()> {
    log_debug("starting JSON IPC mode");

    let mut state = IpcState::new(&config);
    state.supervisor.start()?;
    send_event(&state.status_event());

    let (cmd_tx, cmd_rx) = mpsc::channel();
    #[cfg(any(test, feature = "mutants"))]
    {
        drop(cmd_tx);
        run_ipc_loop(&mut state, &cmd_rx, Some(10))
    }
    #[cfg(not(any(test, feature = "mutants")))]
    {
        let _stdin_handle = spawn_stdin_reader(cmd_tx);
        run_ipc_loop(&mut state, &cmd_rx, None)
    }
}

pub(super) fn run_ipc_loop(
    state: &mut IpcState,
    cmd_rx: &Receiver<IpcCommand>,
    max_loops: Option<u64>,
) -> Result<()> {
    let mut loop_count: u64 = 0;
    loop {
        loop_count += 1;
        if let Some(limit) = max_loops {
            if loop_count >= limit {
                log_debug("IPC loop reached test limit, exiting");
                break;
            }
        }

        match cmd_rx.try_recv() {
            Ok(cmd) => handle_command(state, cmd),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // stdin closed: the UI went away, take the worker down too.
                if !state.shutting_down {
                    log_debug("command channel disconnected, stopping worker");
                    state.supervisor.stop(false);
                    state.shutting_down = true;
                }
            }
        }

        while let Ok(event) = state.supervisor.events().try_recv() {
            state.controller.handle_supervisor_event(event);
        }

        if state.shutting_down && !state.supervisor.is_running() {
            break;
        }

        thread::sleep(Duration::from_millis(LOOP_TICK_MS));
    }

    log_debug("IPC loop exiting");
    Ok(())
}

pub(super) fn handle_command(state: &mut IpcState, cmd: IpcCommand) {
    log_debug_content(&format!("IPC command received: {cmd:?}"));
    match cmd {
        IpcCommand::StartRecording => {
            if let Err(err) = state.controller.start_recording() {
                send_event(&IpcEvent::Error {
                    message: err.to_string(),
                    recoverable: true,
                });
            }
        }
        IpcCommand::StopRecording => {
            if let Err(err) = state.controller.stop_recording() {
                send_event(&IpcEvent::Error {
                    message: err.to_string(),
                    recoverable: true,
                });
            }
        }
        IpcCommand::GetStatus => {
            send_event(&state.status_event());
        }
        IpcCommand::Shutdown { force } => {
            state.supervisor.stop(force);
            state.shutting_down = true;
        }
    }
}
