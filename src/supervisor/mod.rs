//! Worker process supervision.
//!
//! Owns the recorder child process: spawn, stdio forwarding, graceful and
//! forced shutdown, and crash recovery with exponential backoff.
//!
//! Architecture:
//! - stdout/stderr reader threads: forward raw chunks into the event channel
//! - exit watcher thread: reaps the child and evaluates the restart policy
//! - restart timer thread: waits out the backoff delay, re-spawns unless
//!   cancelled
//!
//! All mutable state sits behind one mutex; events are emitted outside the
//! lock so a slow consumer can never wedge a state transition.

mod restart;

use crate::log_debug;
use crate::protocol::{encode_command, WorkerCommand};
use crate::reporter::{report, ErrorLevel, ErrorReporter};
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use restart::{RestartDecision, RestartPolicy};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// How long a graceful stop waits for the worker before the hard kill.
const STOP_GRACE_MS: u64 = 5000;

/// Poll interval for the grace and backoff timers; cancellation latency is
/// bounded by one tick.
const TIMER_TICK_MS: u64 = 10;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK_BYTES: usize = 4096;

/// Immutable description of the worker process, supplied at construction.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub max_restarts: u32,
    pub base_delay_ms: u64,
}

/// Lifecycle and stream events emitted by the supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Started,
    /// Raw stdout chunk; line framing happens downstream.
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    /// OS-level fault that is not an exit (failed respawn, broken stream).
    ProcessError(String),
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    Restarting {
        attempt: u32,
        delay_ms: u64,
    },
    /// Restart budget exhausted; the supervisor stays down until `start()`.
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

struct WorkerState {
    running: bool,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    restart_count: u32,
    should_restart: bool,
    kill_issued: bool,
    /// Increments per spawn; stale timers and watchers compare against it.
    generation: u64,
    /// Cancellation flag of the single pending restart timer, if any.
    pending_restart: Option<Arc<AtomicBool>>,
}

struct Shared {
    config: WorkerConfig,
    policy: RestartPolicy,
    events_tx: Sender<SupervisorEvent>,
    reporter: Arc<dyn ErrorReporter>,
    state: Mutex<WorkerState>,
}

/// Supervises exactly one worker process at a time.
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    events_rx: Receiver<SupervisorEvent>,
}

impl ProcessSupervisor {
    pub fn new(config: WorkerConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let policy = RestartPolicy::new(config.max_restarts, config.base_delay_ms);
        let shared = Arc::new(Shared {
            config,
            policy,
            events_tx,
            reporter,
            state: Mutex::new(WorkerState {
                running: false,
                pid: None,
                stdin: None,
                restart_count: 0,
                should_restart: false,
                kill_issued: false,
                generation: 0,
                pending_restart: None,
            }),
        });
        Self { shared, events_rx }
    }

    /// Stream of lifecycle and output events; single consumer.
    pub fn events(&self) -> &Receiver<SupervisorEvent> {
        &self.events_rx
    }

    /// Spawn the configured worker. No-op with a warning if one is already
    /// running. Re-enables auto-restart after a previous `stop()`.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = lock_state(&self.shared);
            if state.running {
                drop(state);
                self.shared.reporter.report(report(
                    ErrorLevel::Warning,
                    "supervisor",
                    "AlreadyRunning",
                    format!("worker '{}' is already running", self.shared.config.name),
                ));
                return Ok(());
            }
            state.should_restart = true;
        }
        spawn_worker(&self.shared)
    }

    /// Shut the worker down and cancel any pending restart.
    ///
    /// `force == false` writes `quit` and arms a grace timer that hard-kills
    /// at most once if the worker outlives it. `force == true` kills
    /// immediately. Neither mode allows a restart afterwards.
    pub fn stop(&self, force: bool) {
        enum StopAction {
            Kill(u32),
            Grace(u64),
        }

        let action = {
            let mut state = lock_state(&self.shared);
            if let Some(cancel) = state.pending_restart.take() {
                cancel.store(true, Ordering::SeqCst);
            }
            state.should_restart = false;
            if !state.running {
                None
            } else if force {
                state.kill_issued = true;
                state.pid.map(StopAction::Kill)
            } else {
                if !write_line_locked(&mut state, encode_command(WorkerCommand::Quit)) {
                    // Best-effort: a dead pipe just means the grace timer or
                    // the exit watcher finishes the job.
                    log_debug("quit command could not be written to worker stdin");
                }
                Some(StopAction::Grace(state.generation))
            }
        };

        match action {
            Some(StopAction::Kill(pid)) => {
                log_debug(&format!(
                    "force-stopping worker '{}' (pid {pid})",
                    self.shared.config.name
                ));
                kill_hard(pid);
            }
            Some(StopAction::Grace(generation)) => {
                spawn_grace_timer(self.shared.clone(), generation);
            }
            None => {}
        }
    }

    /// Write one raw line to the worker's stdin. Returns `false`, reporting
    /// a send failure, when the worker is not running or the write fails.
    pub fn send(&self, line: &str) -> bool {
        let mut state = lock_state(&self.shared);
        if !state.running {
            drop(state);
            self.shared.reporter.report(report(
                ErrorLevel::Warning,
                "supervisor",
                "SendFailure",
                format!(
                    "dropped '{}': worker '{}' is not running",
                    line.trim_end(),
                    self.shared.config.name
                ),
            ));
            return false;
        }
        if write_line_locked(&mut state, line) {
            true
        } else {
            drop(state);
            self.shared.reporter.report(report(
                ErrorLevel::Error,
                "supervisor",
                "SendFailure",
                format!("stdin write to worker '{}' failed", self.shared.config.name),
            ));
            false
        }
    }

    /// Reset the crash counter; called when the worker reports READY.
    pub fn reset_restart_count(&self) {
        lock_state(&self.shared).restart_count = 0;
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.shared).running
    }

    pub fn restart_count(&self) -> u32 {
        lock_state(&self.shared).restart_count
    }

    #[cfg(any(test, feature = "mutants"))]
    pub(crate) fn kill_was_issued(&self) -> bool {
        lock_state(&self.shared).kill_issued
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.stop(true);
    }
}

fn lock_state(shared: &Shared) -> MutexGuard<'_, WorkerState> {
    shared
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn emit(shared: &Shared, event: SupervisorEvent) {
    // The consumer may already be gone during shutdown; that is fine.
    let _ = shared.events_tx.send(event);
}

fn write_line_locked(state: &mut WorkerState, line: &str) -> bool {
    match state.stdin.as_mut() {
        Some(stdin) => stdin
            .write_all(line.as_bytes())
            .and_then(|_| stdin.flush())
            .is_ok(),
        None => false,
    }
}

/// Spawn the worker and wire up its stream forwarders and exit watcher.
fn spawn_worker(shared: &Arc<Shared>) -> Result<()> {
    let config = &shared.config;
    let mut child = Command::new(&config.command)
        .args(&config.args)
        .current_dir(&config.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn worker '{}'", config.command))?;

    let stdout = child.stdout.take().context("worker stdout not captured")?;
    let stderr = child.stderr.take().context("worker stderr not captured")?;
    let stdin = child.stdin.take().context("worker stdin not captured")?;
    let pid = child.id();

    let generation = {
        let mut state = lock_state(shared);
        state.generation += 1;
        state.running = true;
        state.pid = Some(pid);
        state.stdin = Some(stdin);
        state.kill_issued = false;
        state.pending_restart = None;
        state.generation
    };

    log_debug(&format!(
        "worker '{}' spawned (pid {pid}, generation {generation})",
        config.name
    ));
    emit(shared, SupervisorEvent::Started);

    spawn_stream_forwarder(shared.clone(), stdout, StreamKind::Stdout);
    spawn_stream_forwarder(shared.clone(), stderr, StreamKind::Stderr);
    spawn_exit_watcher(shared.clone(), child, generation);
    Ok(())
}

fn spawn_stream_forwarder(
    shared: Arc<Shared>,
    mut stream: impl Read + Send + 'static,
    kind: StreamKind,
) {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buf[..n].to_vec();
                    let event = match kind {
                        StreamKind::Stdout => SupervisorEvent::Stdout(chunk),
                        StreamKind::Stderr => SupervisorEvent::Stderr(chunk),
                    };
                    if shared.events_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    shared.reporter.report(report(
                        ErrorLevel::Error,
                        "supervisor",
                        "StreamReadFailed",
                        format!("{kind:?} read from worker failed: {err}"),
                    ));
                    break;
                }
            }
        }
    });
}

fn spawn_exit_watcher(shared: Arc<Shared>, mut child: Child, generation: u64) {
    thread::spawn(move || match child.wait() {
        Ok(status) => {
            let code = status.code();
            #[cfg(unix)]
            let signal = std::os::unix::process::ExitStatusExt::signal(&status);
            #[cfg(not(unix))]
            let signal: Option<i32> = None;
            handle_exit(&shared, generation, code, signal);
        }
        Err(err) => {
            shared.reporter.report(report(
                ErrorLevel::Error,
                "supervisor",
                "WaitFailed",
                format!("waiting on worker '{}' failed: {err}", shared.config.name),
            ));
            handle_exit(&shared, generation, None, None);
        }
    });
}

/// What the exit path decided while the lock was held.
enum ExitFollowup {
    Restart {
        attempt: u32,
        delay_ms: u64,
        cancel: Arc<AtomicBool>,
    },
    GiveUp,
}

fn handle_exit(shared: &Arc<Shared>, generation: u64, code: Option<i32>, signal: Option<i32>) {
    let followup = {
        let mut state = lock_state(shared);
        if state.generation != generation {
            // A newer worker already replaced this one.
            return;
        }
        state.running = false;
        state.pid = None;
        state.stdin = None;
        plan_restart_locked(shared, &mut state)
    };

    log_debug(&format!(
        "worker '{}' exited (code {code:?}, signal {signal:?})",
        shared.config.name
    ));
    emit(shared, SupervisorEvent::Exited { code, signal });
    run_followup(shared, followup);
}

/// Evaluate the restart policy under the lock; the caller emits afterwards.
fn plan_restart_locked(shared: &Shared, state: &mut WorkerState) -> Option<ExitFollowup> {
    if !state.should_restart {
        return None;
    }
    match shared.policy.evaluate(state.restart_count) {
        RestartDecision::Backoff { attempt, delay_ms } => {
            state.restart_count = attempt;
            let cancel = Arc::new(AtomicBool::new(false));
            state.pending_restart = Some(cancel.clone());
            Some(ExitFollowup::Restart {
                attempt,
                delay_ms,
                cancel,
            })
        }
        RestartDecision::GiveUp => {
            state.should_restart = false;
            Some(ExitFollowup::GiveUp)
        }
    }
}

fn run_followup(shared: &Arc<Shared>, followup: Option<ExitFollowup>) {
    match followup {
        Some(ExitFollowup::Restart {
            attempt,
            delay_ms,
            cancel,
        }) => {
            emit(
                shared,
                SupervisorEvent::Restarting { attempt, delay_ms },
            );
            schedule_restart(shared.clone(), attempt, delay_ms, cancel);
        }
        Some(ExitFollowup::GiveUp) => {
            shared.reporter.report(report(
                ErrorLevel::Error,
                "supervisor",
                "RestartExhausted",
                format!(
                    "worker '{}' crashed {} consecutive times, giving up",
                    shared.config.name, shared.config.max_restarts
                ),
            ));
            emit(shared, SupervisorEvent::Failed);
        }
        None => {}
    }
}

fn schedule_restart(shared: Arc<Shared>, attempt: u32, delay_ms: u64, cancel: Arc<AtomicBool>) {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_millis(delay_ms);
        while Instant::now() < deadline {
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(TIMER_TICK_MS.min(delay_ms.max(1))));
        }
        {
            let mut state = lock_state(&shared);
            // stop() may have raced the timer; the flag check under the lock
            // makes cancellation total.
            if cancel.load(Ordering::SeqCst) || !state.should_restart || state.running {
                return;
            }
            state.pending_restart = None;
        }
        log_debug(&format!(
            "restart attempt {attempt} for worker '{}'",
            shared.config.name
        ));
        if let Err(err) = spawn_worker(&shared) {
            shared.reporter.report(report(
                ErrorLevel::Error,
                "supervisor",
                "SpawnFailed",
                format!("restart attempt {attempt} failed: {err:#}"),
            ));
            emit(&shared, SupervisorEvent::ProcessError(format!("{err:#}")));
            // A failed respawn consumes an attempt like any other crash.
            let followup = {
                let mut state = lock_state(&shared);
                plan_restart_locked(&shared, &mut state)
            };
            run_followup(&shared, followup);
        }
    });
}

fn spawn_grace_timer(shared: Arc<Shared>, generation: u64) {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_millis(stop_grace_ms());
        loop {
            {
                let state = lock_state(&shared);
                if state.generation != generation || !state.running {
                    // The worker honored quit; nothing to kill.
                    return;
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(TIMER_TICK_MS));
        }
        let pid = {
            let mut state = lock_state(&shared);
            if state.generation != generation || !state.running || state.kill_issued {
                return;
            }
            state.kill_issued = true;
            state.pid
        };
        if let Some(pid) = pid {
            log_debug(&format!(
                "worker '{}' ignored quit for {} ms, killing pid {pid}",
                shared.config.name,
                stop_grace_ms()
            ));
            kill_hard(pid);
        }
    });
}

#[cfg(any(test, feature = "mutants"))]
static STOP_GRACE_OVERRIDE_MS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

#[cfg(any(test, feature = "mutants"))]
pub(crate) fn set_stop_grace_for_tests(ms: u64) {
    STOP_GRACE_OVERRIDE_MS.store(ms, Ordering::SeqCst);
}

fn stop_grace_ms() -> u64 {
    #[cfg(any(test, feature = "mutants"))]
    {
        let override_ms = STOP_GRACE_OVERRIDE_MS.load(Ordering::SeqCst);
        if override_ms != 0 {
            return override_ms;
        }
    }
    STOP_GRACE_MS
}

fn kill_hard(pid: u32) {
    #[cfg(unix)]
    // SAFETY: pid names a child this supervisor spawned; SIGKILL delivery is
    // best-effort and failure is only logged.
    unsafe {
        if libc::kill(pid as i32, libc::SIGKILL) != 0 {
            log_debug(&format!(
                "SIGKILL to pid {pid} failed: {}",
                std::io::Error::last_os_error()
            ));
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        log_debug("forced kill unsupported on this platform");
    }
}
