use super::*;
use crate::reporter::CollectingReporter;
use crate::supervisor::SupervisorEvent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FakeLink {
    running: AtomicBool,
    accept_sends: AtomicBool,
    sent: Mutex<Vec<String>>,
    resets: AtomicUsize,
}

impl FakeLink {
    fn new(running: bool, accept_sends: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
            accept_sends: AtomicBool::new(accept_sends),
            sent: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    fn sent_lines(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn reset_calls(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl WorkerLink for FakeLink {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn send_line(&self, line: &str) -> bool {
        if !self.accept_sends.load(Ordering::SeqCst) {
            return false;
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
        true
    }

    fn reset_restart_count(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

struct CollectingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }

    fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}

fn controller_with(
    running: bool,
    accept_sends: bool,
) -> (
    RecordingSessionController,
    Arc<FakeLink>,
    Arc<CollectingSink>,
    Arc<CollectingReporter>,
) {
    let link = Arc::new(FakeLink::new(running, accept_sends));
    let sink = Arc::new(CollectingSink::new());
    let reporter = Arc::new(CollectingReporter::new());
    let controller =
        RecordingSessionController::new(link.clone(), sink.clone(), reporter.clone());
    (controller, link, sink, reporter)
}

#[test]
fn start_recording_sends_start_and_goes_recording() {
    let (mut controller, link, sink, _reporter) = controller_with(true, true);

    controller.start_recording().expect("start should succeed");

    assert_eq!(controller.state(), SessionState::Recording);
    assert_eq!(link.sent_lines(), vec!["start\n".to_string()]);
    assert_eq!(sink.notifications(), vec![Notification::RecordingStarted]);
}

#[test]
fn start_recording_rejected_when_worker_not_running() {
    let (mut controller, link, sink, reporter) = controller_with(false, true);

    let err = controller.start_recording().expect_err("must reject");

    assert_eq!(err, ControlError::RecorderNotReady);
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(link.sent_lines().is_empty());
    assert!(sink.notifications().is_empty());
    assert!(reporter.kinds().contains(&"RecorderNotReady"));
}

#[test]
fn start_recording_rejected_while_already_recording() {
    let (mut controller, link, _sink, _reporter) = controller_with(true, true);
    controller.start_recording().expect("first start");

    let err = controller.start_recording().expect_err("second start");

    assert_eq!(err, ControlError::RecorderNotReady);
    assert_eq!(controller.state(), SessionState::Recording);
    assert_eq!(link.sent_lines().len(), 1, "no duplicate start command");
}

#[test]
fn failed_send_leaves_session_idle() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, false);

    let err = controller.start_recording().expect_err("send fails");

    assert_eq!(err, ControlError::SendFailed);
    assert_eq!(controller.state(), SessionState::Idle);
    assert!(sink.notifications().is_empty());
}

#[test]
fn stop_recording_while_idle_still_sends_stop() {
    let (mut controller, link, sink, _reporter) = controller_with(true, true);

    controller.stop_recording().expect("stop while idle is fine");

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(link.sent_lines(), vec!["stop\n".to_string()]);
    assert_eq!(sink.notifications(), vec![Notification::RecordingStopped]);
}

#[test]
fn stop_recording_rejected_when_worker_not_running() {
    let (mut controller, link, _sink, _reporter) = controller_with(false, true);

    let err = controller.stop_recording().expect_err("must reject");

    assert_eq!(err, ControlError::RecorderNotReady);
    assert!(link.sent_lines().is_empty());
}

#[test]
fn stopped_line_with_filename_completes_the_session() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);
    controller.start_recording().expect("start");

    controller.handle_worker_line("RECORDING_STOPPED:clip_01.wav");

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        sink.notifications().last(),
        Some(&Notification::RecordingComplete {
            filename: "clip_01.wav".to_string()
        })
    );
}

#[test]
fn stopped_line_with_no_audio_warns_without_filename() {
    let (mut controller, _link, sink, reporter) = controller_with(true, true);
    controller.start_recording().expect("start");

    controller.handle_worker_line("RECORDING_STOPPED:no_audio");

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        sink.notifications().last(),
        Some(&Notification::RecordingNoAudio)
    );
    assert!(reporter.kinds().contains(&"NoAudioData"));
}

#[test]
fn ready_line_resets_restart_counter_and_notifies() {
    let (mut controller, link, sink, _reporter) = controller_with(true, true);

    controller.handle_worker_line("READY");

    assert_eq!(link.reset_calls(), 1);
    assert_eq!(sink.notifications(), vec![Notification::RecorderReady]);
}

#[test]
fn error_line_notifies_without_changing_state() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);
    controller.start_recording().expect("start");

    controller.handle_worker_line("ERROR:mic busy");

    assert_eq!(controller.state(), SessionState::Recording);
    assert_eq!(
        sink.notifications().last(),
        Some(&Notification::RecordingError {
            message: "mic busy".to_string()
        })
    );
}

#[test]
fn unrecognized_line_is_reported_not_notified() {
    let (mut controller, _link, sink, reporter) = controller_with(true, true);

    controller.handle_worker_line("garbage");

    assert!(sink.notifications().is_empty());
    assert!(reporter.kinds().contains(&"UnrecognizedLine"));
}

#[test]
fn worker_exit_forces_idle_without_notification() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);
    controller.start_recording().expect("start");

    controller.handle_supervisor_event(SupervisorEvent::Exited {
        code: Some(1),
        signal: None,
    });

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(sink.notifications(), vec![Notification::RecordingStarted]);
}

#[test]
fn failed_event_notifies_and_forces_idle() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);
    controller.start_recording().expect("start");

    controller.handle_supervisor_event(SupervisorEvent::Failed);

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        sink.notifications().last(),
        Some(&Notification::RecorderFailed)
    );
}

#[test]
fn restarting_event_notifies_without_state_change() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);

    controller.handle_supervisor_event(SupervisorEvent::Restarting {
        attempt: 2,
        delay_ms: 2000,
    });

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(
        sink.notifications(),
        vec![Notification::RecorderRestarting {
            attempt: 2,
            delay_ms: 2000
        }]
    );
}

#[test]
fn stdout_chunks_are_framed_across_boundaries() {
    let (mut controller, link, sink, _reporter) = controller_with(true, true);

    controller.handle_supervisor_event(SupervisorEvent::Stdout(b"REA".to_vec()));
    assert!(sink.notifications().is_empty(), "partial line is not an event");

    controller.handle_supervisor_event(SupervisorEvent::Stdout(b"DY\nRECORDING_".to_vec()));
    assert_eq!(sink.notifications(), vec![Notification::RecorderReady]);
    assert_eq!(link.reset_calls(), 1);

    controller.handle_supervisor_event(SupervisorEvent::Stdout(b"STARTED\n".to_vec()));
    assert_eq!(controller.state(), SessionState::Recording);
}

#[test]
fn exit_drops_a_half_received_line() {
    let (mut controller, _link, sink, _reporter) = controller_with(true, true);

    controller.handle_supervisor_event(SupervisorEvent::Stdout(b"RECORDING_STOP".to_vec()));
    controller.handle_supervisor_event(SupervisorEvent::Exited {
        code: None,
        signal: Some(9),
    });
    controller.handle_supervisor_event(SupervisorEvent::Stdout(b"READY\n".to_vec()));

    // The partial pre-exit bytes must not corrupt the fresh worker's READY.
    assert_eq!(sink.notifications(), vec![Notification::RecorderReady]);
}
