//! Line protocol spoken with the recorder worker.
//!
//! The worker prints newline-terminated ASCII status lines on stdout and
//! accepts single-word commands on stdin. Decoding operates on one trimmed
//! line at a time; [`LineFramer`] turns the supervisor's raw output chunks
//! into such lines.

const READY_LINE: &str = "READY";
const RECORDING_STARTED_LINE: &str = "RECORDING_STARTED";
const RECORDING_STOPPED_PREFIX: &str = "RECORDING_STOPPED:";
const ERROR_PREFIX: &str = "ERROR:";

/// Placeholder filename meaning the capture produced no output.
const NO_AUDIO_SENTINEL: &str = "no_audio";

/// Status event decoded from one worker stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Ready,
    RecordingStarted,
    RecordingStopped { filename: Option<String> },
    ErrorMessage { text: String },
    Unrecognized { raw: String },
}

/// Command accepted by the worker on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    StartRecording,
    StopRecording,
    Quit,
}

/// Exact stdin line for a command, trailing newline included.
pub fn encode_command(command: WorkerCommand) -> &'static str {
    match command {
        WorkerCommand::StartRecording => "start\n",
        WorkerCommand::StopRecording => "stop\n",
        WorkerCommand::Quit => "quit\n",
    }
}

/// Decode one newline-trimmed worker stdout line.
///
/// `RECORDING_STOPPED` payloads split on the first `:` only; anything after
/// it, colons included, is the filename. That matches what the worker prints
/// and must not be hardened without versioning the protocol.
pub fn decode_event(line: &str) -> WorkerEvent {
    if line == READY_LINE {
        return WorkerEvent::Ready;
    }
    if line == RECORDING_STARTED_LINE {
        return WorkerEvent::RecordingStarted;
    }
    if let Some(rest) = line.strip_prefix(RECORDING_STOPPED_PREFIX) {
        let filename = match rest {
            "" | NO_AUDIO_SENTINEL => None,
            name => Some(name.to_string()),
        };
        return WorkerEvent::RecordingStopped { filename };
    }
    if let Some(text) = line.strip_prefix(ERROR_PREFIX) {
        return WorkerEvent::ErrorMessage {
            text: text.to_string(),
        };
    }
    WorkerEvent::Unrecognized {
        raw: line.to_string(),
    }
}

/// Reassembles raw stdout chunks into newline-trimmed lines.
///
/// The supervisor forwards whatever byte chunks the pipe hands it, so a
/// status line can arrive split across reads or several lines can share one
/// chunk. Partial trailing data is held until the closing newline shows up.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every complete line it closed, with the `\n`
    /// and any trailing `\r` stripped. Non-UTF-8 bytes are replaced.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Discard buffered partial data (used when the worker goes away mid-line).
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_recognizes_ready_and_started() {
        assert_eq!(decode_event("READY"), WorkerEvent::Ready);
        assert_eq!(decode_event("RECORDING_STARTED"), WorkerEvent::RecordingStarted);
    }

    #[test]
    fn decode_stopped_with_filename() {
        assert_eq!(
            decode_event("RECORDING_STOPPED:out.wav"),
            WorkerEvent::RecordingStopped {
                filename: Some("out.wav".to_string())
            }
        );
    }

    #[test]
    fn decode_stopped_no_audio_sentinel_means_no_filename() {
        assert_eq!(
            decode_event("RECORDING_STOPPED:no_audio"),
            WorkerEvent::RecordingStopped { filename: None }
        );
    }

    #[test]
    fn decode_stopped_empty_suffix_means_no_filename() {
        assert_eq!(
            decode_event("RECORDING_STOPPED:"),
            WorkerEvent::RecordingStopped { filename: None }
        );
    }

    #[test]
    fn decode_stopped_splits_on_first_colon_only() {
        assert_eq!(
            decode_event("RECORDING_STOPPED:C:/audio/take.wav"),
            WorkerEvent::RecordingStopped {
                filename: Some("C:/audio/take.wav".to_string())
            }
        );
    }

    #[test]
    fn decode_error_carries_remainder() {
        assert_eq!(
            decode_event("ERROR:mic busy"),
            WorkerEvent::ErrorMessage {
                text: "mic busy".to_string()
            }
        );
        assert_eq!(
            decode_event("ERROR:"),
            WorkerEvent::ErrorMessage {
                text: String::new()
            }
        );
    }

    #[test]
    fn decode_anything_else_is_unrecognized() {
        assert_eq!(
            decode_event("garbage"),
            WorkerEvent::Unrecognized {
                raw: "garbage".to_string()
            }
        );
        // Case and exactness matter: near-misses never decode as events.
        assert_eq!(
            decode_event("ready"),
            WorkerEvent::Unrecognized {
                raw: "ready".to_string()
            }
        );
    }

    #[test]
    fn encode_produces_exact_newline_terminated_lines() {
        assert_eq!(encode_command(WorkerCommand::StartRecording), "start\n");
        assert_eq!(encode_command(WorkerCommand::StopRecording), "stop\n");
        assert_eq!(encode_command(WorkerCommand::Quit), "quit\n");
    }

    #[test]
    fn framer_joins_chunks_split_mid_line() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"REA").is_empty());
        assert_eq!(framer.push(b"DY\n"), vec!["READY".to_string()]);
    }

    #[test]
    fn framer_yields_multiple_lines_from_one_chunk() {
        let mut framer = LineFramer::new();
        assert_eq!(
            framer.push(b"READY\nRECORDING_STARTED\npartial"),
            vec!["READY".to_string(), "RECORDING_STARTED".to_string()]
        );
        assert_eq!(framer.push(b"\n"), vec!["partial".to_string()]);
    }

    #[test]
    fn framer_strips_carriage_returns() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"READY\r\n"), vec!["READY".to_string()]);
    }

    #[test]
    fn framer_clear_drops_partial_data() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"RECORDING_ST").is_empty());
        framer.clear();
        assert_eq!(framer.push(b"READY\n"), vec!["READY".to_string()]);
    }
}
