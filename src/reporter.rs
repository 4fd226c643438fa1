//! Injected fault reporting for the supervisor and session controller.
//!
//! Every fault that crosses a thread boundary is reported through a trait
//! handed to each component at construction, so components stay observable
//! in unit tests without process-wide mutable state.

use crate::log_debug;
use std::fmt;

/// Severity of a reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorLevel {
    pub fn label(self) -> &'static str {
        match self {
            ErrorLevel::Info => "INFO",
            ErrorLevel::Warning => "WARNING",
            ErrorLevel::Error => "ERROR",
            ErrorLevel::Critical => "CRITICAL",
        }
    }
}

/// One structured fault record.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub level: ErrorLevel,
    /// Component that raised the fault (`supervisor`, `session`, ...).
    pub component: &'static str,
    /// Short machine-matchable kind (`SendFailure`, `SpawnFailed`, ...).
    pub kind: &'static str,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.level.label(),
            self.component,
            self.kind,
            self.message
        )
    }
}

/// Build a report in one call; call sites read as a single line.
pub fn report(
    level: ErrorLevel,
    component: &'static str,
    kind: &'static str,
    message: impl Into<String>,
) -> ErrorReport {
    ErrorReport {
        level,
        component,
        kind,
        message: message.into(),
    }
}

/// Receiver for fault records.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// Production reporter: debug log plus `tracing` events.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, report: ErrorReport) {
        log_debug(&report.to_string());
        match report.level {
            ErrorLevel::Info => {
                tracing::info!(component = report.component, kind = report.kind, "{}", report.message)
            }
            ErrorLevel::Warning => {
                tracing::warn!(component = report.component, kind = report.kind, "{}", report.message)
            }
            ErrorLevel::Error | ErrorLevel::Critical => {
                tracing::error!(component = report.component, kind = report.kind, "{}", report.message)
            }
        }
    }
}

/// Reporter that retains every record so tests can assert on faults.
#[cfg(any(test, feature = "mutants"))]
pub struct CollectingReporter {
    reports: std::sync::Mutex<Vec<ErrorReport>>,
}

#[cfg(any(test, feature = "mutants"))]
impl CollectingReporter {
    pub fn new() -> Self {
        Self {
            reports: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.reports().iter().map(|report| report.kind).collect()
    }
}

#[cfg(any(test, feature = "mutants"))]
impl Default for CollectingReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "mutants"))]
impl ErrorReporter for CollectingReporter {
    fn report(&self, report: ErrorReport) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report);
    }
}
