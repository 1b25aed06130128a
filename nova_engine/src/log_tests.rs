//! Unit tests for the logging system
//!
//! Uses a capturing logger installed via set_logger; tests are serialized
//! because the logger slot is process-global.

use crate::error::Error;
use crate::log::{dispatch, reset_logger, set_logger, LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};

/// Logger that records every entry for later inspection
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    set_logger(CaptureLogger {
        entries: Arc::clone(&entries),
    });
    entries
}

// ============================================================================
// DISPATCH TESTS
// ============================================================================

#[test]
#[serial]
fn test_dispatch_reaches_installed_logger() {
    let entries = install_capture();

    dispatch(LogSeverity::Info, "nova::test", "hello".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].source, "nova::test");
    assert_eq!(captured[0].message, "hello");
    assert!(captured[0].file.is_none());
    drop(captured);

    reset_logger();
}

#[test]
#[serial]
fn test_macros_format_arguments() {
    let entries = install_capture();

    crate::nova_warn!("nova::test", "frame {} of {}", 2, 3);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Warn);
    assert_eq!(captured[0].message, "frame 2 of 3");
    drop(captured);

    reset_logger();
}

#[test]
#[serial]
fn test_error_macro_carries_file_and_line() {
    let entries = install_capture();

    crate::nova_error!("nova::test", "boom");

    let captured = entries.lock().unwrap();
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());
    drop(captured);

    reset_logger();
}

// ============================================================================
// ERROR-BUILDING MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_nova_err_logs_and_returns_backend_error() {
    let entries = install_capture();

    let err = crate::nova_err!("nova::test", "queue submit failed: {}", 7);

    assert_eq!(err, Error::BackendError("queue submit failed: 7".to_string()));
    assert_eq!(entries.lock().unwrap().len(), 1);

    reset_logger();
}

#[test]
#[serial]
fn test_nova_warn_err_returns_invalid_usage() {
    let entries = install_capture();

    let err = crate::nova_warn_err!("nova::test", "begin on recording buffer");

    assert!(matches!(err, Error::InvalidUsage(_)));
    assert_eq!(entries.lock().unwrap()[0].severity, LogSeverity::Warn);

    reset_logger();
}

#[test]
#[serial]
fn test_nova_bail_early_returns() {
    fn bails() -> crate::error::Result<()> {
        crate::nova_bail!("nova::test", "fatal stage: {}", "instance");
    }

    let _entries = install_capture();
    let result = bails();
    assert!(matches!(result, Err(Error::BackendError(msg)) if msg.contains("instance")));

    reset_logger();
}

// ============================================================================
// SEVERITY ORDERING
// ============================================================================

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}
