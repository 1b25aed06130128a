//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Clone,
//! std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("No suitable physical device".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("No suitable physical device"));
}

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("Failed to create fence".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("Failed to create fence"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of memory");
}

#[test]
fn test_invalid_usage_display() {
    let err = Error::InvalidUsage("Command buffer already recording".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid usage"));
    assert!(display.contains("already recording"));
}

#[test]
fn test_feature_not_present_display() {
    let err = Error::FeatureNotPresent("timeline semaphores");
    let display = format!("{}", err);
    assert!(display.contains("Feature not present"));
    assert!(display.contains("timeline semaphores"));
}

// ============================================================================
// TRAIT IMPLEMENTATION TESTS
// ============================================================================

#[test]
fn test_error_clone_and_eq() {
    let err = Error::InvalidUsage("submit while recording".to_string());
    let cloned = err.clone();
    assert_eq!(err, cloned);
    assert_ne!(err, Error::OutOfMemory);
}

#[test]
fn test_error_implements_std_error() {
    fn takes_std_error(_: &dyn std::error::Error) {}
    let err = Error::OutOfMemory;
    takes_std_error(&err);
}

#[test]
fn test_result_alias_propagation() {
    fn fails() -> Result<u32> {
        Err(Error::FeatureNotPresent("mesh shaders"))
    }

    fn propagates() -> Result<u32> {
        let v = fails()?;
        Ok(v + 1)
    }

    assert_eq!(propagates(), Err(Error::FeatureNotPresent("mesh shaders")));
}
