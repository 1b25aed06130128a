//! Error types for the Nova engine
//!
//! This module defines the error taxonomy used throughout the engine:
//! fatal initialization failures, backend (Vulkan) errors, resource
//! exhaustion, API misuse, and absent optional capabilities.

use std::fmt;

/// Result type for Nova engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nova engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Initialization failed (instance/device creation, no suitable device).
    /// Always fatal: the engine does not start.
    InitializationFailed(String),

    /// Backend-specific error (non-success status from a Vulkan call)
    BackendError(String),

    /// Out of host or device memory
    OutOfMemory,

    /// Precondition violated by the caller (e.g. begin on a recording
    /// command buffer). Logged and refused, never silently corrupting state.
    InvalidUsage(String),

    /// An optional device capability was requested but is not present
    FeatureNotPresent(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidUsage(msg) => write!(f, "Invalid usage: {}", msg),
            Error::FeatureNotPresent(feature) => write!(f, "Feature not present: {}", feature),
        }
    }
}

impl std::error::Error for Error {}
