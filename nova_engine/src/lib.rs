/*!
# Nova Engine

Core types for the Nova rendering engine: error taxonomy, logging system,
and renderer configuration.

Backend implementations (the Vulkan frame-pipeline crate) build on these
types; this crate has no graphics-API dependency of its own.
*/

// Internal modules
pub mod config;
pub mod error;
pub mod log;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod log_tests;

// Main nova namespace module
pub mod nova {
    // Error types
    pub use crate::error::{Error, Result};

    // Renderer configuration
    pub use crate::config::Config;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            flush, reset_logger, set_logger, DefaultLogger, LogEntry, LogSeverity, Logger,
        };
    }
}
