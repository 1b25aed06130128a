//! Renderer configuration

/// Renderer configuration passed to backend initialization
///
/// Small value struct with no external persistence; everything else is
/// negotiated with the device and surface at init.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the graphics backend
    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Enable the validation layer and debug messenger when available
    pub enable_validation: bool,

    /// Number of frame-in-flight slots (command buffers + sync objects)
    pub frames_in_flight: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Nova Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 3,
        }
    }
}
