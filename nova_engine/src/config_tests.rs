//! Unit tests for config.rs

use crate::config::Config;

#[test]
fn test_default_frames_in_flight() {
    let config = Config::default();
    assert_eq!(config.frames_in_flight, 3);
}

#[test]
fn test_default_app_identity() {
    let config = Config::default();
    assert_eq!(config.app_name, "Nova Application");
    assert_eq!(config.app_version, (1, 0, 0));
}

#[test]
fn test_config_is_cloneable() {
    let config = Config {
        app_name: "Demo".to_string(),
        app_version: (2, 1, 0),
        enable_validation: true,
        frames_in_flight: 2,
    };
    let cloned = config.clone();
    assert_eq!(cloned.app_name, "Demo");
    assert_eq!(cloned.frames_in_flight, 2);
}
