//! Configuration file round trips.

use rawstreamer::config::RawStreamerConfig;
use rawstreamer::errors::CameraError;
use tempfile::tempdir;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("rawstreamer.toml");

    let mut config = RawStreamerConfig::default();
    config.camera.default_camera_id = "1".to_string();
    config.camera.auto_reopen_on_disconnect = true;
    config.raw.iso = 800;
    config.raw.ignored_result_prefixes.push("statistics.".to_string());
    config.save_to_file(&path).unwrap();

    let loaded = RawStreamerConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[camera]\ntarget_fps = 0\n").unwrap();

    let err = RawStreamerConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, CameraError::ConfigError(ref m) if m.contains("FPS")));
}

#[test]
fn test_malformed_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[camera\n").unwrap();

    assert!(matches!(
        RawStreamerConfig::load_from_file(&path),
        Err(CameraError::ConfigError(_))
    ));
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[executor]\nteardown_timeout_ms = 500\n").unwrap();

    let config = RawStreamerConfig::load_from_file(&path).unwrap();
    assert_eq!(config.executor.teardown_timeout_ms, 500);
    assert_eq!(config.executor.thread_name, "rawstreamer-camera");
    assert_eq!(config.camera.target_fps, 30);
}

#[test]
fn test_default_path() {
    assert_eq!(
        RawStreamerConfig::default_path().file_name().unwrap(),
        "rawstreamer.toml"
    );
}
