use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use qfollow::config::FollowConfig;
use qfollow::Error;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "QFOLLOW_CONFIG",
        "QFOLLOW_CONFIDENCE_THRESHOLD",
        "QFOLLOW_PERSON_LABEL",
    ] {
        std::env::remove_var(key);
    }
}

const TOML: &str = r#"
[arbitration]
confidence_threshold = 0.2
good_confidence = 0.55
disagreement_iou = 0.6
person_label = 1

[steering]
stop_area_fraction = 0.5
degraded_gain = 4.0

[polling]
interval_ms = 10
max_backoff_ms = 500
idle_timeout_ms = 2000
"#;

#[test]
fn loads_config_from_env_path_with_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(TOML.as_bytes()).expect("write config");

    std::env::set_var("QFOLLOW_CONFIG", file.path());
    std::env::set_var("QFOLLOW_PERSON_LABEL", "0");

    let cfg = FollowConfig::load(None).expect("load config");

    assert_eq!(cfg.arbitration.confidence_threshold, 0.2);
    assert_eq!(cfg.arbitration.good_confidence, 0.55);
    assert_eq!(cfg.arbitration.existence_confidence, 0.3);
    assert_eq!(cfg.arbitration.disagreement_iou, 0.6);
    assert_eq!(cfg.arbitration.person_label, 0);
    assert_eq!(cfg.steering.stop_area_fraction, 0.5);
    assert_eq!(cfg.steering.tracking_gain, 2.0);
    assert_eq!(cfg.steering.degraded_gain, 4.0);
    assert_eq!(cfg.polling.interval, Duration::from_millis(10));
    assert_eq!(cfg.polling.max_backoff, Duration::from_millis(500));
    assert_eq!(cfg.polling.idle_timeout, Duration::from_secs(2));

    clear_env();
}

#[test]
fn explicit_path_wins_over_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(TOML.as_bytes()).expect("write config");
    std::env::set_var("QFOLLOW_CONFIG", "/nonexistent/qfollow.toml");

    let cfg = FollowConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.arbitration.person_label, 1);

    clear_env();
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    assert_eq!(FollowConfig::load(None).unwrap(), FollowConfig::default());
}

#[test]
fn bad_env_override_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("QFOLLOW_CONFIDENCE_THRESHOLD", "lots");
    let res = FollowConfig::load(None);
    assert!(matches!(res, Err(Error::InvalidConfig(_))));

    std::env::set_var("QFOLLOW_CONFIDENCE_THRESHOLD", "1.5");
    let res = FollowConfig::load(None);
    assert!(matches!(res, Err(Error::InvalidConfig(_))));

    clear_env();
}

#[test]
fn missing_file_is_io_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let res = FollowConfig::load(Some(std::path::Path::new("/nonexistent/qfollow.toml")));
    assert!(matches!(res, Err(Error::Io(_))));
}
