use super::Config;
use anyhow::Result;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults_without_any_file() -> Result<()> {
    let config = Config::load(None)?;

    assert_eq!(config.broker.port, 1883);
    assert_eq!(config.bus.namespace, "");
    assert_eq!(config.bus.call_timeout(), None);
    assert_eq!(config.ui.feedback_delay(), Duration::from_millis(1500));
    assert_eq!(config.ui.refresh_hz, 60);
    Ok(())
}

#[test]
fn test_explicit_file_overrides_defaults() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[broker]
host = "10.0.0.7"
port = 1884

[bus]
namespace = "/uav1"
call_timeout_ms = 2500
"#
    )?;

    let config = Config::load(Some(file.path()))?;

    assert_eq!(config.broker.host, "10.0.0.7");
    assert_eq!(config.broker.port, 1884);
    assert_eq!(config.broker.client_id, "mav-tools");
    assert_eq!(config.bus.namespace, "/uav1");
    assert_eq!(config.bus.call_timeout(), Some(Duration::from_millis(2500)));
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.toml");

    assert!(Config::load(Some(&missing)).is_err());
}

#[test]
fn test_refresh_period_never_divides_by_zero() {
    let ui = super::UiConfig {
        refresh_hz: 0,
        feedback_ms: 1500,
        dark: true,
    };
    assert_eq!(ui.refresh_period(), Duration::from_secs(1));
}
