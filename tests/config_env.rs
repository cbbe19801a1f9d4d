//! Environment overrides, kept in their own process so the variables never
//! leak into other configuration tests.

use vigilant_sentinel::config::AppConfig;

#[test]
fn test_environment_overrides_file_and_defaults() {
    std::env::set_var("SENTINEL_SERVER__PORT", "9100");
    std::env::set_var("SENTINEL_CASE_MANAGER__SEED", "7");
    std::env::set_var("SENTINEL_LOGGING__FORMAT", "json");

    let shipped = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.toml");
    let config = AppConfig::load_from_path(shipped).unwrap();

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.bind_address(), "0.0.0.0:9100");
    assert_eq!(config.case_manager.seed, 7);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.nats.alert_subject, "fraud.alerts");
}
