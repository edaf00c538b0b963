use std::time::Duration;

use lockguard_core::config::{ServiceConfig, DEFAULT_SERVICE_NAME, DEFAULT_VALUE_NAME};
use lockguard_core::enforcer::EnforceMode;
use lockguard_core::error::ConfigError;
use lockguard_core::filter::NotifyFilter;
use lockguard_core::target::RootScope;

#[test]
fn defaults_target_the_personalization_policy() {
    let config = ServiceConfig::default();
    assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
    assert_eq!(config.watch_path.scope(), RootScope::LocalMachine);
    assert_eq!(config.watch_path.sub_path(), "SOFTWARE\\Policies\\Microsoft\\Windows\\Personalization");
    assert_eq!(config.value_name, DEFAULT_VALUE_NAME);
    assert_eq!(config.baseline, 0);
    assert_eq!(config.mode, EnforceMode::SetThenDelete);
    assert_eq!(config.interval(), Duration::from_secs(300));
    assert_eq!(config.filter, NotifyFilter::all());
    config.validate().expect("defaults are valid");
}

#[test]
fn empty_json_yields_defaults() {
    let config = ServiceConfig::from_json(b"{}").expect("parse");
    assert_eq!(config, ServiceConfig::default());
}

#[test]
fn partial_json_overrides_selected_fields() {
    let json = br#"{
        "watch_path": "HKCU\\Software\\LockguardTest",
        "value_name": "Flag",
        "mode": "set_only",
        "interval_secs": 60
    }"#;
    let config = ServiceConfig::from_json(json).expect("parse");
    assert_eq!(config.watch_path.scope(), RootScope::CurrentUser);
    assert_eq!(config.watch_path.sub_path(), "Software\\LockguardTest");
    assert_eq!(config.mode, EnforceMode::SetOnly);
    assert_eq!(config.interval_secs, 60);

    let rule = config.policy_rule();
    assert_eq!(rule.key, config.watch_path);
    assert_eq!(rule.value_name, "Flag");
}

#[test]
fn invalid_values_are_rejected() {
    assert!(matches!(
        ServiceConfig::from_json(br#"{ "interval_secs": 0 }"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        ServiceConfig::from_json(br#"{ "value_name": "  " }"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        ServiceConfig::from_json(br#"{ "watch_path": "HKXX\\Software" }"#),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn config_round_trips_through_json() {
    let config = ServiceConfig {
        filter: NotifyFilter::NAME | NotifyFilter::LAST_SET,
        ..ServiceConfig::default()
    };
    let json = serde_json::to_vec(&config).expect("serialize");
    let back = ServiceConfig::from_json(&json).expect("parse");
    assert_eq!(back, config);
}

#[test]
fn relative_failure_log_resolves_against_cwd() {
    let config = ServiceConfig::default();
    let path = config.failure_log_path();
    assert!(path.is_absolute());
    assert!(path.ends_with("lockguard-failures.log"));
}
