//! tests/config_tests.rs

use std::collections::HashMap;
use std::time::Duration;

use crate::config::app_config::{AppConfig, ChannelKind, ConfigError, DEFAULT_DATABASE_URL};
use crate::models::notification_model::RunMode;

fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_defaults() {
    let config = config_from(&[]).unwrap();

    assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(config.lookahead_days, 5);
    assert_eq!(config.mode, RunMode::DryRun);
    assert_eq!(config.channel, ChannelKind::Sms);
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.send_timeout, Duration::from_secs(30));
    assert_eq!(config.default_country_code, "359");
    assert!(config.allow_list_phones.is_none());
    assert!(config.default_import_path.is_none());
}

#[test]
fn test_only_literal_production_enables_sending() {
    for (raw, expected) in [
        ("production", RunMode::Production),
        (" PROD ", RunMode::Production),
        ("prodution", RunMode::DryRun),
        ("true", RunMode::DryRun),
    ] {
        let config = config_from(&[("NOTIFY_MODE", raw)]).unwrap();
        assert_eq!(config.mode, expected, "NOTIFY_MODE={:?}", raw);
    }
}

#[test]
fn test_overrides() {
    let config = config_from(&[
        ("DATABASE_URL", "sqlite::memory:"),
        ("NOTIFICATION_DAYS_AHEAD", "7"),
        ("NOTIFY_CHANNEL", "Viber"),
        ("NOTIFY_CONCURRENCY", "8"),
        ("NOTIFY_TIMEOUT_SECS", "3"),
        ("DEFAULT_EXCEL_PATH", "data/customers.csv"),
    ])
    .unwrap();

    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.lookahead_days, 7);
    assert_eq!(config.channel, ChannelKind::Viber);
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.send_timeout, Duration::from_secs(3));
    assert_eq!(config.default_import_path.as_deref(), Some("data/customers.csv"));
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        config_from(&[("NOTIFICATION_DAYS_AHEAD", "-1")]),
        Err(ConfigError::InvalidNumber { name: "NOTIFICATION_DAYS_AHEAD", .. })
    ));
    assert!(matches!(
        config_from(&[("NOTIFY_CONCURRENCY", "0")]),
        Err(ConfigError::ZeroConcurrency)
    ));
    assert!(matches!(
        config_from(&[("NOTIFY_CHANNEL", "email")]),
        Err(ConfigError::UnknownChannel(_))
    ));
}

#[test]
fn test_allow_list_is_canonicalized() {
    let config = config_from(&[
        ("ALLOW_LIST_PHONES", "0888 123 456, +359877000111,"),
        ("TEST_PHONE", "00359899000000"),
    ])
    .unwrap();

    let allowed: Vec<String> = config.allow_list_phones.unwrap().into_iter().collect();
    assert_eq!(
        allowed,
        vec!["+359877000111", "+359888123456", "+359899000000"]
    );
}

#[test]
fn test_invalid_allow_list_phone_is_fatal() {
    assert!(matches!(
        config_from(&[("ALLOW_LIST_PHONES", "call me")]),
        Err(ConfigError::InvalidAllowListPhone { .. })
    ));
}

#[test]
fn test_production_credentials() {
    let config = config_from(&[]).unwrap();
    assert!(matches!(
        config.require_channel_credentials(ChannelKind::Sms),
        Err(ConfigError::MissingCredential("TWILIO_ACCOUNT_SID"))
    ));
    assert!(matches!(
        config.require_channel_credentials(ChannelKind::Viber),
        Err(ConfigError::MissingCredential("VIBER_AUTH_TOKEN"))
    ));

    let config = config_from(&[
        ("TWILIO_ACCOUNT_SID", "AC123"),
        ("TWILIO_AUTH_TOKEN", "secret"),
        ("TWILIO_PHONE_NUMBER", "+15005550006"),
        ("VIBER_AUTH_TOKEN", "token"),
    ])
    .unwrap();
    assert!(config.require_channel_credentials(ChannelKind::Sms).is_ok());
    assert!(config.require_channel_credentials(ChannelKind::Viber).is_ok());
}
