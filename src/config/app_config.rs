//! config/app_config.rs
//! Configuración de la aplicación, construida una sola vez al arrancar
//! (variables de entorno / `.env`) y pasada explícitamente a los servicios.

use clap::ValueEnum;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::models::notification_model::RunMode;
use crate::models::phone_model::{Phone, PhoneError};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/insurance.db";
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 5;
pub const DEFAULT_COUNTRY_CODE: &str = "359";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TWILIO_API_URL: &str = "https://api.twilio.com";
pub const DEFAULT_VIBER_API_URL: &str = "https://chatapi.viber.com";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ChannelKind {
    #[default]
    Sms,
    Viber,
}

impl ChannelKind {
    fn from_config_value(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sms" | "twilio" => Ok(ChannelKind::Sms),
            "viber" => Ok(ChannelKind::Viber),
            other => Err(ConfigError::UnknownChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("NOTIFY_CONCURRENCY must be at least 1")]
    ZeroConcurrency,
    #[error("unknown notification channel '{0}' (expected sms or viber)")]
    UnknownChannel(String),
    #[error("allow-list phone '{value}' is invalid: {source}")]
    InvalidAllowListPhone { value: String, source: PhoneError },
    #[error("{0} is required to send in production mode")]
    MissingCredential(&'static str),
}

/// Credenciales del proveedor SMS (API estilo Twilio).
#[derive(Debug, Clone, Default)]
pub struct SmsSettings {
    pub api_url: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

/// Credenciales del bot de Viber.
#[derive(Debug, Clone, Default)]
pub struct ViberSettings {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub lookahead_days: u32,
    pub default_import_path: Option<String>,
    pub mode: RunMode,
    /// `None` = sin restricción de destinos.
    pub allow_list_phones: Option<BTreeSet<String>>,
    pub default_country_code: String,
    pub channel: ChannelKind,
    pub concurrency: usize,
    pub send_timeout: Duration,
    pub sms: SmsSettings,
    pub viber: ViberSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            default_import_path: None,
            mode: RunMode::DryRun,
            allow_list_phones: None,
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            channel: ChannelKind::Sms,
            concurrency: DEFAULT_CONCURRENCY,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            sms: SmsSettings {
                api_url: DEFAULT_TWILIO_API_URL.to_string(),
                ..SmsSettings::default()
            },
            viber: ViberSettings {
                api_url: DEFAULT_VIBER_API_URL.to_string(),
                auth_token: None,
                sender_name: "Insurance".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Lee el entorno del proceso (el `.env` ya se cargó en `main`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env`, pero con una fuente de variables inyectable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AppConfig::default();

        let lookahead_days = match var("NOTIFICATION_DAYS_AHEAD") {
            Some(raw) => raw.parse::<u32>().map_err(|_| ConfigError::InvalidNumber {
                name: "NOTIFICATION_DAYS_AHEAD",
                value: raw,
            })?,
            None => defaults.lookahead_days,
        };

        let concurrency = match var("NOTIFY_CONCURRENCY") {
            Some(raw) => raw.parse::<usize>().map_err(|_| ConfigError::InvalidNumber {
                name: "NOTIFY_CONCURRENCY",
                value: raw,
            })?,
            None => defaults.concurrency,
        };
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let send_timeout = match var("NOTIFY_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidNumber {
                    name: "NOTIFY_TIMEOUT_SECS",
                    value: raw,
                }
            })?),
            None => defaults.send_timeout,
        };

        let channel = match var("NOTIFY_CHANNEL") {
            Some(raw) => ChannelKind::from_config_value(&raw)?,
            None => defaults.channel,
        };

        let mode = var("NOTIFY_MODE")
            .map(|raw| RunMode::from_config_value(&raw))
            .unwrap_or_default();

        let default_country_code = var("DEFAULT_COUNTRY_CODE")
            .map(|cc| cc.trim_start_matches('+').to_string())
            .unwrap_or(defaults.default_country_code);

        // ALLOW_LIST_PHONES (lista separada por comas) + TEST_PHONE
        let mut raw_allow_list: Vec<String> = var("ALLOW_LIST_PHONES")
            .map(|list| {
                list.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(test_phone) = var("TEST_PHONE") {
            raw_allow_list.push(test_phone);
        }
        let allow_list_phones = if raw_allow_list.is_empty() {
            None
        } else {
            let mut canonical = BTreeSet::new();
            for value in raw_allow_list {
                let phone = Phone::parse(&value, Some(&default_country_code))
                    .map_err(|source| ConfigError::InvalidAllowListPhone { value, source })?;
                canonical.insert(phone.as_str().to_string());
            }
            Some(canonical)
        };

        Ok(AppConfig {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            lookahead_days,
            default_import_path: var("DEFAULT_EXCEL_PATH"),
            mode,
            allow_list_phones,
            default_country_code,
            channel,
            concurrency,
            send_timeout,
            sms: SmsSettings {
                api_url: var("TWILIO_API_URL").unwrap_or(defaults.sms.api_url),
                account_sid: var("TWILIO_ACCOUNT_SID"),
                auth_token: var("TWILIO_AUTH_TOKEN"),
                from_number: var("TWILIO_PHONE_NUMBER"),
            },
            viber: ViberSettings {
                api_url: var("VIBER_API_URL").unwrap_or(defaults.viber.api_url),
                auth_token: var("VIBER_AUTH_TOKEN"),
                sender_name: var("VIBER_SENDER_NAME").unwrap_or(defaults.viber.sender_name),
            },
        })
    }

    /// En producción el canal elegido necesita sus credenciales completas.
    pub fn require_channel_credentials(&self, channel: ChannelKind) -> Result<(), ConfigError> {
        match channel {
            ChannelKind::Sms => {
                if self.sms.account_sid.is_none() {
                    return Err(ConfigError::MissingCredential("TWILIO_ACCOUNT_SID"));
                }
                if self.sms.auth_token.is_none() {
                    return Err(ConfigError::MissingCredential("TWILIO_AUTH_TOKEN"));
                }
                if self.sms.from_number.is_none() {
                    return Err(ConfigError::MissingCredential("TWILIO_PHONE_NUMBER"));
                }
            }
            ChannelKind::Viber => {
                if self.viber.auth_token.is_none() {
                    return Err(ConfigError::MissingCredential("VIBER_AUTH_TOKEN"));
                }
            }
        }
        Ok(())
    }
}
