use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::config::app_config::{AppConfig, ChannelKind, SmsSettings, ViberSettings};
use crate::models::notification_model::{ChannelError, ChannelErrorKind};

/// Canal saliente (SMS, Viber, ...). El núcleo nunca pregunta cuál es.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, destination: &str, message: &str) -> Result<(), ChannelError>;
}

/// Construye el canal configurado sobre un único `reqwest::Client` por corrida.
pub fn build_channel(kind: ChannelKind, config: &AppConfig, http_client: Client) -> Arc<dyn OutboundChannel> {
    match kind {
        ChannelKind::Sms => Arc::new(SmsChannel::new(http_client, &config.sms)),
        ChannelKind::Viber => Arc::new(ViberChannel::new(http_client, &config.viber)),
    }
}

// ======================================================
// SMS (API REST estilo Twilio)
// ======================================================

pub struct SmsChannel {
    http_client: Client,
    api_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsChannel {
    pub fn new(http_client: Client, settings: &SmsSettings) -> Self {
        Self {
            http_client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            account_sid: settings.account_sid.clone().unwrap_or_default(),
            auth_token: settings.auth_token.clone().unwrap_or_default(),
            from_number: settings.from_number.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl OutboundChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), ChannelError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_url, self.account_sid
        );
        log::info!("(sms_send) -> to='{}', len={} chars", destination, message.chars().count());

        let resp = self
            .http_client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("From", self.from_number.as_str()),
                ("To", destination),
                ("Body", message),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_success() {
            let sid = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("sid").and_then(|s| s.as_str()).map(str::to_string))
                .unwrap_or_default();
            log::info!("(sms_send) -> Enviado a '{}'. sid={}", destination, sid);
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        log::error!(
            "(sms_send) -> Fallo al enviar a '{}': status={} body='{}'",
            destination,
            status,
            body
        );
        Err(sms_failure(status, &body))
    }
}

/// Traduce una respuesta de error del proveedor SMS.
pub fn sms_failure(status: StatusCode, body: &str) -> ChannelError {
    let provider_code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_i64));

    let kind = match provider_code {
        // To inválido / no es móvil / región no permitida
        Some(21211) | Some(21408) | Some(21612) | Some(21614) => ChannelErrorKind::InvalidDestination,
        Some(20003) => ChannelErrorKind::Auth,
        Some(20429) => ChannelErrorKind::Throttled,
        _ => kind_for_status(status),
    };
    ChannelError::new(kind, format!("HTTP {}: {}", status.as_u16(), body.trim()))
}

// ======================================================
// Viber (bot API)
// ======================================================

pub struct ViberChannel {
    http_client: Client,
    api_url: String,
    auth_token: String,
    sender_name: String,
}

impl ViberChannel {
    pub fn new(http_client: Client, settings: &ViberSettings) -> Self {
        Self {
            http_client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone().unwrap_or_default(),
            sender_name: settings.sender_name.clone(),
        }
    }
}

#[async_trait]
impl OutboundChannel for ViberChannel {
    fn name(&self) -> &'static str {
        "viber"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), ChannelError> {
        let url = format!("{}/pa/send_message", self.api_url);
        let payload = serde_json::json!({
            "receiver": destination,
            "min_api_version": 1,
            "sender": { "name": self.sender_name },
            "type": "text",
            "text": message
        });
        log::info!("(viber_send) -> receiver='{}', len={} chars", destination, message.chars().count());

        let resp = self
            .http_client
            .post(&url)
            .header("X-Viber-Auth-Token", self.auth_token.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::error!("(viber_send) -> HTTP {} para '{}': {}", status, destination, body);
            return Err(ChannelError::new(
                kind_for_status(status),
                format!("HTTP {}: {}", status.as_u16(), body.trim()),
            ));
        }

        // Viber responde 200 siempre; el resultado real va en `status` del JSON.
        let json_val = resp.json::<Value>().await.map_err(|e| {
            ChannelError::new(ChannelErrorKind::Transient, format!("respuesta ilegible: {e}"))
        })?;
        let code = json_val.get("status").and_then(Value::as_i64).unwrap_or(-1);
        let status_message = json_val
            .get("status_message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match viber_failure(code, status_message) {
            None => {
                log::info!("(viber_send) -> Enviado a '{}'.", destination);
                Ok(())
            }
            Some(err) => {
                log::error!("(viber_send) -> Fallo para '{}': {}", destination, err);
                Err(err)
            }
        }
    }
}

/// `None` si el código de estado de Viber indica éxito.
pub fn viber_failure(code: i64, status_message: &str) -> Option<ChannelError> {
    let kind = match code {
        0 => return None,
        2 | 7 | 8 | 9 => ChannelErrorKind::Auth,
        3 | 4 | 5 | 6 | 11 => ChannelErrorKind::InvalidDestination,
        12 => ChannelErrorKind::Throttled,
        _ => ChannelErrorKind::Transient,
    };
    Some(ChannelError::new(
        kind,
        format!("viber status {}: {}", code, status_message),
    ))
}

fn kind_for_status(status: StatusCode) -> ChannelErrorKind {
    match status.as_u16() {
        401 | 403 => ChannelErrorKind::Auth,
        429 => ChannelErrorKind::Throttled,
        400 | 404 | 422 => ChannelErrorKind::InvalidDestination,
        _ => ChannelErrorKind::Transient,
    }
}

fn transport_error(err: reqwest::Error) -> ChannelError {
    let kind = if err.is_timeout() {
        ChannelErrorKind::Timeout
    } else {
        ChannelErrorKind::Transient
    };
    ChannelError::new(kind, err.to_string())
}
