use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::customer_model::RecordId;

/// Situación de un vencimiento respecto a "hoy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Future,
    /// Vence dentro de la ventana; `days_left == 0` es hoy.
    DueSoon { days_left: u32 },
    Overdue { days_late: u32 },
}

impl Urgency {
    pub fn is_notifiable(&self) -> bool {
        !matches!(self, Urgency::Future)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Future => "future",
            Urgency::DueSoon { .. } => "due_soon",
            Urgency::Overdue { .. } => "overdue",
        }
    }
}

/// Modo de ejecución. Por defecto nunca se contacta a nadie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    DryRun,
    Production,
}

impl RunMode {
    /// Solo el literal `production`/`prod` habilita envíos reales;
    /// cualquier otro valor (incluido un typo) queda en dry-run.
    pub fn from_config_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => RunMode::Production,
            _ => RunMode::DryRun,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "DRY-RUN"),
            RunMode::Production => write!(f, "PRODUCTION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub record_id: RecordId,
    pub channel: String,
    pub status: NotificationStatus,
    /// Presente cuando `status` es skipped o failed.
    pub reason: Option<String>,
    /// Mensaje renderizado (idéntico en dry-run y producción).
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationOutcome {
    pub fn sent(record_id: RecordId, channel: &str, message: String) -> Self {
        Self::build(record_id, channel, NotificationStatus::Sent, None, message)
    }

    pub fn skipped(record_id: RecordId, channel: &str, reason: impl Into<String>, message: String) -> Self {
        Self::build(record_id, channel, NotificationStatus::Skipped, Some(reason.into()), message)
    }

    pub fn failed(record_id: RecordId, channel: &str, reason: impl Into<String>, message: String) -> Self {
        Self::build(record_id, channel, NotificationStatus::Failed, Some(reason.into()), message)
    }

    fn build(
        record_id: RecordId,
        channel: &str,
        status: NotificationStatus,
        reason: Option<String>,
        message: String,
    ) -> Self {
        Self {
            record_id,
            channel: channel.to_string(),
            status,
            reason,
            message,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorKind {
    InvalidDestination,
    Throttled,
    Auth,
    Transient,
    Timeout,
}

impl fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelErrorKind::InvalidDestination => "invalid destination",
            ChannelErrorKind::Throttled => "throttled",
            ChannelErrorKind::Auth => "auth failure",
            ChannelErrorKind::Transient => "transient failure",
            ChannelErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Fallo de envío devuelto por un canal saliente.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct ChannelError {
    pub kind: ChannelErrorKind,
    pub detail: String,
}

impl ChannelError {
    pub fn new(kind: ChannelErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Campo faltante o mal formado, ya sea en una fila importada o en un registro guardado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityIssue {
    /// Fila de la hoja (la cabecera es la fila 1).
    pub row: Option<usize>,
    pub record_id: Option<RecordId>,
    pub full_name: String,
    pub reason: String,
}

impl DataQualityIssue {
    pub fn for_row(row: usize, full_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            record_id: None,
            full_name: full_name.into(),
            reason: reason.into(),
        }
    }

    pub fn for_record(record_id: Option<RecordId>, full_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row: None,
            record_id,
            full_name: full_name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row, self.record_id) {
            (Some(row), _) => write!(f, "row {} ({}): {}", row, self.full_name, self.reason),
            (None, Some(id)) => write!(f, "record {} ({}): {}", id, self.full_name, self.reason),
            (None, None) => write!(f, "{}: {}", self.full_name, self.reason),
        }
    }
}
