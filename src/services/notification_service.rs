use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::timeout;

use crate::models::customer_model::{metadata_keys, CustomerRecord};
use crate::models::notification_model::{NotificationOutcome, RunMode, Urgency};
use crate::services::notification_channel_service::OutboundChannel;

pub const REASON_DRY_RUN: &str = "dry-run";
pub const REASON_NOT_ALLOWED: &str = "not in allow-list";
pub const REASON_TIMEOUT: &str = "timeout";

/// Formato de fecha que ven los clientes.
const MESSAGE_DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Clone)]
pub struct NotificationService {
    channel: Arc<dyn OutboundChannel>,
    allow_list: Option<BTreeSet<String>>,
    send_timeout: Duration,
}

impl NotificationService {
    pub fn new(
        channel: Arc<dyn OutboundChannel>,
        allow_list: Option<BTreeSet<String>>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            allow_list,
            send_timeout,
        }
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Renderiza y (solo en producción) envía el recordatorio de un registro.
    ///
    /// Nunca devuelve error: teléfono inválido, allow-list y fallos del canal
    /// terminan en un `NotificationOutcome`. Llamarlo con un registro sin id o
    /// con `Urgency::Future` es un error de programación.
    pub async fn notify(&self, record: &CustomerRecord, urgency: Urgency, mode: RunMode) -> NotificationOutcome {
        let record_id = match record.id {
            Some(id) => id,
            None => panic!("(notify) solo se notifican registros persistidos: '{}'", record.full_name),
        };
        assert!(
            urgency.is_notifiable(),
            "(notify) registro id={} no está vencido ni por vencer",
            record_id
        );

        let channel = self.channel.name();
        let message = render_message(record, urgency);

        // Misma revalidación en dry-run y en producción.
        let destination = match record.phone.recheck() {
            Ok(phone) => phone,
            Err(e) => {
                log::warn!("(notify) id={} teléfono inválido '{}': {}", record_id, record.phone, e);
                return NotificationOutcome::skipped(record_id, channel, format!("invalid phone: {e}"), message);
            }
        };

        if mode == RunMode::DryRun {
            log::info!(
                "(notify) DRY-RUN id={} -> {} [{}]: {}",
                record_id,
                destination,
                channel,
                message
            );
            return NotificationOutcome::skipped(record_id, channel, REASON_DRY_RUN, message);
        }

        if let Some(allowed) = &self.allow_list {
            if !allowed.contains(destination.as_str()) {
                log::info!(
                    "(notify) id={} destino {} fuera de la allow-list, no se envía.",
                    record_id,
                    destination
                );
                return NotificationOutcome::skipped(record_id, channel, REASON_NOT_ALLOWED, message);
            }
        }

        log::info!(
            "(notify) Enviando id={} ({}) por {} a {}...",
            record_id,
            urgency.label(),
            channel,
            destination
        );
        match timeout(self.send_timeout, self.channel.send(destination.as_str(), &message)).await {
            Ok(Ok(())) => {
                log::info!("(notify) id={} enviado con éxito.", record_id);
                NotificationOutcome::sent(record_id, channel, message)
            }
            Ok(Err(e)) => {
                log::error!("(notify) id={} fallo del canal: {}", record_id, e);
                NotificationOutcome::failed(record_id, channel, e.to_string(), message)
            }
            Err(_) => {
                log::error!(
                    "(notify) id={} sin respuesta tras {:?}, se marca como fallido.",
                    record_id,
                    self.send_timeout
                );
                NotificationOutcome::failed(record_id, channel, REASON_TIMEOUT, message)
            }
        }
    }
}

/// Texto del recordatorio. Plantillas distintas para "por vencer" y "vencido".
pub fn render_message(record: &CustomerRecord, urgency: Urgency) -> String {
    let due = format_due(record.due_date);
    let vehicle = vehicle_clause(record);

    match urgency {
        Urgency::DueSoon { days_left: 0 } => format!(
            "Hello {}, your insurance{} is due TODAY ({}). Please make your payment as soon as possible.",
            record.full_name, vehicle, due
        ),
        Urgency::DueSoon { .. } => format!(
            "Hello {}, this is a reminder that your insurance{} will be due on {}.",
            record.full_name, vehicle, due
        ),
        Urgency::Overdue { .. } => format!(
            "Hello {}, your insurance{} was due on {} and is now overdue. Please make your payment as soon as possible.",
            record.full_name, vehicle, due
        ),
        Urgency::Future => format!(
            "Hello {}, your insurance{} is due on {}.",
            record.full_name, vehicle, due
        ),
    }
}

fn format_due(due_date: Option<NaiveDate>) -> String {
    due_date
        .map(|d| d.format(MESSAGE_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn vehicle_clause(record: &CustomerRecord) -> String {
    match (
        record.metadata(metadata_keys::CAR_TYPE),
        record.metadata(metadata_keys::LICENSE_PLATE),
    ) {
        (Some(car), Some(plate)) => format!(" for {} ({})", car.trim(), plate.trim()),
        (Some(car), None) => format!(" for {}", car.trim()),
        (None, Some(plate)) => format!(" for {}", plate.trim()),
        (None, None) => String::new(),
    }
}
