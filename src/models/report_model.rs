//! models/report_model.rs
//! Resúmenes de importación y de cada corrida del pipeline.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::customer_model::CustomerRecord;
use crate::models::notification_model::{
    DataQualityIssue, NotificationOutcome, NotificationStatus, RunMode, Urgency,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub rows_read: usize,
    pub upserted: usize,
    pub duplicates_skipped: usize,
    pub issues: Vec<DataQualityIssue>,
}

/// Resultado puro de clasificar los registros guardados.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Mismo orden que la entrada.
    pub classified: Vec<(CustomerRecord, Urgency)>,
    pub issues: Vec<DataQualityIssue>,
}

impl Classification {
    pub fn due_soon(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.classified
            .iter()
            .filter(|(_, u)| matches!(u, Urgency::DueSoon { .. }))
            .map(|(r, _)| r)
    }

    pub fn overdue(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.classified
            .iter()
            .filter(|(_, u)| matches!(u, Urgency::Overdue { .. }))
            .map(|(r, _)| r)
    }

    pub fn future(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.classified
            .iter()
            .filter(|(_, u)| matches!(u, Urgency::Future))
            .map(|(r, _)| r)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub channel: String,
    pub today: NaiveDate,
    pub lookahead_days: u32,
    /// En el orden en que se clasificaron los registros.
    pub outcomes: Vec<NotificationOutcome>,
    pub data_quality: Vec<DataQualityIssue>,
    pub not_yet_due: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn sent(&self) -> usize {
        self.count(NotificationStatus::Sent)
    }

    pub fn skipped(&self) -> usize {
        self.count(NotificationStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(NotificationStatus::Failed)
    }

    /// Todo lo que no se envió, con su motivo.
    pub fn not_sent(&self) -> impl Iterator<Item = &NotificationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status != NotificationStatus::Sent)
    }

    pub fn failures(&self) -> impl Iterator<Item = &NotificationOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == NotificationStatus::Failed)
    }

    fn count(&self, status: NotificationStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}
