use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::customer_model::{CustomerRecord, RecordId};
use crate::models::notification_model::{NotificationOutcome, RunMode};
use crate::models::report_model::{Classification, RunReport};
use crate::services::due_date_service;
use crate::services::notification_service::{render_message, NotificationService};
use crate::services::repository::Repository;

pub const REASON_DUPLICATE: &str = "duplicate";
pub const REASON_CANCELLED: &str = "cancelled";
pub const REASON_WORKER_LOST: &str = "notification task aborted";

#[derive(Clone)]
pub struct PipelineService {
    repository: Arc<dyn Repository<CustomerRecord>>,
    notifier: Arc<NotificationService>,
    concurrency: usize,
}

impl PipelineService {
    pub fn new(
        repository: Arc<dyn Repository<CustomerRecord>>,
        notifier: NotificationService,
        concurrency: usize,
    ) -> Self {
        Self {
            repository,
            notifier: Arc::new(notifier),
            concurrency: concurrency.max(1),
        }
    }

    /// Lee el store y clasifica, sin notificar (vista de próximos vencimientos).
    pub async fn preview(&self, today: NaiveDate, lookahead_days: u32) -> Result<Classification> {
        let records = self
            .repository
            .find_all()
            .await
            .context("No se pudieron leer los registros")?;
        Ok(due_date_service::classify(&records, today, lookahead_days))
    }

    pub async fn run(&self, today: NaiveDate, lookahead_days: u32, mode: RunMode) -> Result<RunReport> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(today, lookahead_days, mode, cancel_rx).await
    }

    /// Una pasada lineal: leer todo, clasificar, notificar, agregar.
    ///
    /// Un fallo del store aborta antes de notificar. Un fallo de envío solo
    /// afecta a ese registro. Tras cancelar no se despachan más envíos, los
    /// que están en curso terminan y el resto queda como `cancelled`.
    pub async fn run_with_cancel(
        &self,
        today: NaiveDate,
        lookahead_days: u32,
        mode: RunMode,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let channel = self.notifier.channel_name();
        log::info!(
            "(run) Iniciando corrida {} modo={} canal={} hoy={} ventana={}d",
            run_id,
            mode,
            channel,
            today,
            lookahead_days
        );

        // 1) + 2) lectura única, antes de cualquier envío
        let classification = self.preview(today, lookahead_days).await?;
        let not_yet_due = classification.future().count();

        // 3) despacho
        let mut outcomes: BTreeMap<usize, NotificationOutcome> = BTreeMap::new();
        let mut dispatched: Vec<(usize, RecordId)> = Vec::new();
        let mut seen: HashSet<(String, Option<NaiveDate>)> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, NotificationOutcome)> = JoinSet::new();
        let mut cancelled = false;

        for (position, (record, urgency)) in classification.classified.iter().enumerate() {
            if !urgency.is_notifiable() {
                continue;
            }
            let Some(record_id) = record.id else {
                continue;
            };

            let key = (record.full_name.trim().to_lowercase(), record.due_date);
            if !seen.insert(key) {
                log::info!(
                    "(run) id={} duplicado ({}, {:?}), se omite.",
                    record_id,
                    record.full_name,
                    record.due_date
                );
                record_once(
                    &mut outcomes,
                    position,
                    NotificationOutcome::skipped(record_id, channel, REASON_DUPLICATE, render_message(record, *urgency)),
                );
                continue;
            }

            if !cancelled {
                let permit = tokio::select! {
                    biased;
                    _ = wait_cancelled(&mut cancel) => None,
                    permit = semaphore.clone().acquire_owned() => Some(permit.context("Semáforo cerrado")?),
                };
                match permit {
                    Some(permit) => {
                        let notifier = self.notifier.clone();
                        let record = record.clone();
                        let urgency = *urgency;
                        dispatched.push((position, record_id));
                        tasks.spawn(async move {
                            let _permit = permit;
                            let outcome = notifier.notify(&record, urgency, mode).await;
                            (position, outcome)
                        });
                        continue;
                    }
                    None => {
                        log::warn!("(run) Corrida {} cancelada, no se despachan más envíos.", run_id);
                        cancelled = true;
                    }
                }
            }

            record_once(
                &mut outcomes,
                position,
                NotificationOutcome::skipped(record_id, channel, REASON_CANCELLED, render_message(record, *urgency)),
            );
        }

        // Los envíos en curso siempre terminan.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => record_once(&mut outcomes, position, outcome),
                Err(e) => log::error!("(run) Tarea de notificación abortada: {:?}", e),
            }
        }
        for (position, record_id) in dispatched {
            if let Entry::Vacant(slot) = outcomes.entry(position) {
                slot.insert(NotificationOutcome::failed(
                    record_id,
                    channel,
                    REASON_WORKER_LOST,
                    String::new(),
                ));
            }
        }

        // 4) agregado
        let report = RunReport {
            run_id,
            mode,
            channel: channel.to_string(),
            today,
            lookahead_days,
            outcomes: outcomes.into_values().collect(),
            data_quality: classification.issues,
            not_yet_due,
            cancelled,
        };

        log::info!(
            "(run) Corrida {} finalizada: enviados={} omitidos={} fallidos={} problemas_de_datos={}",
            report.run_id,
            report.sent(),
            report.skipped(),
            report.failed(),
            report.data_quality.len()
        );
        for failure in report.failures() {
            log::warn!(
                "(run) id={} falló: {}",
                failure.record_id,
                failure.reason.as_deref().unwrap_or_default()
            );
        }
        Ok(report)
    }
}

/// Cada posición se registra una sola vez; un segundo intento es un bug y se ignora.
fn record_once(outcomes: &mut BTreeMap<usize, NotificationOutcome>, position: usize, outcome: NotificationOutcome) {
    match outcomes.entry(position) {
        Entry::Vacant(slot) => {
            slot.insert(outcome);
        }
        Entry::Occupied(existing) => {
            log::error!(
                "(record_once) Resultado repetido para id={}, se conserva el primero.",
                existing.get().record_id
            );
        }
    }
}

/// Resuelve cuando se pide cancelar. Si el emisor desaparece sin cancelar, no resuelve nunca.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
