//! services/due_date_service.rs
//! Clasificación de vencimientos. Funciones puras, sin acceso a DB ni red.

use chrono::{Duration, NaiveDate};

use crate::models::customer_model::CustomerRecord;
use crate::models::notification_model::{DataQualityIssue, Urgency};
use crate::models::report_model::Classification;

/// Urgencia de una fecha concreta.
///
/// `overdue` si `due < today`, `due_soon` si `today <= due <= today + lookahead_days`,
/// `future` en otro caso.
pub fn urgency_for(due_date: NaiveDate, today: NaiveDate, lookahead_days: u32) -> Urgency {
    let days = (due_date - today).num_days();
    if days < 0 {
        Urgency::Overdue {
            days_late: days.unsigned_abs() as u32,
        }
    } else if days <= i64::from(lookahead_days) {
        Urgency::DueSoon {
            days_left: days as u32,
        }
    } else {
        Urgency::Future
    }
}

/// Último día de la ventana. Satura en `NaiveDate::MAX` si la ventana se sale del calendario.
pub fn window_end(today: NaiveDate, lookahead_days: u32) -> NaiveDate {
    today
        .checked_add_signed(Duration::days(i64::from(lookahead_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Clasifica los registros conservando el orden de entrada.
/// Los que no tienen fecha de vencimiento se reportan, nunca se descartan en silencio.
pub fn classify(records: &[CustomerRecord], today: NaiveDate, lookahead_days: u32) -> Classification {
    let mut classification = Classification::default();

    for record in records {
        match record.due_date {
            Some(due) => {
                let urgency = urgency_for(due, today, lookahead_days);
                classification.classified.push((record.clone(), urgency));
            }
            None => {
                log::warn!(
                    "(classify) Registro id={:?} ({}) sin fecha de vencimiento válida, excluido.",
                    record.id,
                    record.full_name
                );
                classification.issues.push(DataQualityIssue::for_record(
                    record.id,
                    record.full_name.clone(),
                    "missing or unparseable due date",
                ));
            }
        }
    }

    log::info!(
        "(classify) hoy={} ventana={}d -> {} vencen pronto, {} vencidos, {} futuros, {} con problemas",
        today,
        lookahead_days,
        classification.due_soon().count(),
        classification.overdue().count(),
        classification.future().count(),
        classification.issues.len()
    );

    classification
}
