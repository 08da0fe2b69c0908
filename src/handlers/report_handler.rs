//! handlers/report_handler.rs
//! Salida por consola de importaciones, próximos vencimientos y corridas.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::models::customer_model::{metadata_keys, CustomerRecord};
use crate::models::report_model::{Classification, ImportReport, RunReport};

/// Cuántos registros muestra la lista ordenada por vencimiento.
const SORTED_PREVIEW_LEN: usize = 5;

/// Quita repetidos por (nombre, vencimiento), conservando el primero.
pub fn dedup_by_name_and_due<'a, I>(records: I) -> Vec<&'a CustomerRecord>
where
    I: IntoIterator<Item = &'a CustomerRecord>,
{
    let mut seen: HashSet<(String, Option<NaiveDate>)> = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.full_name.trim().to_lowercase(), r.due_date)))
        .collect()
}

pub fn render_import_report(report: &ImportReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nImport from {}\n", report.source));
    out.push_str(&format!(
        "  rows read: {}, saved: {}, duplicates skipped: {}, rejected: {}\n",
        report.rows_read,
        report.upserted,
        report.duplicates_skipped,
        report.issues.len()
    ));
    if !report.issues.is_empty() {
        out.push_str("  Data quality issues:\n");
        for issue in &report.issues {
            out.push_str(&format!("   - {}\n", issue));
        }
    }
    out
}

/// `due_soon` viene de la consulta por rango del store; el resto, de la clasificación.
pub fn render_upcoming(due_soon: &[CustomerRecord], classification: &Classification) -> String {
    let due_soon = dedup_by_name_and_due(due_soon);
    let overdue = dedup_by_name_and_due(classification.overdue());

    let mut out = String::new();
    out.push_str(&format!("\nUsers due soon ({}):\n", due_soon.len()));
    for r in &due_soon {
        out.push_str(&format!("{} - Due: {}", r.full_name, show_date(r.due_date)));
        if let Some(notice) = r.metadata(metadata_keys::NOTICE) {
            out.push_str(&format!(" - Notice: {}", show_stored_date(notice)));
        }
        out.push('\n');
    }

    out.push_str(&format!("\nOverdue users ({}):\n", overdue.len()));
    for r in &overdue {
        out.push_str(&format!("{} - Due: {}\n", r.full_name, show_date(r.due_date)));
    }

    let mut sorted: Vec<&CustomerRecord> = classification.classified.iter().map(|(r, _)| r).collect();
    sorted.sort_by_key(|r| r.due_date);
    out.push_str(&format!("\nSorted by due date (first {}):\n", SORTED_PREVIEW_LEN));
    for r in dedup_by_name_and_due(sorted).into_iter().take(SORTED_PREVIEW_LEN) {
        out.push_str(&format!("{} - Due: {}\n", r.full_name, show_date(r.due_date)));
    }

    if !classification.issues.is_empty() {
        out.push_str(&format!("\nRecords without a usable due date ({}):\n", classification.issues.len()));
        for issue in &classification.issues {
            out.push_str(&format!(" - {}\n", issue));
        }
    }
    out
}

pub fn render_run_report(report: &RunReport) -> String {
    let banner = "=".repeat(50);
    let mut out = String::new();
    out.push_str(&format!(
        "\n{banner}\nNOTIFICATION RUN {} ({} via {})\n{banner}\n",
        report.run_id, report.mode, report.channel
    ));
    out.push_str(&format!(
        "today: {}, window: {} days, not yet due: {}\n",
        report.today, report.lookahead_days, report.not_yet_due
    ));
    out.push_str(&format!(
        "sent: {}, skipped: {}, failed: {}\n",
        report.sent(),
        report.skipped(),
        report.failed()
    ));
    if report.cancelled {
        out.push_str("run was cancelled before every notification was dispatched\n");
    }

    let not_sent: Vec<_> = report.not_sent().collect();
    if !not_sent.is_empty() {
        out.push_str("\nNot sent:\n");
        for o in not_sent {
            out.push_str(&format!(
                " - record {} [{:?}]: {}\n",
                o.record_id,
                o.status,
                o.reason.as_deref().unwrap_or("")
            ));
        }
    }

    if !report.data_quality.is_empty() {
        out.push_str("\nData quality exclusions:\n");
        for issue in &report.data_quality {
            out.push_str(&format!(" - {}\n", issue));
        }
    }
    out
}

/// Fechas de `policy_metadata` (ISO); lo ilegible se muestra tal cual.
fn show_stored_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

fn show_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}
