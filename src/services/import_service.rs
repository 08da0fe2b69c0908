//! services/import_service.rs
//! Importa clientes desde la exportación CSV de la hoja de cálculo.
//! Las cabeceras vienen en búlgaro; también se aceptan los nombres canónicos.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::models::customer_model::{metadata_keys, CustomerRecord};
use crate::models::notification_model::DataQualityIssue;
use crate::models::phone_model::Phone;
use crate::models::report_model::ImportReport;
use crate::services::repository::Repository;

const DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d.%m.%y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Nickname,
    FullName,
    Phone,
    CarType,
    LicensePlate,
    DueMonth,
    Notice,
    DueDate,
    MadeOn,
    Amount,
    Installments,
    PolicyNumber,
}

/// Cabecera (ya normalizada) -> campo.
fn field_for_header(header: &str) -> Option<Field> {
    let normalized = header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let field = match normalized.as_str() {
        "контрагент" | "nickname" => Field::Nickname,
        "име на собственик" | "full_name" | "name" => Field::FullName,
        "телефон" | "cell_phone" | "phone" => Field::Phone,
        "авт-ил" | "car_type" => Field::CarType,
        "рег №" | "license_plate" => Field::LicensePlate,
        "месец" | "due_month" => Field::DueMonth,
        "предупреди на" | "notice" => Field::Notice,
        "падеж" | "due_day" | "due_date" => Field::DueDate,
        "сключена на" | "made_on" => Field::MadeOn,
        "сума" | "amount" => Field::Amount,
        "вн" | "installments" => Field::Installments,
        "№ на полица" | "policy_number" => Field::PolicyNumber,
        _ => return None,
    };
    Some(field)
}

/// Fechas `dd.mm.yyyy` (formato de la hoja) o ISO; ignora una hora al final.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let date_part = value.split_whitespace().next().unwrap_or(value);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Enteros de la hoja; lo ilegible cuenta como 0.
fn parse_amount(raw: &str) -> i64 {
    let value = raw.trim().replace(',', ".");
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|f| f.trunc() as i64))
        .unwrap_or(0)
}

fn cell<'a>(row: &'a StringRecord, columns: &HashMap<Field, usize>, field: Field) -> &'a str {
    columns
        .get(&field)
        .and_then(|&i| row.get(i))
        .unwrap_or("")
}

/// Resultado de leer un archivo, antes de tocar la base de datos.
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub rows_read: usize,
    pub records: Vec<CustomerRecord>,
    pub duplicates_skipped: usize,
    pub issues: Vec<DataQualityIssue>,
}

/// Lee y valida filas. Las filas inválidas se reportan, no se devuelven.
pub fn parse_rows<R: Read>(reader: R, default_country_code: &str) -> Result<ParsedRows> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers().context("No se pudo leer la cabecera")?.clone();
    let mut columns: HashMap<Field, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(field) = field_for_header(header) {
            columns.entry(field).or_insert(idx);
        }
    }

    let missing: Vec<&str> = [
        (Field::FullName, "full_name"),
        (Field::Phone, "phone"),
        (Field::DueDate, "due_date"),
    ]
    .iter()
    .filter(|(field, _)| !columns.contains_key(field))
    .map(|(_, name)| *name)
    .collect();
    if !missing.is_empty() {
        return Err(anyhow!("Faltan columnas requeridas: {}", missing.join(", ")));
    }

    let mut parsed = ParsedRows::default();
    let mut seen: HashSet<(String, NaiveDate, String)> = HashSet::new();

    for (idx, result) in csv_reader.records().enumerate() {
        // fila 1 = cabecera
        let row_number = idx + 2;
        let row = result.with_context(|| format!("Fila {} ilegible", row_number))?;
        let get = |field: Field| cell(&row, &columns, field);

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        parsed.rows_read += 1;

        let full_name = get(Field::FullName).trim().to_string();
        if full_name.is_empty() {
            parsed
                .issues
                .push(DataQualityIssue::for_row(row_number, "", "missing full name"));
            continue;
        }

        let raw_due = get(Field::DueDate);
        let due_date = match parse_date(raw_due) {
            Some(d) => d,
            None => {
                let reason = if raw_due.trim().is_empty() {
                    "missing due date".to_string()
                } else {
                    format!("unparseable due date '{}'", raw_due.trim())
                };
                log::warn!("(parse_rows) Fila {} ({}): {}", row_number, full_name, reason);
                parsed
                    .issues
                    .push(DataQualityIssue::for_row(row_number, full_name, reason));
                continue;
            }
        };

        let phone = match Phone::parse(get(Field::Phone), Some(default_country_code)) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("(parse_rows) Fila {} ({}): {}", row_number, full_name, e);
                parsed
                    .issues
                    .push(DataQualityIssue::for_row(row_number, full_name, e.to_string()));
                continue;
            }
        };

        let policy_number = get(Field::PolicyNumber).trim().to_string();
        let key = (full_name.to_lowercase(), due_date, policy_number.clone());
        if !seen.insert(key) {
            log::info!(
                "(parse_rows) Fila {} duplicada en el archivo: {}, {}, {}",
                row_number,
                full_name,
                due_date,
                policy_number
            );
            parsed.duplicates_skipped += 1;
            continue;
        }

        let mut record = CustomerRecord::new(full_name, phone, due_date).with_policy_number(policy_number);
        for (field, key) in [
            (Field::Nickname, metadata_keys::NICKNAME),
            (Field::CarType, metadata_keys::CAR_TYPE),
            (Field::LicensePlate, metadata_keys::LICENSE_PLATE),
        ] {
            let value = get(field).trim();
            if !value.is_empty() {
                record = record.with_metadata(key, value);
            }
        }
        for (field, key) in [
            (Field::DueMonth, metadata_keys::DUE_MONTH),
            (Field::Notice, metadata_keys::NOTICE),
            (Field::MadeOn, metadata_keys::MADE_ON),
        ] {
            if let Some(date) = parse_date(get(field)) {
                record = record.with_metadata(key, date.format("%Y-%m-%d").to_string());
            }
        }
        for (field, key) in [
            (Field::Amount, metadata_keys::AMOUNT),
            (Field::Installments, metadata_keys::INSTALLMENTS),
        ] {
            record = record.with_metadata(key, parse_amount(get(field)).to_string());
        }

        parsed.records.push(record);
    }

    Ok(parsed)
}

#[derive(Clone)]
pub struct ImportService {
    repository: Arc<dyn Repository<CustomerRecord>>,
    default_country_code: String,
}

impl ImportService {
    pub fn new(repository: Arc<dyn Repository<CustomerRecord>>, default_country_code: impl Into<String>) -> Self {
        Self {
            repository,
            default_country_code: default_country_code.into(),
        }
    }

    /// Importa un archivo: alta o actualización por clave natural.
    pub async fn import_file(&self, path: &Path) -> Result<ImportReport> {
        log::info!("(import_file) Leyendo {:?}...", path);
        let file = File::open(path).with_context(|| format!("No se pudo abrir {:?}", path))?;
        let mut report = self.import_reader(file).await?;
        report.source = path.display().to_string();
        Ok(report)
    }

    pub async fn import_reader<R: Read>(&self, reader: R) -> Result<ImportReport> {
        let parsed = parse_rows(reader, &self.default_country_code)?;

        let mut upserted = 0;
        for record in &parsed.records {
            let id = self
                .repository
                .upsert(record)
                .await
                .with_context(|| format!("Error guardando '{}'", record.full_name))?;
            log::debug!("(import_reader) '{}' -> id={}", record.full_name, id);
            upserted += 1;
        }

        log::info!(
            "(import_reader) {} filas leídas, {} guardadas, {} duplicadas, {} con problemas",
            parsed.rows_read,
            upserted,
            parsed.duplicates_skipped,
            parsed.issues.len()
        );

        Ok(ImportReport {
            source: String::new(),
            rows_read: parsed.rows_read,
            upserted,
            duplicates_skipped: parsed.duplicates_skipped,
            issues: parsed.issues,
        })
    }
}
