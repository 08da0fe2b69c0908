use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeMap;

use crate::models::customer_model::{CustomerRecord, Entity, RecordId};
use crate::models::phone_model::Phone;
use crate::services::repository::Repository;

const SELECT_COLUMNS: &str = r#"
    SELECT id, full_name, phone, due_date, policy_number, policy_metadata
    FROM customers
"#;

#[derive(Clone, Debug)]
pub struct CustomerService {
    db_pool: Pool<Sqlite>,
}

impl CustomerService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        CustomerService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones de 'customers'")?;
        Ok(())
    }

    /// Registros con vencimiento en `[from, until]`, ordenados por fecha.
    pub async fn find_upcoming(&self, from: NaiveDate, until: NaiveDate) -> Result<Vec<CustomerRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE due_date IS NOT NULL AND due_date BETWEEN ?1 AND ?2 ORDER BY due_date ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(format_date(from))
            .bind(format_upper_bound(until))
            .fetch_all(&self.db_pool)
            .await
            .context("Error consultando próximos vencimientos")?;

        rows.iter().map(row_to_record).collect()
    }

    async fn update_by_id(&self, id: RecordId, item: &CustomerRecord) -> Result<RecordId> {
        let now = Utc::now().to_rfc3339();
        let metadata = serde_json::to_string(&item.policy_metadata)?;

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET natural_key = ?1,
                full_name = ?2,
                phone = ?3,
                due_date = ?4,
                policy_number = ?5,
                policy_metadata = ?6,
                updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(item.natural_key())
        .bind(&item.full_name)
        .bind(item.phone.as_str())
        .bind(item.due_date.map(format_date))
        .bind(&item.policy_number)
        .bind(metadata)
        .bind(now)
        .bind(id)
        .execute(&self.db_pool)
        .await
        .context("Error actualizando customer")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("No existe customer con id={}", id));
        }
        Ok(id)
    }

    async fn insert_or_merge(&self, item: &CustomerRecord) -> Result<RecordId> {
        let now = Utc::now().to_rfc3339();
        let metadata = serde_json::to_string(&item.policy_metadata)?;

        // La clave natural decide si es alta o actualización; el id no cambia.
        let row = sqlx::query(
            r#"
            INSERT INTO customers (
                natural_key, full_name, phone, due_date,
                policy_number, policy_metadata, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(natural_key) DO UPDATE SET
                full_name = excluded.full_name,
                phone = excluded.phone,
                policy_metadata = excluded.policy_metadata,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(item.natural_key())
        .bind(&item.full_name)
        .bind(item.phone.as_str())
        .bind(item.due_date.map(format_date))
        .bind(&item.policy_number)
        .bind(metadata)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await
        .context("Fallo al insertar customer")?;

        Ok(row.try_get::<i64, _>("id")?)
    }
}

#[async_trait]
impl Repository<CustomerRecord> for CustomerService {
    async fn find_all(&self) -> Result<Vec<CustomerRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.db_pool)
            .await
            .context("Error leyendo customers")?;

        log::debug!("(find_all) {} registros leídos", rows.len());
        rows.iter().map(row_to_record).collect()
    }

    async fn upsert(&self, item: &CustomerRecord) -> Result<RecordId> {
        match item.id() {
            Some(id) => self.update_by_id(id, item).await,
            None => self.insert_or_merge(item).await,
        }
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<CustomerRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Error buscando customer por id")?;

        row.as_ref().map(row_to_record).transpose()
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Las fechas se guardan como texto ISO de 4 dígitos; más allá del año 9999 no compararían bien.
fn format_upper_bound(date: NaiveDate) -> String {
    if date.year() > 9999 {
        "9999-12-31".to_string()
    } else {
        format_date(date)
    }
}

fn row_to_record(row: &SqliteRow) -> Result<CustomerRecord> {
    let id: i64 = row.try_get("id")?;
    let full_name: String = row.try_get("full_name")?;
    let raw_due: Option<String> = row.try_get("due_date")?;
    let raw_metadata: String = row.try_get("policy_metadata")?;

    // Un texto ilegible queda como "sin fecha"; el evaluador lo reporta.
    let due_date = raw_due.as_deref().and_then(|s| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| log::warn!("(row_to_record) id={} due_date ilegible '{}': {}", id, s, e))
            .ok()
    });

    let policy_metadata: BTreeMap<String, String> = serde_json::from_str(&raw_metadata)
        .unwrap_or_else(|e| {
            log::warn!("(row_to_record) id={} policy_metadata inválido: {}", id, e);
            BTreeMap::new()
        });

    Ok(CustomerRecord {
        id: Some(id),
        full_name,
        phone: Phone::from_stored(row.try_get("phone")?),
        due_date,
        policy_number: row.try_get("policy_number")?,
        policy_metadata,
    })
}
