//! tests/common.rs
//! Helpers compartidos: pool en memoria, canal falso y repositorio que falla.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::customer_model::{CustomerRecord, RecordId};
use crate::models::notification_model::ChannelError;
use crate::models::phone_model::Phone;
use crate::services::customer_service::CustomerService;
use crate::services::notification_channel_service::OutboundChannel;
use crate::services::repository::Repository;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("fecha inválida en test")
}

pub fn customer(full_name: &str, phone: &str, due_date: NaiveDate) -> CustomerRecord {
    let phone = Phone::parse(phone, Some("359")).expect("teléfono inválido en test");
    CustomerRecord::new(full_name, phone, due_date)
}

/// Una sola conexión: cada conexión a `sqlite::memory:` es una base distinta.
pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria");

    CustomerService::new(pool.clone())
        .run_migrations()
        .await
        .expect("Fallaron las migraciones");
    pool
}

pub async fn memory_service() -> CustomerService {
    CustomerService::new(memory_pool().await)
}

/// Canal que registra cada envío y falla para los destinos indicados.
#[derive(Default)]
pub struct FakeChannel {
    calls: Mutex<Vec<(String, String)>>,
    failures: HashMap<String, ChannelError>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, destination: &str, error: ChannelError) -> Self {
        self.failures.insert(destination.to_string(), error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("mutex envenenado").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutboundChannel for FakeChannel {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, destination: &str, message: &str) -> Result<(), ChannelError> {
        self.calls
            .lock()
            .expect("mutex envenenado")
            .push((destination.to_string(), message.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(destination) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Store caído: toda operación devuelve error.
pub struct FailingRepository;

#[async_trait]
impl Repository<CustomerRecord> for FailingRepository {
    async fn find_all(&self) -> Result<Vec<CustomerRecord>> {
        Err(anyhow!("database is locked"))
    }

    async fn upsert(&self, _item: &CustomerRecord) -> Result<RecordId> {
        Err(anyhow!("database is locked"))
    }

    async fn find_by_id(&self, _id: RecordId) -> Result<Option<CustomerRecord>> {
        Err(anyhow!("database is locked"))
    }
}
