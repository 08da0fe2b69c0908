//! app.rs
//! Línea de comandos y cableado de servicios para una corrida.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::app_config::{AppConfig, ChannelKind, ConfigError};
use crate::handlers::report_handler;
use crate::logger::with_logging;
use crate::models::customer_model::CustomerRecord;
use crate::models::notification_model::RunMode;
use crate::services::customer_service::CustomerService;
use crate::services::due_date_service;
use crate::services::import_service::ImportService;
use crate::services::notification_channel_service::build_channel;
use crate::services::notification_service::NotificationService;
use crate::services::pipeline_service::PipelineService;
use crate::services::repository::Repository;

#[derive(Parser, Debug)]
#[command(
    name = "insurance_notifier",
    about = "Import insurance customers and remind them of upcoming or missed payments",
    version
)]
pub struct Cli {
    /// Spreadsheet export (CSV) to import before checking due dates
    #[arg(long)]
    pub excel: Option<PathBuf>,

    /// Skip the import step even if a default path is configured
    #[arg(long)]
    pub no_import: bool,

    /// Check upcoming due dates and send notifications
    #[arg(long, visible_alias = "sms")]
    pub notify: bool,

    /// Send to real customers (default is a dry run)
    #[arg(long)]
    pub prod: bool,

    /// Notification channel (defaults to NOTIFY_CHANNEL or sms)
    #[arg(long, value_enum)]
    pub channel: Option<ChannelKind>,

    /// Number of days ahead to check for due dates
    #[arg(long)]
    pub days: Option<u32>,

    /// Override today's date (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

impl Cli {
    /// `--prod` o el modo configurado; nunca producción por omisión.
    pub fn run_mode(&self, config: &AppConfig) -> RunMode {
        if self.prod {
            RunMode::Production
        } else {
            config.mode
        }
    }

    /// Credenciales del canal: solo hacen falta si esta corrida envía de verdad.
    pub fn require_send_credentials(
        &self,
        config: &AppConfig,
        mode: RunMode,
        channel: ChannelKind,
    ) -> Result<(), ConfigError> {
        if self.notify && mode == RunMode::Production {
            config.require_channel_credentials(channel)?;
        }
        Ok(())
    }

    pub fn import_path(&self, config: &AppConfig) -> Option<PathBuf> {
        if self.no_import {
            return None;
        }
        self.excel
            .clone()
            .or_else(|| config.default_import_path.as_ref().map(PathBuf::from))
    }
}

pub(crate) async fn setup_database(database_url: &str) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("DATABASE_URL inválida: {}", database_url))?
        .create_if_missing(true);

    // Crear la carpeta del archivo si hace falta
    if let Some(parent) = options.clone().get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("No se pudo crear directorio {:?}", parent))?;
        }
    }

    log::info!("Conectando a SQLite en {}", database_url);
    let db_pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")?;

    Ok(db_pool)
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env().context("Configuración inválida")?;
    let mode = cli.run_mode(&config);
    let channel_kind = cli.channel.unwrap_or(config.channel);
    cli.require_send_credentials(&config, mode, channel_kind)
        .context("Configuración incompleta para producción")?;

    let db_pool = setup_database(&config.database_url).await?;
    // El pool se cierra en todos los caminos de salida.
    let result = run_with_pool(&cli, &config, mode, channel_kind, db_pool.clone()).await;
    db_pool.close().await;
    result
}

async fn run_with_pool(
    cli: &Cli,
    config: &AppConfig,
    mode: RunMode,
    channel_kind: ChannelKind,
    db_pool: Pool<Sqlite>,
) -> Result<()> {
    let customer_service = CustomerService::new(db_pool);
    customer_service.run_migrations().await?;
    let repository: Arc<dyn Repository<CustomerRecord>> = Arc::new(customer_service.clone());

    if let Some(path) = cli.import_path(config) {
        let import_service = ImportService::new(repository.clone(), config.default_country_code.clone());
        let report = with_logging("import", import_service.import_file(&path)).await?;
        println!("{}", report_handler::render_import_report(&report));
    }

    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let lookahead_days = cli.days.unwrap_or(config.lookahead_days);

    let channel = build_channel(channel_kind, config, Client::new());
    let notifier = NotificationService::new(channel, config.allow_list_phones.clone(), config.send_timeout);
    let pipeline = PipelineService::new(repository, notifier, config.concurrency);

    let until = due_date_service::window_end(today, lookahead_days);
    let due_soon = customer_service.find_upcoming(today, until).await?;
    let classification = with_logging("upcoming", pipeline.preview(today, lookahead_days)).await?;
    println!("{}", report_handler::render_upcoming(&due_soon, &classification));

    if !cli.notify {
        log::info!("(run) Sin --notify: no se envían notificaciones.");
        return Ok(());
    }

    log::info!("(run) Modo de notificación: {}", mode);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("(run) Interrupción recibida, cancelando corrida...");
            let _ = cancel_tx.send(true);
        }
    });

    let report = with_logging(
        "notify",
        pipeline.run_with_cancel(today, lookahead_days, mode, cancel_rx),
    )
    .await;
    interrupt.abort();

    let report = report?;
    println!("{}", report_handler::render_run_report(&report));
    Ok(())
}
