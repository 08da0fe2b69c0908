//! logger.rs
//! Configuración del logger usando env_logger.

use std::future::Future;
use std::time::Instant;

use env_logger;

pub fn init_logger() {
    // Nivel desde RUST_LOG; si no está, "info".
    let log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_env))
        .format_timestamp_secs()
        .init();
}

/// Envuelve una operación: registra inicio, duración y error si lo hay.
pub async fn with_logging<T, F>(label: &str, operation: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    log::info!("({}) Iniciando...", label);
    let start = Instant::now();

    match operation.await {
        Ok(value) => {
            log::info!("({}) Completado en {:?}.", label, start.elapsed());
            Ok(value)
        }
        Err(e) => {
            log::error!("({}) Falló tras {:?}: {:?}", label, start.elapsed(), e);
            Err(e)
        }
    }
}
