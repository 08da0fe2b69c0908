use clap::Parser;
use dotenv::dotenv;
use std::process::ExitCode;

use crate::logger::init_logger;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let cli = app::Cli::parse();

    // Fallos individuales de envío no cambian el código de salida;
    // solo los de arranque (config, base de datos, archivo de importación).
    match app::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Error fatal: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
