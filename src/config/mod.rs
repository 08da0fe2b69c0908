//! config/mod.rs
//! Configuración global leída del entorno.

pub mod app_config;
