//! services/mod.rs
//! Capas de negocio: store, clasificación, importación y notificación.

pub mod customer_service;
pub mod due_date_service;
pub mod import_service;
pub mod notification_channel_service;
pub mod notification_service;
pub mod pipeline_service;
pub mod repository;
