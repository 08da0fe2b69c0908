//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod customer_model;
pub mod notification_model;
pub mod phone_model;
pub mod report_model;
