//! handlers/mod.rs
pub mod report_handler;
