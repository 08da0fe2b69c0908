//! tests/mod.rs
//! Pruebas unitarias y de integración (SQLite en memoria, canal falso).

mod common;

mod config_tests;
mod pipeline_tests;
