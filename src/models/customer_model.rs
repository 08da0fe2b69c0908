//! models/customer_model.rs
//! Cliente asegurado tal como se guarda en la tabla `customers`.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::phone_model::Phone;

pub type RecordId = i64;

/// Cualquier cosa que el store identifica por un id asignado al crearse.
pub trait Entity: Send + Sync {
    fn id(&self) -> Option<RecordId>;
}

/// Claves conocidas dentro de `policy_metadata`.
pub mod metadata_keys {
    pub const NICKNAME: &str = "nickname";
    pub const CAR_TYPE: &str = "car_type";
    pub const LICENSE_PLATE: &str = "license_plate";
    pub const DUE_MONTH: &str = "due_month";
    pub const NOTICE: &str = "notice";
    pub const MADE_ON: &str = "made_on";
    pub const AMOUNT: &str = "amount";
    pub const INSTALLMENTS: &str = "installments";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    /// Asignado por el store; `None` hasta el primer upsert.
    pub id: Option<RecordId>,
    pub full_name: String,
    pub phone: Phone,
    /// `None` si falta o no se pudo leer (se reporta como problema de datos).
    pub due_date: Option<NaiveDate>,
    pub policy_number: String,
    pub policy_metadata: BTreeMap<String, String>,
}

impl CustomerRecord {
    pub fn new(full_name: impl Into<String>, phone: Phone, due_date: NaiveDate) -> Self {
        Self {
            id: None,
            full_name: full_name.into(),
            phone,
            due_date: Some(due_date),
            policy_number: String::new(),
            policy_metadata: BTreeMap::new(),
        }
    }

    pub fn with_policy_number(mut self, policy_number: impl Into<String>) -> Self {
        self.policy_number = policy_number.into();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.policy_metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.policy_metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Clave estable para re-importar sin duplicar: póliza + nombre + vencimiento.
    pub fn natural_key(&self) -> String {
        let due = self
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        format!(
            "{}|{}|{}",
            self.policy_number.trim(),
            self.full_name.trim().to_lowercase(),
            due
        )
    }
}

impl Entity for CustomerRecord {
    fn id(&self) -> Option<RecordId> {
        self.id
    }
}
