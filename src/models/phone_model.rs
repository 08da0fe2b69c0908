//! models/phone_model.rs
//! Teléfono en formato canónico internacional (`+` seguido solo de dígitos).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Mínimo de dígitos (código de país incluido) que acepta el proveedor.
pub const MIN_DIGITS: usize = 9;
/// Máximo E.164.
pub const MAX_DIGITS: usize = 15;

/// Valores que aparecen en la hoja de cálculo en lugar de un número.
const PLACEHOLDERS: [&str; 5] = ["*", "-", "none", "n/a", "no phone"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number contains non-numeric characters: '{0}'")]
    NonNumeric(String),
    #[error("phone number has {0} digits, expected 9-15")]
    WrongLength(usize),
    #[error("phone number '{0}' has no country code")]
    MissingCountryCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Valida y normaliza un número tal como viene de la importación.
    ///
    /// Se toleran separadores (espacios, guiones, paréntesis, puntos, barras).
    /// Un número nacional (empieza por `0`) recibe `default_country_code`;
    /// sin él, o sin prefijo internacional reconocible, se rechaza.
    pub fn parse(raw: &str, default_country_code: Option<&str>) -> Result<Self, PhoneError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
            return Err(PhoneError::Empty);
        }

        let cleaned: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.' | '/'))
            .collect();

        let (international, body) = if let Some(rest) = cleaned.strip_prefix('+') {
            (true, rest)
        } else if let Some(rest) = cleaned.strip_prefix("00") {
            (true, rest)
        } else {
            (false, cleaned.as_str())
        };

        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::NonNumeric(trimmed.to_string()));
        }

        let digits = if international {
            body.to_string()
        } else {
            let country_code = default_country_code
                .map(|cc| cc.trim_start_matches('+'))
                .filter(|cc| !cc.is_empty())
                .ok_or_else(|| PhoneError::MissingCountryCode(trimmed.to_string()))?;

            if let Some(national) = body.strip_prefix('0') {
                format!("{country_code}{national}")
            } else if body.starts_with(country_code) {
                body.to_string()
            } else {
                return Err(PhoneError::MissingCountryCode(trimmed.to_string()));
            }
        };

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::WrongLength(digits.len()));
        }

        Ok(Phone(format!("+{digits}")))
    }

    /// Envuelve un valor ya canónico leído de la base de datos, sin validar.
    pub(crate) fn from_stored(value: String) -> Self {
        Phone(value)
    }

    /// Vuelve a validar el valor guardado; un valor canónico siempre pasa.
    pub fn recheck(&self) -> Result<Phone, PhoneError> {
        Phone::parse(&self.0, None)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
