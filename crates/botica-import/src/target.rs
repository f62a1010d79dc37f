use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Entity a CSV file loads into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportTarget {
    Products,
    Clients,
}

impl ImportTarget {
    /// Lowercase header names the file must carry.
    pub const fn required_headers(&self) -> &'static [&'static str] {
        match self {
            ImportTarget::Products => &["nombre", "codigo", "precio_venta", "stock"],
            ImportTarget::Clients => &[
                "nombre",
                "apellido",
                "tipo_id",
                "numero_id",
                "telefono",
                "email",
                "direccion",
            ],
        }
    }

    /// Required headers absent from `headers` (already lowercased).
    pub fn missing_headers(&self, headers: &[String]) -> Vec<String> {
        self.required_headers()
            .iter()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .map(|required| required.to_string())
            .collect()
    }
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::Products => f.write_str("Products"),
            ImportTarget::Clients => f.write_str("Clients"),
        }
    }
}

impl FromStr for ImportTarget {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "products" => Ok(ImportTarget::Products),
            "clients" => Ok(ImportTarget::Clients),
            _ => Err(ImportError::UnknownTarget(s.to_string())),
        }
    }
}
