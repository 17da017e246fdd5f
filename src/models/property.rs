use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Sale or rent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Sale,
    Rent,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sale => "sale",
            Operation::Rent => "rent",
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sale" | "venta" => Ok(Operation::Sale),
            "rent" | "renta" => Ok(Operation::Rent),
            other => Err(UnknownVariant::new("operation", other)),
        }
    }
}

/// Location information for a property
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub neighborhood: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Canonical flattened property representation handed to portal clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyData {
    pub title: String,
    pub description: String,
    /// Price in whole currency units
    pub price: i64,
    pub currency: String,
    pub operation: Operation,
    /// Free-form type as used by the CRM ("casa", "departamento", "terreno", ...)
    pub property_type: String,
    pub location: Location,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f32>,
    pub parking_spaces: Option<i32>,
    /// Built area in square meters
    pub construction_m2: Option<f64>,
    /// Lot area in square meters
    pub land_m2: Option<f64>,
    pub features: Vec<String>,
    pub images: Vec<String>,
}

/// Property owned by an agency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub data: PropertyData,
}

#[cfg(test)]
impl PropertyData {
    pub(crate) fn sample() -> Self {
        Self {
            title: "Casa en Providencia".to_string(),
            description: "Casa de dos plantas con jardín".to_string(),
            price: 4_850_000,
            currency: "MXN".to_string(),
            operation: Operation::Sale,
            property_type: "casa".to_string(),
            location: Location {
                address: "Av. Providencia 2450".to_string(),
                neighborhood: Some("Providencia".to_string()),
                city: "Guadalajara".to_string(),
                state: "Jalisco".to_string(),
                postal_code: Some("44630".to_string()),
                latitude: Some(20.6903),
                longitude: Some(-103.3846),
            },
            bedrooms: Some(3),
            bathrooms: Some(2.5),
            parking_spaces: Some(2),
            construction_m2: Some(210.0),
            land_m2: Some(180.0),
            features: vec!["Jardín".to_string(), "Cuarto de servicio".to_string()],
            images: vec!["https://cdn.example.com/p/1.jpg".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_accepts_spanish_names() {
        assert_eq!("venta".parse::<Operation>().unwrap(), Operation::Sale);
        assert_eq!("Renta".parse::<Operation>().unwrap(), Operation::Rent);
        assert!("lease".parse::<Operation>().is_err());
    }
}
