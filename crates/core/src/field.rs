use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Quad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Price,
    Date,
    Vendor,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Price => write!(f, "price"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::Vendor => write!(f, "vendor"),
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(FieldKind::Price),
            "date" => Ok(FieldKind::Date),
            "vendor" => Ok(FieldKind::Vendor),
            other => Err(format!("Unknown field kind: '{other}'")),
        }
    }
}

/// Where a field was found and what it reads. Either half may be absent on
/// its own: a located region whose text did not parse keeps its region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResult {
    pub region: Option<Quad>,
    pub value: Option<String>,
}

impl FieldResult {
    pub fn found(region: Quad, value: impl Into<String>) -> Self {
        Self { region: Some(region), value: Some(value.into()) }
    }

    pub fn region_only(region: Quad) -> Self {
        Self { region: Some(region), value: None }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
