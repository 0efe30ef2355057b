//! Hierarchy levels and the address-form fields they map onto.

use serde::{Deserialize, Serialize};

/// Region (субъект РФ)
pub const LEVEL_REGION: u32 = 1;
/// District (район)
pub const LEVEL_DISTRICT: u32 = 3;
/// City (город)
pub const LEVEL_CITY: u32 = 4;
/// Settlement (населённый пункт)
pub const LEVEL_SETTLEMENT: u32 = 6;
/// Street (улица)
pub const LEVEL_STREET: u32 = 7;

/// Levels excluded from classifier resolution (additional territories and their elements).
pub const UNCLASSIFIED_LEVELS: [u32; 2] = [90, 91];

/// Address form field. Several source levels may share one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Region,
    District,
    Place,
    Street,
}

impl Field {
    /// Map a source hierarchy level to its form field
    pub fn from_level(level: u32) -> Option<Self> {
        match level {
            LEVEL_REGION => Some(Field::Region),
            LEVEL_DISTRICT => Some(Field::District),
            LEVEL_CITY | LEVEL_SETTLEMENT => Some(Field::Place),
            LEVEL_STREET => Some(Field::Street),
            _ => None,
        }
    }

    /// All fields in hierarchical order (region first)
    pub fn all() -> &'static [Field] {
        &[Field::Region, Field::District, Field::Place, Field::Street]
    }

    /// Source levels offered as candidates below an object of `level`
    pub fn next_levels(level: u32) -> &'static [u32] {
        match level {
            LEVEL_REGION => &[LEVEL_DISTRICT],
            LEVEL_DISTRICT => &[LEVEL_CITY, LEVEL_SETTLEMENT],
            LEVEL_CITY | LEVEL_SETTLEMENT => &[LEVEL_STREET],
            _ => &[],
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Field::Region => "region",
            Field::District => "district",
            Field::Place => "place",
            Field::Street => "street",
        }
    }
}

/// True when `level` participates in address lookups.
pub fn is_lookup_level(level: u32) -> bool {
    Field::from_level(level).is_some()
}
