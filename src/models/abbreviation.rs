//! Classifier abbreviation base (SOCRBASE) rows.

use serde::{Deserialize, Serialize};

/// One classifier abbreviation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbbreviationEntry {
    /// Store-assigned row id
    pub id: u64,

    /// Numeric classifier code parsed from KOD_T_ST (`0` if absent)
    pub code: u32,

    /// Hierarchy level the abbreviation applies to
    pub level: u32,

    /// Raw abbreviation token (SCNAME), e.g. "ул"
    pub short_name: String,

    /// Full classifier word (SOCRNAME), e.g. "Улица"
    pub full_name: String,

    /// `full_name` in lower case
    pub lowercased_name: String,

    /// Canonical short form shown to users; equals `short_name` until overridden
    #[serde(default)]
    pub display_form: String,
}

impl AbbreviationEntry {
    pub fn new(id: u64, code: u32, level: u32, short_name: &str, full_name: &str) -> Self {
        Self {
            id,
            code,
            level,
            short_name: short_name.to_string(),
            full_name: full_name.to_string(),
            lowercased_name: full_name.to_lowercase(),
            display_form: short_name.to_string(),
        }
    }

    /// Parse the legacy KOD_T_ST attribute into a numeric code.
    pub fn parse_code(raw: Option<&str>) -> u32 {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
    }
}
