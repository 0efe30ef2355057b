//! Address object rows as stored per dataset version.

use serde::{Deserialize, Serialize};

/// Numeric id of an address object. `0` is the root.
pub type ObjectId = u64;

/// Parent id meaning "no parent".
pub const ROOT_ID: ObjectId = 0;

/// One live, active address object from the classifier feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressObject {
    /// Store-assigned id, stable within a version
    pub id: ObjectId,

    /// Resolved parent id (`ROOT_ID` until resolved, or for roots/orphans)
    pub parent_id: ObjectId,

    /// AOGUID from the feed
    pub guid: String,

    /// PARENTGUID from the feed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub formal_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,

    /// Short classifier token, e.g. "ул"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    /// Resolved classifier code (`0` until resolved)
    pub classifier_code: u32,

    /// AOLEVEL
    pub level: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,

    /// Canonical display name, empty until computed
    #[serde(default)]
    pub display_name: String,
}

impl AddressObject {
    pub fn new(id: ObjectId, guid: impl Into<String>, level: u32) -> Self {
        Self {
            id,
            parent_id: ROOT_ID,
            guid: guid.into(),
            parent_guid: None,
            formal_name: None,
            official_name: None,
            short_name: None,
            classifier_code: 0,
            level,
            postal_code: None,
            region_code: None,
            display_name: String::new(),
        }
    }

    pub fn formal_name(&self) -> &str {
        self.formal_name.as_deref().unwrap_or("")
    }

    pub fn region_code(&self) -> &str {
        self.region_code.as_deref().unwrap_or("")
    }

    /// Postal code if present and non-blank
    pub fn postal(&self) -> Option<&str> {
        self.postal_code
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
    }
}
