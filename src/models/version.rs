use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonically increasing dataset version number
pub type VersionNumber = u32;

/// The published dataset pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub version: VersionNumber,

    /// Freshness date stated by the upstream feed
    pub source_date: String,

    pub published_at: DateTime<Utc>,
}
