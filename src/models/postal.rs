use serde::{Deserialize, Serialize};

/// A distinct postal code present in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCode {
    pub id: u64,
    pub zip: String,
}
