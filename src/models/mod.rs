//! Core data models for the address classifier.

pub mod abbreviation;
pub mod address;
pub mod level;
pub mod postal;
pub mod version;

pub use abbreviation::AbbreviationEntry;
pub use address::{AddressObject, ObjectId, ROOT_ID};
pub use level::Field;
pub use postal::PostalCode;
pub use version::{DatasetVersion, VersionNumber};
