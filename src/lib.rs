//! AddressOK - address classifier build pipeline and hierarchical lookup
//!
//! This library provides shared types and modules for the ingest and query binaries.

pub mod build;
pub mod config;
pub mod error;
pub mod feed;
pub mod lookup;
pub mod models;
pub mod naming;
pub mod store;
pub mod version;

pub use error::{Error, Result};
pub use models::{AbbreviationEntry, AddressObject, DatasetVersion, Field, ObjectId};
