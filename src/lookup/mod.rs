//! Incremental "narrow down the address" queries.

mod engine;
mod response;

pub use engine::{AddressSelection, QueryEngine};
pub use response::{AddressResponse, Entry, Filled, Suggestions};
