//! Canonical display names following Russian word-order conventions.
//!
//! [`rules`] picks a naming branch from the classifier code and level in a
//! fixed priority order; [`NameComposer`] renders the branch.

mod composer;
pub mod rules;

pub use composer::{Composition, NameComposer, NameInput, UNNAMED};
pub use rules::Category;
