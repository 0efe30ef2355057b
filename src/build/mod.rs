//! Dataset build stages: hierarchy, postal index, classifier codes and names.

pub mod classifier;
pub mod driver;
pub mod hierarchy;
pub mod names;
pub mod pipeline;
pub mod postal;

pub use driver::{refresh, Refresh};
pub use hierarchy::{resolve_parents, Hierarchy};
pub use pipeline::{BuildPipeline, BuildReport};
pub use postal::{build_postal_index, AncestorIndex};
