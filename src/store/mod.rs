//! Versioned record store.
//!
//! Every logical table lives in its own namespace addressed by a [`TableId`]:
//! a table kind plus, for per-version tables, the dataset version. Backends see
//! only raw keys and values; the typed view lives in [`Dataset`].

mod batch;
mod dataset;
mod retry;
mod sled_store;

pub use batch::BatchWriter;
pub use dataset::{pair_key, pair_tail, Dataset, Row};
pub use retry::{RetryPolicy, Retrying};
pub use sled_store::SledStore;

use crate::config::Config;
use crate::error::Result;
use crate::models::VersionNumber;

/// Open the configured on-disk store behind the configured retry policy
pub fn open(config: &Config) -> Result<Retrying<SledStore>> {
    let store = SledStore::open(&config.store.path)?;
    Ok(Retrying::new(store, RetryPolicy::from(&config.retry)))
}

/// Logical tables. Tags are persisted in namespace names and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Un-versioned pointers and build locks
    Meta,
    AddressObject,
    Abbreviation,
    PostalCode,
    /// (postal id, object id) pairs
    PostalLink,
    /// (parent id, child id) pairs
    ChildIndex,
    /// zip string -> postal id
    ZipIndex,
    /// (object id, postal id) pairs
    ObjectLinks,
}

impl TableKind {
    fn tag(&self) -> u8 {
        match self {
            TableKind::Meta => 0,
            TableKind::AddressObject => 1,
            TableKind::Abbreviation => 2,
            TableKind::PostalCode => 3,
            TableKind::PostalLink => 4,
            TableKind::ChildIndex => 5,
            TableKind::ZipIndex => 6,
            TableKind::ObjectLinks => 7,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TableKind::Meta => "dataset_version",
            TableKind::AddressObject => "address_object",
            TableKind::Abbreviation => "abbreviation",
            TableKind::PostalCode => "postal_code",
            TableKind::PostalLink => "postal_link",
            TableKind::ChildIndex => "child_index",
            TableKind::ZipIndex => "zip_index",
            TableKind::ObjectLinks => "object_links",
        }
    }

    /// Tables created, built and dropped together for each dataset version
    pub fn versioned() -> &'static [TableKind] {
        &[
            TableKind::AddressObject,
            TableKind::Abbreviation,
            TableKind::PostalCode,
            TableKind::PostalLink,
            TableKind::ChildIndex,
            TableKind::ZipIndex,
            TableKind::ObjectLinks,
        ]
    }
}

/// Namespace of one logical table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId {
    pub kind: TableKind,
    pub version: Option<VersionNumber>,
}

impl TableId {
    pub fn meta() -> Self {
        Self {
            kind: TableKind::Meta,
            version: None,
        }
    }

    pub fn versioned(kind: TableKind, version: VersionNumber) -> Self {
        Self {
            kind,
            version: Some(version),
        }
    }

    /// Binary namespace name: tag byte, then the big-endian version if any
    pub fn namespace(&self) -> Vec<u8> {
        let mut name = Vec::with_capacity(5);
        name.push(self.kind.tag());
        if let Some(version) = self.version {
            name.extend_from_slice(&version.to_be_bytes());
        }
        name
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}@v{}", self.kind.label(), v),
            None => write!(f, "{}", self.kind.label()),
        }
    }
}

/// Ordered set of puts and deletes applied atomically to one table
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push((key.into(), Some(value.into())));
    }

    pub fn remove(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push((key.into(), None));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[(Vec<u8>, Option<Vec<u8>>)] {
        &self.ops
    }
}

/// Raw (key, value) rows from a range scan
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a>;

/// Tabular storage consumed by the build pipeline and the lookup engine.
pub trait RecordStore: Send + Sync {
    /// Create the table if it does not exist yet
    fn create_table(&self, table: TableId) -> Result<()>;

    /// Drop the table and all its rows. Returns false if it did not exist.
    fn drop_table(&self, table: TableId) -> Result<bool>;

    /// Apply a batch atomically; this is the commit boundary
    fn commit(&self, table: TableId, batch: &WriteBatch) -> Result<()>;

    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Rows whose key starts with `prefix`, in key order
    fn scan_prefix(&self, table: TableId, prefix: &[u8]) -> Result<RowIter<'_>>;

    /// Insert only if the key is absent. Returns true if inserted.
    fn insert_if_absent(&self, table: TableId, key: &[u8], value: &[u8]) -> Result<bool>;

    fn remove(&self, table: TableId, key: &[u8]) -> Result<()>;

    /// Fresh unique id, never `ROOT_ID`
    fn next_id(&self) -> Result<u64>;

    fn flush(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_do_not_collide() {
        let a = TableId::versioned(TableKind::AddressObject, 1);
        let b = TableId::versioned(TableKind::AddressObject, 2);
        let c = TableId::versioned(TableKind::Abbreviation, 1);
        assert_ne!(a.namespace(), b.namespace());
        assert_ne!(a.namespace(), c.namespace());
        assert_eq!(TableId::meta().namespace(), vec![0]);
        assert_eq!(a.namespace(), vec![1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_display() {
        let t = TableId::versioned(TableKind::PostalLink, 7);
        assert_eq!(t.to_string(), "postal_link@v7");
    }
}
