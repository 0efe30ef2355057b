//! Typed view over the tables of one dataset version.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{RecordStore, TableId, TableKind, WriteBatch};
use crate::error::Result;
use crate::models::{AbbreviationEntry, AddressObject, ObjectId, PostalCode, VersionNumber};

/// A row type stored in its own table, keyed by a big-endian id.
pub trait Row: Serialize + DeserializeOwned {
    const KIND: TableKind;

    fn row_id(&self) -> u64;

    fn key(&self) -> [u8; 8] {
        self.row_id().to_be_bytes()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Row for AddressObject {
    const KIND: TableKind = TableKind::AddressObject;

    fn row_id(&self) -> u64 {
        self.id
    }
}

impl Row for AbbreviationEntry {
    const KIND: TableKind = TableKind::Abbreviation;

    fn row_id(&self) -> u64 {
        self.id
    }
}

impl Row for PostalCode {
    const KIND: TableKind = TableKind::PostalCode;

    fn row_id(&self) -> u64 {
        self.id
    }
}

/// Concatenate two ids into a 16-byte composite key
pub fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

/// Second half of a composite key
pub fn pair_tail(key: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = key.get(8..16)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

/// All tables of one dataset version
pub struct Dataset<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    version: VersionNumber,
}

impl<'a, S: RecordStore + ?Sized> Dataset<'a, S> {
    pub fn new(store: &'a S, version: VersionNumber) -> Self {
        Self { store, version }
    }

    pub fn version(&self) -> VersionNumber {
        self.version
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn table(&self, kind: TableKind) -> TableId {
        TableId::versioned(kind, self.version)
    }

    /// Drop any leftovers of this version, then create every table empty
    pub fn create_tables(&self) -> Result<()> {
        for kind in TableKind::versioned() {
            let table = self.table(*kind);
            self.store.drop_table(table)?;
            self.store.create_table(table)?;
        }
        Ok(())
    }

    pub fn drop_tables(&self) -> Result<()> {
        for kind in TableKind::versioned() {
            self.store.drop_table(self.table(*kind))?;
        }
        Ok(())
    }

    pub fn get<R: Row>(&self, id: u64) -> Result<Option<R>> {
        match self.store.get(self.table(R::KIND), &id.to_be_bytes())? {
            Some(bytes) => Ok(Some(R::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Full scan of a row table in id order
    pub fn scan<R: Row + 'a>(&self) -> Result<impl Iterator<Item = Result<R>> + 'a> {
        let rows = self.store.scan_prefix(self.table(R::KIND), &[])?;
        Ok(rows.map(|row| row.and_then(|(_, value)| R::decode(&value))))
    }

    pub fn object(&self, id: ObjectId) -> Result<Option<AddressObject>> {
        self.get(id)
    }

    /// Direct children of `parent`, in id order
    pub fn children(&self, parent: ObjectId) -> Result<Vec<ObjectId>> {
        self.pair_tails(TableKind::ChildIndex, parent)
    }

    pub fn postal_id(&self, zip: &str) -> Result<Option<u64>> {
        let value = self
            .store
            .get(self.table(TableKind::ZipIndex), zip.trim().as_bytes())?;
        Ok(value.and_then(|v| v.as_slice().try_into().ok().map(u64::from_be_bytes)))
    }

    pub fn postal_code(&self, postal_id: u64) -> Result<Option<PostalCode>> {
        self.get(postal_id)
    }

    /// Postal ids linked to an object
    pub fn postal_ids_for(&self, object: ObjectId) -> Result<Vec<u64>> {
        self.pair_tails(TableKind::ObjectLinks, object)
    }

    /// Objects linked to a postal id
    pub fn objects_for_postal(&self, postal_id: u64) -> Result<Vec<ObjectId>> {
        self.pair_tails(TableKind::PostalLink, postal_id)
    }

    pub fn is_linked(&self, postal_id: u64, object: ObjectId) -> Result<bool> {
        Ok(self
            .store
            .get(self.table(TableKind::PostalLink), &pair_key(postal_id, object))?
            .is_some())
    }

    /// Write a single row outside a batch
    pub fn put<R: Row>(&self, row: &R) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.insert(row.key().to_vec(), row.encode()?);
        self.store.commit(self.table(R::KIND), &batch)
    }

    fn pair_tails(&self, kind: TableKind, head: u64) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        for row in self.store.scan_prefix(self.table(kind), &head.to_be_bytes())? {
            let (key, _) = row?;
            if let Some(tail) = pair_tail(&key) {
                out.push(tail);
            }
        }
        Ok(out)
    }
}
