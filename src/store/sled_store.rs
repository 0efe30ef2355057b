use std::path::Path;

use sled::Db;
use tracing::info;

use super::{RecordStore, RowIter, TableId, WriteBatch};
use crate::error::Result;

/// Embedded sled database; one tree per table namespace.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening record store at {}", path.display());
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tree(&self, table: TableId) -> Result<sled::Tree> {
        Ok(self.db.open_tree(table.namespace())?)
    }
}

impl RecordStore for SledStore {
    fn create_table(&self, table: TableId) -> Result<()> {
        self.tree(table)?;
        Ok(())
    }

    fn drop_table(&self, table: TableId) -> Result<bool> {
        Ok(self.db.drop_tree(table.namespace())?)
    }

    fn commit(&self, table: TableId, batch: &WriteBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.ops() {
            match value {
                Some(v) => sled_batch.insert(key.as_slice(), v.as_slice()),
                None => sled_batch.remove(key.as_slice()),
            }
        }
        self.tree(table)?.apply_batch(sled_batch)?;
        Ok(())
    }

    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree(table)?.get(key)?.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, table: TableId, prefix: &[u8]) -> Result<RowIter<'_>> {
        let iter = self.tree(table)?.scan_prefix(prefix);
        Ok(Box::new(iter.map(|row| {
            row.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(Into::into)
        })))
    }

    fn insert_if_absent(&self, table: TableId, key: &[u8], value: &[u8]) -> Result<bool> {
        let swapped = self
            .tree(table)?
            .compare_and_swap(key, None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    fn remove(&self, table: TableId, key: &[u8]) -> Result<()> {
        self.tree(table)?.remove(key)?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64> {
        // sled counts from 0, which is the root id
        Ok(self.db.generate_id()? + 1)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
