//! Batched writes with bounded transaction size.

use tracing::debug;

use super::{RecordStore, Row, TableId, WriteBatch};
use crate::error::{Error, Result};

/// Buffers rows for one table and commits them every `batch_size` rows.
///
/// A failed commit aborts the load with the index of the offending batch;
/// rows are never dropped silently.
pub struct BatchWriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    table: TableId,
    batch_size: usize,
    buffer: WriteBatch,
    batches_committed: usize,
    total_written: usize,
}

impl<'a, S: RecordStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, table: TableId, batch_size: usize) -> Self {
        Self {
            store,
            table,
            batch_size: batch_size.max(1),
            buffer: WriteBatch::new(),
            batches_committed: 0,
            total_written: 0,
        }
    }

    /// Add a raw key/value, flushing if the batch is full
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<()> {
        self.buffer.insert(key, value);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Insert or overwrite a typed row
    pub fn put<R: Row>(&mut self, row: &R) -> Result<()> {
        let value = row.encode()?;
        self.insert(row.key().to_vec(), value)
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len();
        let index = self.batches_committed;

        debug!("Committing batch {} ({} rows) to {}", index, count, self.table);

        self.store
            .commit(self.table, &batch)
            .map_err(|e| Error::BatchFailed {
                table: self.table.to_string(),
                batch: index,
                source: Box::new(e),
            })?;

        self.batches_committed += 1;
        self.total_written += count;
        Ok(())
    }

    /// Flush the remainder and return the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.total_written)
    }

    /// (rows written, batches committed)
    pub fn stats(&self) -> (usize, usize) {
        (self.total_written, self.batches_committed)
    }
}
