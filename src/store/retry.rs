use std::time::Duration;

use tracing::warn;

use super::{RecordStore, RowIter, TableId, WriteBatch};
use crate::config::RetryConfig;
use crate::error::Result;

/// Bounded retry with exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying retryable errors up to `max_attempts` times in total.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, self.max_attempts, e, delay
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps a store so every operation goes through a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RecordStore> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RecordStore> RecordStore for Retrying<S> {
    fn create_table(&self, table: TableId) -> Result<()> {
        self.policy.run("create_table", || self.inner.create_table(table))
    }

    fn drop_table(&self, table: TableId) -> Result<bool> {
        self.policy.run("drop_table", || self.inner.drop_table(table))
    }

    fn commit(&self, table: TableId, batch: &WriteBatch) -> Result<()> {
        self.policy.run("commit", || self.inner.commit(table, batch))
    }

    fn get(&self, table: TableId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.policy.run("get", || self.inner.get(table, key))
    }

    /// Only opening the scan is retried; errors raised while iterating
    /// are handed to the caller as they come.
    fn scan_prefix(&self, table: TableId, prefix: &[u8]) -> Result<RowIter<'_>> {
        self.policy
            .run("scan_prefix", || self.inner.scan_prefix(table, prefix))
    }

    fn insert_if_absent(&self, table: TableId, key: &[u8], value: &[u8]) -> Result<bool> {
        self.policy.run("insert_if_absent", || {
            self.inner.insert_if_absent(table, key, value)
        })
    }

    fn remove(&self, table: TableId, key: &[u8]) -> Result<()> {
        self.policy.run("remove", || self.inner.remove(table, key))
    }

    fn next_id(&self) -> Result<u64> {
        self.policy.run("next_id", || self.inner.next_id())
    }

    fn flush(&self) -> Result<()> {
        self.policy.run("flush", || self.inner.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let calls = Cell::new(0);
        let result = quick_policy(3).run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::StoreUnavailable("busy".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = quick_policy(2).run("op", || {
            calls.set(calls.get() + 1);
            Err(Error::StoreUnavailable("down".into()))
        });
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = quick_policy(5).run("op", || {
            calls.set(calls.get() + 1);
            Err(Error::ResolutionInconsistency("bad".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_scan_passes_rows_through() {
        use crate::store::SledStore;

        let store = Retrying::new(SledStore::temporary().unwrap(), quick_policy(2));
        let table = TableId::meta();
        let mut batch = WriteBatch::new();
        batch.insert(b"k1".to_vec(), b"a".to_vec());
        batch.insert(b"k2".to_vec(), b"b".to_vec());
        batch.insert(b"x1".to_vec(), b"c".to_vec());
        store.commit(table, &batch).unwrap();

        let rows: Vec<(Vec<u8>, Vec<u8>)> = store
            .scan_prefix(table, b"k")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].1, b"b".to_vec());
    }
}
