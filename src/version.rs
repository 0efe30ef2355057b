//! Dataset version pointer and the build/publish/retire protocol.
//!
//! The meta table holds three kinds of keys: `current` (the version served
//! to readers), `previous` (the version still kept for in-flight readers),
//! and one lock per version under construction. Publishing rewrites both
//! pointers and releases the lock in a single atomic batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{DatasetVersion, VersionNumber};
use crate::store::{Dataset, RecordStore, TableId, WriteBatch};

const CURRENT_KEY: &[u8] = b"current";
const PREVIOUS_KEY: &[u8] = b"previous";
const LOCK_PREFIX: &[u8] = b"lock/";

fn lock_key(version: VersionNumber) -> Vec<u8> {
    let mut key = LOCK_PREFIX.to_vec();
    key.extend_from_slice(&version.to_be_bytes());
    key
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BuildLock {
    version: VersionNumber,
    source_date: String,
    started_at: DateTime<Utc>,
}

/// Exclusive right to build one version. Consumed by publish or abort.
#[derive(Debug)]
#[must_use = "a started build must be published or aborted"]
pub struct BuildHandle {
    version: VersionNumber,
    source_date: String,
    started_at: DateTime<Utc>,
}

impl BuildHandle {
    pub fn version(&self) -> VersionNumber {
        self.version
    }

    pub fn source_date(&self) -> &str {
        &self.source_date
    }
}

pub struct VersionManager<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> VersionManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The version readers should use, if any has been published
    pub fn current(&self) -> Result<Option<DatasetVersion>> {
        self.read_pointer(CURRENT_KEY)
    }

    /// The version kept alive for in-flight readers after the last cutover
    pub fn previous(&self) -> Result<Option<DatasetVersion>> {
        self.read_pointer(PREVIOUS_KEY)
    }

    pub fn next_version(&self) -> Result<VersionNumber> {
        Ok(self.current()?.map_or(1, |v| v.version + 1))
    }

    /// True when the published version was built from the same upstream date
    pub fn is_latest(&self, source_date: &str) -> Result<bool> {
        Ok(self
            .current()?
            .map_or(false, |v| v.source_date == source_date))
    }

    pub fn dataset(&self, handle: &BuildHandle) -> Dataset<'a, S> {
        Dataset::new(self.store, handle.version)
    }

    /// Take the build lock for `version` and create its tables empty.
    ///
    /// Fails with [`Error::BuildLocked`] when another build holds the lock.
    pub fn start_build(&self, version: VersionNumber, source_date: &str) -> Result<BuildHandle> {
        for pointer in [self.current()?, self.previous()?].into_iter().flatten() {
            if pointer.version == version {
                return Err(Error::ResolutionInconsistency(format!(
                    "version {} is still published",
                    version
                )));
            }
        }

        let lock = BuildLock {
            version,
            source_date: source_date.to_string(),
            started_at: Utc::now(),
        };
        let acquired = self.store.insert_if_absent(
            TableId::meta(),
            &lock_key(version),
            &serde_json::to_vec(&lock)?,
        )?;
        if !acquired {
            return Err(Error::BuildLocked(version));
        }

        let handle = BuildHandle {
            version,
            source_date: lock.source_date,
            started_at: lock.started_at,
        };
        if let Err(e) = self.dataset(&handle).create_tables() {
            self.store.remove(TableId::meta(), &lock_key(version))?;
            return Err(e);
        }

        info!("Started build of version {} ({})", version, source_date);
        Ok(handle)
    }

    /// Atomically make the built version current and release its lock.
    ///
    /// The replaced version becomes `previous`; it stays readable until
    /// [`retire`](Self::retire) is called for it.
    pub fn publish(&self, handle: BuildHandle) -> Result<DatasetVersion> {
        let old_current = self.current()?;
        let old_previous = self.previous()?;

        let published = DatasetVersion {
            version: handle.version,
            source_date: handle.source_date.clone(),
            published_at: Utc::now(),
        };

        let mut batch = WriteBatch::new();
        batch.insert(CURRENT_KEY, serde_json::to_vec(&published)?);
        match &old_current {
            Some(old) => batch.insert(PREVIOUS_KEY, serde_json::to_vec(old)?),
            None => batch.remove(PREVIOUS_KEY),
        }
        batch.remove(lock_key(handle.version));

        self.store.flush()?;
        self.store.commit(TableId::meta(), &batch)?;
        self.store.flush()?;

        let elapsed = published.published_at - handle.started_at;
        info!(
            "Published version {} (built in {}s)",
            published.version,
            elapsed.num_seconds()
        );

        // only one previous version is kept
        if let Some(stale) = old_previous {
            if Some(stale.version) != old_current.as_ref().map(|v| v.version) {
                warn!(
                    "Version {} was never retired, dropping it now",
                    stale.version
                );
                Dataset::new(self.store, stale.version).drop_tables()?;
            }
        }

        Ok(published)
    }

    /// Drop a failed build's tables and release its lock
    pub fn abort(&self, handle: BuildHandle) -> Result<()> {
        warn!("Aborting build of version {}", handle.version);
        self.dataset(&handle).drop_tables()?;
        self.store
            .remove(TableId::meta(), &lock_key(handle.version))?;
        Ok(())
    }

    /// Drop every table of an old version and clear the previous pointer if it names it
    pub fn retire(&self, version: VersionNumber) -> Result<()> {
        if self.current()?.map(|v| v.version) == Some(version) {
            return Err(Error::ResolutionInconsistency(format!(
                "refusing to retire current version {}",
                version
            )));
        }

        Dataset::new(self.store, version).drop_tables()?;
        if self.previous()?.map(|v| v.version) == Some(version) {
            self.store.remove(TableId::meta(), PREVIOUS_KEY)?;
        }
        self.store.flush()?;

        info!("Retired version {}", version);
        Ok(())
    }

    fn read_pointer(&self, key: &[u8]) -> Result<Option<DatasetVersion>> {
        match self.store.get(TableId::meta(), key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
