//! Batched loading of feed records into the tables of a dataset version.

use std::io::BufRead;
use std::str::FromStr;

use indicatif::ProgressBar;
use tracing::info;

use super::reader::{Record, XmlRecords};
use crate::error::{Error, Result};
use crate::models::{AbbreviationEntry, AddressObject};
use crate::store::{BatchWriter, Dataset, RecordStore, Row};

/// Address objects that are the live, actual revision
pub fn is_live_and_active(record: &Record) -> bool {
    record.get("LIVESTATUS") == Some("1") && record.get("ACTSTATUS") == Some("1")
}

/// Abbreviation elements carrying a short name
pub fn has_short_name(record: &Record) -> bool {
    record.has("SCNAME")
}

/// Streams feed documents into one dataset version
pub struct FeedLoader<'a, S: RecordStore + ?Sized> {
    dataset: &'a Dataset<'a, S>,
    batch_size: usize,
    progress: ProgressBar,
}

impl<'a, S: RecordStore + ?Sized> FeedLoader<'a, S> {
    pub fn new(dataset: &'a Dataset<'a, S>, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Load every live, active address object; returns the number stored
    pub fn load_address_objects<R: BufRead>(&self, source: R) -> Result<usize> {
        self.load(source, is_live_and_active, "address objects", |record, id| {
            address_object_from(record, id)
        })
    }

    /// Load every abbreviation with a short name; returns the number stored
    pub fn load_abbreviations<R: BufRead>(&self, source: R) -> Result<usize> {
        self.load(source, has_short_name, "abbreviations", |record, id| {
            abbreviation_from(record, id)
        })
    }

    fn load<R, T, P, F>(&self, source: R, predicate: P, what: &str, convert: F) -> Result<usize>
    where
        R: BufRead,
        T: Row,
        P: FnMut(&Record) -> bool,
        F: Fn(&Record, u64) -> Result<T>,
    {
        let store = self.dataset.store();
        let mut writer = BatchWriter::new(store, self.dataset.table(T::KIND), self.batch_size);
        let mut records = XmlRecords::new(source, predicate);

        self.progress.set_message(format!("Loading {}", what));
        for record in records.by_ref() {
            let record = record?;
            let row = convert(&record, store.next_id()?)?;
            writer.put(&row)?;

            self.progress.inc(1);
            let (written, batches) = writer.stats();
            if written > 0 && written % self.batch_size.saturating_mul(100) == 0 {
                info!("Loading {}: {} rows in {} batches", what, written, batches);
            }
        }

        let total = writer.finish()?;
        info!(
            "Loaded {} {} ({} elements scanned)",
            total,
            what,
            records.elements_seen()
        );
        Ok(total)
    }
}

fn required<'r>(record: &'r Record, name: &str) -> Result<&'r str> {
    record.get(name).ok_or_else(|| Error::FeedFormat {
        position: record.position,
        message: format!("missing attribute {}", name),
    })
}

fn parsed<T: FromStr>(record: &Record, name: &str) -> Result<T> {
    let raw = required(record, name)?;
    raw.trim().parse().map_err(|_| Error::FeedFormat {
        position: record.position,
        message: format!("attribute {}={:?} is not a number", name, raw),
    })
}

fn address_object_from(record: &Record, id: u64) -> Result<AddressObject> {
    let mut object = AddressObject::new(id, required(record, "AOGUID")?, parsed(record, "AOLEVEL")?);
    object.parent_guid = record.get_owned("PARENTGUID");
    object.formal_name = record.get_owned("FORMALNAME");
    object.official_name = record.get_owned("OFFNAME");
    object.short_name = record.get_owned("SHORTNAME");
    object.postal_code = record.get_owned("POSTALCODE");
    object.region_code = record.get_owned("REGIONCODE");
    Ok(object)
}

fn abbreviation_from(record: &Record, id: u64) -> Result<AbbreviationEntry> {
    Ok(AbbreviationEntry::new(
        id,
        AbbreviationEntry::parse_code(record.get("KOD_T_ST")),
        parsed(record, "LEVEL")?,
        required(record, "SCNAME")?,
        record.get("SOCRNAME").unwrap_or(""),
    ))
}
