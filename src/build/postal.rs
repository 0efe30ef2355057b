//! Postal code table and the ancestor-closed postal link index.

use std::collections::BTreeMap;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use tracing::{info, warn};

use super::hierarchy::Hierarchy;
use crate::error::{Error, Result};
use crate::models::{AddressObject, ObjectId, PostalCode, ROOT_ID};
use crate::store::{pair_key, BatchWriter, Dataset, RecordStore, TableKind};

/// Memoized ancestor chains over a resolved hierarchy.
///
/// Each chain is computed once and shared by every descendant walk that
/// reaches it. Walks longer than `max_depth` are truncated and counted.
pub struct AncestorIndex<'h> {
    hierarchy: &'h Hierarchy,
    cache: HashMap<ObjectId, Rc<[ObjectId]>>,
    max_depth: usize,
    truncated: usize,
}

impl<'h> AncestorIndex<'h> {
    pub fn new(hierarchy: &'h Hierarchy, max_depth: usize) -> Self {
        Self {
            hierarchy,
            cache: HashMap::new(),
            max_depth,
            truncated: 0,
        }
    }

    /// Strict ancestors of `id`, nearest first; empty for top-level objects
    pub fn ancestors(&mut self, id: ObjectId) -> Rc<[ObjectId]> {
        if let Some(chain) = self.cache.get(&id) {
            return Rc::clone(chain);
        }

        let mut path = Vec::new();
        let mut current = self.hierarchy.parent(id);
        let mut truncated = false;
        let tail: Rc<[ObjectId]> = loop {
            if current == ROOT_ID {
                break Rc::from(Vec::new());
            }
            if let Some(chain) = self.cache.get(&current) {
                path.push(current);
                break Rc::clone(chain);
            }
            if path.len() >= self.max_depth {
                let err = Error::CycleDetected {
                    start: id,
                    max_depth: self.max_depth,
                };
                warn!("{}; truncating ancestor chain", err);
                self.truncated += 1;
                truncated = true;
                break Rc::from(Vec::new());
            }
            path.push(current);
            current = self.hierarchy.parent(current);
        };

        if !truncated {
            for (i, &ancestor) in path.iter().enumerate() {
                if self.cache.contains_key(&ancestor) {
                    continue;
                }
                let chain: Vec<ObjectId> = path[i + 1..].iter().chain(tail.iter()).copied().collect();
                self.cache.insert(ancestor, Rc::from(chain));
            }
        }

        let chain: Rc<[ObjectId]> = path.iter().chain(tail.iter()).copied().collect();
        self.cache.insert(id, Rc::clone(&chain));
        chain
    }

    /// Walks cut short at `max_depth`
    pub fn truncated(&self) -> usize {
        self.truncated
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostalStats {
    pub codes: usize,
    pub links: usize,
    pub truncated_walks: usize,
}

/// Build the postal code table, the zip index and both link indexes.
///
/// Postal ids are assigned 1.. in zip order. Each code links every object
/// carrying it plus every strict ancestor of those objects.
pub fn build_postal_index<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    hierarchy: &Hierarchy,
    batch_size: usize,
    max_depth: usize,
) -> Result<PostalStats> {
    let mut carriers: BTreeMap<String, Vec<ObjectId>> = BTreeMap::new();
    for object in dataset.scan::<AddressObject>()? {
        let object = object?;
        if let Some(zip) = object.postal() {
            carriers.entry(zip.to_string()).or_default().push(object.id);
        }
    }
    info!("Found {} distinct postal codes", carriers.len());

    let store = dataset.store();
    let mut codes = BatchWriter::new(store, dataset.table(TableKind::PostalCode), batch_size);
    let mut zips = BatchWriter::new(store, dataset.table(TableKind::ZipIndex), batch_size);
    let mut by_postal = BatchWriter::new(store, dataset.table(TableKind::PostalLink), batch_size);
    let mut by_object = BatchWriter::new(store, dataset.table(TableKind::ObjectLinks), batch_size);

    let mut ancestors = AncestorIndex::new(hierarchy, max_depth);
    let mut stats = PostalStats {
        codes: carriers.len(),
        ..Default::default()
    };

    for (index, (zip, objects)) in carriers.iter().enumerate() {
        let postal_id = index as u64 + 1;
        codes.put(&PostalCode {
            id: postal_id,
            zip: zip.clone(),
        })?;
        zips.insert(zip.as_bytes().to_vec(), postal_id.to_be_bytes().to_vec())?;

        // an object already in the closure brought its ancestors with it
        let mut closure: HashSet<ObjectId> = HashSet::new();
        for &carrier in objects {
            if !closure.insert(carrier) {
                continue;
            }
            for &ancestor in ancestors.ancestors(carrier).iter() {
                if !closure.insert(ancestor) {
                    break;
                }
            }
        }

        let mut closure: Vec<ObjectId> = closure.into_iter().collect();
        closure.sort_unstable();
        for object in closure {
            by_postal.insert(pair_key(postal_id, object).to_vec(), Vec::new())?;
            by_object.insert(pair_key(object, postal_id).to_vec(), Vec::new())?;
            stats.links += 1;
        }

        if (index + 1) % 1000 == 0 {
            info!(
                "Linking postal codes: {} / {} ({} links)",
                index + 1,
                stats.codes,
                stats.links
            );
        }
    }

    codes.finish()?;
    zips.finish()?;
    by_postal.finish()?;
    by_object.finish()?;

    stats.truncated_walks = ancestors.truncated();
    info!(
        "Linked {} postal codes to {} objects",
        stats.codes, stats.links
    );
    Ok(stats)
}
