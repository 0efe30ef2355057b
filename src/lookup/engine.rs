//! Hierarchical address lookup over the published dataset version.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};

use super::AddressResponse;
use crate::error::{Error, Result};
use crate::models::level::{is_lookup_level, LEVEL_REGION};
use crate::models::{AddressObject, Field, ObjectId, ROOT_ID};
use crate::store::{Dataset, RecordStore};
use crate::version::VersionManager;

/// Per-field ids as submitted by an address form; `0` means unset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressSelection {
    pub region_id: ObjectId,
    pub district_id: ObjectId,
    pub place_id: ObjectId,
    pub street_id: ObjectId,
    pub postal_code: String,
}

impl AddressSelection {
    /// Street, then place, then district, then region
    pub fn most_specific(&self) -> ObjectId {
        [self.street_id, self.place_id, self.district_id, self.region_id]
            .into_iter()
            .find(|id| *id != ROOT_ID)
            .unwrap_or(ROOT_ID)
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn check(&self) -> Result<()> {
        match self.0 {
            Some(at) if Instant::now() >= at => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Read-only, stateless query engine. Each call reads the version pointer
/// once and answers entirely from that version.
pub struct QueryEngine<S: RecordStore + ?Sized> {
    store: Arc<S>,
    max_depth: usize,
}

impl<S: RecordStore + ?Sized> QueryEngine<S> {
    pub fn new(store: Arc<S>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    fn dataset(&self) -> Result<Dataset<'_, S>> {
        let current = VersionManager::new(&*self.store)
            .current()?
            .ok_or(Error::NoPublishedVersion)?;
        Ok(Dataset::new(&*self.store, current.version))
    }

    /// Filled ancestor chain and next-level candidates for `id`, optionally narrowed by `zip`.
    ///
    /// `id == 0` with an empty zip yields the initial region list; `id == 0`
    /// with a zip looks the zip up on its own. Unknown ids yield an empty
    /// response echoing the zip.
    pub fn lookup(
        &self,
        id: ObjectId,
        zip: &str,
        deadline: Option<Instant>,
    ) -> Result<AddressResponse> {
        let zip = zip.trim();
        let deadline = Deadline(deadline);
        let dataset = self.dataset()?;

        if id == ROOT_ID {
            return if zip.is_empty() {
                self.initial_in(&dataset, deadline)
            } else {
                self.by_postal_code_in(&dataset, zip, deadline)
            };
        }

        let Some(object) = dataset.object(id)? else {
            debug!("{}", Error::NotFound(format!("address object {}", id)));
            return Ok(AddressResponse::empty(zip));
        };

        let mut response = AddressResponse::default();
        let mut chain = self.ancestry(&dataset, &object, deadline)?;
        chain.sort_by_key(|o| o.level);
        for member in &chain {
            response.fill(member);
        }

        let postal_id = if zip.is_empty() {
            None
        } else {
            response.filled.zip = zip.to_string();
            dataset.postal_id(zip)?
        };

        let picked = object.id;
        let mut current = object;
        for _ in 0..self.max_depth {
            deadline.check()?;
            if Field::next_levels(current.level).is_empty() {
                break;
            }

            let mut candidates = self.candidates(&dataset, current.id, postal_id, deadline)?;
            if candidates.len() == 1 {
                if let Some(only) = candidates.pop() {
                    debug!("Single candidate {} below {}, descending", only.id, current.id);
                    response.fill(&only);
                    current = only;
                    continue;
                }
            }

            for candidate in &candidates {
                response.suggest(candidate);
            }
            break;
        }

        if zip.is_empty() {
            let mut single = single_zip(&dataset, picked)?;
            if single.is_none() && current.id != picked {
                single = single_zip(&dataset, current.id)?;
            }
            if let Some(code) = single {
                response.filled.zip = code;
            }
        }

        response.promote_singletons();
        Ok(response)
    }

    /// Every object linked to `zip`, grouped by field
    pub fn lookup_by_postal_code(
        &self,
        zip: &str,
        deadline: Option<Instant>,
    ) -> Result<AddressResponse> {
        let dataset = self.dataset()?;
        self.by_postal_code_in(&dataset, zip.trim(), Deadline(deadline))
    }

    pub fn lookup_selection(
        &self,
        selection: &AddressSelection,
        deadline: Option<Instant>,
    ) -> Result<AddressResponse> {
        self.lookup(selection.most_specific(), &selection.postal_code, deadline)
    }

    /// All regions, nothing filled
    pub fn initial(&self, deadline: Option<Instant>) -> Result<AddressResponse> {
        let dataset = self.dataset()?;
        self.initial_in(&dataset, Deadline(deadline))
    }

    fn initial_in(&self, dataset: &Dataset<'_, S>, deadline: Deadline) -> Result<AddressResponse> {
        let mut regions = Vec::new();
        for id in dataset.children(ROOT_ID)? {
            deadline.check()?;
            if let Some(object) = dataset.object(id)? {
                if object.level == LEVEL_REGION {
                    regions.push(object);
                }
            }
        }
        sort_by_name(&mut regions);

        let mut response = AddressResponse::default();
        for region in &regions {
            response.suggest(region);
        }
        Ok(response)
    }

    fn by_postal_code_in(
        &self,
        dataset: &Dataset<'_, S>,
        zip: &str,
        deadline: Deadline,
    ) -> Result<AddressResponse> {
        let mut response = AddressResponse::empty(zip);
        let Some(postal_id) = dataset.postal_id(zip)? else {
            debug!("{}", Error::NotFound(format!("postal code {:?}", zip)));
            return Ok(response);
        };

        let mut objects = Vec::new();
        for id in dataset.objects_for_postal(postal_id)? {
            deadline.check()?;
            if let Some(object) = dataset.object(id)? {
                if is_lookup_level(object.level) {
                    objects.push(object);
                }
            }
        }
        sort_by_name(&mut objects);
        objects.sort_by_key(|o| o.level);

        for object in &objects {
            response.suggest(object);
        }
        response.promote_singletons();
        Ok(response)
    }

    /// The object followed by its ancestors, nearest first, at most `max_depth` steps up
    fn ancestry(
        &self,
        dataset: &Dataset<'_, S>,
        object: &AddressObject,
        deadline: Deadline,
    ) -> Result<Vec<AddressObject>> {
        let mut chain = vec![object.clone()];
        let mut parent = object.parent_id;

        while parent != ROOT_ID {
            deadline.check()?;
            if chain.len() > self.max_depth {
                let err = Error::CycleDetected {
                    start: object.id,
                    max_depth: self.max_depth,
                };
                warn!("{}; truncating ancestor chain", err);
                break;
            }
            match dataset.object(parent)? {
                Some(ancestor) => {
                    parent = ancestor.parent_id;
                    chain.push(ancestor);
                }
                None => {
                    warn!("Object {} references missing parent {}", object.id, parent);
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// Children of `parent` at lookup levels, restricted to `postal_id` when given
    fn candidates(
        &self,
        dataset: &Dataset<'_, S>,
        parent: ObjectId,
        postal_id: Option<u64>,
        deadline: Deadline,
    ) -> Result<Vec<AddressObject>> {
        let mut candidates = Vec::new();
        for id in dataset.children(parent)? {
            deadline.check()?;
            if let Some(postal_id) = postal_id {
                if !dataset.is_linked(postal_id, id)? {
                    continue;
                }
            }
            if let Some(child) = dataset.object(id)? {
                if is_lookup_level(child.level) {
                    candidates.push(child);
                }
            }
        }
        sort_by_name(&mut candidates);
        Ok(candidates)
    }
}

/// The postal code of `id` when exactly one is linked to it
fn single_zip<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    id: ObjectId,
) -> Result<Option<String>> {
    match dataset.postal_ids_for(id)?.as_slice() {
        [only] => Ok(dataset.postal_code(*only)?.map(|code| code.zip)),
        _ => Ok(None),
    }
}

/// Case-insensitive order by formal name, ties by id
fn sort_by_name(objects: &mut [AddressObject]) {
    objects.sort_by_cached_key(|o| (o.formal_name().to_lowercase(), o.id));
}
