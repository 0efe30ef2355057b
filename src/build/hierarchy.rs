//! Parent GUID to numeric parent id resolution.

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{AddressObject, ObjectId, ROOT_ID};
use crate::store::{pair_key, BatchWriter, Dataset, RecordStore, Row, TableKind};

/// Resolved `id -> parent_id` map for one dataset version
#[derive(Debug, Default)]
pub struct Hierarchy {
    parents: HashMap<ObjectId, ObjectId>,
    pub resolved: usize,
    pub orphans: usize,
}

impl Hierarchy {
    pub fn parent(&self, id: ObjectId) -> ObjectId {
        self.parents.get(&id).copied().unwrap_or(ROOT_ID)
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(ObjectId, ObjectId)]) -> Self {
        Self {
            parents: pairs.iter().copied().collect(),
            resolved: 0,
            orphans: 0,
        }
    }
}

/// Resolve every object's `parent_guid` to a numeric `parent_id` and write the child index.
///
/// Two passes over the table: the first builds a `guid -> id` map, the second
/// rewrites each row. Self-references and unknown parents resolve to the root.
pub fn resolve_parents<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    batch_size: usize,
) -> Result<Hierarchy> {
    let mut ids: HashMap<String, ObjectId> = HashMap::new();
    for object in dataset.scan::<AddressObject>()? {
        let object = object?;
        ids.insert(object.guid, object.id);
    }
    info!("Indexed {} object GUIDs", ids.len());

    let store = dataset.store();
    let mut objects = BatchWriter::new(store, dataset.table(AddressObject::KIND), batch_size);
    let mut children = BatchWriter::new(store, dataset.table(TableKind::ChildIndex), batch_size);
    let mut hierarchy = Hierarchy {
        parents: HashMap::with_capacity(ids.len()),
        ..Default::default()
    };

    for object in dataset.scan::<AddressObject>()? {
        let mut object = object?;

        let parent_id = match object.parent_guid.as_deref() {
            None | Some("") => ROOT_ID,
            Some(guid) if guid == object.guid => ROOT_ID,
            Some(guid) => match ids.get(guid) {
                Some(&id) => {
                    hierarchy.resolved += 1;
                    id
                }
                None => {
                    debug!("Object {} has unknown parent {}", object.guid, guid);
                    hierarchy.orphans += 1;
                    ROOT_ID
                }
            },
        };

        hierarchy.parents.insert(object.id, parent_id);
        children.insert(pair_key(parent_id, object.id).to_vec(), Vec::new())?;
        if object.parent_id != parent_id {
            object.parent_id = parent_id;
            objects.put(&object)?;
        }
    }

    objects.finish()?;
    children.finish()?;

    info!(
        "Resolved {} parents ({} orphans)",
        hierarchy.resolved, hierarchy.orphans
    );
    Ok(hierarchy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledStore;

    fn object(id: u64, guid: &str, parent: Option<&str>, level: u32) -> AddressObject {
        let mut object = AddressObject::new(id, guid, level);
        object.parent_guid = parent.map(str::to_string);
        object
    }

    #[test]
    fn test_resolves_parents_and_children() {
        let store = SledStore::temporary().unwrap();
        let dataset = Dataset::new(&store, 1);
        dataset.create_tables().unwrap();

        for row in [
            object(1, "region", None, 1),
            object(2, "city", Some("region"), 4),
            object(3, "street", Some("city"), 7),
            object(4, "self", Some("self"), 7),
            object(5, "lost", Some("missing"), 7),
        ] {
            dataset.put(&row).unwrap();
        }

        let hierarchy = resolve_parents(&dataset, 2).unwrap();
        assert_eq!(hierarchy.resolved, 2);
        assert_eq!(hierarchy.orphans, 1);
        assert_eq!(hierarchy.parent(3), 2);
        assert_eq!(hierarchy.parent(4), ROOT_ID);

        assert_eq!(dataset.object(3).unwrap().unwrap().parent_id, 2);
        assert_eq!(dataset.object(5).unwrap().unwrap().parent_id, ROOT_ID);
        assert_eq!(dataset.children(1).unwrap(), vec![2]);
        assert_eq!(dataset.children(2).unwrap(), vec![3]);
        assert_eq!(dataset.children(ROOT_ID).unwrap(), vec![1, 4, 5]);
    }
}
