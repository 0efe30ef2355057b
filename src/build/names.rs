use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{AbbreviationEntry, AddressObject};
use crate::naming::{NameComposer, NameInput, UNNAMED};
use crate::store::{BatchWriter, Dataset, RecordStore, Row};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameStats {
    pub composed: usize,
    /// Rows named by the default rule because their short name contradicted the rule
    pub degraded: usize,
    /// Rows without a classifier code
    pub unresolved: usize,
}

/// Label for objects whose classifier could not be resolved
pub fn fallback_name(object: &AddressObject) -> String {
    let name = [object.short_name.as_deref().unwrap_or(""), object.formal_name()]
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        UNNAMED.to_string()
    } else {
        name
    }
}

/// Compose and store `display_name` for every address object
pub fn fill_display_names<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    composer: &NameComposer,
    batch_size: usize,
) -> Result<NameStats> {
    let mut abbreviations: HashMap<u32, AbbreviationEntry> = HashMap::new();
    for entry in dataset.scan::<AbbreviationEntry>()? {
        let entry = entry?;
        abbreviations.entry(entry.code).or_insert(entry);
    }

    let mut writer = BatchWriter::new(
        dataset.store(),
        dataset.table(AddressObject::KIND),
        batch_size,
    );
    let mut stats = NameStats::default();

    for object in dataset.scan::<AddressObject>()? {
        let mut object = object?;

        let abbreviation = match object.classifier_code {
            0 => None,
            code => abbreviations.get(&code),
        };
        let name = match abbreviation {
            Some(abbreviation) => {
                let composition = composer.compose_input(&NameInput::new(&object, abbreviation));
                if composition.degraded {
                    debug!(
                        "Object {} ({:?}): short name {:?} does not fit {:?}, using default form",
                        object.id, object.formal_name, abbreviation.short_name, composition.category
                    );
                    stats.degraded += 1;
                }
                stats.composed += 1;
                composition.name
            }
            None => {
                stats.unresolved += 1;
                fallback_name(&object)
            }
        };

        if object.display_name != name {
            object.display_name = name;
            writer.put(&object)?;
        }
    }
    writer.finish()?;

    if stats.degraded > 0 {
        warn!(
            "{} display names fell back to the default form",
            stats.degraded
        );
    }
    info!(
        "Composed {} display names ({} without classifier)",
        stats.composed, stats.unresolved
    );
    Ok(stats)
}
