//! Classifier code assignment and canonical abbreviation display forms.

use hashbrown::HashMap;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::level::UNCLASSIFIED_LEVELS;
use crate::models::{AbbreviationEntry, AddressObject};
use crate::store::{BatchWriter, Dataset, RecordStore, Row};

/// How an abbreviation's short name is rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayForm {
    /// Short name followed by a period
    Dot,
    Upper,
    Literal(&'static str),
}

impl DisplayForm {
    pub fn render(&self, short_name: &str) -> String {
        match self {
            DisplayForm::Dot => format!("{}.", short_name),
            DisplayForm::Upper => short_name.to_uppercase(),
            DisplayForm::Literal(literal) => literal.to_string(),
        }
    }
}

/// Override for one classifier code, valid only while the feed still uses `expected_short`
#[derive(Debug, Clone, Copy)]
pub struct DisplayOverride {
    pub code: u32,
    pub expected_short: &'static str,
    pub form: DisplayForm,
}

const fn dot(code: u32, expected_short: &'static str) -> DisplayOverride {
    DisplayOverride {
        code,
        expected_short,
        form: DisplayForm::Dot,
    }
}

const fn upper(code: u32, expected_short: &'static str) -> DisplayOverride {
    DisplayOverride {
        code,
        expected_short,
        form: DisplayForm::Upper,
    }
}

const fn literal(code: u32, expected_short: &'static str, text: &'static str) -> DisplayOverride {
    DisplayOverride {
        code,
        expected_short,
        form: DisplayForm::Literal(text),
    }
}

pub static DISPLAY_OVERRIDES: &[DisplayOverride] = &[
    literal(102, "Аобл", "АО"),
    dot(103, "г"),
    dot(105, "обл"),
    literal(106, "Респ", "респ."),
    dot(306, "п"),
    dot(303, "тер"),
    dot(302, "у"),
    dot(401, "г"),
    upper(405, "дп"),
    upper(404, "кп"),
    dot(417, "п"),
    dot(412, "тер"),
    dot(502, "тер"),
    dot(604, "высел"),
    dot(605, "г"),
    dot(606, "д"),
    dot(617, "м"),
    dot(621, "п"),
    dot(630, "с"),
    dot(631, "сл"),
    upper(641, "снт"),
    dot(632, "ст"),
    dot(637, "тер"),
    dot(634, "у"),
    dot(635, "х"),
    upper(763, "гск"),
    dot(736, "д"),
    upper(787, "днп"),
    dot(704, "дор"),
    dot(744, "м"),
    dot(711, "наб"),
    dot(714, "пер"),
    dot(9114, "пер"),
    dot(716, "пл"),
    dot(747, "платф"),
    dot(755, "с"),
    dot(756, "сл"),
    dot(757, "ст"),
    dot(725, "стр"),
    dot(726, "тер"),
    dot(728, "туп"),
    dot(729, "ул"),
    dot(9129, "ул"),
    dot(758, "х"),
    dot(731, "ш"),
];

pub fn display_override(code: u32) -> Option<&'static DisplayOverride> {
    DISPLAY_OVERRIDES.iter().find(|o| o.code == code)
}

/// Canonical display form for an abbreviation.
///
/// Fails when an override exists for the code but the feed's short name
/// has drifted from the one the override was written for.
pub fn display_form_for(entry: &AbbreviationEntry) -> Result<String> {
    match display_override(entry.code) {
        None => Ok(entry.short_name.clone()),
        Some(o) if o.expected_short == entry.short_name => Ok(o.form.render(&entry.short_name)),
        Some(o) => Err(Error::ResolutionInconsistency(format!(
            "classifier code {} has short name {:?}, display override expects {:?}",
            entry.code, entry.short_name, o.expected_short
        ))),
    }
}

/// Compute and store `display_form` for every abbreviation
pub fn fill_display_forms<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    batch_size: usize,
) -> Result<usize> {
    let mut writer = BatchWriter::new(
        dataset.store(),
        dataset.table(AbbreviationEntry::KIND),
        batch_size,
    );

    let mut count = 0;
    for entry in dataset.scan::<AbbreviationEntry>()? {
        let mut entry = entry?;
        let form = display_form_for(&entry)?;
        if form != entry.display_form {
            entry.display_form = form;
            writer.put(&entry)?;
        }
        count += 1;
    }
    writer.finish()?;

    info!("Computed display forms for {} abbreviations", count);
    Ok(count)
}

/// `(level, short name) -> code`, keeping the first entry of each pair
pub fn abbreviation_codes<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
) -> Result<(HashMap<(u32, String), u32>, usize)> {
    let mut codes = HashMap::new();
    let mut duplicates = 0;
    for entry in dataset.scan::<AbbreviationEntry>()? {
        let entry = entry?;
        let key = (entry.level, entry.short_name.clone());
        match codes.get(&key) {
            Some(existing) => {
                warn!(
                    "Duplicate abbreviation {:?} at level {} (codes {} and {}); keeping {}",
                    entry.short_name, entry.level, existing, entry.code, existing
                );
                duplicates += 1;
            }
            None => {
                codes.insert(key, entry.code);
            }
        }
    }
    Ok((codes, duplicates))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    pub assigned: usize,
    pub unmatched: usize,
    pub duplicate_abbreviations: usize,
}

/// Assign `classifier_code` by matching each object's `(level, short_name)`
/// against the abbreviation table. Additional-territory levels are skipped.
pub fn assign_codes<S: RecordStore + ?Sized>(
    dataset: &Dataset<'_, S>,
    batch_size: usize,
) -> Result<ClassifierStats> {
    let (codes, duplicates) = abbreviation_codes(dataset)?;
    let mut stats = ClassifierStats {
        duplicate_abbreviations: duplicates,
        ..Default::default()
    };

    let mut writer = BatchWriter::new(
        dataset.store(),
        dataset.table(AddressObject::KIND),
        batch_size,
    );

    for object in dataset.scan::<AddressObject>()? {
        let mut object = object?;
        if UNCLASSIFIED_LEVELS.contains(&object.level) {
            continue;
        }

        let code = object
            .short_name
            .as_ref()
            .and_then(|short| codes.get(&(object.level, short.clone())).copied());

        match code {
            Some(code) => {
                stats.assigned += 1;
                if object.classifier_code != code {
                    object.classifier_code = code;
                    writer.put(&object)?;
                }
            }
            None => stats.unmatched += 1,
        }
    }
    writer.finish()?;

    info!(
        "Assigned classifier codes to {} objects ({} unmatched)",
        stats.assigned, stats.unmatched
    );
    Ok(stats)
}
