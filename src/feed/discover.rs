use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

const ADDRESS_OBJECT_PREFIX: &str = "as_addrobj_";
const ABBREVIATION_PREFIX: &str = "as_socrbase_";

/// The two documents a build consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFiles {
    pub address_objects: PathBuf,
    pub abbreviations: PathBuf,
}

impl FeedFiles {
    /// Locate `AS_ADDROBJ_*.XML` and `AS_SOCRBASE_*.XML` (optionally `.gz`) under `dir`.
    ///
    /// Names are matched case-insensitively. When several dumps of one kind
    /// are present the lexicographically last, i.e. the newest stamp, wins.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Looking for feed documents in {}", dir.display());

        let mut address_objects = Vec::new();
        let mut abbreviations = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let lower = file_name.to_lowercase();
            if !(lower.ends_with(".xml") || lower.ends_with(".xml.gz")) {
                continue;
            }

            if lower.starts_with(ADDRESS_OBJECT_PREFIX) {
                address_objects.push(path.to_path_buf());
            } else if lower.starts_with(ABBREVIATION_PREFIX) {
                abbreviations.push(path.to_path_buf());
            }
        }

        Ok(Self {
            address_objects: pick_newest(address_objects, "AS_ADDROBJ", dir)?,
            abbreviations: pick_newest(abbreviations, "AS_SOCRBASE", dir)?,
        })
    }

    /// Upstream date stamp from the address object file name, e.g. `20240101`
    /// from `AS_ADDROBJ_20240101_<uuid>.XML`
    pub fn source_date(&self) -> Option<String> {
        let name = self.address_objects.file_name()?.to_str()?;
        let stamp: String = name
            .get(ADDRESS_OBJECT_PREFIX.len()..)?
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        (stamp.len() == 8).then_some(stamp)
    }
}

fn pick_newest(mut found: Vec<PathBuf>, kind: &str, dir: &Path) -> Result<PathBuf> {
    found.sort();
    if found.len() > 1 {
        warn!(
            "{} documents of kind {} in {}, using the newest",
            found.len(),
            kind,
            dir.display()
        );
    }
    found
        .pop()
        .ok_or_else(|| Error::NotFound(format!("{}_*.XML in {}", kind, dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_both_documents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("fias")).unwrap();
        fs::write(dir.path().join("fias/AS_ADDROBJ_20240101_abc.XML"), "").unwrap();
        fs::write(dir.path().join("fias/as_socrbase_20240101_def.xml.gz"), "").unwrap();
        fs::write(dir.path().join("fias/AS_DEL_ADDROBJ_20240101.XML"), "").unwrap();
        fs::write(dir.path().join("readme.txt"), "").unwrap();

        let files = FeedFiles::discover(dir.path()).unwrap();
        assert!(files
            .address_objects
            .ends_with("fias/AS_ADDROBJ_20240101_abc.XML"));
        assert!(files
            .abbreviations
            .ends_with("fias/as_socrbase_20240101_def.xml.gz"));
        assert_eq!(files.source_date().as_deref(), Some("20240101"));
    }

    #[test]
    fn test_source_date_needs_full_stamp() {
        let files = FeedFiles {
            address_objects: PathBuf::from("/feed/AS_ADDROBJ_2024.XML"),
            abbreviations: PathBuf::from("/feed/AS_SOCRBASE_2024.XML"),
        };
        assert_eq!(files.source_date(), None);
    }

    #[test]
    fn test_newest_dump_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AS_ADDROBJ_20230101.XML"), "").unwrap();
        fs::write(dir.path().join("AS_ADDROBJ_20240101.XML"), "").unwrap();
        fs::write(dir.path().join("AS_SOCRBASE_20240101.XML"), "").unwrap();

        let files = FeedFiles::discover(dir.path()).unwrap();
        assert!(files.address_objects.ends_with("AS_ADDROBJ_20240101.XML"));
    }

    #[test]
    fn test_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AS_ADDROBJ_20240101.XML"), "").unwrap();

        let err = FeedFiles::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
