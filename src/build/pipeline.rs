use std::io::BufRead;
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::info;

use super::classifier::{assign_codes, fill_display_forms};
use super::hierarchy::resolve_parents;
use super::names::fill_display_names;
use super::postal::build_postal_index;
use crate::config::BuildConfig;
use crate::error::Result;
use crate::feed::{open_document, FeedFiles, FeedLoader};
use crate::naming::NameComposer;
use crate::store::{Dataset, RecordStore};

/// Counters collected over one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub objects_loaded: usize,
    pub abbreviations_loaded: usize,
    pub parents_resolved: usize,
    pub orphans: usize,
    pub postal_codes: usize,
    pub postal_links: usize,
    pub truncated_walks: usize,
    pub codes_assigned: usize,
    pub duplicate_abbreviations: usize,
    pub names_composed: usize,
    pub names_degraded: usize,
    pub names_unresolved: usize,
}

impl BuildReport {
    pub fn log(&self) {
        info!(
            "Loaded {} address objects and {} abbreviations",
            self.objects_loaded, self.abbreviations_loaded
        );
        info!(
            "Hierarchy: {} parents resolved, {} orphans",
            self.parents_resolved, self.orphans
        );
        info!(
            "Postal index: {} codes, {} links, {} truncated walks",
            self.postal_codes, self.postal_links, self.truncated_walks
        );
        info!(
            "Classifier: {} codes assigned, {} duplicate abbreviations",
            self.codes_assigned, self.duplicate_abbreviations
        );
        info!(
            "Names: {} composed, {} degraded, {} without classifier",
            self.names_composed, self.names_degraded, self.names_unresolved
        );
    }
}

/// Runs every build stage, in order, against one dataset version.
///
/// The pipeline only fills tables; creating them and publishing the version
/// is left to [`crate::version::VersionManager`].
pub struct BuildPipeline {
    config: BuildConfig,
    composer: NameComposer,
    progress: ProgressBar,
}

impl BuildPipeline {
    pub fn new(config: BuildConfig) -> Result<Self> {
        Ok(Self {
            config,
            composer: NameComposer::new()?,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Build from feed documents on disk
    pub fn run<S: RecordStore + ?Sized>(
        &self,
        dataset: &Dataset<'_, S>,
        feed: &FeedFiles,
    ) -> Result<BuildReport> {
        info!(
            "Building version {} from {} and {}",
            dataset.version(),
            feed.address_objects.display(),
            feed.abbreviations.display()
        );
        self.run_sources(
            dataset,
            open_document(&feed.address_objects)?,
            open_document(&feed.abbreviations)?,
        )
    }

    /// Build from any pair of readable feed documents
    pub fn run_sources<S, A, B>(
        &self,
        dataset: &Dataset<'_, S>,
        address_objects: A,
        abbreviations: B,
    ) -> Result<BuildReport>
    where
        S: RecordStore + ?Sized,
        A: BufRead,
        B: BufRead,
    {
        let started = Instant::now();
        let batch_size = self.config.batch_size;
        let mut report = BuildReport::default();

        let loader = FeedLoader::new(dataset, batch_size).with_progress(self.progress.clone());
        report.objects_loaded = loader.load_address_objects(address_objects)?;
        report.abbreviations_loaded = loader.load_abbreviations(abbreviations)?;

        self.progress.set_message("Resolving hierarchy");
        let hierarchy = resolve_parents(dataset, batch_size)?;
        report.parents_resolved = hierarchy.resolved;
        report.orphans = hierarchy.orphans;

        self.progress.set_message("Linking postal codes");
        let postal = build_postal_index(dataset, &hierarchy, batch_size, self.config.max_depth)?;
        drop(hierarchy);
        report.postal_codes = postal.codes;
        report.postal_links = postal.links;
        report.truncated_walks = postal.truncated_walks;

        self.progress.set_message("Resolving classifier codes");
        let classifier = assign_codes(dataset, batch_size)?;
        report.codes_assigned = classifier.assigned;
        report.duplicate_abbreviations = classifier.duplicate_abbreviations;
        fill_display_forms(dataset, batch_size)?;

        self.progress.set_message("Composing display names");
        let names = fill_display_names(dataset, &self.composer, batch_size)?;
        report.names_composed = names.composed;
        report.names_degraded = names.degraded;
        report.names_unresolved = names.unresolved;

        dataset.store().flush()?;
        self.progress.finish_and_clear();

        info!(
            "Version {} built in {:.1}s",
            dataset.version(),
            started.elapsed().as_secs_f64()
        );
        report.log();
        Ok(report)
    }
}
