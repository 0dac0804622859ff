use crate::config::{BackendKind, CorrConfig};
use crate::core::cluster::{self, ClusterMerge, MergeOutcome};
use crate::core::frantz::{self, TabulationSummary};
use crate::core::tabulation::{self, Placement, Retabulation};
use crate::core::types::*;
use crate::core::{datum, view, zone};
use crate::document::{export_view, DocumentFragment};
use crate::error::{CorrError, CorrResult};
use crate::persistence::save_to_disk;
use crate::store::{open_store, MemoryStore, Store, Tracked};
use std::path::PathBuf;
use tracing::warn;

// The engine owns the store and the configuration; every operation below is a
// thin pass-through so callers never juggle the two.
pub struct CorrEngine {
    store: MemoryStore,
    config: CorrConfig,
}

impl Default for CorrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrEngine {
    /// In-memory engine with the standard zone chart.
    pub fn new() -> Self {
        let mut store = MemoryStore::new();
        zone::seed_zones(&mut store).expect("seeding an empty in-memory store cannot fail");
        Self {
            store,
            config: CorrConfig::default(),
        }
    }

    pub fn with_config(config: CorrConfig) -> CorrResult<Self> {
        config.validate()?;
        let mut store = open_store(&config)?;
        zone::seed_zones(&mut store)?;
        Ok(Self { store, config })
    }

    /// Opens the snapshot at `path`, starting fresh if it cannot be read.
    ///
    /// A fresh engine that replaced an unreadable snapshot stays in memory,
    /// so `save` never overwrites the file it could not read.
    pub fn from_file_or_new(path: &str) -> Self {
        let config = CorrConfig {
            backend: BackendKind::Snapshot {
                path: PathBuf::from(path),
            },
            ..CorrConfig::default()
        };
        Self::with_config(config).unwrap_or_else(|e| {
            warn!(path, error = %e, "could not open snapshot, starting empty in memory");
            Self::new()
        })
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    pub fn config(&self) -> &CorrConfig {
        &self.config
    }

    pub fn create_collection(&mut self, name: &str) -> CorrResult<WordCollection> {
        view::create_collection(&mut self.store, name)
    }

    pub fn add_variety(
        &mut self,
        collection_id: EntityId,
        name: &str,
        short_name: &str,
        abbreviation: &str,
    ) -> CorrResult<Variety> {
        view::add_variety(&mut self.store, collection_id, name, short_name, abbreviation)
    }

    pub fn add_entry(&mut self, collection_id: EntityId, number: u32, gloss: &str) -> CorrResult<Entry> {
        view::add_entry(&mut self.store, collection_id, number, gloss)
    }

    pub fn add_datum(
        &mut self,
        entry_id: EntityId,
        variety_id: EntityId,
        annotated: &str,
    ) -> CorrResult<(Datum, Vec<Alignment>)> {
        datum::add_datum(&mut self.store, entry_id, variety_id, annotated)
    }

    pub fn realign(&mut self, alignment_id: EntityId, vector: &str) -> CorrResult<Alignment> {
        datum::realign(&mut self.store, alignment_id, vector)
    }

    pub fn set_metathesis(&mut self, alignment_id: EntityId, metathesis: Option<Metathesis>) -> CorrResult<Alignment> {
        datum::set_metathesis(&mut self.store, alignment_id, metathesis)
    }

    /// Creates a view using the configured default threshold.
    pub fn create_view(&mut self, collection_id: EntityId, name: &str, members: Vec<EntityId>) -> CorrResult<View> {
        let threshold = self.config.tabulation.default_threshold;
        view::create_view(&mut self.store, collection_id, name, members, threshold)
    }

    pub fn edit_view(&self, view_id: EntityId) -> CorrResult<Tracked<View>> {
        Tracked::load(&self.store, view_id)
    }

    pub fn update_view(&mut self, view: &Tracked<View>) -> CorrResult<()> {
        view::update_view(&mut self.store, view)
    }

    pub fn create_group(&mut self, view_id: EntityId, entry_id: EntityId, name: &str) -> CorrResult<Group> {
        tabulation::create_group(&mut self.store, view_id, entry_id, name)
    }

    pub fn assign_alignment(&mut self, alignment_id: EntityId, group_id: Option<EntityId>) -> CorrResult<Alignment> {
        tabulation::assign_alignment(&mut self.store, alignment_id, group_id)
    }

    pub fn correspondence_column(&self, group_id: EntityId, column: usize) -> CorrResult<String> {
        tabulation::correspondence_column(&self.store, group_id, column)
    }

    /// Finds the protosegment `symbol` in the zone, creating it if needed.
    pub fn protosegment(&mut self, view_id: EntityId, zone_abbreviation: &str, symbol: &str) -> CorrResult<Protosegment> {
        let zone = zone::find_zone(&self.store, zone_abbreviation)?.ok_or_else(|| {
            CorrError::Validation(crate::error::ValidationError::Other(format!(
                "unknown zone '{zone_abbreviation}'"
            )))
        })?;
        let zone_id = zone.id.unwrap_or_default();
        match zone::find_protosegment(&self.store, view_id, zone_id, symbol)? {
            Some(p) => Ok(p),
            None => zone::create_protosegment(&mut self.store, view_id, zone_id, symbol),
        }
    }

    pub fn tabulate(&mut self, group_id: EntityId, placements: &[Placement]) -> CorrResult<Vec<Citation>> {
        tabulation::tabulate_group(&mut self.store, group_id, placements)
    }

    pub fn retabulate(&mut self, group_id: EntityId) -> CorrResult<Retabulation> {
        tabulation::retabulate(&mut self.store, group_id)
    }

    pub fn add_correspondence_set(&mut self, cluster_id: EntityId, set_id: EntityId) -> CorrResult<MergeOutcome> {
        cluster::add_correspondence_set(&mut self.store, cluster_id, set_id)
    }

    pub fn has_conformable(&self, cluster_id: EntityId, set_id: EntityId) -> CorrResult<bool> {
        let set: CorrespondenceSet = self.store.load(set_id)?;
        cluster::has_conformable(&self.store, cluster_id, &set)
    }

    pub fn merge_clusters(&mut self, from_id: EntityId, into_id: EntityId) -> CorrResult<ClusterMerge> {
        cluster::merge_clusters(&mut self.store, from_id, into_id)
    }

    /// Recomputes Frantz strength for the view; returns the group count the
    /// baseline was drawn from.
    pub fn recompute_strength(&mut self, view_id: EntityId) -> CorrResult<usize> {
        frantz::compute_strength(&mut self.store, view_id, &self.config)
    }

    pub fn summary(&self, view_id: EntityId) -> CorrResult<TabulationSummary> {
        frantz::summarize_view(&self.store, view_id)
    }

    pub fn export_view(&self, view_id: EntityId) -> CorrResult<DocumentFragment> {
        export_view(&self.store, view_id)
    }

    /// Writes the snapshot when the backend has one; in-memory engines have
    /// nothing to save.
    pub fn save(&self) -> CorrResult<()> {
        match &self.config.backend {
            BackendKind::Snapshot { path } => save_to_disk(&self.store, path),
            BackendKind::InMemory => Ok(()),
        }
    }
}
