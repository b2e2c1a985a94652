//! Per-unit indexing pipeline: build, serialize, collect, commit.
//!
//! Units are independent, so batches run on the rayon pool; the registry,
//! char table and store are the only shared state. A failing unit is logged
//! and reported without affecting the others.

use crate::builder::{CancellationToken, StubBuilder};
use crate::codec::StubSerializer;
use crate::element_type::ElementTypeRegistry;
use crate::error::{Result, StubError};
use crate::index_sink::collect_index_entries;
use crate::index_store::{CommitOutcome, ReverseIndexStore, UnitId};
use crate::light_tree::LightTree;
use crate::string_interner::CharTable;
use crate::stub::StubTree;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Supplies the light tree of a source unit.
pub trait SourceProvider: Send + Sync {
    fn light_tree(&self, unit: &UnitId) -> Result<LightTree>;
}

impl<F> SourceProvider for F
where
    F: Fn(&UnitId) -> Result<LightTree> + Send + Sync,
{
    fn light_tree(&self, unit: &UnitId) -> Result<LightTree> {
        self(unit)
    }
}

/// Monotonically increasing rebuild sequence numbers.
#[derive(Debug, Default)]
pub struct RebuildSequencer(AtomicU64);

impl RebuildSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct IndexedUnit {
    pub unit: UnitId,
    pub sequence: u64,
    pub tree: Arc<StubTree>,
    pub bytes: Vec<u8>,
    pub entry_count: usize,
    pub outcome: CommitOutcome,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The persisted blob was current and has been re-sunk.
    Loaded(IndexedUnit),
    /// The blob was unusable; the unit was rebuilt from source.
    Rebuilt { unit: IndexedUnit, reason: StubError },
}

impl LoadOutcome {
    pub fn indexed(&self) -> &IndexedUnit {
        match self {
            Self::Loaded(unit) | Self::Rebuilt { unit, .. } => unit,
        }
    }

    pub fn was_rebuilt(&self) -> bool {
        matches!(self, Self::Rebuilt { .. })
    }
}

#[derive(Debug, Default)]
pub struct IndexingReport {
    pub indexed: Vec<IndexedUnit>,
    pub failures: Vec<(UnitId, StubError)>,
}

impl IndexingReport {
    pub fn total_stubs(&self) -> usize {
        self.indexed.iter().map(|u| u.tree.len()).sum()
    }

    pub fn total_entries(&self) -> usize {
        self.indexed.iter().map(|u| u.entry_count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadOutcome>,
    pub failures: Vec<(UnitId, StubError)>,
}

impl LoadReport {
    pub fn rebuilt_count(&self) -> usize {
        self.loaded.iter().filter(|o| o.was_rebuilt()).count()
    }
}

pub struct UnitIndexer<P> {
    registry: Arc<ElementTypeRegistry>,
    provider: P,
    store: Arc<dyn ReverseIndexStore>,
    sequencer: RebuildSequencer,
    chars: Arc<CharTable>,
}

impl<P: SourceProvider> UnitIndexer<P> {
    pub fn new(
        registry: Arc<ElementTypeRegistry>,
        provider: P,
        store: Arc<dyn ReverseIndexStore>,
    ) -> Self {
        Self {
            registry,
            provider,
            store,
            sequencer: RebuildSequencer::new(),
            chars: Arc::new(CharTable::new()),
        }
    }

    pub fn with_char_table(mut self, chars: Arc<CharTable>) -> Self {
        self.chars = chars;
        self
    }

    pub fn registry(&self) -> &Arc<ElementTypeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ReverseIndexStore> {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn char_table(&self) -> &Arc<CharTable> {
        &self.chars
    }

    /// Builds the stub tree of `unit` without touching the store.
    pub fn build_unit(&self, unit: &UnitId, token: Option<&CancellationToken>) -> Result<StubTree> {
        let light = self.provider.light_tree(unit)?;
        let walker = light.walker(&self.chars);
        let mut builder = StubBuilder::new(&self.registry);
        if let Some(token) = token {
            builder = builder.with_cancellation(token.clone());
        }
        builder.build(&walker)
    }

    pub fn index_unit(
        &self,
        unit: &UnitId,
        token: Option<&CancellationToken>,
    ) -> Result<IndexedUnit> {
        let sequence = self.sequencer.next();
        let tree = self.build_unit(unit, token).map_err(|e| {
            if e.is_structural() || matches!(e, StubError::Source { .. }) {
                warn!("no stub data for {}: {}", unit, e);
                // 古いエントリを残さない
                let outcome = self.store.remove_unit(unit, sequence);
                debug!("retired {} (seq {}): {:?}", unit, sequence, outcome);
            }
            e
        })?;
        let bytes = StubSerializer::new(&self.registry).serialize(&tree)?;
        self.sink(unit, sequence, Arc::new(tree), bytes, token)
    }

    fn sink(
        &self,
        unit: &UnitId,
        sequence: u64,
        tree: Arc<StubTree>,
        bytes: Vec<u8>,
        token: Option<&CancellationToken>,
    ) -> Result<IndexedUnit> {
        let entries = collect_index_entries(&self.registry, &tree)?;
        // 破棄されたビルドはストアに入れない
        if token.map(|t| t.is_cancelled()).unwrap_or(false) {
            return Err(StubError::Cancelled);
        }
        let entry_count = entries.len();
        let outcome = self.store.commit(unit, sequence, entries);
        debug!(
            "indexed {} (seq {}): {} stub(s), {} entr(ies), {:?}",
            unit,
            sequence,
            tree.len(),
            entry_count,
            outcome
        );
        Ok(IndexedUnit {
            unit: unit.clone(),
            sequence,
            tree,
            bytes,
            entry_count,
            outcome,
        })
    }

    /// Indexes all units in parallel; one failing unit never blocks another.
    pub fn index_units(&self, units: &[UnitId]) -> IndexingReport {
        let results: Vec<(UnitId, Result<IndexedUnit>)> = units
            .par_iter()
            .map(|unit| (unit.clone(), self.index_unit(unit, None)))
            .collect();

        let mut report = IndexingReport::default();
        for (unit, result) in results {
            match result {
                Ok(indexed) => report.indexed.push(indexed),
                Err(e) => report.failures.push((unit, e)),
            }
        }
        info!(
            "indexed {} unit(s), {} stub(s), {} entr(ies), {} failure(s)",
            report.indexed.len(),
            report.total_stubs(),
            report.total_entries(),
            report.failures.len()
        );
        report
    }

    /// Deserialize-for-reindex pass over one persisted blob. Integrity
    /// failures discard the blob and rebuild from source.
    pub fn load_unit(&self, unit: &UnitId, bytes: &[u8]) -> Result<LoadOutcome> {
        let sequence = self.sequencer.next();
        match StubSerializer::new(&self.registry).deserialize(bytes) {
            Ok(tree) => {
                let indexed = self.sink(unit, sequence, Arc::new(tree), bytes.to_vec(), None)?;
                Ok(LoadOutcome::Loaded(indexed))
            }
            Err(reason) if reason.is_integrity_failure() => {
                warn!("discarding stored stubs of {}: {}", unit, reason);
                let indexed = self.index_unit(unit, None)?;
                Ok(LoadOutcome::Rebuilt {
                    unit: indexed,
                    reason,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn load_units(&self, blobs: Vec<(UnitId, Vec<u8>)>) -> LoadReport {
        let results: Vec<(UnitId, Result<LoadOutcome>)> = blobs
            .into_par_iter()
            .map(|(unit, bytes)| {
                let result = self.load_unit(&unit, &bytes);
                (unit, result)
            })
            .collect();

        let mut report = LoadReport::default();
        for (unit, result) in results {
            match result {
                Ok(outcome) => report.loaded.push(outcome),
                Err(e) => report.failures.push((unit, e)),
            }
        }
        report
    }

    pub fn remove_unit(&self, unit: &UnitId) -> CommitOutcome {
        self.store.remove_unit(unit, self.sequencer.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::InMemoryIndexStore;
    use crate::light_tree::LightTreeBuilder;
    use crate::test_fixtures::{generic_class_tree, toy_registry, TOY_CLASS_INDEX};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// 名前でクラスを返す、テスト用ソース
    struct MapProvider {
        sources: Mutex<HashMap<String, (String, Vec<&'static str>)>>,
    }

    impl MapProvider {
        fn new(units: &[(&str, &str, Vec<&'static str>)]) -> Self {
            Self {
                sources: Mutex::new(
                    units
                        .iter()
                        .map(|(unit, class, params)| {
                            (unit.to_string(), (class.to_string(), params.clone()))
                        })
                        .collect(),
                ),
            }
        }

        fn set(&self, unit: &str, class: &str) {
            self.sources
                .lock()
                .insert(unit.to_string(), (class.to_string(), Vec::new()));
        }
    }

    impl SourceProvider for MapProvider {
        fn light_tree(&self, unit: &UnitId) -> Result<LightTree> {
            let sources = self.sources.lock();
            match sources.get(unit.as_str()) {
                Some((class, _)) if class == "<broken>" => {
                    // identifier のないクラス宣言
                    let mut b = LightTreeBuilder::new();
                    b.start_node("file").start_node("class").finish_node().finish_node();
                    b.finish()
                }
                Some((class, params)) => Ok(generic_class_tree(class, params)),
                None => Err(StubError::Source {
                    unit: unit.to_string(),
                    message: "no such unit".to_string(),
                }),
            }
        }
    }

    fn indexer(provider: MapProvider) -> (UnitIndexer<MapProvider>, Arc<InMemoryIndexStore>) {
        let store = Arc::new(InMemoryIndexStore::new());
        let indexer = UnitIndexer::new(toy_registry(), provider, store.clone());
        (indexer, store)
    }

    #[test]
    fn test_structural_violation_is_isolated() {
        let (indexer, store) = indexer(MapProvider::new(&[
            ("a.toy", "<broken>", vec![]),
            ("b.toy", "Beta", vec!["T"]),
        ]));

        let report = indexer.index_units(&[UnitId::from("a.toy"), UnitId::from("b.toy")]);

        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, UnitId::from("a.toy"));
        assert!(report.failures[0].1.is_structural());

        let hits = store.query(TOY_CLASS_INDEX, "Beta");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit, UnitId::from("b.toy"));
        assert!(store.unit_sequence(&UnitId::from("a.toy")).is_none());
    }

    #[test]
    fn test_failed_rebuild_retires_previous_entries() {
        let (indexer, store) = indexer(MapProvider::new(&[
            ("a.toy", "Old", vec![]),
            ("b.toy", "Other", vec![]),
        ]));
        let a = UnitId::from("a.toy");
        let b = UnitId::from("b.toy");
        indexer.index_unit(&a, None).unwrap();
        indexer.index_unit(&b, None).unwrap();

        indexer.provider().set("a.toy", "<broken>");
        let err = indexer.index_unit(&a, None).unwrap_err();
        assert!(err.is_structural());
        assert!(store.query(TOY_CLASS_INDEX, "Old").is_empty());
        assert!(store.unit_sequence(&a).is_none());

        // ソースが消えた場合も同様
        indexer.provider().sources.lock().remove("b.toy");
        let err = indexer.index_unit(&b, None).unwrap_err();
        assert!(matches!(err, StubError::Source { .. }));
        assert!(store.query(TOY_CLASS_INDEX, "Other").is_empty());
        assert_eq!(store.unit_count(), 0);
    }

    #[test]
    fn test_reindex_replaces_entries() {
        let (indexer, store) = indexer(MapProvider::new(&[("a.toy", "First", vec![])]));
        let unit = UnitId::from("a.toy");

        indexer.index_unit(&unit, None).unwrap();
        indexer.provider().set("a.toy", "Second");
        let second = indexer.index_unit(&unit, None).unwrap();

        assert!(matches!(second.outcome, CommitOutcome::Committed { replaced: 1, added: 1 }));
        assert!(store.query(TOY_CLASS_INDEX, "First").is_empty());
        assert_eq!(store.query(TOY_CLASS_INDEX, "Second").len(), 1);
    }

    #[test]
    fn test_cancelled_build_is_never_committed() {
        let (indexer, store) = indexer(MapProvider::new(&[("a.toy", "Gone", vec![])]));
        let token = CancellationToken::new();
        token.cancel();

        let err = indexer
            .index_unit(&UnitId::from("a.toy"), Some(&token))
            .unwrap_err();
        assert_eq!(err, StubError::Cancelled);
        assert_eq!(store.unit_count(), 0);
    }

    #[test]
    fn test_load_current_blob() {
        let (indexer, store) = indexer(MapProvider::new(&[("a.toy", "Stored", vec!["T"])]));
        let unit = UnitId::from("a.toy");
        let bytes = indexer.index_unit(&unit, None).unwrap().bytes;
        indexer.remove_unit(&unit);
        assert!(store.query(TOY_CLASS_INDEX, "Stored").is_empty());

        let outcome = indexer.load_unit(&unit, &bytes).unwrap();
        assert!(!outcome.was_rebuilt());
        assert_eq!(outcome.indexed().tree.len(), 3);
        assert_eq!(store.query(TOY_CLASS_INDEX, "Stored").len(), 1);
    }

    #[test]
    fn test_corrupt_blob_triggers_rebuild() {
        let (indexer, store) = indexer(MapProvider::new(&[
            ("stale.toy", "Fresh", vec![]),
            ("cut.toy", "Whole", vec!["T"]),
        ]));

        let mut stale = 12345u64.to_le_bytes().to_vec();
        stale.push(0);
        let good = indexer.index_unit(&UnitId::from("cut.toy"), None).unwrap().bytes;
        let cut = good[..good.len() - 1].to_vec();

        let report = indexer.load_units(vec![
            (UnitId::from("stale.toy"), stale),
            (UnitId::from("cut.toy"), cut),
        ]);

        assert!(report.failures.is_empty());
        assert_eq!(report.rebuilt_count(), 2);
        for outcome in &report.loaded {
            match outcome {
                LoadOutcome::Rebuilt { reason, .. } => assert!(reason.is_integrity_failure()),
                LoadOutcome::Loaded(_) => panic!("expected rebuild"),
            }
        }
        assert_eq!(store.query(TOY_CLASS_INDEX, "Fresh").len(), 1);
        assert_eq!(store.query(TOY_CLASS_INDEX, "Whole").len(), 1);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let (indexer, _) = indexer(MapProvider::new(&[]));
        let report = indexer.index_units(&[UnitId::from("ghost.toy")]);
        assert!(matches!(report.failures[0].1, StubError::Source { .. }));
    }

    #[test]
    fn test_sequencer_is_monotonic() {
        let sequencer = RebuildSequencer::new();
        let mut values: Vec<u64> = (0..100).into_par_iter().map(|_| sequencer.next()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 100);
        assert_eq!(sequencer.current(), 100);
    }
}
