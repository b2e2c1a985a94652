use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stub_core::{
    ElementTypeRegistry, InMemoryIndexStore, LoadReport, ReverseIndexStore, StubError,
    StubSerializer, StubTree, UnitId, UnitIndexer, UnitLocation,
};
use stub_java::{index_by_name, shared_java_registry, JavaFileProvider};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{IndexerConfig, EXCLUDED_DIRS};
use crate::storage::{CacheMetadata, StubCache};

/// スキャンされたソースファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedUnit {
    pub unit: UnitId,
    /// コンテンツハッシュ（xxHash3）
    pub hash: String,
}

/// 差分インデックスの結果
#[derive(Debug, Default)]
pub struct ProjectIndexResult {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// レジストリのバージョン変更や `--force` でキャッシュを捨てたか
    pub full_rebuild: bool,
    pub stubs: usize,
    pub entries: usize,
    pub failures: Vec<(UnitId, StubError)>,
    pub duration: Duration,
}

impl ProjectIndexResult {
    pub fn indexed(&self) -> usize {
        self.added + self.modified - self.failures.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub units: usize,
    pub stubs: usize,
    pub bytes: usize,
    /// Blobs the current registry can no longer read.
    pub stale: usize,
    pub registry_version: u64,
    pub stored_version: Option<u64>,
}

/// Stub index of one project directory, persisted in sled.
pub struct ProjectIndexer {
    config: IndexerConfig,
    cache: StubCache,
    registry: Arc<ElementTypeRegistry>,
}

impl ProjectIndexer {
    pub fn open(config: IndexerConfig) -> Result<Self> {
        let cache = StubCache::open(&config.db_path)
            .with_context(|| format!("Failed to open stub cache at {}", config.db_path.display()))?;
        let registry = shared_java_registry()?;
        Ok(Self {
            config,
            cache,
            registry,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn cache(&self) -> &StubCache {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ElementTypeRegistry> {
        &self.registry
    }

    /// プロジェクト内の対象ファイルを列挙してハッシュを計算する
    pub fn scan(&self) -> Result<Vec<ScannedUnit>> {
        let root = &self.config.project_root;
        let mut scanned = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_excluded(e.path(), root))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !self.config.matches_extension(path) {
                continue;
            }

            if let Some(unit) = scan_file(root, path)? {
                scanned.push(unit);
            }
        }

        scanned.sort_by(|a, b| a.unit.cmp(&b.unit));
        debug!("Scanned {} source file(s) under {}", scanned.len(), root.display());
        Ok(scanned)
    }

    /// 変更のあったユニットだけを再構築してキャッシュに保存する
    pub fn index(&self, force: bool) -> Result<ProjectIndexResult> {
        let start = Instant::now();
        let registry_version = self.registry.version();

        let mut result = ProjectIndexResult::default();
        let mut metadata = match self.cache.load_metadata()? {
            Some(metadata) if !force && metadata.registry_version == registry_version => metadata,
            previous => {
                if let Some(previous) = previous {
                    info!(
                        "Discarding cached stubs (version {:016x} -> {:016x}, force: {})",
                        previous.registry_version, registry_version, force
                    );
                }
                self.cache.clear_stubs()?;
                result.full_rebuild = true;
                CacheMetadata::new(registry_version, self.config.clone())
            }
        };

        let scanned = self.scan()?;
        let seen: HashSet<&str> = scanned.iter().map(|s| s.unit.as_str()).collect();

        let removed: Vec<String> = metadata
            .file_hashes
            .keys()
            .filter(|unit| !seen.contains(unit.as_str()))
            .cloned()
            .collect();
        for unit in &removed {
            self.cache.remove_stubs(&UnitId::new(unit))?;
            metadata.file_hashes.remove(unit);
        }
        result.removed = removed.len();

        let mut changed = Vec::new();
        for scanned_unit in &scanned {
            match metadata.file_hashes.get(scanned_unit.unit.as_str()) {
                Some(hash) if *hash == scanned_unit.hash => result.unchanged += 1,
                Some(_) => {
                    result.modified += 1;
                    changed.push(scanned_unit.unit.clone());
                }
                None => {
                    result.added += 1;
                    changed.push(scanned_unit.unit.clone());
                }
            }
        }

        let store = Arc::new(InMemoryIndexStore::new());
        let indexer = self.unit_indexer(store);
        let report = match self.config.thread_pool()? {
            Some(pool) => pool.install(|| indexer.index_units(&changed)),
            None => indexer.index_units(&changed),
        };

        let hashes: BTreeMap<&str, &str> = scanned
            .iter()
            .map(|s| (s.unit.as_str(), s.hash.as_str()))
            .collect();
        for indexed in &report.indexed {
            self.cache.save_stubs(&indexed.unit, &indexed.bytes)?;
            if let Some(hash) = hashes.get(indexed.unit.as_str()) {
                metadata
                    .file_hashes
                    .insert(indexed.unit.to_string(), hash.to_string());
            }
        }
        // 失敗したユニットは次回も再試行する
        for (unit, error) in &report.failures {
            warn!("Failed to index {}: {}", unit, error);
            self.cache.remove_stubs(unit)?;
            metadata.file_hashes.remove(unit.as_str());
        }

        result.stubs = report.total_stubs();
        result.entries = report.total_entries();
        result.failures = report.failures;

        metadata.updated_at = chrono::Utc::now();
        metadata.config = self.config.clone();
        self.cache.save_metadata(&metadata)?;
        self.cache.flush()?;

        result.duration = start.elapsed();
        info!(
            "Indexed project: +{} ~{} -{} ={} in {:?}",
            result.added, result.modified, result.removed, result.unchanged, result.duration
        );
        Ok(result)
    }

    /// キャッシュからストアを復元する（読めないスタブはソースから再構築）
    pub fn load_store(&self) -> Result<(Arc<InMemoryIndexStore>, LoadReport)> {
        let store = Arc::new(InMemoryIndexStore::new());
        let indexer = self.unit_indexer(Arc::clone(&store));
        let blobs = self.cache.all_stubs()?;
        let report = match self.config.thread_pool()? {
            Some(pool) => pool.install(|| indexer.load_units(blobs)),
            None => indexer.load_units(blobs),
        };

        for outcome in report.loaded.iter().filter(|o| o.was_rebuilt()) {
            let indexed = outcome.indexed();
            self.cache.save_stubs(&indexed.unit, &indexed.bytes)?;
        }
        for (unit, error) in &report.failures {
            warn!("Dropping stubs of {}: {}", unit, error);
            self.cache.remove_stubs(unit)?;
        }
        if !report.failures.is_empty() {
            // ハッシュも消して次回の `index` で再試行させる
            if let Some(mut metadata) = self.cache.load_metadata()? {
                for (unit, _) in &report.failures {
                    metadata.file_hashes.remove(unit.as_str());
                }
                self.cache.save_metadata(&metadata)?;
            }
        }
        if report.rebuilt_count() > 0 || !report.failures.is_empty() {
            self.cache.flush()?;
        }

        debug!(
            "Loaded {} unit(s), {} rebuilt, {} failure(s)",
            report.loaded.len(),
            report.rebuilt_count(),
            report.failures.len()
        );
        Ok((store, report))
    }

    /// Looks `key` up in the index named `index_name`.
    pub fn query(&self, index_name: &str, key: &str) -> Result<Vec<UnitLocation>> {
        let index = index_by_name(index_name).ok_or_else(|| anyhow!("Unknown index: {}", index_name))?;
        let (store, _) = self.load_store()?;
        Ok(store.query(index, key))
    }

    /// Stored stub tree of one unit.
    pub fn dump(&self, unit: &UnitId) -> Result<StubTree> {
        let bytes = self
            .cache
            .load_stubs(unit)?
            .ok_or_else(|| anyhow!("No stubs stored for {}", unit))?;
        let tree = StubSerializer::new(&self.registry)
            .deserialize(&bytes)
            .with_context(|| format!("Stored stubs of {} are unreadable; run `index` again", unit))?;
        Ok(tree)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let codec = StubSerializer::new(&self.registry);
        let mut stats = CacheStats {
            registry_version: self.registry.version(),
            stored_version: self.cache.load_metadata()?.map(|m| m.registry_version),
            ..CacheStats::default()
        };

        for (unit, bytes) in self.cache.all_stubs()? {
            stats.units += 1;
            stats.bytes += bytes.len();
            match codec.deserialize(&bytes) {
                Ok(tree) => stats.stubs += tree.len(),
                Err(e) => {
                    debug!("Stale stubs for {}: {}", unit, e);
                    stats.stale += 1;
                }
            }
        }
        Ok(stats)
    }

    fn unit_indexer(&self, store: Arc<InMemoryIndexStore>) -> UnitIndexer<JavaFileProvider> {
        let store: Arc<dyn ReverseIndexStore> = store;
        UnitIndexer::new(
            Arc::clone(&self.registry),
            JavaFileProvider::new(&self.config.project_root),
            store,
        )
    }
}

fn is_excluded(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
    })
}

/// 読めないファイルは警告してスキップする
fn scan_file(root: &Path, path: &Path) -> Result<Option<ScannedUnit>> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping unreadable file {}: {}", path.display(), e);
            return Ok(None);
        }
    };
    Ok(Some(ScannedUnit {
        unit: unit_id(root, path)?,
        hash: content_hash(&content),
    }))
}

/// ルートからの相対パス（区切りは `/`）をユニットIDにする
fn unit_id(root: &Path, path: &Path) -> Result<UnitId> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    Ok(UnitId::new(relative.to_string_lossy().replace('\\', "/")))
}

pub fn content_hash(content: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectIndexer) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        fs::create_dir_all(root.join("src/com/example")).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(
            root.join("src/com/example/Pair.java"),
            "package com.example;\npublic class Pair<T, U> { T first; }\n",
        )
        .unwrap();
        fs::write(root.join("src/com/example/Util.java"), "class Util { void run() {} }").unwrap();
        fs::write(root.join("target/Generated.java"), "class Generated {}").unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();

        let config = IndexerConfig::new(&root).with_db(temp_dir.path().join("index.db"));
        let indexer = ProjectIndexer::open(config).unwrap();
        (temp_dir, indexer)
    }

    #[test]
    fn test_scan_filters_and_excludes() {
        let (_dir, indexer) = setup();
        let units: Vec<String> = indexer
            .scan()
            .unwrap()
            .into_iter()
            .map(|s| s.unit.to_string())
            .collect();
        assert_eq!(
            units,
            vec!["src/com/example/Pair.java", "src/com/example/Util.java"]
        );
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let (_dir, indexer) = setup();
        let root = indexer.config().project_root.clone();

        let gone = root.join("src/com/example/Gone.java");
        assert!(scan_file(&root, &gone).unwrap().is_none());

        let util = scan_file(&root, &root.join("src/com/example/Util.java"))
            .unwrap()
            .unwrap();
        assert_eq!(util.unit.as_str(), "src/com/example/Util.java");
    }

    #[test]
    fn test_incremental_index() {
        let (_dir, indexer) = setup();

        let first = indexer.index(false).unwrap();
        assert!(first.full_rebuild);
        assert_eq!(first.added, 2);
        assert!(first.failures.is_empty());
        assert_eq!(indexer.cache().unit_count(), 2);

        let second = indexer.index(false).unwrap();
        assert!(!second.full_rebuild);
        assert_eq!((second.added, second.modified, second.unchanged), (0, 0, 2));

        let root = indexer.config().project_root.clone();
        fs::write(root.join("src/com/example/Util.java"), "class Util { int count; }").unwrap();
        fs::remove_file(root.join("src/com/example/Pair.java")).unwrap();

        let third = indexer.index(false).unwrap();
        assert_eq!((third.modified, third.removed, third.unchanged), (1, 1, 0));
        assert_eq!(indexer.cache().unit_count(), 1);
    }

    #[test]
    fn test_force_rebuilds_everything() {
        let (_dir, indexer) = setup();
        indexer.index(false).unwrap();
        let forced = indexer.index(true).unwrap();
        assert!(forced.full_rebuild);
        assert_eq!(forced.added, 2);
    }

    #[test]
    fn test_query_after_reload() {
        let (_dir, indexer) = setup();
        indexer.index(false).unwrap();

        let hits = indexer.query("java.class.shortName", "Pair").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.as_str(), "src/com/example/Pair.java");
        assert_eq!(hits[0].location.to_string(), "/0");

        assert!(indexer.query("java.class.shortName", "Missing").unwrap().is_empty());
        assert!(indexer.query("no.such.index", "Pair").is_err());
    }

    #[test]
    fn test_corrupt_blob_is_rebuilt_on_load() {
        let (_dir, indexer) = setup();
        indexer.index(false).unwrap();

        let unit = UnitId::from("src/com/example/Util.java");
        indexer.cache().save_stubs(&unit, &[0xff, 0x01]).unwrap();
        assert_eq!(indexer.stats().unwrap().stale, 1);

        let (store, report) = indexer.load_store().unwrap();
        assert_eq!(report.rebuilt_count(), 1);
        assert_eq!(store.unit_count(), 2);
        assert_eq!(indexer.stats().unwrap().stale, 0);
        assert!(indexer.dump(&unit).is_ok());
    }

    #[test]
    fn test_failed_rebuild_forgets_hash() {
        let (_dir, indexer) = setup();
        indexer.index(false).unwrap();

        let root = indexer.config().project_root.clone();
        let path = root.join("src/com/example/Util.java");
        let source = fs::read(&path).unwrap();
        let unit = UnitId::from("src/com/example/Util.java");
        indexer.cache().save_stubs(&unit, &[0xff, 0x01]).unwrap();
        fs::remove_file(&path).unwrap();

        let (store, report) = indexer.load_store().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(store.unit_count(), 1);
        let metadata = indexer.cache().load_metadata().unwrap().unwrap();
        assert!(!metadata.file_hashes.contains_key(unit.as_str()));
        assert!(indexer.cache().load_stubs(&unit).unwrap().is_none());

        // 同じ内容で戻っても再インデックスされる
        fs::write(&path, source).unwrap();
        let next = indexer.index(false).unwrap();
        assert_eq!((next.added, next.unchanged), (1, 1));
        assert!(indexer.dump(&unit).is_ok());
    }

    #[test]
    fn test_stats() {
        let (_dir, indexer) = setup();
        indexer.index(false).unwrap();
        let stats = indexer.stats().unwrap();
        assert_eq!(stats.units, 2);
        assert!(stats.stubs >= 4);
        assert!(stats.bytes > 0);
        assert_eq!(stats.stored_version, Some(stats.registry_version));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"class A {}"), content_hash(b"class A {}"));
        assert_ne!(content_hash(b"class A {}"), content_hash(b"class B {}"));
        assert_eq!(content_hash(b"").len(), 16);
    }
}
