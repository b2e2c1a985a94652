use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stub_core::UnitId;

use crate::config::IndexerConfig;

const METADATA_KEY: &str = "__metadata__";
const STUBS_TREE: &str = "stubs";

/// sled に保存するスタブキャッシュ
///
/// スタブのバイナリはユニットごとに `stubs` ツリーへ、
/// メタデータはデフォルトツリーの `__metadata__` へ bincode で保存する。
pub struct StubCache {
    pub(crate) db: sled::Db,
    stubs: sled::Tree,
    db_path: PathBuf,
}

impl StubCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let config = sled::Config::new()
            .path(&db_path)
            .cache_capacity(64 * 1024 * 1024) // 64MB cache
            .flush_every_ms(Some(1000))
            .mode(sled::Mode::HighThroughput);

        let db = config.open()?;
        let stubs = db.open_tree(STUBS_TREE)?;
        Ok(Self { db, stubs, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn save_data<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let serialized = bincode::serialize(data)?;
        self.db.insert(key, serialized)?;
        Ok(())
    }

    pub fn load_data<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        if let Some(data) = self.db.get(key)? {
            let deserialized = bincode::deserialize(&data)?;
            Ok(Some(deserialized))
        } else {
            Ok(None)
        }
    }

    pub fn save_metadata(&self, metadata: &CacheMetadata) -> Result<()> {
        self.save_data(METADATA_KEY, metadata)
    }

    pub fn load_metadata(&self) -> Result<Option<CacheMetadata>> {
        self.load_data(METADATA_KEY)
    }

    /// Stub stream of one unit, exactly as produced by the serializer.
    pub fn save_stubs(&self, unit: &UnitId, bytes: &[u8]) -> Result<()> {
        self.stubs.insert(unit.as_str(), bytes)?;
        Ok(())
    }

    pub fn load_stubs(&self, unit: &UnitId) -> Result<Option<Vec<u8>>> {
        Ok(self.stubs.get(unit.as_str())?.map(|bytes| bytes.to_vec()))
    }

    pub fn remove_stubs(&self, unit: &UnitId) -> Result<()> {
        self.stubs.remove(unit.as_str())?;
        Ok(())
    }

    pub fn all_stubs(&self) -> Result<Vec<(UnitId, Vec<u8>)>> {
        let mut blobs = Vec::new();
        for entry in self.stubs.iter() {
            let (key, value) = entry?;
            // 不正なキーは読み飛ばす
            if let Ok(unit) = std::str::from_utf8(&key) {
                blobs.push((UnitId::new(unit), value.to_vec()));
            }
        }
        Ok(blobs)
    }

    pub fn unit_count(&self) -> usize {
        self.stubs.len()
    }

    /// Drops every stored stub stream, keeping the metadata.
    pub fn clear_stubs(&self) -> Result<()> {
        self.stubs.clear()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// キャッシュのメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// 書き込んだレジストリの集約バージョン
    pub registry_version: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub config: IndexerConfig,
    /// ユニットごとのコンテンツハッシュ（xxHash3）
    pub file_hashes: HashMap<String, String>,
}

impl CacheMetadata {
    pub fn new(registry_version: u64, config: IndexerConfig) -> Self {
        let now = chrono::Utc::now();
        Self {
            registry_version,
            created_at: now,
            updated_at: now,
            config,
            file_hashes: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_open() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StubCache::open(temp_dir.path().join("test.db"));
        assert!(cache.is_ok());
    }

    #[test]
    fn test_save_and_load_stubs() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StubCache::open(temp_dir.path().join("stubs.db")).unwrap();
        let unit = UnitId::from("src/A.java");

        cache.save_stubs(&unit, &[1, 2, 3]).unwrap();
        assert_eq!(cache.load_stubs(&unit).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(cache.unit_count(), 1);

        let all = cache.all_stubs().unwrap();
        assert_eq!(all, vec![(unit.clone(), vec![1, 2, 3])]);

        cache.remove_stubs(&unit).unwrap();
        assert_eq!(cache.load_stubs(&unit).unwrap(), None);
    }

    #[test]
    fn test_metadata_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meta.db");

        {
            let cache = StubCache::open(&path).unwrap();
            let mut metadata = CacheMetadata::new(42, IndexerConfig::new("/project"));
            metadata
                .file_hashes
                .insert("A.java".to_string(), "abc".to_string());
            cache.save_metadata(&metadata).unwrap();
            cache.flush().unwrap();
        }

        let cache = StubCache::open(&path).unwrap();
        let metadata = cache.load_metadata().unwrap().unwrap();
        assert_eq!(metadata.registry_version, 42);
        assert_eq!(metadata.file_hashes.get("A.java").map(String::as_str), Some("abc"));
        assert_eq!(metadata.config.project_root, PathBuf::from("/project"));
    }

    #[test]
    fn test_clear_stubs_keeps_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StubCache::open(temp_dir.path().join("clear.db")).unwrap();
        cache
            .save_metadata(&CacheMetadata::new(1, IndexerConfig::default()))
            .unwrap();
        cache.save_stubs(&UnitId::from("A.java"), &[0]).unwrap();

        cache.clear_stubs().unwrap();
        assert_eq!(cache.unit_count(), 0);
        assert!(cache.load_metadata().unwrap().is_some());
    }
}
