use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = ".stub-index.db";

/// Directories never scanned for sources.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "target", "build", "out", "node_modules", ".idea", ".gradle"];

/// インデクサーの設定（キャッシュのメタデータにも保存される）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// sled データベースのパス
    pub db_path: PathBuf,
    /// プロジェクトルート
    pub project_root: PathBuf,
    /// ワーカースレッド数（0 = rayon のデフォルト）
    pub threads: usize,
    /// 対象とする拡張子
    pub extensions: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            project_root: PathBuf::from("."),
            threads: 0,
            extensions: vec!["java".to_string()],
        }
    }
}

impl IndexerConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    pub fn with_db(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    /// Dedicated pool when a thread count was given.
    pub fn thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        if self.threads == 0 {
            return Ok(None);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .context("Failed to build thread pool")?;
        Ok(Some(pool))
    }
}
