use dashmap::DashSet;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// スレッドセーフな文字テーブル
///
/// 同じ綴りの識別子は一つの `Arc<str>` を共有する。複数のライトツリーを
/// 別スレッドで同時に処理しても安全。
pub struct CharTable {
    strings: DashSet<Arc<str>>,
    stats: InternerCounters,
}

#[derive(Default)]
struct InternerCounters {
    total_bytes: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct InternerStats {
    pub total_strings: usize,
    pub total_bytes: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl CharTable {
    /// 新しいテーブルを作成
    pub fn new() -> Self {
        Self {
            strings: DashSet::new(),
            stats: InternerCounters::default(),
        }
    }

    /// 文字列をインターン化
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(existing.key());
        }

        let candidate: Arc<str> = Arc::from(s);
        // 競合時は先に挿入された方を返す
        if self.strings.insert(Arc::clone(&candidate)) {
            self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
            self.stats.total_bytes.fetch_add(s.len(), Ordering::Relaxed);
            candidate
        } else {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            self.strings
                .get(s)
                .map(|existing| Arc::clone(existing.key()))
                .unwrap_or(candidate)
        }
    }

    /// 統計情報を取得
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            total_strings: self.strings.len(),
            total_bytes: self.stats.total_bytes.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for CharTable {
    fn default() -> Self {
        Self::new()
    }
}

/// プロセス全体で共有される文字テーブル
static SHARED_CHAR_TABLE: Lazy<CharTable> = Lazy::new(CharTable::new);

pub fn shared_char_table() -> &'static CharTable {
    &SHARED_CHAR_TABLE
}

/// 共有テーブルで文字列をインターン化
pub fn intern(s: &str) -> Arc<str> {
    SHARED_CHAR_TABLE.intern(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_table_basic() {
        let table = CharTable::new();

        let s1 = table.intern("hello");
        let s2 = table.intern("world");
        let s3 = table.intern("hello"); // 同じ文字列

        assert!(Arc::ptr_eq(&s1, &s3));
        assert!(!Arc::ptr_eq(&s1, &s2));
        assert_eq!(&*s1, "hello");

        let stats = table.stats();
        assert_eq!(stats.total_strings, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.total_bytes, 10);
    }

    #[test]
    fn test_shared_table() {
        let a = intern("shared_identifier");
        let b = intern("shared_identifier");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_interning() {
        use rayon::prelude::*;

        let table = CharTable::new();
        let interned: Vec<Arc<str>> = (0..1000)
            .into_par_iter()
            .map(|i| table.intern(&format!("name_{}", i % 10)))
            .collect();

        assert_eq!(table.len(), 10);
        for (i, s) in interned.iter().enumerate() {
            let again = table.intern(&format!("name_{}", i % 10));
            assert!(Arc::ptr_eq(s, &again));
        }
    }
}
