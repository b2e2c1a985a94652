use crate::parser::JavaParser;
use dashmap::DashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use stub_core::{LightTree, Result, SourceProvider, StubError, UnitId};

thread_local! {
    // tree_sitter::Parser はスレッド間で共有できないので、ワーカーごとに1つ持つ
    static PARSER: RefCell<Option<JavaParser>> = RefCell::new(None);
}

fn with_parser<T>(f: impl FnOnce(&mut JavaParser) -> Result<T>) -> Result<T> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let mut parser = match slot.take() {
            Some(parser) => parser,
            None => JavaParser::new()?,
        };
        let result = f(&mut parser);
        *slot = Some(parser);
        result
    })
}

/// Parses `unit` with this thread's parser.
pub fn parse_unit(unit: &UnitId, source: &str) -> Result<LightTree> {
    with_parser(|parser| parser.parse(unit.as_str(), source))
}

/// Reads units as paths relative to a project root.
pub struct JavaFileProvider {
    root: PathBuf,
}

impl JavaFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, unit: &UnitId) -> PathBuf {
        self.root.join(unit.as_str())
    }
}

impl SourceProvider for JavaFileProvider {
    fn light_tree(&self, unit: &UnitId) -> Result<LightTree> {
        let source = std::fs::read_to_string(self.path_of(unit)).map_err(|e| StubError::Source {
            unit: unit.to_string(),
            message: e.to_string(),
        })?;
        parse_unit(unit, &source)
    }
}

/// In-memory sources, e.g. unsaved editor buffers.
#[derive(Default)]
pub struct JavaSources {
    sources: DashMap<UnitId, String>,
}

impl JavaSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, unit: impl Into<UnitId>, source: impl Into<String>) {
        self.sources.insert(unit.into(), source.into());
    }

    pub fn remove(&self, unit: &UnitId) -> Option<String> {
        self.sources.remove(unit).map(|(_, source)| source)
    }

    pub fn units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self.sources.iter().map(|e| e.key().clone()).collect();
        units.sort();
        units
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceProvider for JavaSources {
    fn light_tree(&self, unit: &UnitId) -> Result<LightTree> {
        let source = self
            .sources
            .get(unit)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StubError::Source {
                unit: unit.to_string(),
                message: "unit not loaded".to_string(),
            })?;
        parse_unit(unit, &source)
    }
}
