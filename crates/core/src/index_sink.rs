//! Index sink: turns stub attributes into reverse-index entries.

use crate::element_type::ElementTypeRegistry;
use crate::error::Result;
use crate::stub::{StubLocation, StubRef, StubTree};
use std::fmt;
use std::sync::Arc;

/// Name of one reverse index, e.g. `java.class.shortName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubIndexKey(&'static str);

impl StubIndexKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StubIndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Receives the occurrences contributed by one stub.
pub trait IndexSink {
    fn occurrence(&mut self, index: StubIndexKey, key: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexEntry {
    pub index: StubIndexKey,
    pub key: Arc<str>,
    pub location: StubLocation,
}

/// Sink that tags every occurrence with the location of the current stub.
struct EntryCollector {
    current: StubLocation,
    entries: Vec<IndexEntry>,
}

impl IndexSink for EntryCollector {
    fn occurrence(&mut self, index: StubIndexKey, key: &str) {
        self.entries.push(IndexEntry {
            index,
            key: Arc::from(key),
            location: self.current.clone(),
        });
    }
}

/// Calls `index_stub` exactly once per stub, in preorder, and gathers what
/// every stub emitted. Nothing is merged or dropped.
pub fn collect_index_entries(
    registry: &ElementTypeRegistry,
    tree: &StubTree,
) -> Result<Vec<IndexEntry>> {
    let mut collector = EntryCollector {
        current: StubLocation::root(),
        entries: Vec::new(),
    };
    visit_with_locations(tree, |stub, location| {
        collector.current = location;
        let element_type = registry.resolve(stub.element_type())?;
        element_type.index_stub(stub, &mut collector);
        Ok(())
    })?;
    Ok(collector.entries)
}

/// Preorder walk handing each stub its location, computed incrementally.
pub(crate) fn visit_with_locations<'t, F>(tree: &'t StubTree, mut visit: F) -> Result<()>
where
    F: FnMut(StubRef<'t>, StubLocation) -> Result<()>,
{
    if tree.is_empty() {
        return Ok(());
    }
    let mut stack = vec![(tree.root(), Vec::<u32>::new())];
    while let Some((stub, path)) = stack.pop() {
        let children: Vec<_> = stub.children().collect();
        for (i, child) in children.into_iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i as u32);
            stack.push((child, child_path));
        }
        visit(stub, StubLocation::from_path(path))?;
    }
    Ok(())
}
