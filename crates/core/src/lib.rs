//! Stub Index Core Library
//!
//! Language-neutral engine for incremental stub indexing: element type
//! registry, light tree walker, stub builder, binary stub codec, index sink,
//! reverse index store contract and lazy node materialization.

pub mod builder;
pub mod codec;
pub mod element_type;
pub mod error;
pub mod index_sink;
pub mod index_store;
pub mod indexer;
pub mod light_tree;
pub mod materializer;
pub mod string_interner;
pub mod stub;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_fixtures;

// Re-export main types
pub use builder::{CancellationToken, StubBindings, StubBuilder};
pub use codec::{StubInputStream, StubOutputStream, StubSerializer, MAX_STUB_DEPTH};
pub use element_type::{ElementTypeId, ElementTypeRegistry, StubElementType, BASE_FORMAT_VERSION};
pub use error::{Result, StructuralViolation, StubError};
pub use index_sink::{collect_index_entries, IndexEntry, IndexSink, StubIndexKey};
pub use index_store::{CommitOutcome, InMemoryIndexStore, ReverseIndexStore, UnitId, UnitLocation};
pub use indexer::{
    IndexedUnit, IndexingReport, LoadOutcome, LoadReport, RebuildSequencer, SourceProvider,
    UnitIndexer,
};
pub use light_tree::{LightNodeId, LightTree, LightTreeBuilder, LightTreeWalker, SyntaxKind};
pub use materializer::{MaterializeContext, PsiMaterializer, PsiNode};
pub use string_interner::{shared_char_table, CharTable, InternerStats};
pub use stub::{StubArena, StubField, StubFields, StubId, StubLocation, StubNode, StubRef, StubTree};
