//! Incremental stub indexing for Java sources.
//!
//! Facade over the workspace crates: the language-neutral engine
//! (`stub_core`) and the Java front-end (`stub_java`).

pub use stub_core as engine;
pub use stub_java as java;

// Re-export commonly used types
pub use stub_core::{
    collect_index_entries, CancellationToken, ElementTypeRegistry, InMemoryIndexStore,
    PsiMaterializer, PsiNode, ReverseIndexStore, StubBuilder, StubError, StubIndexKey,
    StubLocation, StubSerializer, StubTree, UnitId, UnitIndexer, UnitLocation,
};
pub use stub_java::{java_registry, parse_java, shared_java_registry, JavaKind, JavaSources};
