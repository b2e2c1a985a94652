//! Java front-end for the stub index engine.
//!
//! Parses Java with tree-sitter into light trees and registers the Java
//! element types (file, class, type parameters, members, module directives).

pub mod element_types;
pub mod parser;
pub mod sources;

use once_cell::sync::OnceCell;
use std::sync::Arc;
use stub_core::{ElementTypeRegistry, Result};

pub use element_types::{
    flags, java_registry, JavaKind, ALL_INDEXES, CLASS_SHORT_NAME_INDEX, FIELD_NAME_INDEX,
    METHOD_NAME_INDEX, MODULE_NAME_INDEX, SERVICE_PROVIDES_INDEX, SERVICE_USES_INDEX,
};
pub use parser::{parse_java, JavaParser};
pub use sources::{parse_unit, JavaFileProvider, JavaSources};

static SHARED_REGISTRY: OnceCell<Arc<ElementTypeRegistry>> = OnceCell::new();

/// プロセス全体で共有するJavaレジストリ（初回呼び出しで凍結される）
pub fn shared_java_registry() -> Result<Arc<ElementTypeRegistry>> {
    SHARED_REGISTRY.get_or_try_init(java_registry).map(Arc::clone)
}

/// Looks an index up by name, e.g. for the command line.
pub fn index_by_name(name: &str) -> Option<stub_core::StubIndexKey> {
    ALL_INDEXES.iter().copied().find(|index| index.name() == name)
}
