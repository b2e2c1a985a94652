//! Element types and the registry that maps stable ids to them.
//!
//! An element type is the extension point of the engine: it knows how to
//! build its stub from a light node, how to write and read its fields, which
//! index entries it contributes and how to materialize a full node. The core
//! never enumerates kinds; languages register their own.

use crate::codec::{StubInputStream, StubOutputStream};
use crate::error::{Result, StubError};
use crate::index_sink::IndexSink;
use crate::light_tree::{LightNodeId, LightTreeWalker, SyntaxKind};
use crate::materializer::{MaterializeContext, PsiNode};
use crate::stub::{StubFields, StubRef};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Version of the stream layout itself, independent of registered types.
pub const BASE_FORMAT_VERSION: u32 = 3;

/// Stable integer id, persisted in every stub stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementTypeId(u16);

impl ElementTypeId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ElementTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stub contract of one element type.
pub trait StubElementType: Send + Sync {
    /// Unique identity, e.g. `java.TYPE_PARAMETER`.
    fn external_id(&self) -> &'static str;

    fn debug_name(&self) -> &'static str {
        self.external_id()
    }

    /// Syntax kinds this type builds stubs from.
    fn syntax_kinds(&self) -> &'static [SyntaxKind];

    /// Bump when the field encoding changes; feeds the aggregate version.
    fn format_version(&self) -> u32 {
        0
    }

    fn should_create_stub(&self, _walker: &LightTreeWalker<'_>, _node: LightNodeId) -> bool {
        true
    }

    /// Whether the builder looks for nested stubs below this one.
    fn visits_children(&self) -> bool {
        true
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        parent: Option<StubRef<'_>>,
    ) -> Result<StubFields>;

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()>;

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        parent: Option<StubRef<'_>>,
    ) -> Result<StubFields>;

    /// Most types contribute nothing.
    fn index_stub(&self, _stub: StubRef<'_>, _sink: &mut dyn IndexSink) {}

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        Ok(PsiNode::from_context(ctx))
    }
}

struct Registration {
    id: ElementTypeId,
    element_type: Arc<dyn StubElementType>,
}

/// Process-wide table of element types.
///
/// Filled once at startup, then frozen behind an `Arc` and shared read-only
/// by every indexing thread. Registration order decides the ids, and so the
/// persisted format.
pub struct ElementTypeRegistry {
    types: Vec<Registration>,
    by_external_id: HashMap<&'static str, ElementTypeId>,
    by_syntax_kind: HashMap<SyntaxKind, ElementTypeId>,
    transparent: HashSet<SyntaxKind>,
    signature: Vec<u8>,
    version: u64,
}

impl ElementTypeRegistry {
    pub fn new() -> Self {
        let signature = BASE_FORMAT_VERSION.to_le_bytes().to_vec();
        let version = xxh3_64(&signature);
        Self {
            types: Vec::new(),
            by_external_id: HashMap::new(),
            by_syntax_kind: HashMap::new(),
            transparent: HashSet::new(),
            signature,
            version,
        }
    }

    pub fn register(&mut self, element_type: Arc<dyn StubElementType>) -> Result<ElementTypeId> {
        let name = element_type.external_id();
        if self.by_external_id.contains_key(name) {
            return Err(StubError::DuplicateRegistration {
                name: name.to_string(),
            });
        }
        if let Some(kind) = element_type
            .syntax_kinds()
            .iter()
            .copied()
            .find(|kind| self.by_syntax_kind.contains_key(kind) || self.transparent.contains(kind))
        {
            return Err(StubError::DuplicateRegistration {
                name: format!("{} (syntax kind `{}`)", name, kind),
            });
        }
        if self.types.len() > u16::MAX as usize {
            return Err(StubError::DuplicateRegistration {
                name: format!("{} (id space exhausted)", name),
            });
        }

        let id = ElementTypeId(self.types.len() as u16);
        for &kind in element_type.syntax_kinds() {
            self.by_syntax_kind.insert(kind, id);
        }
        self.by_external_id.insert(name, id);

        self.signature.extend_from_slice(&id.0.to_le_bytes());
        self.signature.extend_from_slice(name.as_bytes());
        self.signature.push(0);
        self.signature
            .extend_from_slice(&element_type.format_version().to_le_bytes());
        self.version = xxh3_64(&self.signature);

        debug!("registered element type {} as {}", name, id);
        self.types.push(Registration { id, element_type });
        Ok(id)
    }

    /// Syntax kind without a stub of its own whose children may hold stubs.
    pub fn mark_transparent(&mut self, kind: SyntaxKind) -> Result<()> {
        if self.by_syntax_kind.contains_key(kind) {
            return Err(StubError::DuplicateRegistration {
                name: format!("transparent kind `{}`", kind),
            });
        }
        self.transparent.insert(kind);
        Ok(())
    }

    /// Initialization barrier: nothing can be registered afterwards.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn resolve(&self, id: ElementTypeId) -> Result<&dyn StubElementType> {
        self.types
            .get(id.0 as usize)
            .map(|registration| registration.element_type.as_ref())
            .ok_or(StubError::UnknownTypeId { id: id.0 as u32 })
    }

    /// Resolves a raw id read from a stream.
    pub fn resolve_raw(&self, raw: u64) -> Result<(ElementTypeId, &dyn StubElementType)> {
        let id = u16::try_from(raw).map_err(|_| StubError::UnknownTypeId {
            id: raw.min(u32::MAX as u64) as u32,
        })?;
        let id = ElementTypeId(id);
        Ok((id, self.resolve(id)?))
    }

    pub fn by_syntax_kind(&self, kind: SyntaxKind) -> Option<ElementTypeId> {
        self.by_syntax_kind.get(kind).copied()
    }

    pub fn by_external_id(&self, name: &str) -> Option<ElementTypeId> {
        self.by_external_id.get(name).copied()
    }

    pub fn is_transparent(&self, kind: SyntaxKind) -> bool {
        self.transparent.contains(kind)
    }

    /// Checksum of the base format and every registration, in order.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementTypeId, &dyn StubElementType)> {
        self.types
            .iter()
            .map(|registration| (registration.id, registration.element_type.as_ref()))
    }
}

impl Default for ElementTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTypeRegistry")
            .field(
                "types",
                &self.types.iter().map(|r| r.element_type.external_id()).collect::<Vec<_>>(),
            )
            .field("version", &format_args!("{:#018x}", self.version))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{toy_registry, NamedType};

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ElementTypeRegistry::new();
        let a = registry
            .register(Arc::new(NamedType::new("toy.A", &["a"])))
            .unwrap();
        let b = registry
            .register(Arc::new(NamedType::new("toy.B", &["b"])))
            .unwrap();

        assert_eq!(a, ElementTypeId::new(0));
        assert_eq!(b, ElementTypeId::new(1));
        assert_eq!(registry.resolve(b).unwrap().external_id(), "toy.B");
        assert_eq!(registry.by_syntax_kind("a"), Some(a));
        assert_eq!(registry.by_external_id("toy.B"), Some(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ElementTypeRegistry::new();
        registry
            .register(Arc::new(NamedType::new("toy.A", &["a"])))
            .unwrap();

        let err = registry
            .register(Arc::new(NamedType::new("toy.A", &["other"])))
            .unwrap_err();
        assert_eq!(
            err,
            StubError::DuplicateRegistration {
                name: "toy.A".to_string()
            }
        );

        // 同じ構文種別を別の型が取ろうとした場合もエラー
        let err = registry
            .register(Arc::new(NamedType::new("toy.C", &["a"])))
            .unwrap_err();
        assert!(matches!(err, StubError::DuplicateRegistration { .. }));
        assert!(registry.mark_transparent("a").is_err());
    }

    #[test]
    fn test_unknown_type_id() {
        let registry = toy_registry();
        assert!(matches!(
            registry.resolve(ElementTypeId::new(999)),
            Err(StubError::UnknownTypeId { id: 999 })
        ));
        assert!(matches!(
            registry.resolve_raw(1 << 40),
            Err(StubError::UnknownTypeId { .. })
        ));
    }

    #[test]
    fn test_version_depends_on_order() {
        let mut first = ElementTypeRegistry::new();
        first.register(Arc::new(NamedType::new("toy.A", &["a"]))).unwrap();
        first.register(Arc::new(NamedType::new("toy.B", &["b"]))).unwrap();

        let mut same = ElementTypeRegistry::new();
        same.register(Arc::new(NamedType::new("toy.A", &["a"]))).unwrap();
        same.register(Arc::new(NamedType::new("toy.B", &["b"]))).unwrap();

        let mut swapped = ElementTypeRegistry::new();
        swapped.register(Arc::new(NamedType::new("toy.B", &["b"]))).unwrap();
        swapped.register(Arc::new(NamedType::new("toy.A", &["a"]))).unwrap();

        assert_eq!(first.version(), same.version());
        assert_ne!(first.version(), swapped.version());
        assert_ne!(first.version(), ElementTypeRegistry::new().version());
    }
}
