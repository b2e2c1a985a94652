//! On-demand materialization of full nodes from stubs.
//!
//! A stub only carries what indexing needs. When a caller wants more (the
//! exact source text of a declaration, a bound clause, ...) the element type
//! rebuilds a [`PsiNode`], using the backing light tree when one is at hand.
//! Results are memoized per stub and dropped when the tree is replaced.

use crate::builder::{StubBindings, StubBuilder};
use crate::element_type::{ElementTypeId, ElementTypeRegistry};
use crate::error::{Result, StubError};
use crate::light_tree::{LightNodeId, LightTree, LightTreeWalker};
use crate::string_interner::shared_char_table;
use crate::stub::{StubId, StubLocation, StubRef, StubTree};
use once_cell::sync::OnceCell;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

/// Full-fidelity view of one construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiNode {
    pub element_type: ElementTypeId,
    pub debug_name: &'static str,
    pub location: StubLocation,
    pub name: Option<Arc<str>>,
    pub properties: Vec<(&'static str, String)>,
    /// Source text of the construct; `None` without a backing light tree.
    pub text: Option<String>,
    pub range: Option<Range<usize>>,
}

impl PsiNode {
    /// Generic node: the stub's name plus, if available, its source text.
    pub fn from_context(ctx: &MaterializeContext<'_>) -> Self {
        let (text, range) = match (ctx.walker(), ctx.light_node()) {
            (Some(walker), Some(node)) => (Some(walker.text(node).to_string()), Some(walker.range(node))),
            _ => (None, None),
        };
        Self {
            element_type: ctx.stub().element_type(),
            debug_name: ctx.debug_name(),
            location: ctx.location().clone(),
            name: ctx.stub().name().cloned(),
            properties: Vec::new(),
            text,
            range,
        }
    }

    pub fn with_property(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.properties.push((key, value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// What an element type sees while materializing one stub.
pub struct MaterializeContext<'a> {
    stub: StubRef<'a>,
    location: StubLocation,
    debug_name: &'static str,
    walker: Option<LightTreeWalker<'a>>,
    light_node: Option<LightNodeId>,
}

impl<'a> MaterializeContext<'a> {
    pub fn stub(&self) -> StubRef<'a> {
        self.stub
    }

    pub fn location(&self) -> &StubLocation {
        &self.location
    }

    pub fn debug_name(&self) -> &'static str {
        self.debug_name
    }

    pub fn walker(&self) -> Option<&LightTreeWalker<'a>> {
        self.walker.as_ref()
    }

    pub fn light_node(&self) -> Option<LightNodeId> {
        self.light_node
    }

    pub fn source_text(&self) -> Option<&'a str> {
        let walker = self.walker?;
        Some(walker.text(self.light_node?))
    }
}

struct BoundSource {
    light: Arc<LightTree>,
    bindings: StubBindings,
}

/// Memoizing accessor from stub ids to materialized nodes.
pub struct PsiMaterializer {
    registry: Arc<ElementTypeRegistry>,
    tree: Arc<StubTree>,
    source: Option<BoundSource>,
    cells: Vec<OnceCell<Arc<PsiNode>>>,
}

impl PsiMaterializer {
    /// Stub data only; materialized nodes carry no source text.
    pub fn new(registry: Arc<ElementTypeRegistry>, tree: Arc<StubTree>) -> Self {
        let cells = Self::fresh_cells(&tree);
        Self {
            registry,
            tree,
            source: None,
            cells,
        }
    }

    /// Backed by the light tree the stubs were built from.
    pub fn with_bindings(
        registry: Arc<ElementTypeRegistry>,
        tree: Arc<StubTree>,
        light: Arc<LightTree>,
        bindings: StubBindings,
    ) -> Self {
        let mut materializer = Self::new(registry, tree);
        if bindings.len() == materializer.tree.len() {
            materializer.source = Some(BoundSource { light, bindings });
        }
        materializer
    }

    /// Backed by a freshly parsed light tree, e.g. for a deserialized stub
    /// tree. The light tree is rebuilt into stubs to recover the bindings;
    /// if it no longer matches, the source is ignored.
    pub fn with_source(
        registry: Arc<ElementTypeRegistry>,
        tree: Arc<StubTree>,
        light: Arc<LightTree>,
    ) -> Self {
        let mut materializer = Self::new(registry, tree);
        materializer.source = materializer.bind(light);
        materializer
    }

    fn bind(&self, light: Arc<LightTree>) -> Option<BoundSource> {
        let walker = light.walker(shared_char_table());
        match StubBuilder::new(&self.registry).build_with_bindings(&walker) {
            Ok((rebuilt, bindings)) if rebuilt == *self.tree => {
                debug!("bound {} stub(s) to light tree", bindings.len());
                Some(BoundSource {
                    light: Arc::clone(&light),
                    bindings,
                })
            }
            Ok(_) => {
                warn!("light tree does not match stub tree; materializing from stubs only");
                None
            }
            Err(e) => {
                warn!("failed to rebind light tree: {}", e);
                None
            }
        }
    }

    fn fresh_cells(tree: &StubTree) -> Vec<OnceCell<Arc<PsiNode>>> {
        (0..tree.len()).map(|_| OnceCell::new()).collect()
    }

    pub fn tree(&self) -> &Arc<StubTree> {
        &self.tree
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// First call computes, later calls return the same `Arc`.
    pub fn materialize(&self, id: StubId) -> Result<Arc<PsiNode>> {
        let cell = self.cells.get(id.index()).ok_or_else(|| {
            StubError::malformed(format!("stub {} not in tree of {}", id.index(), self.tree.len()))
        })?;
        cell.get_or_try_init(|| self.compute(id).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn materialize_at(&self, location: &StubLocation) -> Result<Arc<PsiNode>> {
        let id = self.tree.resolve(location).ok_or_else(|| {
            StubError::malformed(format!("no stub at {}", location))
        })?;
        self.materialize(id)
    }

    pub fn is_materialized(&self, id: StubId) -> bool {
        self.cells
            .get(id.index())
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    fn compute(&self, id: StubId) -> Result<PsiNode> {
        let stub = self
            .tree
            .get(id)
            .ok_or_else(|| StubError::malformed(format!("stub {} not in tree", id.index())))?;
        let element_type = self.registry.resolve(stub.element_type())?;
        let location = self
            .tree
            .location(id)
            .ok_or_else(|| StubError::malformed(format!("stub {} has no location", id.index())))?;

        let (walker, light_node) = match &self.source {
            Some(source) => (
                Some(source.light.walker(shared_char_table())),
                source.bindings.light_node(id),
            ),
            None => (None, None),
        };
        let ctx = MaterializeContext {
            stub,
            location,
            debug_name: element_type.debug_name(),
            walker,
            light_node,
        };
        element_type.create_psi(&ctx)
    }

    /// Invalidation hook: the owning stub tree was replaced.
    pub fn replace_tree(&mut self, tree: Arc<StubTree>, light: Option<Arc<LightTree>>) {
        self.cells = Self::fresh_cells(&tree);
        self.tree = tree;
        self.source = None;
        if let Some(light) = light {
            self.source = self.bind(light);
        }
    }

    /// Drops every memoized node, keeping the tree.
    pub fn invalidate(&mut self) {
        self.cells = Self::fresh_cells(&self.tree);
    }
}
