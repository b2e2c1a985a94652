//! Stub builder: light tree in, stub tree out.

use crate::codec::MAX_STUB_DEPTH;
use crate::element_type::{ElementTypeId, ElementTypeRegistry};
use crate::error::{Result, StructuralViolation, StubError};
use crate::light_tree::{LightNodeId, LightTreeWalker};
use crate::stub::{StubArena, StubId, StubTree};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared flag used to abandon an in-flight build.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StubError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Light node each stub was built from, indexed by stub id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubBindings(Vec<LightNodeId>);

impl StubBindings {
    pub fn light_node(&self, stub: StubId) -> Option<LightNodeId> {
        self.0.get(stub.index()).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct StubBuilder<'r> {
    registry: &'r ElementTypeRegistry,
    cancellation: Option<CancellationToken>,
}

impl<'r> StubBuilder<'r> {
    pub fn new(registry: &'r ElementTypeRegistry) -> Self {
        Self {
            registry,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(&self, walker: &LightTreeWalker<'_>) -> Result<StubTree> {
        self.build_with_bindings(walker).map(|(tree, _)| tree)
    }

    pub fn build_with_bindings(
        &self,
        walker: &LightTreeWalker<'_>,
    ) -> Result<(StubTree, StubBindings)> {
        let root = walker.root();
        let root_kind = walker.kind(root);
        let root_type = self
            .registry
            .by_syntax_kind(root_kind)
            .ok_or(StructuralViolation::UnregisteredRoot { kind: root_kind })?;

        let mut state = BuildState {
            arena: StubArena::new(),
            bindings: Vec::new(),
        };
        self.create_subtree(walker, root, root_type, None, &mut state)?;

        debug!("built {} stub(s) from {} light node(s)", state.arena.len(), walker.tree().len());
        let tree = state.arena.into_tree(self.registry.version(), Vec::new());
        Ok((tree, StubBindings(state.bindings)))
    }

    /// Builds the stub for `node` under `parent` and everything below it.
    pub fn build_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        parent: Option<StubId>,
        arena: &mut StubArena,
    ) -> Result<Option<StubId>> {
        let Some(element_type) = self.registry.by_syntax_kind(walker.kind(node)) else {
            return Ok(None);
        };
        let mut state = BuildState {
            arena: std::mem::take(arena),
            bindings: Vec::new(),
        };
        let result = self.create_subtree(walker, node, element_type, parent, &mut state);
        *arena = state.arena;
        result
    }

    fn create_subtree(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        type_id: ElementTypeId,
        parent: Option<StubId>,
        state: &mut BuildState,
    ) -> Result<Option<StubId>> {
        let depth = parent.map(|p| stub_depth(&state.arena, p) + 1).unwrap_or(0);
        let created = self.create(walker, node, type_id, parent, depth, state)?;
        let Some((stub, descend)) = created else {
            return Ok(None);
        };
        if descend {
            self.visit_descendants(walker, node, stub, depth, state)?;
        }
        Ok(Some(stub))
    }

    /// Creates one stub at `depth`; the flag says whether its children are visited.
    fn create(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        type_id: ElementTypeId,
        parent: Option<StubId>,
        depth: usize,
        state: &mut BuildState,
    ) -> Result<Option<(StubId, bool)>> {
        self.check_cancelled()?;
        if depth > MAX_STUB_DEPTH {
            return Err(StructuralViolation::NestingTooDeep {
                limit: MAX_STUB_DEPTH,
            }
            .into());
        }
        let element_type = self.registry.resolve(type_id)?;
        if !element_type.should_create_stub(walker, node) {
            return Ok(None);
        }

        let fields = {
            let parent_ref = parent.and_then(|p| state.arena.get(p));
            element_type.create_stub(walker, node, parent_ref)?
        };
        let stub = state.arena.push(type_id, parent, fields);
        state.bindings.push(node);
        Ok(Some((stub, element_type.visits_children())))
    }

    /// 明示的なスタックで子孫をたどる（深いネストでもスレッドのスタックを消費しない）
    fn visit_descendants(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        stub: StubId,
        depth: usize,
        state: &mut BuildState,
    ) -> Result<()> {
        let mut stack = vec![Frame {
            node,
            parent: stub,
            depth,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(&child) = walker.children(frame.node).get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let (parent, depth) = (frame.parent, frame.depth);

            let kind = walker.kind(child);
            if let Some(type_id) = self.registry.by_syntax_kind(kind) {
                if let Some((stub, true)) =
                    self.create(walker, child, type_id, Some(parent), depth + 1, state)?
                {
                    stack.push(Frame {
                        node: child,
                        parent: stub,
                        depth: depth + 1,
                        next: 0,
                    });
                }
            } else if self.registry.is_transparent(kind) {
                // ノード自体はスキップし、子孫は探索する
                self.check_cancelled()?;
                stack.push(Frame {
                    node: child,
                    parent,
                    depth,
                    next: 0,
                });
            }
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

/// Light node whose children are being visited, and the stub they attach to.
struct Frame {
    node: LightNodeId,
    parent: StubId,
    depth: usize,
    next: usize,
}

fn stub_depth(arena: &StubArena, stub: StubId) -> usize {
    let mut depth = 0;
    let mut current = arena.get(stub).and_then(|s| s.parent());
    while let Some(parent) = current {
        depth += 1;
        current = parent.parent();
    }
    depth
}

struct BuildState {
    arena: StubArena,
    bindings: Vec<LightNodeId>,
}
