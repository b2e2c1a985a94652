//! In-memory stub trees.
//!
//! Nodes live in an arena addressed by [`StubId`]; the root is always at
//! index 0, parents come before their children and siblings keep their
//! original order. A finished [`StubTree`] is immutable; a changed source unit
//! gets a brand new tree.

use crate::element_type::ElementTypeId;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubId(u32);

impl StubId {
    pub const ROOT: StubId = StubId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One value in a stub's field bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubField {
    Name(Option<Arc<str>>),
    Names(Vec<Arc<str>>),
    Flags(u32),
    Int(i64),
    Bool(bool),
}

/// Ordered field bag. Its layout is owned by the element type that built it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubFields(Vec<StubField>);

impl StubFields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_name(mut self, name: Option<Arc<str>>) -> Self {
        self.0.push(StubField::Name(name));
        self
    }

    pub fn with_names(mut self, names: Vec<Arc<str>>) -> Self {
        self.0.push(StubField::Names(names));
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.0.push(StubField::Flags(flags));
        self
    }

    pub fn with_int(mut self, value: i64) -> Self {
        self.0.push(StubField::Int(value));
        self
    }

    pub fn with_bool(mut self, value: bool) -> Self {
        self.0.push(StubField::Bool(value));
        self
    }

    pub fn get(&self, index: usize) -> Option<&StubField> {
        self.0.get(index)
    }

    pub fn name(&self, index: usize) -> Option<&Arc<str>> {
        match self.0.get(index) {
            Some(StubField::Name(name)) => name.as_ref(),
            _ => None,
        }
    }

    pub fn names(&self, index: usize) -> &[Arc<str>] {
        match self.0.get(index) {
            Some(StubField::Names(names)) => names,
            _ => &[],
        }
    }

    pub fn flags(&self, index: usize) -> u32 {
        match self.0.get(index) {
            Some(StubField::Flags(flags)) => *flags,
            _ => 0,
        }
    }

    pub fn int(&self, index: usize) -> Option<i64> {
        match self.0.get(index) {
            Some(StubField::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bool(&self, index: usize) -> bool {
        matches!(self.0.get(index), Some(StubField::Bool(true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StubField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubNode {
    pub element_type: ElementTypeId,
    pub parent: Option<StubId>,
    pub children: Vec<StubId>,
    pub fields: StubFields,
}

/// Read-only handle on one node, usable both on finished trees and on an
/// arena still under construction.
#[derive(Clone, Copy)]
pub struct StubRef<'a> {
    nodes: &'a [StubNode],
    id: StubId,
}

impl<'a> StubRef<'a> {
    pub fn id(&self) -> StubId {
        self.id
    }

    fn node(&self) -> &'a StubNode {
        &self.nodes[self.id.index()]
    }

    pub fn element_type(&self) -> ElementTypeId {
        self.node().element_type
    }

    pub fn fields(&self) -> &'a StubFields {
        &self.node().fields
    }

    /// First name field, which by convention is the declared name.
    pub fn name(&self) -> Option<&'a Arc<str>> {
        self.node().fields.name(0)
    }

    pub fn parent(&self) -> Option<StubRef<'a>> {
        self.node().parent.map(|id| StubRef {
            nodes: self.nodes,
            id,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = StubRef<'a>> + 'a {
        let nodes = self.nodes;
        self.node()
            .children
            .iter()
            .map(move |&id| StubRef { nodes, id })
    }

    /// Nearest ancestor (self excluded) of the given element type.
    pub fn ancestor_of_type(&self, element_type: ElementTypeId) -> Option<StubRef<'a>> {
        let mut current = self.parent();
        while let Some(stub) = current {
            if stub.element_type() == element_type {
                return Some(stub);
            }
            current = stub.parent();
        }
        None
    }
}

impl fmt::Debug for StubRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubRef")
            .field("id", &self.id)
            .field("element_type", &self.element_type())
            .field("fields", self.fields())
            .finish()
    }
}

/// Path of child indices from the root; `[]` is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubLocation(Vec<u32>);

impl StubLocation {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_path(path: Vec<u32>) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for StubLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Append-only arena used while a tree is built or deserialized.
#[derive(Debug, Default)]
pub struct StubArena {
    nodes: Vec<StubNode>,
}

impl StubArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; the parent must already be in the arena.
    pub fn push(
        &mut self,
        element_type: ElementTypeId,
        parent: Option<StubId>,
        fields: StubFields,
    ) -> StubId {
        let id = StubId(self.nodes.len() as u32);
        self.nodes.push(StubNode {
            element_type,
            parent,
            children: Vec::new(),
            fields,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub fn get(&self, id: StubId) -> Option<StubRef<'_>> {
        (id.index() < self.nodes.len()).then_some(StubRef {
            nodes: &self.nodes,
            id,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_tree(self, version: u64, string_table: Vec<Arc<str>>) -> StubTree {
        StubTree {
            nodes: self.nodes,
            version,
            string_table,
        }
    }
}

/// Stub tree of one source unit plus its provenance.
#[derive(Debug, Clone)]
pub struct StubTree {
    nodes: Vec<StubNode>,
    version: u64,
    string_table: Vec<Arc<str>>,
}

impl StubTree {
    pub fn root(&self) -> StubRef<'_> {
        StubRef {
            nodes: &self.nodes,
            id: StubId::ROOT,
        }
    }

    pub fn get(&self, id: StubId) -> Option<StubRef<'_>> {
        (id.index() < self.nodes.len()).then_some(StubRef {
            nodes: &self.nodes,
            id,
        })
    }

    pub fn node(&self, id: StubId) -> Option<&StubNode> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Format version the tree was built or decoded under.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Interned strings of the last serialization or deserialization pass.
    pub fn string_table(&self) -> &[Arc<str>] {
        &self.string_table
    }

    pub(crate) fn with_string_table(mut self, table: Vec<Arc<str>>) -> Self {
        self.string_table = table;
        self
    }

    /// Ids in preorder. Arena order already is preorder.
    pub fn preorder(&self) -> impl Iterator<Item = StubRef<'_>> + '_ {
        (0..self.nodes.len()).map(move |i| StubRef {
            nodes: &self.nodes,
            id: StubId(i as u32),
        })
    }

    pub fn location(&self, id: StubId) -> Option<StubLocation> {
        self.node(id)?;
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current.index()].parent {
            let position = self.nodes[parent.index()]
                .children
                .iter()
                .position(|&child| child == current)?;
            path.push(position as u32);
            current = parent;
        }
        path.reverse();
        Some(StubLocation(path))
    }

    pub fn resolve(&self, location: &StubLocation) -> Option<StubId> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut current = StubId::ROOT;
        for &index in location.path() {
            current = *self.nodes[current.index()].children.get(index as usize)?;
        }
        Some(current)
    }

    /// Stubs of `element_type` anywhere in the tree, in preorder.
    pub fn stubs_of_type(&self, element_type: ElementTypeId) -> Vec<StubRef<'_>> {
        self.preorder()
            .filter(|stub| stub.element_type() == element_type)
            .collect()
    }
}

/// Structural and field-wise equality; provenance is ignored.
impl PartialEq for StubTree {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Eq for StubTree {}
