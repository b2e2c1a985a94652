//! Light syntax trees and the read-only walker the stub builder consumes.
//!
//! A [`LightTree`] is a flat arena of syntax nodes over one source text. It
//! keeps kinds, byte ranges and the parent/child structure, nothing more.
//! Front-ends (see `stub-java`) produce it with [`LightTreeBuilder`].

use crate::error::{Result, StructuralViolation};
use crate::string_interner::CharTable;
use std::ops::Range;
use std::sync::Arc;

/// Syntactic kind of a light node, as named by the grammar.
pub type SyntaxKind = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightNodeId(u32);

impl LightNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct LightNode {
    kind: SyntaxKind,
    start: u32,
    end: u32,
    parent: Option<LightNodeId>,
    children: Vec<LightNodeId>,
    is_token: bool,
}

#[derive(Debug, Clone)]
pub struct LightTree {
    text: Arc<str>,
    nodes: Vec<LightNode>,
}

impl LightTree {
    pub fn root(&self) -> LightNodeId {
        LightNodeId(0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: LightNodeId) -> bool {
        node.index() < self.nodes.len()
    }

    fn node(&self, id: LightNodeId) -> &LightNode {
        &self.nodes[id.index()]
    }

    pub fn walker<'t>(&'t self, chars: &'t CharTable) -> LightTreeWalker<'t> {
        LightTreeWalker { tree: self, chars }
    }
}

/// Builds a [`LightTree`] in preorder.
///
/// Two modes: over an existing source (`with_source` + the `*_at` methods,
/// used by parser front-ends), or accumulating the text from tokens as they
/// are pushed (`new` + `start_node`/`token`/`finish_node`, handy in tests).
pub struct LightTreeBuilder {
    text: String,
    nodes: Vec<LightNode>,
    stack: Vec<LightNodeId>,
    closed_root: bool,
    balanced: bool,
    needs_space: bool,
}

impl LightTreeBuilder {
    pub fn new() -> Self {
        Self::with_source(String::new())
    }

    pub fn with_source(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            nodes: Vec::new(),
            stack: Vec::new(),
            closed_root: false,
            balanced: true,
            needs_space: false,
        }
    }

    fn push(&mut self, kind: SyntaxKind, start: u32, end: u32, is_token: bool) -> LightNodeId {
        if self.closed_root || (self.stack.is_empty() && !self.nodes.is_empty()) {
            self.balanced = false;
        }
        let id = LightNodeId(self.nodes.len() as u32);
        let parent = self.stack.last().copied();
        self.nodes.push(LightNode {
            kind,
            start,
            end,
            parent,
            children: Vec::new(),
            is_token,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub fn start_node_at(&mut self, kind: SyntaxKind, offset: usize) -> &mut Self {
        let id = self.push(kind, offset as u32, offset as u32, false);
        self.stack.push(id);
        self
    }

    pub fn token_at(&mut self, kind: SyntaxKind, range: Range<usize>) -> &mut Self {
        self.push(kind, range.start as u32, range.end as u32, true);
        self
    }

    pub fn finish_node_at(&mut self, offset: usize) -> &mut Self {
        match self.stack.pop() {
            Some(id) => {
                self.nodes[id.index()].end = offset as u32;
                if self.stack.is_empty() {
                    self.closed_root = true;
                }
            }
            None => self.balanced = false,
        }
        self
    }

    pub fn start_node(&mut self, kind: SyntaxKind) -> &mut Self {
        self.separate();
        let offset = self.text.len();
        self.start_node_at(kind, offset)
    }

    /// Appends `text` to the accumulated source, separated by a space.
    pub fn token(&mut self, kind: SyntaxKind, text: &str) -> &mut Self {
        self.separate();
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        self.needs_space = true;
        self.token_at(kind, start..end)
    }

    fn separate(&mut self) {
        if self.needs_space {
            self.text.push(' ');
            self.needs_space = false;
        }
    }

    pub fn finish_node(&mut self) -> &mut Self {
        let offset = self.text.len();
        self.finish_node_at(offset)
    }

    pub fn finish(self) -> Result<LightTree> {
        if !self.balanced || !self.stack.is_empty() || self.nodes.is_empty() {
            return Err(StructuralViolation::UnbalancedBuilder.into());
        }
        let len = self.text.len() as u32;
        if self.nodes.iter().any(|n| n.start > n.end || n.end > len) {
            return Err(StructuralViolation::UnbalancedBuilder.into());
        }
        Ok(LightTree {
            text: Arc::from(self.text),
            nodes: self.nodes,
        })
    }
}

impl Default for LightTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only, randomly addressable view over one light tree.
#[derive(Clone, Copy)]
pub struct LightTreeWalker<'t> {
    tree: &'t LightTree,
    chars: &'t CharTable,
}

impl<'t> LightTreeWalker<'t> {
    pub fn tree(&self) -> &'t LightTree {
        self.tree
    }

    pub fn root(&self) -> LightNodeId {
        self.tree.root()
    }

    pub fn kind(&self, node: LightNodeId) -> SyntaxKind {
        self.tree.node(node).kind
    }

    pub fn parent(&self, node: LightNodeId) -> Option<LightNodeId> {
        self.tree.node(node).parent
    }

    pub fn is_token(&self, node: LightNodeId) -> bool {
        self.tree.node(node).is_token
    }

    pub fn children(&self, node: LightNodeId) -> &'t [LightNodeId] {
        &self.tree.node(node).children
    }

    pub fn children_of_kind(
        &self,
        node: LightNodeId,
        kind: SyntaxKind,
    ) -> impl Iterator<Item = LightNodeId> + 't {
        let tree = self.tree;
        tree.node(node)
            .children
            .iter()
            .copied()
            .filter(move |child| tree.node(*child).kind == kind)
    }

    pub fn first_child_of_kind(&self, node: LightNodeId, kind: SyntaxKind) -> Option<LightNodeId> {
        self.children_of_kind(node, kind).next()
    }

    pub fn first_child_of_any(
        &self,
        node: LightNodeId,
        kinds: &[SyntaxKind],
    ) -> Option<LightNodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|child| kinds.contains(&self.kind(*child)))
    }

    /// Child that the grammar guarantees; absence is a parser bug.
    pub fn required_child_of_kind(
        &self,
        node: LightNodeId,
        kind: SyntaxKind,
    ) -> Result<LightNodeId> {
        self.first_child_of_kind(node, kind).ok_or_else(|| {
            StructuralViolation::MissingRequiredChild {
                parent_kind: self.kind(node),
                child_kind: kind,
            }
            .into()
        })
    }

    pub fn required_child_of_any(
        &self,
        node: LightNodeId,
        kinds: &[SyntaxKind],
    ) -> Result<LightNodeId> {
        self.first_child_of_any(node, kinds).ok_or_else(|| {
            StructuralViolation::MissingRequiredChild {
                parent_kind: self.kind(node),
                child_kind: kinds.first().copied().unwrap_or("<any>"),
            }
            .into()
        })
    }

    pub fn range(&self, node: LightNodeId) -> Range<usize> {
        let n = self.tree.node(node);
        n.start as usize..n.end as usize
    }

    pub fn text(&self, node: LightNodeId) -> &'t str {
        let range = self.range(node);
        self.tree.text.get(range).unwrap_or("")
    }

    /// Node text through the shared char table.
    pub fn interned_text(&self, node: LightNodeId) -> Arc<str> {
        self.chars.intern(self.text(node))
    }

    /// Node text with all whitespace removed, interned. Qualified names such
    /// as `java . util . List` come out as `java.util.List`.
    pub fn interned_compact_text(&self, node: LightNodeId) -> Arc<str> {
        let text = self.text(node);
        if text.chars().any(char::is_whitespace) {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            self.chars.intern(&compact)
        } else {
            self.chars.intern(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> LightTree {
        let mut b = LightTreeBuilder::new();
        b.start_node("class_declaration")
            .token("class", "class")
            .token("identifier", "Box")
            .start_node("type_parameters")
            .start_node("type_parameter")
            .token("type_identifier", "T")
            .finish_node()
            .finish_node()
            .start_node("class_body")
            .finish_node()
            .finish_node();
        b.finish().unwrap()
    }

    #[test]
    fn test_walker_navigation() {
        let tree = sample_tree();
        let chars = CharTable::new();
        let walker = tree.walker(&chars);

        let root = walker.root();
        assert_eq!(walker.kind(root), "class_declaration");
        assert_eq!(walker.children(root).len(), 4);

        let name = walker.required_child_of_kind(root, "identifier").unwrap();
        assert_eq!(walker.text(name), "Box");
        assert_eq!(walker.parent(name), Some(root));
        assert!(walker.is_token(name));

        let params = walker.first_child_of_kind(root, "type_parameters").unwrap();
        let param = walker.first_child_of_kind(params, "type_parameter").unwrap();
        let id = walker.required_child_of_kind(param, "type_identifier").unwrap();
        assert_eq!(&*walker.interned_text(id), "T");
        assert_eq!(walker.text(params), "T");
    }

    #[test]
    fn test_missing_required_child() {
        let tree = sample_tree();
        let chars = CharTable::new();
        let walker = tree.walker(&chars);

        let err = walker
            .required_child_of_kind(walker.root(), "superclass")
            .unwrap_err();
        assert_eq!(
            err,
            StructuralViolation::MissingRequiredChild {
                parent_kind: "class_declaration",
                child_kind: "superclass",
            }
            .into()
        );
    }

    #[test]
    fn test_interned_text_shares_storage() {
        let mut b = LightTreeBuilder::new();
        b.start_node("program")
            .token("identifier", "List")
            .token("identifier", "List")
            .finish_node();
        let tree = b.finish().unwrap();
        let chars = CharTable::new();
        let walker = tree.walker(&chars);

        let ids: Vec<_> = walker.children_of_kind(walker.root(), "identifier").collect();
        let a = walker.interned_text(ids[0]);
        let b = walker.interned_text(ids[1]);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_source_mode_and_compact_text() {
        let source = "import java . util . List;";
        let mut b = LightTreeBuilder::with_source(source);
        b.start_node_at("program", 0)
            .start_node_at("scoped_identifier", 7)
            .token_at("identifier", 7..11)
            .finish_node_at(25)
            .finish_node_at(source.len());
        let tree = b.finish().unwrap();
        let chars = CharTable::new();
        let walker = tree.walker(&chars);

        let scoped = walker.first_child_of_kind(walker.root(), "scoped_identifier").unwrap();
        assert_eq!(walker.text(scoped), "java . util . List");
        assert_eq!(&*walker.interned_compact_text(scoped), "java.util.List");
    }

    #[test]
    fn test_unbalanced_builder() {
        let mut b = LightTreeBuilder::new();
        b.start_node("program").token("identifier", "x");
        assert!(b.finish().is_err());

        let mut b = LightTreeBuilder::new();
        b.start_node("program").finish_node().finish_node();
        assert!(b.finish().is_err());

        let mut b = LightTreeBuilder::new();
        b.start_node("program").finish_node().start_node("program").finish_node();
        assert!(b.finish().is_err());

        assert!(LightTreeBuilder::new().finish().is_err());
    }
}
