//! Concrete parse trees.

use crate::symbol::{SymbolID, Symbols};
use std::{fmt, rc::Rc};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeID(u32);

impl NodeID {
    pub const ROOT: Self = Self(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    symbol: SymbolID,
    name: Rc<str>,
    parent: Option<NodeID>,
    children: Vec<NodeID>,
    text: Option<String>,
}

/// A parse tree whose nodes live in a single arena.
///
/// Children are owned top-down by their parent; the parent link of each node
/// is a plain `NodeID`.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    pub(crate) fn new(symbols: &Symbols, root: SymbolID) -> Self {
        let mut tree = Self { nodes: vec![] };
        tree.push(symbols, root, None);
        tree
    }

    pub(crate) fn push(
        &mut self,
        symbols: &Symbols,
        symbol: SymbolID,
        parent: Option<NodeID>,
    ) -> NodeID {
        let id = NodeID(self.nodes.len().try_into().expect("too many nodes"));
        self.nodes.push(NodeData {
            symbol,
            name: symbols.rc_name(symbol).clone(),
            parent,
            children: vec![],
            text: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub(crate) fn set_text(&mut self, id: NodeID, text: String) {
        self.nodes[id.index()].text = Some(text);
    }

    /// Attach `children` to the end of `parent`'s children.
    pub(crate) fn adopt(&mut self, parent: NodeID, children: Vec<NodeID>) {
        for child in &children {
            self.nodes[child.index()].parent = Some(parent);
        }
        self.nodes[parent.index()].children.extend(children);
    }

    /// Drop every node created after the arena had `len` nodes.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len.max(1));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Node<'_> {
        self.node(NodeID::ROOT)
    }

    pub fn node(&self, id: NodeID) -> Node<'_> {
        assert!(id.index() < self.nodes.len(), "invalid node ID {:?}", id);
        Node { tree: self, id }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root(), f)
    }
}

/// A borrowed view of one node of a `Tree`.
#[derive(Copy, Clone)]
pub struct Node<'t> {
    tree: &'t Tree,
    id: NodeID,
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("text", &self.text())
            .finish_non_exhaustive()
    }
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id.index()]
    }

    pub fn id(&self) -> NodeID {
        self.id
    }

    pub fn symbol(&self) -> SymbolID {
        self.data().symbol
    }

    pub fn name(&self) -> &'t str {
        &self.data().name
    }

    /// The matched input of a terminal leaf.
    pub fn text(&self) -> Option<&'t str> {
        self.data().text.as_deref()
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let tree = self.tree;
        self.data().children.iter().map(move |id| tree.node(*id))
    }

    pub fn is_leaf(&self) -> bool {
        self.data().children.is_empty()
    }

    /// The nearest strict ancestor named `name`.
    pub fn ancestor_of_type(&self, name: &str) -> Option<Node<'t>> {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.name() == name {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }

    /// Every strict descendant named after one of `names`, in pre-order.
    pub fn descendants_of_type(&self, names: &[&str]) -> Vec<Node<'t>> {
        let mut found = vec![];
        let mut stack: Vec<Node<'t>> = self.children().collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            if names.contains(&node.name()) {
                found.push(node);
            }
            let len = stack.len();
            stack.extend(node.children());
            stack[len..].reverse();
        }
        found
    }

    /// The texts of all leaves below this node, joined by `separator`.
    pub fn get_text(&self, separator: &str) -> String {
        let mut texts = vec![];
        let mut stack = vec![*self];
        while let Some(node) = stack.pop() {
            if let Some(text) = node.text() {
                texts.push(text);
            }
            let len = stack.len();
            stack.extend(node.children());
            stack[len..].reverse();
        }
        texts.join(separator)
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.name(), indent = depth * 2)?;
        if let Some(text) = self.text() {
            write!(f, " {:?}", text)?;
        }
        writeln!(f)?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
