use crate::source::{SourceCode, SourcePos};
use crate::symbol::SymbolId;
use crate::token::Token;

/// An index into a [`ParseTree`]'s node array, or the absence of one. The
/// `NONE` sentinel stands in for a null reference so relations stay plain
/// indices instead of an `Option<usize>` at every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(u32);

impl NodeRef {
    pub const NONE: NodeRef = NodeRef(u32::MAX);

    fn some(i: usize) -> Self {
        NodeRef(i as u32)
    }

    pub fn index(self) -> Option<usize> {
        if self.0 == u32::MAX { None } else { Some(self.0 as usize) }
    }

    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        NodeRef::NONE
    }
}

/// One node of a parse tree: either a lexical (LPR) leaf or a syntactic
/// (PPR) interior node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    index: u32,
    level: u32,
    symbol: SymbolId,
    pos: SourcePos,
    len: u32,
    parent: NodeRef,
    left_sibling: NodeRef,
    right_sibling: NodeRef,
    right_child: NodeRef,
    child_count: u32,
    rule_ref: Option<SymbolId>,
}

impl Node {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    pub fn low_pos(&self) -> SourcePos {
        self.pos
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn high_pos(&self) -> SourcePos {
        SourcePos::new(self.pos.offset() + self.len)
    }

    pub fn parent(&self) -> NodeRef {
        self.parent
    }

    pub fn left_sibling(&self) -> NodeRef {
        self.left_sibling
    }

    pub fn right_sibling(&self) -> NodeRef {
        self.right_sibling
    }

    pub fn right_child(&self) -> NodeRef {
        self.right_child
    }

    pub fn child_count(&self) -> u32 {
        self.child_count
    }

    pub fn rule_ref(&self) -> Option<SymbolId> {
        self.rule_ref
    }

    /// True for any leaf node: a normal LPR-id token, or a consumed
    /// `failure` sentinel (the `failure` opcode can appear as an ordinary
    /// terminal inside a PPR body, spec.md §3). A syntactic (PPR) node is
    /// never lexical, even an empty-bodied one with zero children.
    pub fn is_lexical(&self) -> bool {
        self.child_count == 0 && !self.symbol.is_ppr()
    }

    pub fn is_syntactic(&self) -> bool {
        self.symbol.is_ppr()
    }

    /// Renders this node as one line of the parse-tree text format (spec.md
    /// §6): `"[pos N, len M] id name 'text'"` for a lexical node, or
    /// `"[pos N, len M] id name"` for a syntactic one. `rule_name` looks up
    /// the LPR/PPR name behind [`Node::rule_ref`] — names live in the
    /// grammar, not the tree, so this crate can't resolve them itself. A
    /// lexical `failure` node has no rule at all; its name renders as `?`.
    fn fmt_line(&self, source: &SourceCode, rule_name: &dyn Fn(SymbolId) -> Option<String>) -> String {
        let name = self.rule_ref.and_then(rule_name).unwrap_or_else(|| "?".to_string());
        let head = format!("[pos {}, len {}] {} {}", self.pos.offset(), self.len, self.symbol, name);
        if self.is_lexical() {
            let text = &source.text()[self.pos.offset() as usize..self.high_pos().offset() as usize];
            format!("{head} '{text}'")
        } else {
            head
        }
    }
}

/// An append-only, depth-first array of parse-tree nodes.
///
/// Serves both as the mutable object a parser builds into (via `skip`,
/// `lexical`, `syntactic`, `close`, `abort`) and, once sealed, as the
/// finished immutable tree consumers walk.
#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    nodes: Vec<Node>,
    /// Indices of currently-open syntactic scopes, innermost last.
    open: Vec<u32>,
    aborted: bool,
}

impl ParseTree {
    pub fn new() -> Self {
        ParseTree::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn get(&self, r: NodeRef) -> Option<&Node> {
        r.index().and_then(|i| self.nodes.get(i))
    }

    /// A tree is sealed once it has at least one node and every syntactic
    /// scope opened by `syntactic` has been matched by a `close`.
    pub fn is_sealed(&self) -> bool {
        !self.nodes.is_empty() && self.open.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Marks the tree as having ended on an unrecovered syntax error.
    /// Settable at any point before sealing; does not affect `is_sealed`.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Advances past a suppressed skip token. Skip tokens never contribute
    /// to the tree: no node is created and no ancestor length is extended.
    pub fn skip(&mut self, _len: u32) {}

    /// Appends a lexical (LPR) leaf node for `token` as a child of the
    /// current open scope, and extends that scope's length to cover it.
    ///
    /// Panics if there is no open syntactic scope — a lexical node only
    /// ever arises while parsing the body of some PPR.
    pub fn lexical(&mut self, token: Token) {
        let parent_idx = *self.open.last().expect("lexical() requires an open syntactic scope");
        let index = self.nodes.len() as u32;
        let level = self.nodes[parent_idx as usize].level + 1;
        let node = Node {
            index,
            level,
            symbol: token.id(),
            pos: token.low_pos(),
            len: token.len(),
            parent: NodeRef::some(parent_idx as usize),
            left_sibling: NodeRef::NONE,
            right_sibling: NodeRef::NONE,
            right_child: NodeRef::NONE,
            child_count: 0,
            rule_ref: token.rule_id(),
        };
        self.append_child(parent_idx, index, node);
        self.extend_len(parent_idx, token.high_pos());
    }

    /// Opens a new syntactic (PPR) scope as a child of the current open
    /// scope (or as the root, if none is open), and pushes it as current.
    pub fn syntactic(&mut self, ppr: SymbolId, pos: SourcePos) -> NodeRef {
        debug_assert!(ppr.is_ppr());
        let index = self.nodes.len() as u32;
        let parent = self.open.last().copied();
        let level = parent.map(|p| self.nodes[p as usize].level + 1).unwrap_or(0);
        let parent_ref = match parent {
            Some(p) => NodeRef::some(p as usize),
            None => NodeRef::NONE,
        };
        let node = Node {
            index,
            level,
            symbol: ppr,
            pos,
            len: 0,
            parent: parent_ref,
            left_sibling: NodeRef::NONE,
            right_sibling: NodeRef::NONE,
            right_child: NodeRef::NONE,
            child_count: 0,
            rule_ref: Some(ppr),
        };
        if let Some(p) = parent {
            self.append_child(p, index, node);
        } else {
            self.nodes.push(node);
        }
        self.open.push(index);
        NodeRef::some(index as usize)
    }

    /// Closes the current syntactic scope, contributing its final
    /// high-position to its parent's length (if any).
    pub fn close(&mut self) {
        let closed = self.open.pop().expect("close() with no open syntactic scope");
        let high = self.nodes[closed as usize].high_pos();
        if let Some(&parent_idx) = self.open.last() {
            self.extend_len(parent_idx, high);
        }
    }

    /// Inserts a new syntactic node of `symbol` directly before the node at
    /// `child_root`, and re-parents that node's entire subtree underneath
    /// it as its first (and so far only) child. Pushes the new node as the
    /// current open scope, so a following `lexical`/`syntactic`/`close`
    /// extends it.
    ///
    /// `child_root` must be the most recently completed top-level node —
    /// nothing may have been appended to the tree since it was closed. This
    /// is how the runtime pipeline rewrites a left-recursive PPR's flattened
    /// `base (tail)*` match back into the left-leaning binary shape the
    /// grammar describes (spec.md §4.3, §9): each tail application wraps
    /// the previous complete application as its left operand, which a
    /// purely append-only array can't express without this kind of
    /// surgery, since the wrapping node must precede its new child in
    /// depth-first order but is only known to be needed after that child
    /// is already built.
    pub fn wrap_as_parent(&mut self, child_root: usize, symbol: SymbolId) -> NodeRef {
        assert!(child_root < self.nodes.len(), "wrap_as_parent: child_root out of range");
        let insert_at = child_root as u32;
        let old = self.nodes[child_root].clone();

        let bump = |r: NodeRef| -> NodeRef {
            match r.index() {
                Some(i) if i as u32 >= insert_at => NodeRef::some(i + 1),
                _ => r,
            }
        };
        for n in self.nodes.iter_mut() {
            if n.index >= insert_at {
                n.index += 1;
            }
            n.parent = bump(n.parent);
            n.left_sibling = bump(n.left_sibling);
            n.right_sibling = bump(n.right_sibling);
            n.right_child = bump(n.right_child);
        }
        for o in self.open.iter_mut() {
            if *o >= insert_at {
                *o += 1;
            }
        }
        // The old child_root's whole subtree now sits one layer deeper.
        for n in self.nodes[child_root..].iter_mut() {
            n.level += 1;
        }

        let high = old.high_pos();
        let new_node = Node {
            index: insert_at,
            level: old.level,
            symbol,
            pos: old.pos,
            len: high.offset().saturating_sub(old.pos.offset()),
            parent: old.parent,
            left_sibling: old.left_sibling,
            right_sibling: NodeRef::NONE,
            right_child: NodeRef::some(child_root + 1),
            child_count: 1,
            rule_ref: Some(symbol),
        };
        self.nodes.insert(child_root, new_node);

        if let Some(p) = old.parent.index() {
            if self.nodes[p].right_child.index() == Some(child_root + 1) {
                self.nodes[p].right_child = NodeRef::some(child_root);
            }
        }
        if let Some(ls) = old.left_sibling.index() {
            self.nodes[ls].right_sibling = NodeRef::some(child_root);
        }
        self.nodes[child_root + 1].parent = NodeRef::some(child_root);
        self.nodes[child_root + 1].left_sibling = NodeRef::NONE;

        self.open.push(insert_at);
        NodeRef::some(child_root)
    }

    fn append_child(&mut self, parent_idx: u32, child_index: u32, mut child: Node) {
        let prev_right_child = self.nodes[parent_idx as usize].right_child;
        if let Some(prev_idx) = prev_right_child.index() {
            child.left_sibling = NodeRef::some(prev_idx);
            self.nodes[prev_idx].right_sibling = NodeRef::some(child_index as usize);
        }
        self.nodes.push(child);
        let parent = &mut self.nodes[parent_idx as usize];
        parent.right_child = NodeRef::some(child_index as usize);
        parent.child_count += 1;
    }

    /// Renders the full tree in the parse-tree text format (spec.md §6):
    /// one [`Node::fmt_line`] per node, each indented one tab per level.
    /// Diagnostics only — not a serialization format any loader reads back.
    pub fn fmt_tree(&self, source: &SourceCode, rule_name: impl Fn(SymbolId) -> Option<String>) -> String {
        let mut out = String::new();
        for node in self.iter() {
            if !out.is_empty() {
                out.push('\n');
            }
            for _ in 0..node.level() {
                out.push('\t');
            }
            out.push_str(&node.fmt_line(source, &rule_name));
        }
        out
    }

    fn extend_len(&mut self, node_idx: u32, high: SourcePos) {
        let node = &mut self.nodes[node_idx as usize];
        let candidate = high.offset().saturating_sub(node.pos.offset());
        if candidate > node.len {
            node.len = candidate;
        }
    }
}

impl PartialEq for ParseTree {
    /// Structural equality: ids, positions, lengths, and rule references
    /// must match node-for-node, and both trees must be sealed. The
    /// `aborted` flag is deliberately excluded.
    fn eq(&self, other: &Self) -> bool {
        self.is_sealed() && other.is_sealed() && self.nodes == other.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolId;

    fn ppr(i: u32) -> SymbolId {
        SymbolId::from_ppr_index(i)
    }
    fn lpr(i: u32) -> SymbolId {
        SymbolId::from_lpr_index(i)
    }
    fn tok(rule: u32, pos: u32, len: u32) -> Token {
        Token::normal(lpr(rule), SourcePos::new(pos), len)
    }

    #[test]
    fn s2_three_any_char_children() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(0, 0, 1));
        t.lexical(tok(0, 2, 1));
        t.lexical(tok(0, 4, 1));
        t.close();
        assert!(t.is_sealed());
        let root = t.root().unwrap();
        assert_eq!(root.low_pos(), SourcePos::new(0));
        assert_eq!(root.len(), 5);
        assert_eq!(root.child_count(), 3);
    }

    #[test]
    fn empty_syntactic_node_has_zero_length() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(3));
        t.close();
        assert_eq!(t.root().unwrap().len(), 0);
    }

    #[test]
    fn sibling_chain_links_both_ways() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(0, 0, 1));
        t.lexical(tok(0, 1, 1));
        t.close();
        let first = t.get(t.root().unwrap().right_child()).unwrap();
        assert!(first.left_sibling().is_none());
        let second = t.get(first.right_sibling()).unwrap();
        assert!(second.right_sibling().is_none());
        assert_eq!(t.get(second.left_sibling()).unwrap().index(), first.index());
    }

    #[test]
    fn nested_scopes_cascade_length_up() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.syntactic(ppr(1), SourcePos::new(0));
        t.lexical(tok(0, 0, 4));
        t.close();
        t.close();
        assert_eq!(t.root().unwrap().len(), 4);
        assert!(t.is_sealed());
    }

    #[test]
    fn aborted_is_independent_of_equality() {
        let mut a = ParseTree::new();
        a.syntactic(ppr(0), SourcePos::new(0));
        a.close();
        let mut b = a.clone();
        b.abort();
        assert_eq!(a, b);
        assert!(!a.is_aborted());
        assert!(b.is_aborted());
    }

    #[test]
    fn wrap_as_parent_rebuilds_left_leaning_chain() {
        // Mirrors how the runtime climbs `E: E '+' E | INT;` over "1+2+3":
        // each `+` wraps the previous complete E application as its left
        // child, producing E(E(E(1) '+' E(2)) '+' E(3)).
        let mut t = ParseTree::new();

        let root = t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(1, 0, 1)); // "1"
        t.close();
        let child_root = root.index().unwrap();

        t.wrap_as_parent(child_root, ppr(0));
        t.lexical(tok(2, 1, 1)); // "+"
        t.syntactic(ppr(0), SourcePos::new(2));
        t.lexical(tok(1, 2, 1)); // "2"
        t.close();
        t.close();

        t.wrap_as_parent(child_root, ppr(0));
        t.lexical(tok(2, 3, 1)); // "+"
        t.syntactic(ppr(0), SourcePos::new(4));
        t.lexical(tok(1, 4, 1)); // "3"
        t.close();
        t.close();

        assert!(t.is_sealed());
        let root = t.root().unwrap();
        assert_eq!(root.low_pos(), SourcePos::new(0));
        assert_eq!(root.len(), 5);
        assert_eq!(root.child_count(), 3);

        let lhs = t.get(root.right_child()).unwrap();
        assert_eq!(lhs.symbol(), ppr(0));
        assert_eq!(lhs.child_count(), 3);
        assert_eq!(lhs.low_pos(), SourcePos::new(0));
        assert_eq!(lhs.len(), 3);

        let plus2 = t.get(lhs.right_sibling()).unwrap();
        assert!(plus2.is_lexical());
        let rhs3 = t.get(plus2.right_sibling()).unwrap();
        assert_eq!(rhs3.symbol(), ppr(0));
        assert!(rhs3.right_sibling().is_none());
    }

    #[test]
    fn fmt_tree_renders_indent_and_text() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(1, 0, 1));
        t.close();

        let mut src = SourceCode::new();
        src.add("t", "a");
        let names = |id: SymbolId| {
            if id == ppr(0) {
                Some("start".to_string())
            } else if id == lpr(1) {
                Some("chr".to_string())
            } else {
                None
            }
        };
        let rendered = t.fmt_tree(&src, names);
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap(), format!("[pos 0, len 1] {} start", ppr(0)));
        assert_eq!(lines.next().unwrap(), format!("\t[pos 0, len 1] {} chr 'a'", lpr(1)));
        assert!(lines.next().is_none());
    }

    #[test]
    fn unsealed_tree_is_never_equal() {
        let mut a = ParseTree::new();
        a.syntactic(ppr(0), SourcePos::new(0));
        let mut b = ParseTree::new();
        b.syntactic(ppr(0), SourcePos::new(0));
        assert_ne!(a, b);
        a.close();
        b.close();
        assert_eq!(a, b);
    }
}
