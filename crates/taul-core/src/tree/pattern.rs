use super::node::{Node, ParseTree};
use crate::source::SourcePos;
use crate::symbol::SymbolId;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    Lexical { rule_ref: Option<SymbolId> },
    /// A syntactic node whose children are matched recursively.
    Strict,
    /// A syntactic node that consumes the matched tree node's entire
    /// subtree without inspecting its interior.
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternNode {
    symbol: SymbolId,
    pos: SourcePos,
    len: u32,
    kind: PatternKind,
    child_count: u32,
}

/// Mirrors [`ParseTree`]'s construction API and additionally offers
/// [`loose_syntactic`](Self::loose_syntactic) to match a syntactic node's
/// identity without inspecting its interior.
#[derive(Debug, Clone, Default)]
pub struct ParseTreePattern {
    nodes: Vec<PatternNode>,
    open: Vec<usize>,
    aborted: bool,
}

impl ParseTreePattern {
    pub fn new() -> Self {
        ParseTreePattern::default()
    }

    pub fn skip(&mut self, _len: u32) {}

    pub fn lexical(&mut self, token: Token) {
        let parent = *self.open.last().expect("lexical() requires an open syntactic scope");
        self.nodes.push(PatternNode {
            symbol: token.id(),
            pos: token.low_pos(),
            len: token.len(),
            kind: PatternKind::Lexical { rule_ref: token.rule_id() },
            child_count: 0,
        });
        self.nodes[parent].child_count += 1;
    }

    pub fn syntactic(&mut self, ppr: SymbolId, pos: SourcePos) {
        if let Some(&parent) = self.open.last() {
            self.nodes[parent].child_count += 1;
        }
        let index = self.nodes.len();
        self.nodes.push(PatternNode { symbol: ppr, pos, len: 0, kind: PatternKind::Strict, child_count: 0 });
        self.open.push(index);
    }

    /// Matches a syntactic node's identity, position and length but treats
    /// its interior as opaque: the matched tree node's entire subtree is
    /// consumed regardless of internal structure.
    pub fn loose_syntactic(&mut self, ppr: SymbolId, pos: SourcePos, len: u32) {
        if let Some(&parent) = self.open.last() {
            self.nodes[parent].child_count += 1;
        }
        self.nodes.push(PatternNode { symbol: ppr, pos, len, kind: PatternKind::Loose, child_count: 0 });
    }

    pub fn close(&mut self) {
        let closed = self.open.pop().expect("close() with no open syntactic scope");
        // Length of a strict pattern node is derived, like ParseTree's, from
        // its last recorded child high-position; recompute it here since
        // pattern nodes don't track positions incrementally the way
        // ParseTree does.
        let high = self.subtree_high(closed);
        let node = &mut self.nodes[closed];
        node.len = high.saturating_sub(node.pos.offset());
    }

    fn subtree_high(&self, index: usize) -> u32 {
        // Walk forward from `index + 1` over exactly `child_count` direct
        // children, each possibly nested; return the greatest high position
        // seen among them, or the node's own low position if childless.
        let node = &self.nodes[index];
        let mut cursor = index + 1;
        let mut remaining = node.child_count;
        let mut high = node.pos.offset();
        while remaining > 0 {
            let child = &self.nodes[cursor];
            let child_high = child.pos.offset() + child.len;
            high = high.max(child_high);
            let skip = self.subtree_node_count(cursor);
            cursor += skip;
            remaining -= 1;
        }
        high
    }

    fn subtree_node_count(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        let mut count = 1;
        let mut cursor = index + 1;
        let mut remaining = node.child_count;
        while remaining > 0 {
            let skip = self.subtree_node_count(cursor);
            count += skip;
            cursor += skip;
            remaining -= 1;
        }
        count
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Matches this pattern against `tree`'s full node sequence, in
    /// depth-first order, starting at the root.
    pub fn matches(&self, tree: &ParseTree) -> bool {
        if self.nodes.is_empty() || tree.nodes().is_empty() {
            return self.nodes.is_empty() && tree.nodes().is_empty();
        }
        match Self::match_at(&self.nodes, 0, tree.nodes(), 0) {
            Some((pi, ti)) => pi == self.nodes.len() && ti == tree.nodes().len(),
            None => false,
        }
    }

    /// Attempts to match the pattern node at `pi` (and its subtree) against
    /// the tree node at `ti` (and its subtree). Returns the indices
    /// immediately following both subtrees on success.
    fn match_at(pnodes: &[PatternNode], pi: usize, tnodes: &[Node], ti: usize) -> Option<(usize, usize)> {
        let p = pnodes.get(pi)?;
        let t = tnodes.get(ti)?;
        if p.symbol != t.symbol() || p.pos != t.low_pos() || p.len != t.len() {
            return None;
        }
        match &p.kind {
            PatternKind::Lexical { rule_ref } => {
                if t.child_count() != 0 || *rule_ref != t.rule_ref() {
                    return None;
                }
                Some((pi + 1, ti + 1))
            }
            PatternKind::Loose => {
                let tree_subtree_len = subtree_node_count(tnodes, ti);
                Some((pi + 1, ti + tree_subtree_len))
            }
            PatternKind::Strict => {
                if p.child_count != t.child_count() {
                    return None;
                }
                let mut pc = pi + 1;
                let mut tc = ti + 1;
                for _ in 0..p.child_count {
                    let (np, nt) = Self::match_at(pnodes, pc, tnodes, tc)?;
                    pc = np;
                    tc = nt;
                }
                Some((pc, tc))
            }
        }
    }
}

fn subtree_node_count(nodes: &[Node], index: usize) -> usize {
    let node = &nodes[index];
    let mut count = 1;
    let mut cursor = index + 1;
    for _ in 0..node.child_count() {
        let skip = subtree_node_count(nodes, cursor);
        count += skip;
        cursor += skip;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

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
    fn strict_pattern_matches_identical_tree() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(0, 0, 1));
        t.lexical(tok(0, 1, 1));
        t.close();

        let mut p = ParseTreePattern::new();
        p.syntactic(ppr(0), SourcePos::new(0));
        p.lexical(tok(0, 0, 1));
        p.lexical(tok(0, 1, 1));
        p.close();

        assert!(p.matches(&t));
    }

    #[test]
    fn strict_pattern_rejects_differing_child() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.lexical(tok(0, 0, 1));
        t.close();

        let mut p = ParseTreePattern::new();
        p.syntactic(ppr(0), SourcePos::new(0));
        p.lexical(tok(1, 0, 1));
        p.close();

        assert!(!p.matches(&t));
    }

    #[test]
    fn loose_pattern_consumes_whole_subtree() {
        let mut t = ParseTree::new();
        t.syntactic(ppr(0), SourcePos::new(0));
        t.syntactic(ppr(1), SourcePos::new(0));
        t.lexical(tok(0, 0, 1));
        t.lexical(tok(0, 1, 2));
        t.close();
        t.close();

        let mut p = ParseTreePattern::new();
        p.syntactic(ppr(0), SourcePos::new(0));
        p.loose_syntactic(ppr(1), SourcePos::new(0), 3);
        p.close();

        assert!(p.matches(&t));
    }
}
