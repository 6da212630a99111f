//! The parse-tree data model: an append-only, depth-first node array plus
//! its pattern-matching counterpart.

mod node;
mod pattern;

pub use node::{Node, NodeRef, ParseTree};
pub use pattern::ParseTreePattern;

/// The construction-time view of a [`ParseTree`] is the same type — a tree
/// is "owned by its parser during construction and returned by value on
/// completion" (spec §3), so there is no separate builder type, only a
/// distinction in which methods a caller is expected to use before vs.
/// after [`ParseTree::is_sealed`] becomes true.
pub type ParseTreeBuilder = ParseTree;
