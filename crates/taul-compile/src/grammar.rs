//! The compiled grammar a loaded spec produces: every rule's resolved
//! body alongside the FIRST/FOLLOW facts the runtime pipeline consults at
//! `Ref` boundaries while walking those bodies directly.

use indexmap::IndexMap;

use taul_core::{ParseTree, Qualifier, SourceCode, SymbolId};

use crate::tables::{ParseTable, RExpr};

/// One declared rule: its stable id, its qualifier, and its name-resolved
/// body.
#[derive(Debug, Clone)]
pub struct RuleInfo {
    pub name: String,
    pub id: SymbolId,
    pub qualifier: Qualifier,
    pub expr: RExpr,
}

/// A fully loaded grammar, ready for the runtime reader/lexer/parser
/// pipeline to drive. Lexical rules (LPRs) and syntactic rules (PPRs)
/// keep entirely separate id-to-rule maps and parse tables; a PPR body's
/// `Terminal` nodes reference LPR ids but never index into `lpr_rules`
/// directly (the lexer, not the parser, walks LPR bodies).
#[derive(Debug, Clone)]
pub struct Grammar {
    pub lpr_order: Vec<String>,
    pub ppr_order: Vec<String>,
    pub lpr_ids: IndexMap<String, SymbolId>,
    pub ppr_ids: IndexMap<String, SymbolId>,
    pub lpr_rules: IndexMap<SymbolId, RuleInfo>,
    pub ppr_rules: IndexMap<SymbolId, RuleInfo>,
    pub lexical_table: ParseTable,
    pub syntactic_table: ParseTable,
}

impl Grammar {
    pub fn lpr_rule(&self, id: SymbolId) -> Option<&RuleInfo> {
        self.lpr_rules.get(&id)
    }

    pub fn ppr_rule(&self, id: SymbolId) -> Option<&RuleInfo> {
        self.ppr_rules.get(&id)
    }

    pub fn lpr_id(&self, name: &str) -> Option<SymbolId> {
        self.lpr_ids.get(name).copied()
    }

    pub fn ppr_id(&self, name: &str) -> Option<SymbolId> {
        self.ppr_ids.get(name).copied()
    }

    /// LPRs in declaration order, skipping `support`-qualified ones —
    /// those exist only to be called as subroutines by other LPRs and are
    /// never themselves attempted as a whole-token match.
    pub fn lexer_entry_points(&self) -> impl Iterator<Item = &RuleInfo> {
        self.lpr_order
            .iter()
            .filter_map(move |name| self.lpr_rules.get(self.lpr_ids.get(name)?))
            .filter(|r| r.qualifier != Qualifier::Support)
    }

    /// The declared name behind an LPR or PPR id, for diagnostics that
    /// need to print a rule by name rather than by raw id.
    pub fn rule_name(&self, id: SymbolId) -> Option<String> {
        self.lpr_rule(id).or_else(|| self.ppr_rule(id)).map(|r| r.name.clone())
    }

    /// Renders `tree` in the parse-tree text format (spec.md §6), looking
    /// up rule names against this grammar.
    pub fn fmt_tree(&self, tree: &ParseTree, source: &SourceCode) -> String {
        tree.fmt_tree(source, |id| self.rule_name(id))
    }
}

#[cfg(test)]
mod tests {
    use taul_core::source::SourcePos;
    use taul_core::{SpecWriter, Token};

    use super::*;
    use crate::load;

    #[test]
    fn fmt_tree_resolves_names_from_the_grammar() {
        let mut w = SpecWriter::new();
        w.lpr_decl("chr");
        w.ppr_decl("start");
        w.lpr("chr", Qualifier::None).any().close();
        w.ppr("start", Qualifier::None).name("chr").close();
        let spec = w.done();
        let grammar = load(&spec).expect("grammar loads");

        let chr_id = grammar.lpr_id("chr").unwrap();
        let start_id = grammar.ppr_id("start").unwrap();

        let mut tree = ParseTree::new();
        tree.syntactic(start_id, SourcePos::new(0));
        tree.lexical(Token::normal(chr_id, SourcePos::new(0), 1));
        tree.close();

        let mut source = SourceCode::new();
        source.add("t", "a");

        let rendered = grammar.fmt_tree(&tree, &source);
        assert!(rendered.lines().next().unwrap().ends_with("start"));
        assert!(rendered.lines().nth(1).unwrap().ends_with("chr 'a'"));
    }

    #[test]
    fn fmt_tree_snapshot() {
        let mut w = SpecWriter::new();
        w.lpr_decl("chr");
        w.ppr_decl("start");
        w.lpr("chr", Qualifier::None).any().close();
        w.ppr("start", Qualifier::None).name("chr").close();
        let spec = w.done();
        let grammar = load(&spec).expect("grammar loads");

        let chr_id = grammar.lpr_id("chr").unwrap();
        let start_id = grammar.ppr_id("start").unwrap();

        let mut tree = ParseTree::new();
        tree.syntactic(start_id, SourcePos::new(0));
        tree.lexical(Token::normal(chr_id, SourcePos::new(0), 1));
        tree.close();

        let mut source = SourceCode::new();
        source.add("t", "a");

        let rendered = grammar.fmt_tree(&tree, &source);
        insta::assert_snapshot!(rendered, @r"
        [pos 0, len 1] ppr#0 start
        	[pos 0, len 1] lpr#0 chr 'a'
        ");
    }
}
