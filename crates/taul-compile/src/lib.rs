//! Validates a spec instruction stream, lowers precedence PPRs into
//! left-recursion-free form, resolves every rule body's names, builds
//! FIRST/FOLLOW/PREDICT facts, and assembles the result into a
//! [`Grammar`] the runtime pipeline can drive directly.

mod ast;
mod grammar;
mod load;
mod lower;
mod tables;
mod validate;

pub use grammar::{Grammar, RuleInfo};
pub use load::load;
pub use lower::{LoweredPrecedence, PrecedenceTag, RecurseTail, lower_precedence_body};
pub use tables::{ParseTable, RExpr, RuleScope, TermSet, resolve_precedence_rule};
pub use validate::{RuleDef, ValidatedProgram, validate};

#[cfg(test)]
mod tests {
    use super::*;
    use taul_core::{Qualifier, SpecWriter};

    #[test]
    fn loads_a_minimal_grammar_end_to_end() {
        let mut w = SpecWriter::new();
        w.lpr_decl("a");
        w.ppr_decl("start");
        w.lpr("a", Qualifier::None).string("a").close();
        w.ppr("start", Qualifier::None).name("a").close();
        let spec = w.done();

        let grammar = load(&spec).expect("minimal grammar loads cleanly");
        assert_eq!(grammar.lpr_order, vec!["a".to_string()]);
        assert_eq!(grammar.ppr_order, vec!["start".to_string()]);
        let start_id = grammar.ppr_id("start").unwrap();
        assert!(grammar.ppr_rule(start_id).is_some());
    }

    #[test]
    fn rejects_left_recursion_without_precedence_qualifier() {
        let mut w = SpecWriter::new();
        w.ppr_decl("expr");
        w.ppr("expr", Qualifier::None).name("expr").string("+").close();
        let spec = w.done();

        let err = load(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(&d.kind, taul_core::ErrorKind::IllegalAmbiguity(n, _) if n == "expr")));
    }

    #[test]
    fn accepts_left_recursion_with_precedence_qualifier() {
        let mut w = SpecWriter::new();
        w.lpr_decl("num");
        w.ppr_decl("expr");
        w.lpr("num", Qualifier::None).charset("0-9").close();
        w.ppr("expr", Qualifier::Precedence)
            .name("num")
            .alternative()
            .name("expr")
            .string("+")
            .name("expr")
            .close();
        let spec = w.done();

        let grammar = load(&spec).expect("precedence-qualified left recursion is legal");
        assert!(grammar.ppr_id("expr").is_some());
    }

    #[test]
    fn reports_ambiguous_alternatives() {
        let mut w = SpecWriter::new();
        w.lpr_decl("a");
        w.ppr_decl("start");
        w.lpr("a", Qualifier::None).string("a").close();
        w.ppr("start", Qualifier::None).name("a").alternative().name("a").close();
        let spec = w.done();

        let err = load(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(&d.kind, taul_core::ErrorKind::IllegalAmbiguity(n, _) if n == "start")));
    }
}
