//! Structural and semantic validation of a spec (spec.md §4.2): two
//! explicit stacks (expression scopes, definition scopes) tracked while a
//! single pass over the instruction stream also builds each rule body's
//! [`Expr`] tree, so the lowerer and table builder never need to re-walk
//! raw instructions.

mod scope;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use taul_core::error::ErrorKind;
use taul_core::source::SourceCode;
use taul_core::spec::{Ctx, Opcode, SpecInterpreter, interpret};
use taul_core::{ErrorCounter, Qualifier, Spec, SourcePos, SymbolId};

use crate::ast::Expr;
use scope::{DefFrame, ExprFrame, Marks, Scope};

/// One rule's definition as recovered from the instruction stream: its
/// assigned id, its qualifier, and its parsed body.
#[derive(Debug, Clone)]
pub struct RuleDef {
    pub id: SymbolId,
    pub qualifier: Qualifier,
    pub body: Expr,
}

/// The output of a successful validation pass: every declared rule has a
/// stable id, and every defined rule has a parsed body, ready for the LL
/// lowerer.
#[derive(Debug, Clone, Default)]
pub struct ValidatedProgram {
    pub lpr_order: Vec<String>,
    pub ppr_order: Vec<String>,
    pub lpr_ids: IndexMap<String, SymbolId>,
    pub ppr_ids: IndexMap<String, SymbolId>,
    pub lpr_defs: IndexMap<String, RuleDef>,
    pub ppr_defs: IndexMap<String, RuleDef>,
}

struct NameRef {
    name: String,
    pos: SourcePos,
    scope: Scope,
}

#[derive(Default)]
struct Validator {
    errors: ErrorCounter,
    src: Option<Arc<SourceCode>>,
    any_definition_occurred: bool,

    declared_lpr: IndexSet<String>,
    declared_ppr: IndexSet<String>,
    defined_lpr: IndexSet<String>,
    defined_ppr: IndexSet<String>,
    lpr_ids: IndexMap<String, SymbolId>,
    ppr_ids: IndexMap<String, SymbolId>,
    lpr_defs: IndexMap<String, RuleDef>,
    ppr_defs: IndexMap<String, RuleDef>,

    def_stack: Vec<DefFrame>,
    expr_stack: Vec<ExprFrame>,
    refs: Vec<NameRef>,
}

impl Validator {
    fn push_err(&mut self, kind: ErrorKind, pos: SourcePos) {
        let src = self.src.as_deref();
        self.errors.push(kind, pos, src);
    }

    fn assign_lpr_id(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.lpr_ids.get(name) {
            return *id;
        }
        let id = SymbolId::from_lpr_index(self.lpr_ids.len() as u32);
        self.lpr_ids.insert(name.to_string(), id);
        id
    }

    fn assign_ppr_id(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.ppr_ids.get(name) {
            return *id;
        }
        let id = SymbolId::from_ppr_index(self.ppr_ids.len() as u32);
        self.ppr_ids.insert(name.to_string(), id);
        id
    }

    fn current_scope(&self) -> Option<Scope> {
        self.def_stack.last().map(|f| f.scope)
    }

    /// Pushes a leaf expression onto the innermost open scope, enforcing
    /// that scope's non-propagating marks.
    fn push_leaf(&mut self, pos: SourcePos, expr: Expr) {
        let Some(frame) = self.expr_stack.last_mut() else {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
            return;
        };
        if frame.marks.single_subexpression && !frame.current.is_empty() {
            self.push_err(ErrorKind::IllegalInSingleSubexprScope, pos);
            return;
        }
        if frame.marks.single_terminal && !is_single_terminal(&expr) {
            self.push_err(ErrorKind::IllegalInSingleTerminalScope, pos);
            return;
        }
        frame.current.push(expr);
    }

    /// Rejects an opcode that is structurally illegal in the enclosing
    /// rule's scope (e.g. `token` inside an LPR, `any` inside a PPR).
    fn check_scope_legality(&mut self, pos: SourcePos, opcode: Opcode) -> bool {
        match self.current_scope() {
            None => {
                self.push_err(ErrorKind::IllegalInNoScope, pos);
                false
            }
            Some(Scope::Lexical) => {
                if matches!(opcode, Opcode::Token | Opcode::Failure) {
                    self.push_err(ErrorKind::IllegalInLprScope, pos);
                    false
                } else {
                    true
                }
            }
            Some(Scope::Syntactic) => {
                if matches!(opcode, Opcode::Any | Opcode::String | Opcode::Charset) {
                    self.push_err(ErrorKind::IllegalInPprScope, pos);
                    false
                } else {
                    true
                }
            }
        }
    }

    fn open_composite(&mut self, opcode: Opcode) {
        let inherited = self.expr_stack.last().map(|f| f.marks).unwrap_or_default();
        let marks = match opcode {
            Opcode::Lookahead | Opcode::LookaheadNot | Opcode::Not => Marks {
                single_terminal: true,
                single_subexpression: true,
                no_end_subexpression: true,
                ..Default::default()
            },
            Opcode::Optional | Opcode::KleeneStar | Opcode::KleenePlus => {
                Marks { no_alternation: true, single_subexpression: true, ..Default::default() }
            }
            Opcode::Sequence => Marks {
                single_terminal: inherited.single_terminal,
                no_end_subexpression: inherited.no_end_subexpression,
                ..Default::default()
            },
            _ => Marks::default(),
        };
        self.expr_stack.push(ExprFrame::new(opcode, marks));
    }

    fn finish_rule(&mut self, def: DefFrame, body: Expr) {
        match def.scope {
            Scope::Lexical => {
                let id = self.assign_lpr_id(&def.name);
                self.lpr_defs.insert(def.name, RuleDef { id, qualifier: def.qualifier, body });
            }
            Scope::Syntactic => {
                let id = self.assign_ppr_id(&def.name);
                self.ppr_defs.insert(def.name, RuleDef { id, qualifier: def.qualifier, body });
            }
        }
    }

    fn resolve_refs(&mut self) {
        for r in std::mem::take(&mut self.refs) {
            let is_lpr = self.declared_lpr.contains(&r.name);
            let is_ppr = self.declared_ppr.contains(&r.name);
            if !is_lpr && !is_ppr {
                self.push_err(ErrorKind::RuleNeverDeclared(r.name.clone()), r.pos);
            } else if r.scope == Scope::Lexical && is_ppr && !is_lpr {
                self.push_err(ErrorKind::RuleMayNotBePpr(r.name.clone()), r.pos);
            }
        }
    }

    fn finish(mut self) -> Result<ValidatedProgram, ErrorCounter> {
        if !self.def_stack.is_empty() || !self.expr_stack.is_empty() {
            self.errors.push_unlocated(ErrorKind::ScopeNotClosed);
        }
        for name in self.declared_lpr.iter() {
            if !self.defined_lpr.contains(name) {
                self.errors.push_unlocated(ErrorKind::RuleNeverDefined(name.clone()));
            }
        }
        for name in self.declared_ppr.iter() {
            if !self.defined_ppr.contains(name) {
                self.errors.push_unlocated(ErrorKind::RuleNeverDefined(name.clone()));
            }
        }
        self.resolve_refs();

        if self.errors.has_errors() {
            return Err(self.errors);
        }
        Ok(ValidatedProgram {
            lpr_order: self.lpr_ids.keys().cloned().collect(),
            ppr_order: self.ppr_ids.keys().cloned().collect(),
            lpr_ids: self.lpr_ids,
            ppr_ids: self.ppr_ids,
            lpr_defs: self.lpr_defs,
            ppr_defs: self.ppr_defs,
        })
    }
}

fn is_single_terminal(expr: &Expr) -> bool {
    match expr {
        Expr::Name(_) | Expr::CharsetLit(_) | Expr::Any | Expr::Token | Expr::Failure | Expr::End => true,
        Expr::StringLit(s) => s.chars().count() == 1,
        _ => false,
    }
}

impl SpecInterpreter for Validator {
    fn on_lpr_decl(&mut self, ctx: Ctx, name: &str) {
        let pos = SourcePos::new(ctx.pos);
        if self.any_definition_occurred {
            self.push_err(ErrorKind::IllegalRuleDeclare, pos);
            return;
        }
        if self.declared_lpr.contains(name) || self.declared_ppr.contains(name) {
            self.push_err(ErrorKind::RuleNameConflict(name.to_string()), pos);
            return;
        }
        self.declared_lpr.insert(name.to_string());
        self.assign_lpr_id(name);
    }

    fn on_ppr_decl(&mut self, ctx: Ctx, name: &str) {
        let pos = SourcePos::new(ctx.pos);
        if self.any_definition_occurred {
            self.push_err(ErrorKind::IllegalRuleDeclare, pos);
            return;
        }
        if self.declared_lpr.contains(name) || self.declared_ppr.contains(name) {
            self.push_err(ErrorKind::RuleNameConflict(name.to_string()), pos);
            return;
        }
        self.declared_ppr.insert(name.to_string());
        self.assign_ppr_id(name);
    }

    fn on_lpr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {
        let pos = SourcePos::new(ctx.pos);
        self.any_definition_occurred = true;
        if !self.declared_lpr.contains(name) {
            if self.declared_ppr.contains(name) {
                self.push_err(ErrorKind::RuleNameConflict(name.to_string()), pos);
            } else {
                self.push_err(ErrorKind::RuleNeverDeclared(name.to_string()), pos);
                self.declared_lpr.insert(name.to_string());
            }
        }
        if self.defined_lpr.contains(name) {
            self.push_err(ErrorKind::RuleAlreadyDefined(name.to_string()), pos);
        } else {
            self.defined_lpr.insert(name.to_string());
        }
        if qualifier == Qualifier::Precedence {
            self.push_err(ErrorKind::IllegalQualifier(qualifier.to_string(), name.to_string()), pos);
        }
        self.assign_lpr_id(name);
        self.def_stack.push(DefFrame { name: name.to_string(), qualifier, scope: Scope::Lexical });
        self.expr_stack.push(ExprFrame::new(Opcode::Lpr, Marks::default()));
    }

    fn on_ppr(&mut self, ctx: Ctx, name: &str, qualifier: Qualifier) {
        let pos = SourcePos::new(ctx.pos);
        self.any_definition_occurred = true;
        if !self.declared_ppr.contains(name) {
            if self.declared_lpr.contains(name) {
                self.push_err(ErrorKind::RuleNameConflict(name.to_string()), pos);
            } else {
                self.push_err(ErrorKind::RuleNeverDeclared(name.to_string()), pos);
                self.declared_ppr.insert(name.to_string());
            }
        }
        if self.defined_ppr.contains(name) {
            self.push_err(ErrorKind::RuleAlreadyDefined(name.to_string()), pos);
        } else {
            self.defined_ppr.insert(name.to_string());
        }
        if qualifier == Qualifier::Skip {
            self.push_err(ErrorKind::IllegalQualifier(qualifier.to_string(), name.to_string()), pos);
        }
        self.assign_ppr_id(name);
        self.def_stack.push(DefFrame { name: name.to_string(), qualifier, scope: Scope::Syntactic });
        self.expr_stack.push(ExprFrame::new(Opcode::Ppr, Marks::default()));
    }

    fn on_close(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        let Some(mut frame) = self.expr_stack.pop() else {
            self.push_err(ErrorKind::StrayClose, pos);
            return;
        };
        frame.alts.push(Expr::from_items(std::mem::take(&mut frame.current)));
        let body = Expr::from_alternatives(frame.alts);
        let wrapped = match frame.opcode {
            Opcode::Lookahead => Expr::Lookahead(Box::new(body)),
            Opcode::LookaheadNot => Expr::LookaheadNot(Box::new(body)),
            Opcode::Not => Expr::Not(Box::new(body)),
            Opcode::Optional => Expr::Optional(Box::new(body)),
            Opcode::KleeneStar => Expr::KleeneStar(Box::new(body)),
            Opcode::KleenePlus => Expr::KleenePlus(Box::new(body)),
            Opcode::Sequence => body,
            Opcode::Lpr | Opcode::Ppr => {
                let def = self.def_stack.pop().expect("rule-body close without a def frame");
                self.finish_rule(def, body);
                return;
            }
            _ => body,
        };
        if let Some(parent) = self.expr_stack.last_mut() {
            if parent.marks.single_subexpression && !parent.current.is_empty() {
                self.push_err(ErrorKind::IllegalInSingleSubexprScope, pos);
            } else if parent.marks.single_terminal && !is_single_terminal(&wrapped) {
                self.push_err(ErrorKind::IllegalInSingleTerminalScope, pos);
            } else {
                parent.current.push(wrapped);
            }
        } else {
            self.push_err(ErrorKind::StrayClose, pos);
        }
    }

    fn on_alternative(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        let Some(frame) = self.expr_stack.last_mut() else {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
            return;
        };
        if frame.marks.no_alternation {
            self.push_err(ErrorKind::IllegalInNoAlternationScope, pos);
            return;
        }
        let items = std::mem::take(&mut frame.current);
        frame.alts.push(Expr::from_items(items));
    }

    fn on_end(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if let Some(frame) = self.expr_stack.last() {
            if frame.marks.no_end_subexpression {
                self.push_err(ErrorKind::IllegalInNoEndSubexprScope, pos);
                return;
            }
        }
        self.push_leaf(pos, Expr::End);
    }

    fn on_any(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if !self.check_scope_legality(pos, Opcode::Any) {
            return;
        }
        self.push_leaf(pos, Expr::Any);
    }

    fn on_string(&mut self, ctx: Ctx, text: &str) {
        let pos = SourcePos::new(ctx.pos);
        if !self.check_scope_legality(pos, Opcode::String) {
            return;
        }
        if let Err(e) = taul_spec::validate_literal_visibility(text) {
            self.push_err(ErrorKind::IllegalStringLiteral(e.to_string()), pos);
            return;
        }
        match taul_spec::decode_string_literal(text) {
            Ok(s) => self.push_leaf(pos, Expr::StringLit(s)),
            Err(e) => self.push_err(ErrorKind::IllegalStringLiteral(e.to_string()), pos),
        }
    }

    fn on_charset(&mut self, ctx: Ctx, text: &str) {
        let pos = SourcePos::new(ctx.pos);
        if !self.check_scope_legality(pos, Opcode::Charset) {
            return;
        }
        if let Err(e) = taul_spec::validate_literal_visibility(text) {
            self.push_err(ErrorKind::IllegalCharsetLiteral(e.to_string()), pos);
            return;
        }
        match taul_spec::decode_charset_literal(text) {
            Ok(pairs) => self.push_leaf(pos, Expr::CharsetLit(pairs)),
            Err(e) => self.push_err(ErrorKind::IllegalCharsetLiteral(e.to_string()), pos),
        }
    }

    fn on_token(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if !self.check_scope_legality(pos, Opcode::Token) {
            return;
        }
        self.push_leaf(pos, Expr::Token);
    }

    fn on_failure(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if !self.check_scope_legality(pos, Opcode::Failure) {
            return;
        }
        self.push_leaf(pos, Expr::Failure);
    }

    fn on_name(&mut self, ctx: Ctx, name: &str) {
        let pos = SourcePos::new(ctx.pos);
        let Some(scope) = self.current_scope() else {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
            return;
        };
        self.refs.push(NameRef { name: name.to_string(), pos, scope });
        self.push_leaf(pos, Expr::Name(name.to_string()));
    }

    fn on_sequence(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::Sequence);
    }

    fn on_lookahead(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::Lookahead);
    }

    fn on_lookahead_not(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::LookaheadNot);
    }

    fn on_not(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::Not);
    }

    fn on_optional(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::Optional);
    }

    fn on_kleene_star(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::KleeneStar);
    }

    fn on_kleene_plus(&mut self, ctx: Ctx) {
        let pos = SourcePos::new(ctx.pos);
        if self.expr_stack.is_empty() {
            self.push_err(ErrorKind::IllegalInNoScope, pos);
        }
        self.open_composite(Opcode::KleenePlus);
    }
}

/// Validates `spec`, returning the parsed program on success or the
/// accumulated errors otherwise. Errors continue to accumulate across the
/// whole pass (spec.md §7's non-fail-fast rule); only the final
/// `has_errors` check decides success.
pub fn validate(spec: &Spec) -> Result<ValidatedProgram, ErrorCounter> {
    let mut v = Validator { src: spec.src().cloned(), ..Validator::default() };
    interpret(spec, &mut v);
    v.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taul_core::SpecWriter;

    #[test]
    fn s1_skip_lpr_validates() {
        let mut w = SpecWriter::new();
        w.lpr_decl("lpr");
        w.lpr_decl("ws");
        w.lpr("lpr", Qualifier::None).string("abc").close();
        w.lpr("ws", Qualifier::Skip).kleene_plus().charset(" ").close().close();
        let spec = w.done();
        let program = validate(&spec).expect("valid spec");
        assert!(program.lpr_defs.contains_key("lpr"));
        assert!(program.lpr_defs.contains_key("ws"));
    }

    #[test]
    fn undeclared_reference_is_an_error() {
        let mut w = SpecWriter::new();
        w.ppr_decl("start");
        w.ppr("start", Qualifier::None).name("missing").close();
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(&d.kind, ErrorKind::RuleNeverDeclared(n) if n == "missing")));
    }

    #[test]
    fn stray_close_is_reported() {
        let mut w = SpecWriter::new();
        w.close();
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(d.kind, ErrorKind::StrayClose)));
    }

    #[test]
    fn scope_not_closed_at_shutdown() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).string("a");
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(d.kind, ErrorKind::ScopeNotClosed)));
    }

    #[test]
    fn token_inside_lpr_scope_is_illegal() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).token().close();
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(d.kind, ErrorKind::IllegalInLprScope)));
    }

    #[test]
    fn lookahead_rejects_multi_char_string() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None).lookahead().string("ab").close().close();
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(d.kind, ErrorKind::IllegalInSingleTerminalScope)));
    }

    #[test]
    fn kleene_star_rejects_alternation() {
        let mut w = SpecWriter::new();
        w.lpr_decl("f");
        w.lpr("f", Qualifier::None)
            .kleene_star()
            .string("a")
            .alternative()
            .string("b")
            .close()
            .close();
        let spec = w.done();
        let err = validate(&spec).unwrap_err();
        assert!(err.iter().any(|d| matches!(d.kind, ErrorKind::IllegalInNoAlternationScope)));
    }

    #[test]
    fn s6_ambiguous_alternatives_still_validate_cleanly() {
        // Ambiguity is a table-builder concern (spec.md §4.4), not a
        // validator one; this spec alone is well-formed.
        let mut w = SpecWriter::new();
        w.ppr_decl("f");
        w.lpr_decl("a");
        w.lpr_decl("b");
        w.ppr("f", Qualifier::None)
            .name("a")
            .alternative()
            .name("a")
            .name("b")
            .close();
        w.lpr("a", Qualifier::None).string("a").close();
        w.lpr("b", Qualifier::None).string("b").close();
        let spec = w.done();
        assert!(validate(&spec).is_ok());
    }
}
