//! Ties validation, precedence lowering, name resolution, and table
//! building into the single entry point the facade crate calls (spec.md
//! §4's loader, split here into its constituent passes rather than the
//! original's combined two-stage loader).

use std::collections::HashSet;

use indexmap::IndexMap;

use taul_core::error::ErrorKind;
use taul_core::{ErrorCounter, Qualifier, Spec, SymbolId};

use crate::grammar::{Grammar, RuleInfo};
use crate::lower::lower_precedence_body;
use crate::tables::{ParseTable, RExpr, RuleScope, resolve, resolve_precedence_rule};
use crate::validate::{self, ValidatedProgram};

/// Validates, lowers, resolves, and builds parse tables for `spec`,
/// producing a [`Grammar`] or the accumulated errors from whichever pass
/// first found any.
pub fn load(spec: &Spec) -> Result<Grammar, ErrorCounter> {
    log::debug!("grammar load starting");
    let program = validate::validate(spec)?;
    let result = build_grammar(program);
    match &result {
        Ok(grammar) => log::debug!(
            "grammar load finished: {} lpr(s), {} ppr(s)",
            grammar.lpr_order.len(),
            grammar.ppr_order.len()
        ),
        Err(errors) => log::debug!("grammar load failed: {} error(s)", errors.count()),
    }
    result
}

fn build_grammar(program: ValidatedProgram) -> Result<Grammar, ErrorCounter> {
    let mut errors = ErrorCounter::new();
    let lpr_count = program.lpr_ids.len() as u32;

    let precedence_ids: HashSet<SymbolId> = program
        .ppr_defs
        .values()
        .filter(|def| def.qualifier == Qualifier::Precedence)
        .map(|def| def.id)
        .collect();

    let mut lpr_exprs: IndexMap<SymbolId, RExpr> = IndexMap::new();
    let mut lpr_rules: IndexMap<SymbolId, RuleInfo> = IndexMap::new();
    for name in &program.lpr_order {
        let def = &program.lpr_defs[name];
        let resolved = resolve(
            &def.body,
            RuleScope::Lexical,
            &program.lpr_ids,
            &program.ppr_ids,
            lpr_count,
            &precedence_ids,
        );
        lpr_exprs.insert(def.id, resolved.clone());
        lpr_rules.insert(def.id, RuleInfo { name: name.clone(), id: def.id, qualifier: def.qualifier, expr: resolved });
    }

    let mut ppr_exprs: IndexMap<SymbolId, RExpr> = IndexMap::new();
    let mut ppr_rules: IndexMap<SymbolId, RuleInfo> = IndexMap::new();
    for name in &program.ppr_order {
        let def = &program.ppr_defs[name];
        let is_precedence = def.qualifier == Qualifier::Precedence;

        // Every PPR is checked for direct left recursion this way, not
        // just precedence ones: a rule that climbs but wasn't declared
        // `precedence` is a grammar error, not silently accepted.
        let lowered = lower_precedence_body(name, &def.body);
        if !is_precedence && !lowered.tails.is_empty() {
            log::debug!("ambiguity: '{name}' is left-recursive without a precedence qualifier");
            errors.push_unlocated(ErrorKind::IllegalAmbiguity(
                name.clone(),
                "left-recursive without a precedence qualifier".to_string(),
            ));
            continue;
        }

        let resolved = if is_precedence {
            resolve_precedence_rule(
                def.id,
                lowered,
                &program.lpr_ids,
                &program.ppr_ids,
                lpr_count,
                &precedence_ids,
            )
        } else {
            resolve(
                &def.body,
                RuleScope::Syntactic,
                &program.lpr_ids,
                &program.ppr_ids,
                lpr_count,
                &precedence_ids,
            )
        };
        ppr_exprs.insert(def.id, resolved.clone());
        ppr_rules.insert(def.id, RuleInfo { name: name.clone(), id: def.id, qualifier: def.qualifier, expr: resolved });
    }

    if errors.has_errors() {
        return Err(errors);
    }

    let lpr_names: IndexMap<SymbolId, String> = program.lpr_ids.iter().map(|(n, &id)| (id, n.clone())).collect();
    let ppr_names: IndexMap<SymbolId, String> = program.ppr_ids.iter().map(|(n, &id)| (id, n.clone())).collect();

    let lexical_table = ParseTable::build(&lpr_exprs, &lpr_names, &mut errors);
    let syntactic_table = ParseTable::build(&ppr_exprs, &ppr_names, &mut errors);

    if errors.has_errors() {
        return Err(errors);
    }

    Ok(Grammar {
        lpr_order: program.lpr_order,
        ppr_order: program.ppr_order,
        lpr_ids: program.lpr_ids,
        ppr_ids: program.ppr_ids,
        lpr_rules,
        ppr_rules,
        lexical_table,
        syntactic_table,
    })
}
