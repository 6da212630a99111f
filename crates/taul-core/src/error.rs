//! The error taxonomy shared by the validator, lowerer, table builder, and
//! runtime, plus the accumulator ("error counter") used to collect them
//! without aborting on first failure.

use crate::source::{ResolvedPos, SourceCode, SourcePos};

/// One error kind per entry in the error taxonomy. Each variant's fields are
/// exactly the detail needed to render a useful message; `Display` renders
/// the message body without location info (the counter attaches that).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("no source code associated with spec")]
    SourceCodeNotFound,

    #[error("scope not closed at end of spec")]
    ScopeNotClosed,
    #[error("stray close instruction")]
    StrayClose,

    #[error("rule name '{0}' conflicts with an existing LPR/PPR")]
    RuleNameConflict(String),
    #[error("rule '{0}' used but never declared")]
    RuleNeverDeclared(String),
    #[error("rule '{0}' declared but never defined")]
    RuleNeverDefined(String),
    #[error("rule '{0}' already defined")]
    RuleAlreadyDefined(String),
    #[error("no rule named '{0}' found")]
    RuleNotFound(String),
    #[error("rule '{0}' may not be a PPR in this context")]
    RuleMayNotBePpr(String),
    #[error("illegal rule declaration after a definition has occurred")]
    IllegalRuleDeclare,

    #[error("illegal instruction in LPR scope")]
    IllegalInLprScope,
    #[error("illegal instruction in PPR scope")]
    IllegalInPprScope,
    #[error("illegal instruction outside of any rule scope")]
    IllegalInNoScope,

    #[error("illegal qualifier '{0}' for rule '{1}'")]
    IllegalQualifier(String, String),
    #[error("illegal multiple qualifiers on rule '{0}'")]
    IllegalMultipleQualifiers(String),

    #[error("illegal instruction in single-terminal scope")]
    IllegalInSingleTerminalScope,
    #[error("illegal instruction in no-alternation scope")]
    IllegalInNoAlternationScope,
    #[error("illegal instruction in single-subexpression scope")]
    IllegalInSingleSubexprScope,
    #[error("illegal `end` in no-end-subexpression scope")]
    IllegalInNoEndSubexprScope,

    #[error("illegal string literal: {0}")]
    IllegalStringLiteral(String),
    #[error("illegal charset literal: {0}")]
    IllegalCharsetLiteral(String),

    #[error("ambiguity in rule '{0}' on terminal {1}")]
    IllegalAmbiguity(String, String),
    #[error("syntax error: expected {0}, found {1}")]
    SyntaxError(String, String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A located error: the kind plus, if available, the resolved source
/// position it occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub pos: Option<SourcePos>,
    pub location: Option<ResolvedPos>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}:{}: {}", loc.origin, loc.line, loc.column, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Accumulates errors across a spec/loader pass instead of failing fast, so
/// later phases can continue discovering errors against a stable (if
/// invalid) spec. The first push also flips [`ErrorCounter::has_errors`],
/// which callers use to cancel downstream building.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounter {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorCounter {
    pub fn new() -> Self {
        ErrorCounter::default()
    }

    pub fn push(&mut self, kind: ErrorKind, pos: SourcePos, src: Option<&SourceCode>) {
        let location = src.and_then(|s| s.resolve(pos));
        self.diagnostics.push(Diagnostic { kind, pos: Some(pos), location });
    }

    pub fn push_unlocated(&mut self, kind: ErrorKind) {
        self.diagnostics.push(Diagnostic { kind, pos: None, location: None });
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_clean_and_flips_on_first_error() {
        let mut ec = ErrorCounter::new();
        assert!(!ec.has_errors());
        ec.push_unlocated(ErrorKind::StrayClose);
        assert!(ec.has_errors());
        assert_eq!(ec.count(), 1);
    }

    #[test]
    fn diagnostic_renders_location_when_available() {
        let mut src = SourceCode::new();
        src.add("f.taul", "abc");
        let mut ec = ErrorCounter::new();
        ec.push(ErrorKind::StrayClose, SourcePos::new(1), Some(&src));
        let d = &ec.into_vec()[0];
        assert_eq!(d.to_string(), "f.taul:1:2: stray close instruction");
    }
}
