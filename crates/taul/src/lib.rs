//! TAUL: a self-contained parser-toolkit grammar compiler and runtime.
//!
//! A grammar is described as a stream of spec instructions (build one with
//! [`SpecWriter`]), validated and lowered into a parse-table-backed
//! [`Grammar`] by [`load`], then driven by a [`Reader`]/[`Lexer`]/[`Parser`]
//! pipeline to produce a [`ParseTree`]. There is no surface grammar syntax
//! or bootstrap parser here — building a grammar from source text is a job
//! for some other front end (e.g. one built on [`taul_spec`]'s wire format)
//! layered on top of this crate, not something this crate provides itself.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use taul::{Lexer, Parser, Qualifier, Reader, SourceCode, SpecWriter, load};
//!
//! let mut w = SpecWriter::new();
//! w.lpr_decl("digit");
//! w.ppr_decl("digits");
//! w.lpr("digit", Qualifier::None).charset("0-9").close();
//! w.ppr("digits", Qualifier::None).kleene_plus().name("digit").close().close();
//! let spec = w.done();
//! let grammar = load(&spec).expect("grammar loads");
//!
//! let mut source = SourceCode::new();
//! source.add("input", "123");
//! let reader = Reader::new(Arc::new(source));
//! let lexer = Lexer::new(&grammar, reader);
//! let mut parser = Parser::new(&grammar, lexer);
//! let start = grammar.ppr_id("digits").unwrap();
//! let tree = parser.parse(start);
//!
//! assert!(tree.is_sealed());
//! assert!(!tree.is_aborted());
//! assert_eq!(tree.root().unwrap().child_count(), 3);
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use taul_core::error::{Diagnostic, ErrorCounter, ErrorKind};
pub use taul_core::{
    Glyph, Node, NodeRef, Opcode, ParseTree, ParseTreeBuilder, ParseTreePattern, Partition, Qualifier, SourceCode,
    SourcePos, Spec, SpecWriter, SymbolId, SymbolRange, SymbolSet, Token, disassemble,
};
pub use taul_compile::{Grammar, ParseTable, RExpr, RuleInfo, RuleScope, TermSet, ValidatedProgram, load, validate};
pub use taul_runtime::{
    ErrorHandler, ErrorRecovery, Lexer, Listener, NoRecoveryErrorHandler, Parser, Reader, RegularErrorHandler,
    playback_into,
};
pub use taul_spec::{
    EscapeError, WireError, decode as decode_spec, decode_charset_literal, decode_string_literal, encode as encode_spec,
};

/// Errors a caller might see while loading or running a grammar through
/// this facade's top-level helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The spec instruction stream failed validation or table-building;
    /// call [`load`] directly and inspect the returned [`ErrorCounter`]'s
    /// diagnostics for specifics.
    #[error("grammar failed to load ({0} error(s))")]
    Load(usize),

    /// The spec's binary wire encoding was malformed.
    #[error("malformed spec bytes: {0}")]
    Wire(#[from] WireError),
}

/// Result type for this facade's top-level helpers.
pub type Result<T> = std::result::Result<T, Error>;

/// Loads a [`Grammar`] from a wire-encoded spec byte stream: decodes it
/// with [`taul_spec::decode`] and hands the result to [`taul_compile::load`].
pub fn load_bytes(bytes: &[u8]) -> Result<Grammar> {
    let spec = taul_spec::decode(bytes)?;
    taul_compile::load(&spec).map_err(|ec| Error::Load(ec.count()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_spec() -> Spec {
        let mut w = SpecWriter::new();
        w.lpr_decl("a");
        w.ppr_decl("start");
        w.lpr("a", Qualifier::None).string("a").close();
        w.ppr("start", Qualifier::None).name("a").close();
        w.done()
    }

    #[test]
    fn load_bytes_round_trips_through_the_wire_format() {
        let bytes = encode_spec(&minimal_spec());
        let grammar = load_bytes(&bytes).expect("grammar loads");
        assert!(grammar.ppr_id("start").is_some());
    }

    #[test]
    fn load_bytes_reports_malformed_wire_bytes() {
        let err = load_bytes(&[255]).unwrap_err();
        assert!(matches!(err, Error::Wire(WireError::UnknownOpcode(255))));
    }
}
