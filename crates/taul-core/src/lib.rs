//! Symbol model, source map, spec instruction stream, and parse-tree data
//! structures shared by every other TAUL crate.
//!
//! This crate owns no grammar-loading or parsing logic — it is the common
//! vocabulary that `taul-spec`, `taul-compile`, and `taul-runtime` build on.

pub mod error;
pub mod glyph;
pub mod qualifier;
pub mod source;
pub mod spec;
pub mod symbol;
pub mod token;
pub mod tree;

pub use error::{Diagnostic, ErrorCounter, ErrorKind};
pub use glyph::Glyph;
pub use qualifier::Qualifier;
pub use source::{Page, PositionMap, ResolvedPos, SourceCode, SourcePos};
pub use spec::{Instr, Opcode, Spec, SpecEvent, SpecInterpreter, SpecWriter, disassemble, interpret};
pub use symbol::{Partition, SymbolId, SymbolRange, SymbolSet};
pub use token::Token;
pub use tree::{Node, NodeRef, ParseTree, ParseTreeBuilder, ParseTreePattern};
