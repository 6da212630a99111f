//! The runtime pipeline: reader, lexer, parser, listener, and error
//! handler (spec.md §4.5). A loaded `taul_compile::Grammar` drives all
//! four; this crate owns none of the loading/validation logic itself.

mod error_handler;
mod lexer;
mod listener;
mod parser;
mod reader;

pub use error_handler::{ErrorHandler, ErrorRecovery, NoRecoveryErrorHandler, RegularErrorHandler};
pub use lexer::Lexer;
pub use listener::{Listener, playback_into};
pub use parser::Parser;
pub use reader::Reader;
