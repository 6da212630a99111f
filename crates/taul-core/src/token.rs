use crate::source::SourcePos;
use crate::symbol::SymbolId;

/// A single terminal symbol fed to the parser: an LPR id, or `failure`/`end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    id: SymbolId,
    pos: SourcePos,
    len: u32,
}

impl Token {
    pub fn normal(lpr_id: SymbolId, pos: SourcePos, len: u32) -> Self {
        debug_assert!(lpr_id.is_lpr());
        Token { id: lpr_id, pos, len }
    }

    pub fn failure(pos: SourcePos, len: u32) -> Self {
        Token { id: SymbolId::FAILURE, pos, len }
    }

    pub fn end_of_input(pos: SourcePos) -> Self {
        Token { id: SymbolId::END_OF_INPUT, pos, len: 0 }
    }

    pub fn id(self) -> SymbolId {
        self.id
    }

    pub fn pos(self) -> SourcePos {
        self.pos
    }

    pub fn len(self) -> u32 {
        self.len
    }

    pub fn low_pos(self) -> SourcePos {
        self.pos
    }

    pub fn high_pos(self) -> SourcePos {
        SourcePos::new(self.pos.offset() + self.len)
    }

    /// The LPR id this token was produced by, if it is a normal (non
    /// failure/end-of-input) token.
    pub fn rule_id(self) -> Option<SymbolId> {
        self.id.is_lpr().then_some(self.id)
    }

    pub fn is_normal(self) -> bool {
        self.id.is_lpr()
    }

    pub fn is_failure(self) -> bool {
        self.id.is_failure()
    }

    pub fn is_end_of_input(self) -> bool {
        self.id.is_end_of_input()
    }
}
