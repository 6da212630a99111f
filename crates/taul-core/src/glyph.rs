use crate::source::SourcePos;

/// A single terminal symbol fed to the lexer: one code point, a decoder
/// failure, or end-of-input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// A successfully decoded code point at `pos`, spanning `len` bytes.
    Normal { code_point: u32, pos: SourcePos, len: u32 },
    /// A decode failure of byte length 1 at `pos`.
    Failure { pos: SourcePos },
    /// End of the source, at `pos == source length`.
    EndOfInput { pos: SourcePos },
}

impl Glyph {
    pub fn pos(self) -> SourcePos {
        match self {
            Glyph::Normal { pos, .. } | Glyph::Failure { pos } | Glyph::EndOfInput { pos } => pos,
        }
    }

    /// Byte length this glyph advances the reader by.
    pub fn len(self) -> u32 {
        match self {
            Glyph::Normal { len, .. } => len,
            Glyph::Failure { .. } => 1,
            Glyph::EndOfInput { .. } => 0,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn code_point(self) -> Option<u32> {
        match self {
            Glyph::Normal { code_point, .. } => Some(code_point),
            _ => None,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Glyph::Failure { .. })
    }

    pub fn is_end_of_input(self) -> bool {
        matches!(self, Glyph::EndOfInput { .. })
    }
}
