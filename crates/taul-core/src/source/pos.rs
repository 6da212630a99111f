/// The resolved human-readable location of a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPos {
    pub origin: String,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number.
    pub column: usize,
}

/// Maps byte offsets within a single text blob to (line, column), counting
/// lines by CR, LF, and CRLF (CRLF counted once). Character/line values
/// index from 1.
#[derive(Debug, Clone)]
pub struct PositionMap {
    /// Byte offset of the start of each line (line 0's start is always 0).
    line_starts: Vec<u32>,
    text_len: u32,
}

impl PositionMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        let bytes = text.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    let next = if i + 1 < bytes.len() && bytes[i + 1] == b'\n' { i + 2 } else { i + 1 };
                    line_starts.push(next as u32);
                    i = next;
                }
                b'\n' => {
                    line_starts.push((i + 1) as u32);
                    i += 1;
                }
                _ => i += 1,
            }
        }
        PositionMap { line_starts, text_len: bytes.len() as u32 }
    }

    /// Resolve a byte offset to a 1-indexed (line, column). Offsets past the
    /// end of the text clamp to the end-of-text location.
    pub fn line_col(&self, offset: u32) -> (usize, usize) {
        let offset = offset.min(self.text_len);
        // Last line_starts entry <= offset.
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        (line_idx + 1, (offset - line_start + 1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lf() {
        let m = PositionMap::new("ab\ncd\nef");
        assert_eq!(m.line_col(0), (1, 1));
        assert_eq!(m.line_col(3), (2, 1));
        assert_eq!(m.line_col(7), (3, 2));
    }

    #[test]
    fn crlf_counts_once() {
        let m = PositionMap::new("ab\r\ncd");
        // 'a'=0 'b'=1 '\r'=2 '\n'=3 'c'=4 'd'=5
        assert_eq!(m.line_col(2), (1, 3)); // '\r' still on line 1
        assert_eq!(m.line_col(4), (2, 1)); // 'c' starts line 2, not 3
    }

    #[test]
    fn bare_cr_breaks_line() {
        let m = PositionMap::new("ab\rcd");
        assert_eq!(m.line_col(3), (2, 1));
    }

    #[test]
    fn past_end_clamps() {
        let m = PositionMap::new("ab\ncd");
        assert_eq!(m.line_col(100), m.line_col(5));
    }
}
