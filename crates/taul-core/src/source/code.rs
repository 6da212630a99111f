use super::{PositionMap, SourcePos};

/// One page of source text: an origin label, a starting position in the
/// concatenated source, and a byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    origin: String,
    start: SourcePos,
    len: u32,
}

impl Page {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn start(&self) -> SourcePos {
        self.start
    }

    pub fn len(&self) -> u32 {
        self.len
    }
}

/// An ordered sequence of pages whose concatenated text is the source.
///
/// `SourceCode` owns no file I/O (an explicit non-goal of the core) — pages
/// are supplied as already-decoded text by the caller.
#[derive(Debug, Clone)]
pub struct SourceCode {
    text: String,
    pages: Vec<Page>,
    position_map: PositionMap,
}

impl SourceCode {
    pub fn new() -> Self {
        SourceCode {
            text: String::new(),
            pages: Vec::new(),
            position_map: PositionMap::new(""),
        }
    }

    /// Append a page of text with the given origin label.
    pub fn add(&mut self, origin: impl Into<String>, text: &str) {
        let start = SourcePos::new(self.text.len() as u32);
        self.pages.push(Page {
            origin: origin.into(),
            start,
            len: text.len() as u32,
        });
        self.text.push_str(text);
        self.position_map = PositionMap::new(&self.text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> u32 {
        self.text.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// The index of the page containing `pos`, if `pos` is in bounds.
    pub fn page_at(&self, pos: SourcePos) -> Option<usize> {
        if pos.offset() > self.len() {
            return None;
        }
        self.pages
            .iter()
            .position(|p| pos.offset() >= p.start().offset() && pos.offset() < p.start().offset() + p.len())
            .or_else(|| {
                // pos == len(): resolves to the end of the last page.
                if pos.offset() == self.len() && !self.pages.is_empty() {
                    Some(self.pages.len() - 1)
                } else {
                    None
                }
            })
    }

    /// Resolve a byte offset to (origin, line, column). Positions past the
    /// end of the text resolve to the end-of-text location.
    pub fn resolve(&self, pos: SourcePos) -> Option<super::ResolvedPos> {
        let page_idx = self.page_at(pos)?;
        let page = &self.pages[page_idx];
        let (line, column) = self.position_map.line_col(pos.offset());
        Some(super::ResolvedPos {
            origin: page.origin.clone(),
            line,
            column,
        })
    }
}

impl Default for SourceCode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_resolves() {
        let mut sc = SourceCode::new();
        sc.add("a.taul", "abc\ndef");
        let r = sc.resolve(SourcePos::new(5)).unwrap();
        assert_eq!(r.origin, "a.taul");
        assert_eq!((r.line, r.column), (2, 2));
    }

    #[test]
    fn multi_page_origin_tracks_page() {
        let mut sc = SourceCode::new();
        sc.add("a", "xy");
        sc.add("b", "zw");
        assert_eq!(sc.resolve(SourcePos::new(0)).unwrap().origin, "a");
        assert_eq!(sc.resolve(SourcePos::new(2)).unwrap().origin, "b");
    }

    #[test]
    fn past_end_resolves_to_end_of_text() {
        let mut sc = SourceCode::new();
        sc.add("a", "xy");
        let r = sc.resolve(SourcePos::new(2)).unwrap();
        assert_eq!(r.origin, "a");
    }
}
