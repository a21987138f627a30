use proc_macro2::LineColumn;

/// Maps `proc-macro2` line/column positions to byte offsets and back.
///
/// Lines are 1-based, columns count chars (not bytes), matching what
/// `Span::start()` reports with `span-locations` enabled.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            line_starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of a line/column position inside `text`.
    ///
    /// Positions past the end of a line clamp to the line end, positions past
    /// the last line clamp to the end of the text.
    pub fn offset(&self, text: &str, pos: LineColumn) -> usize {
        if pos.line == 0 || pos.line > self.line_starts.len() {
            return self.len;
        }
        let start = self.line_starts[pos.line - 1];
        let mut offset = start;
        for (n, ch) in text[start..].chars().enumerate() {
            if n == pos.column || ch == '\n' {
                break;
            }
            offset += ch.len_utf8();
        }
        offset
    }

    /// 1-based line containing the byte `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        let idx = self.line_starts.partition_point(|&start| start <= offset);
        idx.max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_char_columns() {
        let text = "ab\nμz = 1;\n";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, LineColumn { line: 1, column: 1 }), 1);
        assert_eq!(index.offset(text, LineColumn { line: 2, column: 0 }), 3);
        // `μ` is two bytes wide
        assert_eq!(index.offset(text, LineColumn { line: 2, column: 1 }), 5);
        assert_eq!(index.offset(text, LineColumn { line: 9, column: 0 }), text.len());
    }

    #[test]
    fn line_of_maps_offsets_back() {
        let text = "fn a() {}\nfn b() {}\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(9), 1);
        assert_eq!(index.line_of(10), 2);
        assert_eq!(index.line_count(), 3);
    }
}
