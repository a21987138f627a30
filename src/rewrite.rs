//! Text overlay over an immutable source.
//!
//! All positions are byte offsets into the *original* text. Edits never shift
//! each other, so ranges taken from the syntax tree stay valid after any
//! number of insertions and replacements.

use std::ops::Range;

use crate::error::RewriteError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone)]
pub struct RewriteBuffer {
    original: String,
    // Sorted by start; at equal start, insertions precede the replacement.
    edits: Vec<Edit>,
}

impl RewriteBuffer {
    pub fn new(original: impl Into<String>) -> Self {
        RewriteBuffer {
            original: original.into(),
            edits: Vec::new(),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), RewriteError> {
        let len = self.original.len();
        if range.start > range.end
            || range.end > len
            || !self.original.is_char_boundary(range.start)
            || !self.original.is_char_boundary(range.end)
        {
            return Err(RewriteError::OutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }
        Ok(())
    }

    fn check_insertion_point(&self, offset: usize) -> Result<(), RewriteError> {
        self.check_range(&(offset..offset))?;
        if let Some(e) = self
            .edits
            .iter()
            .find(|e| !e.is_insertion() && e.start < offset && offset < e.end)
        {
            return Err(RewriteError::Overlap {
                start: offset,
                end: offset,
                other_start: e.start,
                other_end: e.end,
            });
        }
        Ok(())
    }

    /// Inserts `text` at `offset`, ahead of anything inserted there before.
    pub fn insert_before(&mut self, offset: usize, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_insertion_point(offset)?;
        let pos = self.edits.partition_point(|e| e.start < offset);
        self.edits.insert(
            pos,
            Edit {
                start: offset,
                end: offset,
                text: text.into(),
            },
        );
        Ok(())
    }

    /// Inserts `text` at `offset`, after anything inserted there before.
    pub fn insert_after(&mut self, offset: usize, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_insertion_point(offset)?;
        let pos = self
            .edits
            .partition_point(|e| e.start < offset || (e.start == offset && e.is_insertion()));
        self.edits.insert(
            pos,
            Edit {
                start: offset,
                end: offset,
                text: text.into(),
            },
        );
        Ok(())
    }

    /// Replaces `range` of the original text.
    ///
    /// Earlier edits lying entirely inside `range` are dropped, since their
    /// text is expected to be part of `text` already. Insertions sitting
    /// exactly on either boundary are kept.
    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) -> Result<(), RewriteError> {
        self.check_range(&range)?;
        if range.is_empty() {
            return self.insert_after(range.start, text);
        }
        for e in &self.edits {
            if Self::overlaps_partially(e, &range) {
                return Err(RewriteError::Overlap {
                    start: range.start,
                    end: range.end,
                    other_start: e.start,
                    other_end: e.end,
                });
            }
        }
        self.edits.retain(|e| !Self::inside(e, &range));
        let pos = self
            .edits
            .partition_point(|e| e.start < range.start || (e.start == range.start && e.is_insertion()));
        self.edits.insert(
            pos,
            Edit {
                start: range.start,
                end: range.end,
                text: text.into(),
            },
        );
        Ok(())
    }

    fn inside(e: &Edit, range: &Range<usize>) -> bool {
        if e.is_insertion() {
            range.start < e.start && e.start < range.end
        } else {
            range.start <= e.start && e.end <= range.end
        }
    }

    fn overlaps_partially(e: &Edit, range: &Range<usize>) -> bool {
        if e.is_insertion() {
            return false;
        }
        let disjoint = e.end <= range.start || e.start >= range.end;
        !disjoint && !Self::inside(e, range)
    }

    /// Whether `range` already lies inside an earlier replacement, so its
    /// original text no longer appears in the output.
    pub fn is_rewritten(&self, range: Range<usize>) -> bool {
        self.edits
            .iter()
            .any(|e| !e.is_insertion() && e.start <= range.start && range.end <= e.end)
    }

    /// Current text of an original range, with every edit inside it applied.
    pub fn rewritten_text(&self, range: Range<usize>) -> Result<String, RewriteError> {
        self.check_range(&range)?;
        let mut out = String::new();
        let mut cursor = range.start;
        for e in &self.edits {
            if Self::overlaps_partially(e, &range) {
                return Err(RewriteError::Overlap {
                    start: range.start,
                    end: range.end,
                    other_start: e.start,
                    other_end: e.end,
                });
            }
            if !Self::inside(e, &range) {
                continue;
            }
            out.push_str(&self.original[cursor..e.start]);
            out.push_str(&e.text);
            cursor = e.end;
        }
        out.push_str(&self.original[cursor..range.end]);
        Ok(out)
    }

    /// The whole rewritten source.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.original.len());
        let mut cursor = 0;
        for e in &self.edits {
            out.push_str(&self.original[cursor..e.start]);
            out.push_str(&e.text);
            cursor = e.end;
        }
        out.push_str(&self.original[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertions_respect_before_and_after() {
        let mut rw = RewriteBuffer::new("fn f() {}");
        rw.insert_before(0, "A\n").unwrap();
        rw.insert_before(0, "B\n").unwrap();
        rw.insert_after(0, "C\n").unwrap();
        assert_eq!(rw.render(), "B\nA\nC\nfn f() {}");
    }

    #[test]
    fn enclosing_replace_reads_and_subsumes_inner_edit() {
        //         0123456789
        let src = "x = a + b + c;";
        let mut rw = RewriteBuffer::new(src);
        rw.replace(4..9, "add(a, b)").unwrap();
        assert_eq!(rw.rewritten_text(4..9).unwrap(), "add(a, b)");
        let outer = rw.rewritten_text(4..13).unwrap();
        assert_eq!(outer, "add(a, b) + c");
        rw.replace(4..13, format!("add({}, c)", rw.rewritten_text(4..9).unwrap()))
            .unwrap();
        assert_eq!(rw.render(), "x = add(add(a, b), c);");
    }

    #[test]
    fn boundary_insertions_survive_replacement() {
        let mut rw = RewriteBuffer::new("ab");
        rw.insert_before(0, "<").unwrap();
        rw.insert_after(2, ">").unwrap();
        rw.replace(0..2, "XY").unwrap();
        assert_eq!(rw.render(), "<XY>");
        assert_eq!(rw.rewritten_text(0..2).unwrap(), "XY");
    }

    #[test]
    fn ranges_inside_a_replacement_are_rewritten() {
        let mut rw = RewriteBuffer::new("for i in 0..n - 1 {}");
        rw.insert_after(0, "static b: usize = 8;\n").unwrap();
        assert!(!rw.is_rewritten(0..3));
        rw.replace(12..17, "b").unwrap();
        assert!(rw.is_rewritten(12..17));
        assert!(rw.is_rewritten(16..17));
        assert!(!rw.is_rewritten(9..17));
        assert!(!rw.is_rewritten(0..3));
    }

    #[test]
    fn partial_overlap_is_rejected() {
        let mut rw = RewriteBuffer::new("a + b + c");
        rw.replace(4..9, "q").unwrap();
        let err = rw.replace(0..5, "z").unwrap_err();
        assert!(matches!(err, RewriteError::Overlap { other_start: 4, other_end: 9, .. }));
        assert!(rw.insert_before(6, "!").is_err());
        assert!(rw.replace(3..20, "z").is_err());
    }
}
