//! Offset to line/column conversion.

use crate::ByteOffset;
use text_size::TextSize;

/// A 0-indexed line and byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    #[inline]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Start offsets of every line in a text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<ByteOffset>,
    len: ByteOffset,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let line_starts = std::iter::once(TextSize::from(0))
            .chain(
                text.match_indices('\n')
                    .map(|(idx, _)| TextSize::from(idx as u32 + 1)),
            )
            .collect();
        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts an offset to a line/column, or `None` past the end of text.
    pub fn line_col(&self, offset: ByteOffset) -> Option<LineCol> {
        if offset > self.len {
            return None;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Some(LineCol::new(
            line as u32,
            u32::from(offset - self.line_starts[line]),
        ))
    }

    /// Converts a line/column back to an offset.
    pub fn offset(&self, line_col: LineCol) -> Option<ByteOffset> {
        let start = *self.line_starts.get(line_col.line as usize)?;
        let offset = start + TextSize::from(line_col.col);
        (offset <= self.len).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_across_lines() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line_col(TextSize::from(0)), Some(LineCol::new(0, 0)));
        assert_eq!(index.line_col(TextSize::from(2)), Some(LineCol::new(0, 2)));
        assert_eq!(index.line_col(TextSize::from(3)), Some(LineCol::new(1, 0)));
        assert_eq!(index.line_col(TextSize::from(6)), Some(LineCol::new(2, 0)));
        assert_eq!(index.line_col(TextSize::from(8)), Some(LineCol::new(3, 1)));
        assert_eq!(index.line_col(TextSize::from(10)), None);
    }

    #[test]
    fn test_offset_round_trip() {
        let text = "<script>\n  let x;\n</script>";
        let index = LineIndex::new(text);
        for offset in 0..=text.len() as u32 {
            let offset = TextSize::from(offset);
            let line_col = index.line_col(offset).unwrap();
            assert_eq!(index.offset(line_col), Some(offset));
        }
    }
}
