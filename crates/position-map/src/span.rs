//! Byte offsets and half-open spans.

use text_size::TextSize;

/// A byte offset into a source string.
pub type ByteOffset = TextSize;

/// A half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: ByteOffset,
    pub end: ByteOffset,
}

impl Span {
    #[inline]
    pub fn new(start: impl Into<ByteOffset>, end: impl Into<ByteOffset>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Builds a span from `usize` offsets, as produced by string searches.
    #[inline]
    pub fn from_usize(start: usize, end: usize) -> Self {
        Self::new(to_offset(start), to_offset(end))
    }

    #[inline]
    pub fn empty(offset: impl Into<ByteOffset>) -> Self {
        let offset = offset.into();
        Self {
            start: offset,
            end: offset,
        }
    }

    #[inline]
    pub fn len(&self) -> TextSize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if `offset` lies inside the span (end exclusive).
    #[inline]
    pub fn contains(&self, offset: ByteOffset) -> bool {
        self.start <= offset && offset < self.end
    }

    #[inline]
    pub fn start_usize(&self) -> usize {
        u32::from(self.start) as usize
    }

    #[inline]
    pub fn end_usize(&self) -> usize {
        u32::from(self.end) as usize
    }

    /// The text this span covers in `source`.
    ///
    /// Out-of-range or non-boundary spans yield an empty string.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.start_usize()..self.end_usize())
            .unwrap_or_default()
    }
}

/// Converts a `usize` string index into a [`ByteOffset`].
#[inline]
pub fn to_offset(index: usize) -> ByteOffset {
    TextSize::from(index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_end_exclusive() {
        let span = Span::new(5u32, 15u32);
        assert!(!span.contains(TextSize::from(4)));
        assert!(span.contains(TextSize::from(5)));
        assert!(!span.contains(TextSize::from(15)));
    }

    #[test]
    fn test_text_slices_source() {
        let source = "let answer = 42;";
        assert_eq!(Span::from_usize(4, 10).text(source), "answer");
        assert_eq!(Span::from_usize(10, 99).text(source), "");
    }

    #[test]
    fn test_empty_span() {
        let span = Span::empty(7u32);
        assert!(span.is_empty());
        assert_eq!(span.len(), TextSize::from(0));
    }
}
