//! Span source maps for transformations that reorder and rewrite text.

use crate::{ByteOffset, OriginalPosition, PositionMapper, Span};
use text_size::TextSize;

/// A generated span and the original span it was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mapping {
    pub generated: Span,
    pub original: Span,
}

impl Mapping {
    /// True when the generated text is a verbatim copy of the original span.
    #[inline]
    pub fn is_verbatim(&self) -> bool {
        self.generated.len() == self.original.len()
    }
}

/// Mappings from generated text back to the original source, sorted by
/// generated position.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    mappings: Vec<Mapping>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SourceMapBuilder {
        SourceMapBuilder::new()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter()
    }

    /// Finds the original offset for a generated offset covered by a mapping.
    ///
    /// Offsets inside a rewritten span are clamped to the original span.
    pub fn original_position(&self, generated: ByteOffset) -> Option<ByteOffset> {
        let mapping = self.covering(generated)?;
        let delta = (generated - mapping.generated.start).min(mapping.original.len());
        Some(mapping.original.start + delta)
    }

    /// Finds the generated offset for an original offset.
    ///
    /// Verbatim copies are preferred over rewritten spans; text that was
    /// dropped from the output yields `None`.
    pub fn generated_position(&self, original: ByteOffset) -> Option<ByteOffset> {
        let mut rewritten = None;
        for mapping in &self.mappings {
            if !mapping.original.contains(original) {
                continue;
            }
            if mapping.is_verbatim() {
                return Some(mapping.generated.start + (original - mapping.original.start));
            }
            rewritten.get_or_insert(mapping.generated.start);
        }
        rewritten
    }

    fn covering(&self, generated: ByteOffset) -> Option<&Mapping> {
        let idx = self
            .mappings
            .partition_point(|m| m.generated.start <= generated)
            .checked_sub(1)?;
        self.mappings
            .get(idx)
            .filter(|m| m.generated.contains(generated))
    }
}

impl PositionMapper for SourceMap {
    fn to_generated(&self, original: ByteOffset) -> Option<ByteOffset> {
        self.generated_position(original)
    }

    fn to_original(&self, generated: ByteOffset) -> OriginalPosition {
        if let Some(mapping) = self.covering(generated) {
            return if mapping.is_verbatim() {
                OriginalPosition::exact(
                    mapping.original.start + (generated - mapping.generated.start),
                )
            } else {
                OriginalPosition::synthetic(mapping.original.start)
            };
        }

        // Synthetic text: anchor where the preceding mapped text ended.
        let anchor = self
            .mappings
            .iter()
            .take_while(|m| m.generated.end <= generated)
            .last()
            .map(|m| m.original.end)
            .unwrap_or_default();
        OriginalPosition::synthetic(anchor)
    }
}

/// Emits generated text piece by piece while recording span mappings.
///
/// Pieces are appended in output order: verbatim copies of original spans,
/// rewritten spans, and synthetic text without an original counterpart.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    code: String,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current end of the generated output.
    #[inline]
    pub fn generated_offset(&self) -> ByteOffset {
        TextSize::of(self.code.as_str())
    }

    /// The text generated so far.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Copies `span` of `source` verbatim with a 1:1 mapping.
    pub fn copy(&mut self, source: &str, span: Span) {
        let text = span.text(source);
        if text.is_empty() {
            return;
        }
        self.emit_mapped(span, text);
    }

    /// Emits `text` in place of the original `span`.
    ///
    /// An empty replacement drops the span without recording a mapping.
    pub fn replace(&mut self, original: Span, text: &str) {
        if text.is_empty() {
            return;
        }
        self.emit_mapped(original, text);
    }

    /// Emits synthetic text.
    pub fn push(&mut self, text: &str) {
        self.code.push_str(text);
    }

    fn emit_mapped(&mut self, original: Span, text: &str) {
        let start = self.generated_offset();
        self.code.push_str(text);
        self.mappings.push(Mapping {
            generated: Span::new(start, self.generated_offset()),
            original,
        });
    }

    /// Finishes emission, returning the generated text and its map.
    pub fn finish(self) -> (String, SourceMap) {
        (
            self.code,
            SourceMap {
                mappings: self.mappings,
            },
        )
    }
}
