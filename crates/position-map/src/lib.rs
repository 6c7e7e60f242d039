//! Position tracking between original and generated source for svelte-shim.
//!
//! Two structures record how generated text relates to its source:
//!
//! - [`Ledger`]: an ordered list of pure text insertions. Used when the
//!   generated file is the original file plus annotations.
//! - [`SourceMap`]: span mappings produced by [`SourceMapBuilder`] while the
//!   generated file is emitted piece by piece (reordered, rewritten, stripped).
//!
//! Both implement [`PositionMapper`], so callers translating diagnostics do not
//! care which transformation produced the file.

mod builder;
mod ledger;
mod line_index;
mod span;

pub use builder::{Mapping, SourceMap, SourceMapBuilder};
pub use ledger::{Insertion, Ledger, LedgerError};
pub use line_index::{LineCol, LineIndex};
pub use span::{to_offset, ByteOffset, Span};

/// The result of translating a generated offset back to the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OriginalPosition {
    /// The original offset, or the best anchor when `in_generated` is set.
    pub offset: ByteOffset,
    /// The queried position lies in text that has no original counterpart.
    pub in_generated: bool,
}

impl OriginalPosition {
    /// A position that maps exactly onto original text.
    #[inline]
    pub fn exact(offset: ByteOffset) -> Self {
        Self {
            offset,
            in_generated: false,
        }
    }

    /// A position inside synthetic text, anchored at `offset`.
    #[inline]
    pub fn synthetic(offset: ByteOffset) -> Self {
        Self {
            offset,
            in_generated: true,
        }
    }
}

/// Translates offsets between the original and generated coordinate spaces.
pub trait PositionMapper {
    /// Maps an original offset to the generated text.
    ///
    /// Returns `None` when the original text was dropped from the output.
    fn to_generated(&self, original: ByteOffset) -> Option<ByteOffset>;

    /// Maps a generated offset back to the original text.
    fn to_original(&self, generated: ByteOffset) -> OriginalPosition;
}
