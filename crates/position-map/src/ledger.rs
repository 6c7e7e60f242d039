//! Insertion ledger for annotate-in-place transformations.
//!
//! Every piece of text added to the original file is recorded with its
//! original offset. Because the generated file is the original plus these
//! insertions, offsets in either direction are a prefix sum away.

use crate::{ByteOffset, OriginalPosition, PositionMapper};
use text_size::TextSize;
use thiserror::Error;

/// One text insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Insertion {
    /// Offset in the original text the insertion is placed before.
    pub original_pos: ByteOffset,
    /// Offset of the inserted text in the generated output.
    pub generated_pos: ByteOffset,
    /// Byte length of the inserted text.
    pub length: TextSize,
    /// The inserted text.
    pub text: String,
    /// Sum of `length` over this insertion and every earlier one.
    pub total: TextSize,
}

/// Errors raised while recording insertions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Two insertions were requested at the same original offset.
    #[error("an insertion is already recorded at offset {offset}")]
    DuplicatePosition {
        /// The contested original offset.
        offset: u32,
    },
}

/// Ordered record of insertions, sorted by `original_pos` with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    insertions: Vec<Insertion>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `text` as inserted before original offset `position`.
    ///
    /// Insertions may arrive in any order; later records are shifted so that
    /// `generated_pos` and `total` stay consistent. Empty text is ignored.
    pub fn insert(
        &mut self,
        position: ByteOffset,
        text: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let text = text.into();
        if text.is_empty() {
            return Ok(());
        }
        let length = TextSize::of(text.as_str());

        let idx = self
            .insertions
            .partition_point(|ins| ins.original_pos <= position);
        let preceding_total = match idx.checked_sub(1).map(|i| &self.insertions[i]) {
            Some(prev) if prev.original_pos == position => {
                return Err(LedgerError::DuplicatePosition {
                    offset: position.into(),
                });
            }
            Some(prev) => prev.total,
            None => TextSize::from(0),
        };

        for later in &mut self.insertions[idx..] {
            later.generated_pos += length;
            later.total += length;
        }

        self.insertions.insert(
            idx,
            Insertion {
                original_pos: position,
                generated_pos: position + preceding_total,
                length,
                text,
                total: preceding_total + length,
            },
        );
        Ok(())
    }

    pub fn insertions(&self) -> &[Insertion] {
        &self.insertions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.insertions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty()
    }

    /// Maps an original offset into the generated text.
    ///
    /// An insertion placed exactly at `original` counts as preceding it, so
    /// the result points at the original character, not the inserted text.
    pub fn to_generated_pos(&self, original: ByteOffset) -> ByteOffset {
        let idx = self
            .insertions
            .partition_point(|ins| ins.original_pos <= original);
        match idx.checked_sub(1) {
            Some(prev) => original + self.insertions[prev].total,
            None => original,
        }
    }

    /// Maps a generated offset back into the original text.
    ///
    /// Offsets inside inserted text have no original counterpart; they are
    /// reported with `in_generated` set and anchored at the insertion point.
    pub fn to_original_pos(&self, generated: ByteOffset) -> OriginalPosition {
        let idx = self
            .insertions
            .partition_point(|ins| ins.generated_pos <= generated);
        let Some(last) = idx.checked_sub(1).map(|i| &self.insertions[i]) else {
            return OriginalPosition::exact(generated);
        };

        if generated < last.generated_pos + last.length {
            OriginalPosition::synthetic(last.original_pos)
        } else {
            OriginalPosition::exact(generated - last.total)
        }
    }

    /// Replays the insertions over `original`, producing the generated text.
    pub fn assemble(&self, original: &str) -> String {
        let extra = self
            .insertions
            .last()
            .map(|ins| u32::from(ins.total) as usize)
            .unwrap_or(0);
        let mut out = String::with_capacity(original.len() + extra);
        let mut cursor = 0usize;

        for ins in &self.insertions {
            let pos = (u32::from(ins.original_pos) as usize).min(original.len());
            out.push_str(&original[cursor..pos]);
            out.push_str(&ins.text);
            cursor = pos;
        }
        out.push_str(&original[cursor..]);
        out
    }
}

impl PositionMapper for Ledger {
    fn to_generated(&self, original: ByteOffset) -> Option<ByteOffset> {
        Some(self.to_generated_pos(original))
    }

    fn to_original(&self, generated: ByteOffset) -> OriginalPosition {
        self.to_original_pos(generated)
    }
}
