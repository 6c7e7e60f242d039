//! Transformation errors.

use position_map::LedgerError;
use svelte_markup::ParseError;
use thiserror::Error;

/// Why a file could not be transformed.
///
/// Files that are simply not eligible (not a special file kind, or already
/// fully typed) are never errors.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The component markup could not be parsed.
    #[error("markup error: {0}")]
    Markup(#[from] ParseError),

    /// A component script could not be parsed.
    #[error("script error at offset {offset}: {message}")]
    Script { message: String, offset: u32 },

    /// The source uses a construct the transformation cannot express.
    #[error("unsupported construct at offset {offset}: {message}")]
    Structural { message: String, offset: u32 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl TransformError {
    /// The original offset the error points at, when known.
    pub fn offset(&self) -> Option<u32> {
        match self {
            TransformError::Markup(err) => Some(err.span.start.into()),
            TransformError::Script { offset, .. } | TransformError::Structural { offset, .. } => {
                Some(*offset)
            }
            TransformError::Ledger(LedgerError::DuplicatePosition { offset }) => Some(*offset),
        }
    }
}

/// An export or statement shape the scanner cannot describe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScanError {
    pub message: String,
    /// Offset in the scanned text.
    pub offset: usize,
}

impl ScanError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// Converts into a [`TransformError`], shifting the offset by where the
    /// scanned text starts in the original file.
    pub fn into_transform(self, base: usize) -> TransformError {
        TransformError::Structural {
            message: self.message,
            offset: (base + self.offset) as u32,
        }
    }
}
