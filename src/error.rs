// Copyright (C) 2023 Dheatly23
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt;

/// Errors produced while descrambling a single image.
#[derive(Debug, thiserror::Error)]
pub enum DescrambleError {
    /// The metadata carries no unique identifier, so there is no key.
    #[error("decryption key not found in image metadata")]
    DecryptionKeyNotFound,

    /// The identifier is not a colon separated list of hex numbers.
    #[error("malformed key segment {segment:?}")]
    MalformedKey { segment: String },

    /// The input is not an image the codec layer understands.
    #[error("failed to decode image: {0}")]
    DecodeFailure(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    EncodeFailure(#[source] image::ImageError),

    /// The EXIF block exists but its header or first directory is unreadable.
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(#[from] ExifError),

    /// The metadata asks for a canvas larger than the configured limit.
    #[error("canvas {width}x{height} exceeds the allocation limit")]
    CanvasTooLarge { width: u32, height: u32 },

    #[error("pixel buffer has unexpected shape: {0}")]
    BufferShape(#[from] ndarray::ShapeError),
}

impl DescrambleError {
    /// Whether the image itself is fine and only the key is unusable.
    ///
    /// Callers in a response pipeline should serve the original bytes for
    /// these instead of failing the whole page.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::DecryptionKeyNotFound
                | Self::MalformedKey { .. }
                | Self::CorruptMetadata(_)
                | Self::CanvasTooLarge { .. }
        )
    }
}

/// Structural problems inside a TIFF/EXIF block or its container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExifError {
    #[error("bad byte order mark")]
    ByteOrder,

    #[error("bad TIFF magic number {0:#06x}")]
    Magic(u16),

    #[error("truncated at offset {offset} (need {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("directory loop at offset {0}")]
    Loop(usize),

    #[error("unsupported container: {0}")]
    Container(&'static str),

    #[error("metadata segment too large ({0} bytes)")]
    TooLarge(usize),
}

/// A reconstruction that completed but left part of the canvas unplaced.
///
/// Cells that were not written stay black (fully transparent in RGBA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReconstruction {
    /// The key has fewer entries than the scheme has permuted tiles.
    ShortKey { expected: usize, found: usize },

    /// Key position `position` refers to a source cell outside the interior.
    SourceOutOfRange { position: usize },

    /// Key entry at `position` names a destination cell outside the interior.
    DestinationOutOfRange { position: usize, index: usize },

    /// A copy had to be clipped to fit the raster or the canvas.
    Clipped { position: usize },
}

impl fmt::Display for PartialReconstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ShortKey { expected, found } => {
                write!(f, "key has {found} entries, expected {expected}")
            }
            Self::SourceOutOfRange { position } => {
                write!(f, "key position {position} has no source tile")
            }
            Self::DestinationOutOfRange { position, index } => {
                write!(f, "key entry {index:#x} at position {position} is out of range")
            }
            Self::Clipped { position } => write!(f, "tile {position} was clipped"),
        }
    }
}
