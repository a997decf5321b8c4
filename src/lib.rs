//! Library to reassemble tile-scrambled page images.
//!
//! Some publishers cut each page into a 10 by 15 grid, shuffle the inner
//! tiles, insert a gap between all of them and hide the shuffle key in the
//! image's own EXIF block. [DescramblingEngine] reverses that:
//!
//! * Border strips are copied straight across, minus the gaps.
//! * Inner tiles are moved to the cell the key names.
//! * Division remainders end up in the right and bottom strips.
//!
//! [DescrambleHook] wraps the engine for use inside an HTTP client, and
//! [scramble] produces scrambled images for testing.

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
//

mod engine;
mod error;
pub mod exif;
pub mod grid;
mod hook;
mod key;
mod metadata;
pub mod reconstruct;
pub mod scramble;
mod scheme;

#[doc(inline)]
pub use crate::engine::{
    descramble, ConfigBuilder, Descrambled, DescramblingEngine, EngineConfig, OutputFormat,
    RawImage,
};
pub use crate::error::{DescrambleError, ExifError, PartialReconstruction};
pub use crate::grid::{BlockCopy, GridPlan};
pub use crate::hook::{
    DescrambleHook, Fetch, FetchError, HookError, ImageResponse, DEFAULT_MARKER,
};
pub use crate::key::PermutationKey;
pub use crate::metadata::{DimensionSource, ImageMetadata};
pub use crate::scheme::SchemeParameters;
