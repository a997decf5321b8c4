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

//! Block transfers between a scrambled raster and the output canvas.
//!
//! Arrays are laid out as `(rows, columns, channels)`, the same shape
//! [`image`] buffers have when viewed through [`ndarray`].

use image::RgbaImage;
use ndarray::prelude::*;
use ndarray::{ErrorKind, ShapeError};

use crate::error::PartialReconstruction;
use crate::grid::{BlockCopy, GridPlan, InteriorMiss};
use crate::key::PermutationKey;
use crate::scheme::SchemeParameters;

/// Views an RGBA image as a `(height, width, 4)` array.
pub fn rgba_view(img: &RgbaImage) -> Result<ArrayView3<'_, u8>, ShapeError> {
    let (w, h) = img.dimensions();
    ArrayView3::from_shape((h as usize, w as usize, 4), img.as_raw())
}

/// Turns a `(height, width, 4)` array back into an RGBA image.
pub fn rgba_image(arr: Array3<u8>) -> Result<RgbaImage, ShapeError> {
    let (h, w, c) = arr.dim();
    if c != 4 || !arr.is_standard_layout() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleLayout));
    }
    RgbaImage::from_raw(w as u32, h as u32, arr.into_raw_vec())
        .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleShape))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Full,
    Clipped,
}

fn extent<A>(arr: &ArrayView3<'_, A>) -> (u32, u32) {
    (arr.shape()[1] as u32, arr.shape()[0] as u32)
}

/// Copies one rectangle, clipped to both arrays.
pub(crate) fn transfer<A: Clone>(
    src: &ArrayView3<'_, A>,
    dst: &mut ArrayViewMut3<'_, A>,
    copy: BlockCopy,
) -> Outcome {
    if copy.is_empty() {
        return Outcome::Full;
    }
    let dst_dim = (dst.shape()[1] as u32, dst.shape()[0] as u32);
    let Some(c) = copy.clip(extent(src), dst_dim) else {
        return Outcome::Clipped;
    };

    let (sx, sy) = (c.src.0 as usize, c.src.1 as usize);
    let (dx, dy) = (c.dst.0 as usize, c.dst.1 as usize);
    let (w, h) = (c.width as usize, c.height as usize);
    dst.slice_mut(s![dy..dy + h, dx..dx + w, ..])
        .assign(&src.slice(s![sy..sy + h, sx..sx + w, ..]));

    if c == copy {
        Outcome::Full
    } else {
        Outcome::Clipped
    }
}

/// Copies the four unpermuted strips to their place on the canvas.
pub fn copy_borders<A: Clone>(
    raster: ArrayView3<'_, A>,
    mut canvas: ArrayViewMut3<'_, A>,
    plan: &GridPlan,
    scheme: &SchemeParameters,
) {
    let names = ["top", "left", "bottom", "right"];
    for (copy, name) in plan.border_copies(scheme).into_iter().zip(names) {
        if transfer(&raster, &mut canvas, copy) == Outcome::Clipped {
            log::warn!("{name} border strip does not fit, clipped: {copy:?}");
        }
    }
}

/// Moves every scrambled interior tile to the cell the key names.
///
/// Cells no key entry reaches keep their previous contents. Anything that
/// could not be placed is reported instead of failing the page.
pub fn place_tiles<A: Clone>(
    raster: ArrayView3<'_, A>,
    mut canvas: ArrayViewMut3<'_, A>,
    plan: &GridPlan,
    scheme: &SchemeParameters,
    key: &PermutationKey,
) -> Vec<PartialReconstruction> {
    let mut warnings = Vec::new();

    let expected = scheme.expected_key_len();
    if key.len() < expected {
        warnings.push(PartialReconstruction::ShortKey {
            expected,
            found: key.len(),
        });
    }

    for (position, &index) in key.as_slice().iter().enumerate() {
        match plan.interior_copy(scheme, position, index) {
            Ok(copy) => {
                if transfer(&raster, &mut canvas, copy) == Outcome::Clipped {
                    warnings.push(PartialReconstruction::Clipped { position });
                }
            }
            Err(InteriorMiss::Destination) => {
                warnings.push(PartialReconstruction::DestinationOutOfRange { position, index });
            }
            Err(InteriorMiss::Source) => {
                // every later position is out of range too
                warnings.push(PartialReconstruction::SourceOutOfRange { position });
                break;
            }
        }
    }

    warnings
}

/// Runs both reconstructors on a fresh canvas filled with `A::default()`.
pub fn reconstruct<A: Clone + Default>(
    raster: ArrayView3<'_, A>,
    plan: &GridPlan,
    scheme: &SchemeParameters,
    key: &PermutationKey,
) -> (Array3<A>, Vec<PartialReconstruction>) {
    let channels = raster.shape()[2];
    let mut canvas = Array3::from_elem(
        (
            plan.canvas_height as usize,
            plan.canvas_width as usize,
            channels,
        ),
        A::default(),
    );

    copy_borders(raster.view(), canvas.view_mut(), plan, scheme);
    let warnings = place_tiles(raster, canvas.view_mut(), plan, scheme, key);
    for w in &warnings {
        log::warn!("partial reconstruction: {w}");
    }

    (canvas, warnings)
}
