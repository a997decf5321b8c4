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

//! Forward direction of the scheme, for producing test images.
//!
//! Every copy the reconstructors make is replayed backwards, so
//! scrambling then descrambling returns the original canvas wherever the
//! key reaches.

use image::RgbaImage;
use ndarray::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use sha2::{Digest, Sha256};

use crate::engine::OutputFormat;
use crate::error::DescrambleError;
use crate::exif::{self, ExifFields};
use crate::grid::GridPlan;
use crate::key::PermutationKey;
use crate::reconstruct::{rgba_image, rgba_view, transfer};
use crate::scheme::SchemeParameters;

/// Random generator for key generation.
///
/// A seed string is hashed so that any text gives a full-width seed.
pub fn seeded_rng(seed: Option<&str>) -> Xoshiro256StarStar {
    match seed {
        Some(seed) => {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            Xoshiro256StarStar::from_seed(hasher.finalize().into())
        }
        None => Xoshiro256StarStar::from_entropy(),
    }
}

/// Scrambles a `(height, width, channels)` canvas.
///
/// The result is padded by the scheme's cuts and keeps gap pixels at
/// `A::default()`. Key entries that do not address a cell are ignored.
pub fn scramble<A: Clone + Default>(
    canvas: ArrayView3<'_, A>,
    key: &PermutationKey,
    scheme: &SchemeParameters,
) -> Array3<A> {
    let (h, w, channels) = canvas.dim();
    let content = (w as u32, h as u32);
    let raster_dim = (content.0 + scheme.width_cut, content.1 + scheme.height_cut);
    let plan = GridPlan::new(raster_dim, content, scheme);

    let mut raster = Array3::from_elem(
        (raster_dim.1 as usize, raster_dim.0 as usize, channels),
        A::default(),
    );
    let mut out = raster.view_mut();

    for copy in plan.border_copies(scheme) {
        transfer(&canvas, &mut out, copy.reversed());
    }
    for (position, &index) in key.as_slice().iter().enumerate() {
        if let Ok(copy) = plan.interior_copy(scheme, position, index) {
            transfer(&canvas, &mut out, copy.reversed());
        }
    }

    raster
}

/// Scrambles an RGBA image.
pub fn scramble_image(
    img: &RgbaImage,
    key: &PermutationKey,
    scheme: &SchemeParameters,
) -> Result<RgbaImage, DescrambleError> {
    Ok(rgba_image(scramble(rgba_view(img)?, key, scheme))?)
}

/// Scrambles and encodes an image, storing its size and key as EXIF.
pub fn scramble_to_bytes(
    img: &RgbaImage,
    key: &PermutationKey,
    scheme: &SchemeParameters,
    output: OutputFormat,
) -> Result<Vec<u8>, DescrambleError> {
    let fields = ExifFields {
        dimensions: Some(img.dimensions()),
        unique_id: Some(key.to_string()),
    };
    let encoded = output.encode(scramble_image(img, key, scheme)?)?;
    Ok(exif::embed(&encoded, output.image_format(), &fields.to_tiff())?)
}
