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

use std::io::{BufRead, Seek};

use image::{ImageDecoder, ImageError, ImageReader};

use crate::error::DescrambleError;
use crate::exif::ExifFields;
use crate::key::PermutationKey;
use crate::scheme::SchemeParameters;

/// Where [`ImageMetadata`] got its dimensions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    Tagged,
    Fallback,
}

/// Scheme fields read from an image's EXIF block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub unique_id: String,
    pub source: DimensionSource,
}

impl ImageMetadata {
    /// Builds metadata from parsed EXIF fields.
    ///
    /// Missing dimensions fall back to the scheme defaults; a missing
    /// identifier is fatal.
    pub fn from_fields(
        fields: ExifFields,
        scheme: &SchemeParameters,
    ) -> Result<Self, DescrambleError> {
        let unique_id = fields
            .unique_id
            .ok_or(DescrambleError::DecryptionKeyNotFound)?;

        let ((width, height), source) = match fields.dimensions {
            Some(d) => (d, DimensionSource::Tagged),
            None => {
                log::debug!(
                    "no dimension tags, assuming {}x{}",
                    scheme.fallback_width,
                    scheme.fallback_height
                );
                (
                    (scheme.fallback_width, scheme.fallback_height),
                    DimensionSource::Fallback,
                )
            }
        };

        Ok(Self {
            width,
            height,
            unique_id,
            source,
        })
    }

    /// Builds metadata from a raw EXIF block (with or without `Exif\0\0`).
    pub fn from_exif(raw: &[u8], scheme: &SchemeParameters) -> Result<Self, DescrambleError> {
        Self::from_fields(ExifFields::parse(raw)?, scheme)
    }

    /// Reads metadata from an encoded image stream.
    ///
    /// The stream is consumed; pixel data is not decoded.
    pub fn read<R: BufRead + Seek>(
        reader: R,
        scheme: &SchemeParameters,
    ) -> Result<Self, DescrambleError> {
        let mut decoder = ImageReader::new(reader)
            .with_guessed_format()
            .map_err(|e| DescrambleError::DecodeFailure(ImageError::IoError(e)))?
            .into_decoder()
            .map_err(DescrambleError::DecodeFailure)?;

        let raw = decoder
            .exif_metadata()
            .map_err(DescrambleError::DecodeFailure)?
            .ok_or(DescrambleError::DecryptionKeyNotFound)?;

        Self::from_exif(&raw, scheme)
    }

    pub fn key(&self) -> Result<PermutationKey, DescrambleError> {
        PermutationKey::parse(&self.unique_id)
    }
}
