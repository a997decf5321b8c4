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

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Limits, RgbaImage};
use rayon::prelude::*;

use crate::error::{DescrambleError, PartialReconstruction};
use crate::grid::GridPlan;
use crate::key::PermutationKey;
use crate::metadata::ImageMetadata;
use crate::reconstruct::{reconstruct, rgba_image, rgba_view};
use crate::scheme::SchemeParameters;

/// Encoding of the reconstructed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg {
        quality: u8,
    },
}

impl OutputFormat {
    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg { .. } => ImageFormat::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.image_format().to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }

    /// Encodes an RGBA image. JPEG drops the alpha channel.
    pub fn encode(&self, img: RgbaImage) -> Result<Vec<u8>, DescrambleError> {
        let mut out = Cursor::new(Vec::new());
        let written = match *self {
            Self::Png => img.write_to(&mut out, ImageFormat::Png),
            Self::Jpeg { quality } => DynamicImage::ImageRgba8(img)
                .into_rgb8()
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality)),
        };
        written.map_err(DescrambleError::EncodeFailure)?;
        Ok(out.into_inner())
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub scheme: SchemeParameters,
    pub output: OutputFormat,
    /// Largest output canvas, in bytes, the engine will allocate.
    ///
    /// The canvas size comes partly from the image's own metadata, so it is
    /// capped the same way the decoder caps its allocations.
    pub max_canvas_bytes: u64,
}

impl EngineConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeParameters::default(),
            output: OutputFormat::default(),
            max_canvas_bytes: Limits::default().max_alloc.unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheme(mut self, scheme: SchemeParameters) -> Self {
        self.config.scheme = scheme;
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.config.output = output;
        self
    }

    /// Shorthand for JPEG output at `quality` (clamped to 1..=100).
    pub fn max_canvas_bytes(mut self, bytes: u64) -> Self {
        self.config.max_canvas_bytes = bytes;
        self
    }

    pub fn jpeg_quality(self, quality: u8) -> Self {
        self.output(OutputFormat::Jpeg {
            quality: quality.clamp(1, 100),
        })
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Encoded input image, shared read-only for the duration of a call.
///
/// Decoding pixels and reading metadata each consume a stream, so the
/// engine opens two independent readers over this buffer. The buffer is
/// reference counted, which keeps the second view from doubling memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage(Bytes);

impl RawImage {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Two independent cursors over the same bytes.
    pub fn readers(&self) -> (Cursor<Bytes>, Cursor<Bytes>) {
        (Cursor::new(self.0.clone()), Cursor::new(self.0.clone()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<Bytes> for RawImage {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl From<&'static [u8]> for RawImage {
    fn from(b: &'static [u8]) -> Self {
        Self::new(b)
    }
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct Descrambled {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Non-empty when parts of the canvas could not be placed.
    pub warnings: Vec<PartialReconstruction>,
}

impl Descrambled {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Reverses the tile scrambling of one image at a time.
///
/// Holds no per-image state, so a single engine can be shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct DescramblingEngine {
    config: EngineConfig,
}

impl DescramblingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decodes, reassembles and re-encodes one scrambled image.
    ///
    /// Metadata is read before the pixels are decoded, so images without a
    /// key are rejected without paying for a full decode. This also sets the
    /// error precedence: an image with no usable key reports the key error
    /// even when its pixel data is corrupt as well, and only keyed images
    /// can fail with [`DescrambleError::DecodeFailure`] on their pixels.
    pub fn descramble(&self, raw: impl Into<RawImage>) -> Result<Descrambled, DescrambleError> {
        let raw = raw.into();
        let scheme = &self.config.scheme;
        let (meta_reader, pixel_reader) = raw.readers();

        let meta = ImageMetadata::read(meta_reader, scheme)?;
        let key = meta.key()?;
        let raster = decode(pixel_reader)?;

        log::debug!(
            "descrambling {}x{} raster, target {}x{} ({:?}), {} key entries",
            raster.width(),
            raster.height(),
            meta.width,
            meta.height,
            meta.source,
            key.len()
        );

        let (canvas, warnings) = self.reconstruct(&raster, &meta, &key)?;
        let (width, height) = canvas.dimensions();
        let bytes = self.config.output.encode(canvas)?;

        Ok(Descrambled {
            bytes,
            format: self.config.output,
            width,
            height,
            warnings,
        })
    }

    /// Reassembles an already decoded raster.
    pub fn reconstruct(
        &self,
        raster: &RgbaImage,
        meta: &ImageMetadata,
        key: &PermutationKey,
    ) -> Result<(RgbaImage, Vec<PartialReconstruction>), DescrambleError> {
        let scheme = &self.config.scheme;
        let plan = GridPlan::new(raster.dimensions(), (meta.width, meta.height), scheme);
        match plan.canvas_bytes(4) {
            Some(bytes) if bytes <= self.config.max_canvas_bytes => {}
            _ => {
                return Err(DescrambleError::CanvasTooLarge {
                    width: plan.canvas_width,
                    height: plan.canvas_height,
                })
            }
        }
        let (canvas, warnings) = reconstruct(rgba_view(raster)?, &plan, scheme, key);
        Ok((rgba_image(canvas)?, warnings))
    }

    /// Descrambles many images on the rayon thread pool.
    ///
    /// Results come back in input order, one per image.
    pub fn descramble_batch<I>(&self, inputs: Vec<I>) -> Vec<Result<Descrambled, DescrambleError>>
    where
        I: Into<RawImage> + Send,
    {
        inputs
            .into_par_iter()
            .map(|raw| self.descramble(raw))
            .collect()
    }
}

fn decode(reader: Cursor<Bytes>) -> Result<RgbaImage, DescrambleError> {
    Ok(ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| DescrambleError::DecodeFailure(ImageError::IoError(e)))?
        .decode()
        .map_err(DescrambleError::DecodeFailure)?
        .into_rgba8())
}

/// Descrambles with the default engine.
pub fn descramble(raw: impl Into<RawImage>) -> Result<Descrambled, DescrambleError> {
    DescramblingEngine::default().descramble(raw)
}
