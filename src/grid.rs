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

use crate::scheme::SchemeParameters;

/// A translation-only rectangle transfer from raster to canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCopy {
    pub src: (u32, u32),
    pub dst: (u32, u32),
    pub width: u32,
    pub height: u32,
}

impl BlockCopy {
    /// The same copy in the opposite direction.
    pub fn reversed(self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
            ..self
        }
    }

    /// Shrinks the copy to fit a `src_dim` source and a `dst_dim` target.
    ///
    /// Returns `None` when nothing is left.
    pub fn clip(self, src_dim: (u32, u32), dst_dim: (u32, u32)) -> Option<Self> {
        let fit = |len: u32, s: u32, d: u32, sl: u32, dl: u32| {
            len.min(sl.saturating_sub(s)).min(dl.saturating_sub(d))
        };
        let width = fit(self.width, self.src.0, self.dst.0, src_dim.0, dst_dim.0);
        let height = fit(self.height, self.src.1, self.dst.1, src_dim.1, dst_dim.1);

        (width > 0 && height > 0).then_some(Self {
            width,
            height,
            ..self
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Geometry of one descrambling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPlan {
    pub raster_width: u32,
    pub raster_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub columns: u32,
    pub rows: u32,
}

impl GridPlan {
    /// Computes the canvas and block sizes.
    ///
    /// The canvas is the raster minus the scheme padding, but never smaller
    /// than the size the metadata asks for. Block sizes round down; the
    /// remainder is carried by the right and bottom strips.
    pub fn new(
        raster: (u32, u32),
        meta: (u32, u32),
        scheme: &SchemeParameters,
    ) -> Self {
        let canvas_width = raster.0.saturating_sub(scheme.width_cut).max(meta.0);
        let canvas_height = raster.1.saturating_sub(scheme.height_cut).max(meta.1);
        let plan = Self {
            raster_width: raster.0,
            raster_height: raster.1,
            canvas_width,
            canvas_height,
            block_width: canvas_width / scheme.columns.max(1),
            block_height: canvas_height / scheme.rows.max(1),
            columns: scheme.columns,
            rows: scheme.rows,
        };
        log::debug!("{plan:?}");
        plan
    }

    /// Size of the canvas buffer with `channels` bytes per pixel, or `None`
    /// if it does not fit in a `u64`.
    pub fn canvas_bytes(&self, channels: u64) -> Option<u64> {
        u64::from(self.canvas_width)
            .checked_mul(u64::from(self.canvas_height))?
            .checked_mul(channels)
    }

    /// Columns of canvas pixels not covered by whole blocks.
    pub fn width_remainder(&self) -> u32 {
        self.canvas_width - self.columns * self.block_width
    }

    /// The four unpermuted strips: top, left, bottom, right.
    ///
    /// Left and right stop where the bottom strip starts, so no canvas
    /// pixel is written twice; the bottom strip is the one that takes the
    /// vertical remainder.
    pub fn border_copies(&self, scheme: &SchemeParameters) -> [BlockCopy; 4] {
        let (bw, bh, gap) = (self.block_width, self.block_height, scheme.gap);
        let last_col = self.columns.saturating_sub(1);
        let last_row = self.rows.saturating_sub(1);

        let bottom_src = last_row * (bh + gap);
        let bottom_dst = last_row * bh;
        let side_height = self
            .canvas_height
            .saturating_sub(2 * bh)
            .min(bottom_dst.saturating_sub(bh));

        let top = BlockCopy {
            src: (0, 0),
            dst: (0, 0),
            width: self.canvas_width,
            height: bh,
        };
        let left = BlockCopy {
            src: (0, bh + gap),
            dst: (0, bh),
            width: bw,
            height: side_height,
        };
        let bottom = BlockCopy {
            src: (0, bottom_src),
            dst: (0, bottom_dst),
            width: self.canvas_width,
            height: self.raster_height.saturating_sub(bottom_src),
        };
        let right = BlockCopy {
            src: (last_col * (bw + gap), bh + gap),
            dst: (last_col * bw, bh),
            width: bw + self.width_remainder(),
            height: side_height,
        };

        [top, left, bottom, right]
    }

    /// Copy moving scrambled tile `position` to interior cell `index`.
    ///
    /// Both cells are addressed modulo `inner_count` on both axes. Fails
    /// when either falls outside the addressable interior.
    pub fn interior_copy(
        &self,
        scheme: &SchemeParameters,
        position: usize,
        index: usize,
    ) -> Result<BlockCopy, InteriorMiss> {
        let cells = scheme.addressable_cells();
        if position >= cells {
            return Err(InteriorMiss::Source);
        }
        if index >= cells {
            return Err(InteriorMiss::Destination);
        }

        let inner = scheme.inner_count as usize;
        let cell = |i: usize| ((i % inner) as u32 + 1, (i / inner) as u32 + 1);
        let (sc, sr) = cell(position);
        let (dc, dr) = cell(index);
        let (bw, bh, gap) = (self.block_width, self.block_height, scheme.gap);

        Ok(BlockCopy {
            src: (sc * (bw + gap), sr * (bh + gap)),
            dst: (dc * bw, dr * bh),
            width: bw,
            height: bh,
        })
    }
}

/// Which side of an interior copy was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteriorMiss {
    Source,
    Destination,
}
