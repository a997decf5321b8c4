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

/// Fixed parameters of one scrambling scheme.
///
/// The defaults match the publisher scheme this crate was written for.
/// Changing any of them without matching sample data produces garbage,
/// since nothing checks that the grid matches the real tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeParameters {
    /// Grid columns, border included.
    pub columns: u32,
    /// Grid rows, border included.
    pub rows: u32,
    /// Pixels inserted between adjacent tiles of the scrambled image.
    pub gap: u32,
    /// Horizontal padding of the scrambled image over the content.
    pub width_cut: u32,
    /// Vertical padding of the scrambled image over the content.
    pub height_cut: u32,
    /// Width used when the metadata has no dimension tags.
    pub fallback_width: u32,
    /// Height used when the metadata has no dimension tags.
    pub fallback_height: u32,
    /// Divisor mapping a key index to an interior cell, on both axes.
    pub inner_count: u32,
}

impl SchemeParameters {
    pub const fn new() -> Self {
        Self {
            columns: 10,
            rows: 15,
            gap: 10,
            width_cut: 90,
            height_cut: 140,
            fallback_width: 800,
            fallback_height: 1200,
            inner_count: 8,
        }
    }

    /// Number of key entries a complete key carries.
    pub fn expected_key_len(&self) -> usize {
        (self.inner_count as usize).pow(2)
    }

    /// Number of interior cells a key index may address.
    ///
    /// Indices wrap every `inner_count` cells, so with the default scheme
    /// only 8 of the 13 interior rows are reachable.
    pub fn addressable_cells(&self) -> usize {
        self.inner_count as usize * self.rows.saturating_sub(2) as usize
    }
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self::new()
    }
}
