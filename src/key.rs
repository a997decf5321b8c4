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
use std::str::FromStr;

use rand::prelude::*;

use crate::error::DescrambleError;

/// Destination cell of every scrambled interior tile, in source order.
///
/// Entry `m` says where source tile `m` belongs. Values are not validated
/// here; the reconstructor bounds-checks them when it writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermutationKey(Vec<usize>);

impl PermutationKey {
    /// Parses the colon separated hex form stored in `ImageUniqueID`.
    ///
    /// Empty segments are skipped, so `"1::2:"` is the key `[1, 2]`.
    pub fn parse(id: &str) -> Result<Self, DescrambleError> {
        id.split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let malformed = || DescrambleError::MalformedKey {
                    segment: s.to_owned(),
                };
                if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(malformed());
                }
                usize::from_str_radix(s, 16).map_err(|_| malformed())
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }

    /// Key that leaves every tile where it is.
    pub fn identity(len: usize) -> Self {
        Self((0..len).collect())
    }

    /// Random permutation of `0..len`.
    pub fn random<R: Rng + ?Sized>(len: usize, random: &mut R) -> Self {
        let mut v: Vec<_> = (0..len).collect();
        v.shuffle(random);
        Self(v)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for PermutationKey {
    fn from(v: Vec<usize>) -> Self {
        Self(v)
    }
}

impl FromStr for PermutationKey {
    type Err = DescrambleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PermutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{v:x}")?;
        }
        Ok(())
    }
}
