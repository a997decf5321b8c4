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

//! Minimal TIFF/EXIF directory reader and writer.
//!
//! Only the handful of tags the scrambling scheme uses are interpreted.
//! Raw EXIF blocks come from the image decoder; this module never walks
//! JPEG or PNG containers when reading, only when embedding.

use image::ImageFormat;

use crate::error::ExifError;

pub const TAG_IMAGE_WIDTH: u16 = 0x0100;
pub const TAG_IMAGE_LENGTH: u16 = 0x0101;
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_PIXEL_X_DIMENSION: u16 = 0xA002;
pub const TAG_PIXEL_Y_DIMENSION: u16 = 0xA003;
pub const TAG_IMAGE_UNIQUE_ID: u16 = 0xA420;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }
}

/// One 12-byte directory entry.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub tag: u16,
    kind: u16,
    count: u32,
    // Offset of the 4-byte value field inside the TIFF block.
    field: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub entries: Vec<Entry>,
}

impl Directory {
    pub fn get(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// A parsed TIFF header over a borrowed EXIF block.
#[derive(Debug, Clone, Copy)]
pub struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Tiff<'a> {
    /// Parses the TIFF header. A leading `Exif\0\0` marker is skipped.
    pub fn parse(data: &'a [u8]) -> Result<Self, ExifError> {
        let data = data.strip_prefix(EXIF_HEADER).unwrap_or(data);
        let mut tiff = Self {
            data,
            order: ByteOrder::Little,
        };

        tiff.order = match tiff.slice(0, 2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return Err(ExifError::ByteOrder),
        };
        match tiff.read_u16(2)? {
            42 => Ok(tiff),
            v => Err(ExifError::Magic(v)),
        }
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ExifError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ExifError::Truncated {
                offset,
                needed: len,
            })
    }

    fn read_u16(&self, offset: usize) -> Result<u16, ExifError> {
        Ok(self.order.u16(self.slice(offset, 2)?))
    }

    fn read_u32(&self, offset: usize) -> Result<u32, ExifError> {
        Ok(self.order.u32(self.slice(offset, 4)?))
    }

    /// Reads the directory at `offset`, returning it with the next offset.
    fn read_directory(&self, offset: usize) -> Result<(Directory, usize), ExifError> {
        let count = self.read_u16(offset)? as usize;
        let body = offset + 2;
        let raw = self.slice(body, count * 12)?;

        let entries = raw
            .chunks_exact(12)
            .enumerate()
            .map(|(i, e)| Entry {
                tag: self.order.u16(&e[0..2]),
                kind: self.order.u16(&e[2..4]),
                count: self.order.u32(&e[4..8]),
                field: body + i * 12 + 8,
            })
            .collect();

        // Some writers drop the trailing next-directory link.
        let next = self.read_u32(body + count * 12).unwrap_or(0) as usize;
        Ok((Directory { entries }, next))
    }

    /// Collects IFD0, the EXIF sub-directory and IFD1, in that order.
    ///
    /// Only a broken IFD0 is an error. Later directories that cannot be
    /// read, or that point back at an already visited one, are skipped.
    pub fn directories(&self) -> Result<Vec<Directory>, ExifError> {
        let first = self.read_u32(4)? as usize;
        let (ifd0, next) = self.read_directory(first)?;

        let mut seen = vec![first];
        let mut pending = vec![next];
        if let Some(p) = ifd0.get(TAG_EXIF_IFD).and_then(|e| self.uint(e)) {
            pending.push(p as usize);
        }
        let mut out = vec![ifd0];

        while let Some(offset) = pending.pop() {
            if offset == 0 {
                continue;
            }
            if seen.contains(&offset) {
                log::warn!("ignoring EXIF directory: {}", ExifError::Loop(offset));
                continue;
            }
            seen.push(offset);

            match self.read_directory(offset) {
                Ok((dir, _)) => out.push(dir),
                Err(e) => log::warn!("skipping unreadable EXIF directory at {offset}: {e}"),
            }
        }

        Ok(out)
    }

    fn value_bytes(&self, e: &Entry, unit: usize) -> Option<&'a [u8]> {
        let len = unit.checked_mul(e.count as usize)?;
        if len <= 4 {
            self.slice(e.field, len).ok()
        } else {
            let offset = self.read_u32(e.field).ok()? as usize;
            self.slice(offset, len).ok()
        }
    }

    /// First value of a SHORT or LONG entry.
    pub fn uint(&self, e: &Entry) -> Option<u32> {
        if e.count == 0 {
            return None;
        }
        match e.kind {
            TYPE_SHORT => Some(self.order.u16(self.slice(e.field, 2).ok()?) as u32),
            TYPE_LONG => self.read_u32(e.field).ok(),
            _ => None,
        }
    }

    /// Text of an ASCII (or UNDEFINED) entry, without NUL padding.
    pub fn text(&self, e: &Entry) -> Option<String> {
        if e.kind != TYPE_ASCII && e.kind != TYPE_UNDEFINED {
            return None;
        }
        let raw = self.value_bytes(e, 1)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(&raw[..end]).trim().to_owned())
    }
}

/// The tags the scrambling scheme stores in an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifFields {
    /// Intended content width and height.
    pub dimensions: Option<(u32, u32)>,
    /// The permutation key, as stored in `ImageUniqueID`.
    pub unique_id: Option<String>,
}

impl ExifFields {
    /// Extracts the scheme tags from a raw EXIF block.
    pub fn parse(raw: &[u8]) -> Result<Self, ExifError> {
        let tiff = Tiff::parse(raw)?;
        let dirs = tiff.directories()?;
        let find = |tag| dirs.iter().find_map(|d| d.get(tag));

        let pair = |w, h| Some((tiff.uint(find(w)?)?, tiff.uint(find(h)?)?));
        let dimensions = pair(TAG_IMAGE_WIDTH, TAG_IMAGE_LENGTH)
            .or_else(|| pair(TAG_PIXEL_X_DIMENSION, TAG_PIXEL_Y_DIMENSION));

        let unique_id = find(TAG_IMAGE_UNIQUE_ID)
            .and_then(|e| tiff.text(e))
            .filter(|s| !s.is_empty());

        Ok(Self {
            dimensions,
            unique_id,
        })
    }

    /// Serializes the fields as a big-endian TIFF block.
    ///
    /// Dimensions go to IFD0, the identifier to an EXIF sub-directory.
    pub fn to_tiff(&self) -> Vec<u8> {
        let mut ifd0 = Vec::new();
        if let Some((w, h)) = self.dimensions {
            ifd0.push((TAG_IMAGE_WIDTH, TYPE_LONG, 1, w));
            ifd0.push((TAG_IMAGE_LENGTH, TYPE_LONG, 1, h));
        }

        let ifd0_count = ifd0.len() + usize::from(self.unique_id.is_some());
        let exif_at = 8 + 2 + 12 * ifd0_count + 4;

        let mut out = Vec::new();
        out.extend_from_slice(b"MM");
        out.extend_from_slice(&42u16.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes());

        let Some(id) = &self.unique_id else {
            write_directory(&mut out, &ifd0);
            return out;
        };

        ifd0.push((TAG_EXIF_IFD, TYPE_LONG, 1, exif_at as u32));
        write_directory(&mut out, &ifd0);

        let mut text = id.as_bytes().to_vec();
        text.push(0);
        let value = if text.len() <= 4 {
            let mut v = [0u8; 4];
            v[..text.len()].copy_from_slice(&text);
            u32::from_be_bytes(v)
        } else {
            (exif_at + 2 + 12 + 4) as u32
        };
        write_directory(
            &mut out,
            &[(TAG_IMAGE_UNIQUE_ID, TYPE_ASCII, text.len() as u32, value)],
        );
        if text.len() > 4 {
            out.extend_from_slice(&text);
        }

        out
    }
}

fn write_directory(out: &mut Vec<u8>, entries: &[(u16, u16, u32, u32)]) {
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for &(tag, kind, count, value) in entries {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&0u32.to_be_bytes());
}

/// Inserts a TIFF block into an encoded JPEG (APP1) or PNG (eXIf).
pub fn embed(encoded: &[u8], format: ImageFormat, tiff: &[u8]) -> Result<Vec<u8>, ExifError> {
    match format {
        ImageFormat::Jpeg => embed_jpeg(encoded, tiff),
        ImageFormat::Png => embed_png(encoded, tiff),
        _ => Err(ExifError::Container("only JPEG and PNG can carry metadata")),
    }
}

fn embed_jpeg(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, ExifError> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return Err(ExifError::Container("missing JPEG start of image"));
    }
    let len = 2 + EXIF_HEADER.len() + tiff.len();
    let len16 = u16::try_from(len).map_err(|_| ExifError::TooLarge(len))?;

    let mut out = Vec::with_capacity(jpeg.len() + len + 2);
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE1]);
    out.extend_from_slice(&len16.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

fn embed_png(png: &[u8], tiff: &[u8]) -> Result<Vec<u8>, ExifError> {
    if !png.starts_with(&PNG_SIGNATURE) || png.get(12..16) != Some(b"IHDR".as_slice()) {
        return Err(ExifError::Container("missing PNG header chunk"));
    }
    let ihdr_len = u32::from_be_bytes([png[8], png[9], png[10], png[11]]) as usize;
    let ihdr_end = 8 + 12 + ihdr_len;
    if png.len() < ihdr_end {
        return Err(ExifError::Truncated {
            offset: 8,
            needed: 12 + ihdr_len,
        });
    }
    let len = u32::try_from(tiff.len()).map_err(|_| ExifError::TooLarge(tiff.len()))?;

    let mut out = Vec::with_capacity(png.len() + tiff.len() + 12);
    out.extend_from_slice(&png[..ihdr_end]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&crc32(b"eXIf", tiff).to_be_bytes());
    out.extend_from_slice(&png[ihdr_end..]);
    Ok(out)
}

fn crc32(tag: &[u8], data: &[u8]) -> u32 {
    static TABLE: std::sync::OnceLock<[u32; 256]> = std::sync::OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut t = [0u32; 256];
        for (n, v) in t.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 {
                    0xEDB8_8320 ^ (c >> 1)
                } else {
                    c >> 1
                };
            }
            *v = c;
        }
        t
    });

    let mut c = 0xFFFF_FFFFu32;
    for &b in tag.iter().chain(data) {
        c = table[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}
