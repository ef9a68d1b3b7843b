//! Windows icon container (`.ico`) codec.
//!
//! Sizing an icon only needs the 6-byte header and the 16-byte directory
//! entries; the pixel payload is read only when a full decode is requested.

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::{self, Cursor, Read, Write};

use crate::errors::IcoError;

/// Leading bytes of an icon container: reserved `0`, type `1`.
pub const ICO_MAGIC: [u8; 4] = [0x00, 0x00, 0x01, 0x00];

const HEADER_LEN: usize = 6;
const ENTRY_LEN: usize = 16;
const BMP_FILE_HEADER_LEN: u32 = 14;
const BITMAPINFOHEADER_LEN: u32 = 40;
const BI_BITFIELDS: u32 = 3;
const BI_ALPHABITFIELDS: u32 = 6;
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// One directory entry, fields as stored on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IconDirEntry {
    /// Stored width; 0 means 256.
    pub width: u8,
    /// Stored height; 0 means 256.
    pub height: u8,
    /// Stored palette size; 0 means 256.
    pub palette_count: u8,
    /// Reserved, should be 0.
    pub reserved: u8,
    /// Color planes.
    pub color_planes: u16,
    /// Bits per pixel.
    pub bits_per_pixel: u16,
    /// Payload length in bytes.
    pub size: u32,
    /// Payload offset from the start of the file.
    pub offset: u32,
}

impl IconDirEntry {
    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        if self.width == 0 {
            256
        } else {
            self.width as u32
        }
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        if self.height == 0 {
            256
        } else {
            self.height as u32
        }
    }

    /// Number of palette colors.
    #[must_use]
    pub const fn color_count(&self) -> u32 {
        if self.palette_count == 0 {
            256
        } else {
            self.palette_count as u32
        }
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; ENTRY_LEN];
        reader.read_exact(&mut buf)?;
        Ok(Self {
            width: buf[0],
            height: buf[1],
            palette_count: buf[2],
            reserved: buf[3],
            color_planes: u16::from_le_bytes([buf[4], buf[5]]),
            bits_per_pixel: u16::from_le_bytes([buf[6], buf[7]]),
            size: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            offset: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[self.width, self.height, self.palette_count, self.reserved])?;
        writer.write_all(&self.color_planes.to_le_bytes())?;
        writer.write_all(&self.bits_per_pixel.to_le_bytes())?;
        writer.write_all(&self.size.to_le_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())
    }

    /// Slices this entry's payload out of the whole container.
    pub fn payload<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], IcoError> {
        let offset = self.offset as usize;
        let end = offset.saturating_add(self.size as usize);
        if end > data.len() {
            return Err(IcoError::PayloadOutOfBounds {
                offset,
                end,
                len: data.len(),
            });
        }
        Ok(&data[offset..end])
    }
}

/// The icon directory: header plus entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconDir {
    /// Reserved, should be 0.
    pub reserved: u16,
    /// 1 for icons, 2 for cursors.
    pub kind: u16,
    /// Directory entries in file order.
    pub entries: Vec<IconDirEntry>,
}

impl IconDir {
    /// Reads the header and directory. Never touches pixel data.
    ///
    /// Any short read fails with [`IcoError::MalformedContainer`].
    pub fn parse<R: Read>(mut reader: R) -> Result<Self, IcoError> {
        let reserved = read_u16(&mut reader)?;
        let kind = read_u16(&mut reader)?;
        let count = read_u16(&mut reader)?;

        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            entries.push(IconDirEntry::read_from(&mut reader)?);
        }

        Ok(Self {
            reserved,
            kind,
            entries,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Picks the entry to report for this container.
    ///
    /// An entry replaces the current best only if it is strictly larger in
    /// both width and height, so of a 48x32 and a 32x48 entry the first one
    /// seen is kept.
    #[must_use]
    pub fn find_best_icon(&self) -> Option<&IconDirEntry> {
        let mut entries = self.entries.iter();
        let mut best = entries.next()?;
        for entry in entries {
            if entry.width() > best.width() && entry.height() > best.height() {
                best = entry;
            }
        }
        Some(best)
    }

    /// Writes the header and directory.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many icon entries"))?;
        writer.write_all(&self.reserved.to_le_bytes())?;
        writer.write_all(&self.kind.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        for entry in &self.entries {
            entry.write_to(writer)?;
        }
        Ok(())
    }

    /// Length of header plus directory in bytes.
    #[must_use]
    pub fn directory_len(&self) -> usize {
        HEADER_LEN + ENTRY_LEN * self.entries.len()
    }
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Returns the dimensions of the best entry without decoding pixels.
pub fn decode_config(data: &[u8]) -> Result<(u32, u32), IcoError> {
    let dir = IconDir::parse(data)?;
    let best = dir.find_best_icon().ok_or(IcoError::NoImages)?;
    Ok((best.width(), best.height()))
}

/// Fully decodes the best entry.
pub fn decode(data: &[u8]) -> Result<DynamicImage, IcoError> {
    let dir = IconDir::parse(data)?;
    let best = dir.find_best_icon().ok_or(IcoError::NoImages)?;
    let payload = best.payload(data)?;

    if payload.starts_with(PNG_SIGNATURE) {
        return Ok(image::load_from_memory_with_format(payload, ImageFormat::Png)?);
    }

    let bmp = dib_to_bmp(payload)?;
    Ok(image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)?)
}

/// Wraps a raw DIB from an icon entry into a standalone BMP file.
///
/// Icon DIBs store twice their height (color bitmap plus AND mask); the
/// height is halved so only the color bitmap is read.
fn dib_to_bmp(dib: &[u8]) -> Result<Vec<u8>, IcoError> {
    if dib.len() < BITMAPINFOHEADER_LEN as usize {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated bitmap header").into());
    }

    let le_u32 = |at: usize| u32::from_le_bytes([dib[at], dib[at + 1], dib[at + 2], dib[at + 3]]);
    let header_len = le_u32(0);
    if header_len < BITMAPINFOHEADER_LEN || header_len as usize > dib.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "unsupported bitmap header").into());
    }

    let height = i32::from_le_bytes([dib[8], dib[9], dib[10], dib[11]]);
    let bits_per_pixel = u16::from_le_bytes([dib[14], dib[15]]);
    let compression = le_u32(16);
    let colors_used = le_u32(32);

    let palette_len = if bits_per_pixel <= 8 {
        let colors = if colors_used == 0 {
            1u32 << bits_per_pixel
        } else {
            colors_used
        };
        colors.saturating_mul(4)
    } else {
        0
    };
    let masks_len = match (header_len, compression) {
        (BITMAPINFOHEADER_LEN, BI_BITFIELDS) => 12,
        (BITMAPINFOHEADER_LEN, BI_ALPHABITFIELDS) => 16,
        _ => 0,
    };
    let pixel_offset = (BMP_FILE_HEADER_LEN + header_len)
        .saturating_add(palette_len)
        .saturating_add(masks_len);
    let file_len = u32::try_from(dib.len())
        .ok()
        .and_then(|len| len.checked_add(BMP_FILE_HEADER_LEN))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bitmap too large"))?;

    let mut bmp = Vec::with_capacity(file_len as usize);
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&file_len.to_le_bytes());
    bmp.extend_from_slice(&[0, 0, 0, 0]);
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(dib);

    let height_at = BMP_FILE_HEADER_LEN as usize + 8;
    bmp[height_at..height_at + 4].copy_from_slice(&(height / 2).to_le_bytes());
    Ok(bmp)
}

/// Builds an icon container holding one PNG-encoded entry per image.
///
/// Dimensions of 256 and above are stored as 0.
pub fn encode_ico(images: &[RgbaImage]) -> Result<Vec<u8>, IcoError> {
    let mut payloads = Vec::with_capacity(images.len());
    for img in images {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        payloads.push((img.width(), img.height(), png));
    }

    let mut dir = IconDir {
        reserved: 0,
        kind: 1,
        entries: Vec::with_capacity(payloads.len()),
    };
    let mut offset = HEADER_LEN + ENTRY_LEN * payloads.len();
    for (width, height, png) in &payloads {
        dir.entries.push(IconDirEntry {
            width: u8::try_from(*width).unwrap_or(0),
            height: u8::try_from(*height).unwrap_or(0),
            palette_count: 0,
            reserved: 0,
            color_planes: 1,
            bits_per_pixel: 32,
            size: to_u32(png.len())?,
            offset: to_u32(offset)?,
        });
        offset += png.len();
    }

    let mut out = Vec::with_capacity(offset);
    dir.write_to(&mut out)?;
    for (_, _, png) in payloads {
        out.extend_from_slice(&png);
    }
    Ok(out)
}

fn to_u32(n: usize) -> io::Result<u32> {
    u32::try_from(n).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "icon too large"))
}
