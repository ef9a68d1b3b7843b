//! Image format registry.
//!
//! Formats are recognised by their leading bytes. Each registered format
//! provides a dimension-only decoder and a full decoder.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;

use crate::errors::DecodeError;
use crate::ico;
use crate::models::IconFormat;

/// Reads only the dimensions of an image.
pub type ConfigDecoder = fn(&[u8]) -> Result<(u32, u32), DecodeError>;

/// Decodes an image fully.
pub type ImageDecoder = fn(&[u8]) -> Result<DynamicImage, DecodeError>;

/// Dimensions and format of an image, without its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// Detected format.
    pub format: IconFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A registered image format.
#[derive(Clone)]
pub struct ImageFormatSpec {
    /// Format reported for matching data.
    pub format: IconFormat,
    /// Leading bytes; `?` matches any single byte.
    pub magic: &'static [u8],
    /// Dimension-only decoder.
    pub decode_config: ConfigDecoder,
    /// Full decoder.
    pub decode: ImageDecoder,
}

impl ImageFormatSpec {
    /// Whether `data` starts with this format's magic.
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.magic.len()
            && self
                .magic
                .iter()
                .zip(data)
                .all(|(m, b)| *m == b'?' || m == b)
    }
}

impl fmt::Debug for ImageFormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFormatSpec")
            .field("format", &self.format)
            .field("magic", &self.magic)
            .finish_non_exhaustive()
    }
}

/// Ordered list of known formats. The first match wins.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<ImageFormatSpec>,
}

impl FormatRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registers a format.
    pub fn register(&mut self, entry: ImageFormatSpec) {
        self.formats.push(entry);
    }

    /// Adds a format, builder style.
    #[must_use]
    pub fn with_format(mut self, entry: ImageFormatSpec) -> Self {
        self.register(entry);
        self
    }

    /// Finds the format matching `data`.
    #[must_use]
    pub fn sniff(&self, data: &[u8]) -> Option<&ImageFormatSpec> {
        self.formats.iter().find(|entry| entry.matches(data))
    }

    /// Reads format and dimensions without decoding pixels.
    pub fn decode_config(&self, data: &[u8]) -> Result<ImageConfig, DecodeError> {
        let entry = self.sniff(data).ok_or(DecodeError::UnknownFormat)?;
        let (width, height) = (entry.decode_config)(data)?;
        Ok(ImageConfig {
            format: entry.format,
            width,
            height,
        })
    }

    /// Decodes the image fully.
    pub fn decode(&self, data: &[u8]) -> Result<DynamicImage, DecodeError> {
        let entry = self.sniff(data).ok_or(DecodeError::UnknownFormat)?;
        (entry.decode)(data)
    }

    /// Formats known to this registry.
    pub fn formats(&self) -> impl Iterator<Item = IconFormat> + '_ {
        self.formats.iter().map(|entry| entry.format)
    }
}

impl Default for FormatRegistry {
    /// PNG, GIF, JPEG, BMP and WebP through `image`, plus the icon container.
    fn default() -> Self {
        Self::empty()
            .with_format(ImageFormatSpec {
                format: IconFormat::Png,
                magic: b"\x89PNG\r\n\x1a\n",
                decode_config: png_config,
                decode: png_decode,
            })
            .with_format(ImageFormatSpec {
                format: IconFormat::Gif,
                magic: b"GIF8",
                decode_config: gif_config,
                decode: gif_decode,
            })
            .with_format(ImageFormatSpec {
                format: IconFormat::Jpg,
                magic: b"\xff\xd8",
                decode_config: jpeg_config,
                decode: jpeg_decode,
            })
            .with_format(ImageFormatSpec {
                format: IconFormat::Bmp,
                magic: b"BM",
                decode_config: bmp_config,
                decode: bmp_decode,
            })
            .with_format(ImageFormatSpec {
                format: IconFormat::Webp,
                magic: b"RIFF????WEBP",
                decode_config: webp_config,
                decode: webp_decode,
            })
            .with_format(ImageFormatSpec {
                format: IconFormat::Ico,
                magic: &ico::ICO_MAGIC,
                decode_config: ico_config,
                decode: ico_decode,
            })
    }
}

fn dimensions_with(data: &[u8], format: ImageFormat) -> Result<(u32, u32), DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(data));
    reader.set_format(format);
    Ok(reader.into_dimensions()?)
}

fn decode_with(data: &[u8], format: ImageFormat) -> Result<DynamicImage, DecodeError> {
    Ok(image::load_from_memory_with_format(data, format)?)
}

macro_rules! image_codec {
    ($config:ident, $decode:ident, $format:expr) => {
        fn $config(data: &[u8]) -> Result<(u32, u32), DecodeError> {
            dimensions_with(data, $format)
        }

        fn $decode(data: &[u8]) -> Result<DynamicImage, DecodeError> {
            decode_with(data, $format)
        }
    };
}

image_codec!(png_config, png_decode, ImageFormat::Png);
image_codec!(gif_config, gif_decode, ImageFormat::Gif);
image_codec!(jpeg_config, jpeg_decode, ImageFormat::Jpeg);
image_codec!(bmp_config, bmp_decode, ImageFormat::Bmp);
image_codec!(webp_config, webp_decode, ImageFormat::WebP);

fn ico_config(data: &[u8]) -> Result<(u32, u32), DecodeError> {
    Ok(ico::decode_config(data)?)
}

fn ico_decode(data: &[u8]) -> Result<DynamicImage, DecodeError> {
    Ok(ico::decode(data)?)
}

/// Cheap SVG sniffing.
///
/// The body must be at least 10 bytes, start with `<!`, `<?` or `<svg`, and
/// contain `<svg` within its first 300 bytes.
#[must_use]
pub fn is_svg(body: &[u8]) -> bool {
    if body.len() < 10 {
        return false;
    }

    if !(body.starts_with(b"<!") || body.starts_with(b"<?") || body.starts_with(b"<svg")) {
        return false;
    }

    body.windows(4)
        .position(|w| w == b"<svg")
        .is_some_and(|offset| offset <= 300)
}
