//! Data models for discovered icons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{FetchError, IconfinderError};

/// Image format of a discovered icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconFormat {
    /// Portable Network Graphics.
    Png,
    /// Graphics Interchange Format.
    Gif,
    /// Windows icon container.
    Ico,
    /// JPEG, always reported as `jpg`.
    #[serde(alias = "jpeg")]
    Jpg,
    /// Windows bitmap.
    Bmp,
    /// WebP.
    Webp,
    /// Scalable Vector Graphics, detected by sniffing only.
    Svg,
}

impl IconFormat {
    /// All known formats.
    pub const ALL: [Self; 7] = [
        Self::Png,
        Self::Gif,
        Self::Ico,
        Self::Jpg,
        Self::Bmp,
        Self::Webp,
        Self::Svg,
    ];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Ico => "ico",
            Self::Jpg => "jpg",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
            Self::Svg => "svg",
        }
    }

    /// Parses a comma separated list such as `png,ico`.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, IconfinderError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for IconFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IconFormat {
    type Err = IconfinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name == "jpeg" {
            return Ok(Self::Jpg);
        }
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == name)
            .ok_or_else(|| IconfinderError::UnknownFormat(s.to_string()))
    }
}

/// A successfully fetched and sized icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Absolute URL of the icon.
    pub url: String,
    /// Width in pixels, 0 if unknown.
    pub width: u32,
    /// Height in pixels, 0 if unknown.
    pub height: u32,
    /// Detected image format.
    pub format: IconFormat,
    /// Length of the raw body.
    pub bytes: usize,
    /// SHA-1 hex digest of the raw body.
    pub sha1sum: String,
    /// Raw body, kept only when the engine retains image bytes.
    ///
    /// Serialized as standard base64.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub image_data: Option<Vec<u8>>,
}

impl Icon {
    /// Creates an icon with the given url, format and dimensions.
    #[must_use]
    pub fn new(url: impl Into<String>, format: IconFormat, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            format,
            bytes: 0,
            sha1sum: String::new(),
            image_data: None,
        }
    }

    /// Sets the byte length and digest.
    #[must_use]
    pub fn with_body_info(mut self, bytes: usize, sha1sum: impl Into<String>) -> Self {
        self.bytes = bytes;
        self.sha1sum = sha1sum.into();
        self
    }

    /// Attaches the raw body.
    #[must_use]
    pub fn with_image_data(mut self, data: Vec<u8>) -> Self {
        self.image_data = Some(data);
        self
    }

    /// Decodes the retained body into a raster image.
    ///
    /// Returns `None` when the bytes were discarded or the icon is an SVG.
    pub fn image(
        &self,
        registry: &crate::decode::FormatRegistry,
    ) -> Option<Result<image::DynamicImage, crate::errors::DecodeError>> {
        if self.format == IconFormat::Svg {
            return None;
        }
        self.image_data.as_deref().map(|data| registry.decode(data))
    }
}

/// Result of fetching and decoding one candidate.
#[derive(Debug)]
pub enum IconOutcome {
    /// The candidate was fetched and sized.
    Fetched(Icon),
    /// The candidate failed; siblings are unaffected.
    Failed {
        /// The candidate URL.
        url: String,
        /// Why it failed.
        error: FetchError,
    },
}

impl IconOutcome {
    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(url: impl Into<String>, error: FetchError) -> Self {
        Self::Failed {
            url: url.into(),
            error,
        }
    }

    /// The candidate URL.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Fetched(icon) => &icon.url,
            Self::Failed { url, .. } => url,
        }
    }

    /// Whether the candidate was fetched and sized.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A candidate that failed during discovery.
#[derive(Debug)]
pub struct FailedCandidate {
    /// The candidate URL.
    pub url: String,
    /// Why it failed.
    pub error: FetchError,
}

/// Everything one discovery produced.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Usable icons, best first.
    pub icons: Vec<Icon>,
    /// Candidates that failed to fetch or decode.
    pub failures: Vec<FailedCandidate>,
    /// Number of candidates that were tried.
    pub candidate_count: usize,
}

impl Discovery {
    /// Splits pipeline outcomes into icons and failures.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<IconOutcome>) -> Self {
        let candidate_count = outcomes.len();
        let mut icons = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                IconOutcome::Fetched(icon) => icons.push(icon),
                IconOutcome::Failed { url, error } => failures.push(FailedCandidate { url, error }),
            }
        }
        Self {
            icons,
            failures,
            candidate_count,
        }
    }

    /// Whether there were no candidates at all.
    #[must_use]
    pub const fn had_no_candidates(&self) -> bool {
        self.candidate_count == 0
    }

    /// Whether candidates existed but none of them yielded an icon.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.candidate_count > 0 && self.icons.is_empty()
    }
}
