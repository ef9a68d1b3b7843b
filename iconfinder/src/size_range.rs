//! Desired icon dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IconfinderError;

/// Largest size a caller may ask for unless configured otherwise.
pub const DEFAULT_MAX_ICON_SIZE: u32 = 500;

/// A `(min, perfect, max)` size preference.
///
/// `0 <= min <= perfect <= max <= max_icon_size` holds for every value
/// produced by the constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeRange {
    /// Smallest acceptable size.
    pub min: u32,
    /// Preferred size.
    pub perfect: u32,
    /// Largest acceptable size.
    pub max: u32,
}

impl SizeRange {
    /// Creates a range after checking ordering and bounds.
    pub fn new(min: u32, perfect: u32, max: u32, max_icon_size: u32) -> Result<Self, IconfinderError> {
        if min <= perfect && perfect <= max && max <= max_icon_size {
            Ok(Self { min, perfect, max })
        } else {
            Err(IconfinderError::bad_size(format!("{min}..{perfect}..{max}")))
        }
    }

    /// A range that prefers `size` and accepts anything up to `max_icon_size`.
    pub fn from_size(size: u32, max_icon_size: u32) -> Result<Self, IconfinderError> {
        Self::new(size, size, max_icon_size, max_icon_size)
    }

    /// Parses `"120"` or `"60..100..200"`.
    pub fn parse(s: &str, max_icon_size: u32) -> Result<Self, IconfinderError> {
        let parts: Vec<&str> = s.splitn(3, "..").collect();
        match parts.as_slice() {
            [size] => Self::from_size(parse_size(size, max_icon_size, s)?, max_icon_size),
            [min, perfect, max] => Self::new(
                parse_size(min, max_icon_size, s)?,
                parse_size(perfect, max_icon_size, s)?,
                parse_size(max, max_icon_size, s)?,
                max_icon_size,
            ),
            _ => Err(IconfinderError::bad_size(s)),
        }
    }

    /// Whether both dimensions lie in `lower..=upper`.
    #[must_use]
    pub const fn fits(width: u32, height: u32, lower: u32, upper: u32) -> bool {
        width >= lower && height >= lower && width <= upper && height <= upper
    }
}

fn parse_size(part: &str, max_icon_size: u32, input: &str) -> Result<u32, IconfinderError> {
    match part.parse::<u32>() {
        Ok(size) if size <= max_icon_size => Ok(size),
        _ => Err(IconfinderError::bad_size(input)),
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}..{}", self.min, self.perfect, self.max)
    }
}
