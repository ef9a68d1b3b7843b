//! Error types for icon discovery.
//!
//! Errors come in two tiers. [`IconfinderError`] is returned from a whole
//! discovery call and only covers structural failures. [`FetchError`] is
//! recorded per candidate and never aborts sibling candidates.

use thiserror::Error;

/// The main error type for discovery operations.
#[derive(Debug, Error)]
pub enum IconfinderError {
    /// The site URL could not be turned into a usable base URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The fetched page could not be treated as an HTML document.
    #[error("could not parse html")]
    UnparsableDocument,

    /// A size range was malformed or violated `min <= perfect <= max`.
    #[error("bad size: {0}")]
    BadSize(String),

    /// A format name was not recognised.
    #[error("unknown icon format: {0}")]
    UnknownFormat(String),

    /// Discovery finished without a single usable icon.
    #[error("no icons found for site")]
    NoIconsFound,

    /// The engine could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cached discovery result carried an error.
    #[error("cached error: {0}")]
    Cached(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IconfinderError {
    /// Creates a bad size error.
    #[must_use]
    pub fn bad_size(input: impl Into<String>) -> Self {
        Self::BadSize(input.into())
    }

    /// Creates an invalid url error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl(url.into())
    }
}

/// Per-candidate failure recorded by the fetch-and-decode pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The candidate URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a status outside `200..300`.
    #[error("unexpected status: {0}")]
    Status(u16),

    /// The server answered with an empty body.
    #[error("empty response")]
    EmptyBody,

    /// The body reached the configured size cap.
    #[error("body too large (limit {limit} bytes)")]
    BodyTooLarge {
        /// The cap in bytes.
        limit: usize,
    },

    /// Reading the body failed midway.
    #[error("failed to read body: {0}")]
    Body(String),

    /// The body is not a decodable image.
    #[error("unknown image format: {0}")]
    Decode(#[from] DecodeError),

    /// The fetch was abandoned because the discovery was cancelled.
    #[error("fetch cancelled: {0}")]
    Cancelled(String),

    /// The task running the fetch panicked or was aborted.
    #[error("fetch task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by the image decode registry.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No registered format matches the leading bytes.
    #[error("no registered format matches the data")]
    UnknownFormat,

    /// The data looked like an icon container but could not be read.
    #[error(transparent)]
    Ico(#[from] IcoError),

    /// The image codec rejected the data.
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Errors raised by the ICO container codec.
#[derive(Debug, Error)]
pub enum IcoError {
    /// The header or directory was truncated or unreadable.
    #[error("malformed icon container: {0}")]
    MalformedContainer(#[from] std::io::Error),

    /// The directory is empty.
    #[error("ico file does not contain any icons")]
    NoImages,

    /// The best entry points outside the file.
    #[error("icon payload {offset}..{end} exceeds file length {len}")]
    PayloadOutOfBounds {
        /// Start of the payload.
        offset: usize,
        /// End of the payload.
        end: usize,
        /// Length of the container.
        len: usize,
    },

    /// The embedded bitmap or PNG could not be decoded.
    #[error("failed to decode embedded image: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_messages() {
        assert_eq!(IconfinderError::UnparsableDocument.to_string(), "could not parse html");
        assert_eq!(IconfinderError::NoIconsFound.to_string(), "no icons found for site");
        assert_eq!(
            IconfinderError::bad_size("16..120..80").to_string(),
            "bad size: 16..120..80"
        );
    }

    #[test]
    fn test_fetch_error_from_decode() {
        let err: FetchError = DecodeError::UnknownFormat.into();
        assert!(matches!(err, FetchError::Decode(DecodeError::UnknownFormat)));
        assert!(err.to_string().starts_with("unknown image format"));
    }

    #[test]
    fn test_ico_error_wraps_short_read() {
        let err: IcoError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        match err {
            IcoError::MalformedContainer(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
