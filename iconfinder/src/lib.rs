//! # Iconfinder
//!
//! Discovers, fetches and ranks the icons of a web site.
//!
//! Given a site URL the engine:
//!
//! - **Fetches the page** and collects `icon` / `apple-touch-icon` links,
//!   falling back to well-known paths when the page is unavailable
//! - **Fetches every candidate concurrently** and sizes it by sniffing the
//!   body (PNG, GIF, JPEG, BMP, WebP, ICO and SVG)
//! - **Ranks the results** and picks the icon that best fits a size range
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iconfinder::prelude::*;
//!
//! let engine = Besticon::new()?;
//! let mut finder = engine.new_icon_finder();
//! finder.fetch_icons("daringfireball.net").await?;
//!
//! let range = engine.parse_size_range("32..64..128")?;
//! if let Some(icon) = finder.icon_in_size_range(range) {
//!     println!("{} ({}x{})", icon.url, icon.width, icon.height);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod cancellation;
pub mod charset;
pub mod decode;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod finder;
pub mod ico;
pub mod models;
pub mod observer;
pub mod select;
pub mod size_range;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{cache_key, CachedResult, IconCache, MemoryIconCache};
    pub use crate::cancellation::CancellationToken;
    pub use crate::decode::{FormatRegistry, ImageConfig, ImageFormatSpec};
    pub use crate::errors::{DecodeError, FetchError, IcoError, IconfinderError};
    pub use crate::extract::{default_icon_urls, find_icon_links};
    #[cfg(feature = "http")]
    pub use crate::fetch::ReqwestFetcher;
    pub use crate::fetch::{FetchConfig, FetchResponse, Fetcher, FinderConfig};
    pub use crate::finder::{Besticon, BesticonBuilder, IconFinder};
    pub use crate::models::{Discovery, FailedCandidate, Icon, IconFormat, IconOutcome};
    pub use crate::observer::{
        init_tracing, FetchObserver, LoggingFetchObserver, NoOpFetchObserver,
    };
    pub use crate::select::{best_icon, icon_in_size_range, DEFAULT_FORMATS};
    pub use crate::size_range::{SizeRange, DEFAULT_MAX_ICON_SIZE};
}
