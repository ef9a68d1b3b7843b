//! Fetching pages and icons.
//!
//! This module provides:
//! - The [`Fetcher`] abstraction and a `reqwest` implementation
//! - Size-capped body reading
//! - The concurrent fetch-and-decode pipeline

pub mod client;
pub mod config;
pub mod pipeline;

#[cfg(feature = "http")]
pub use client::ReqwestFetcher;
pub use client::{read_body_limited, BodyStream, FetchResponse, Fetcher};
pub use config::{FetchConfig, FinderConfig};
pub use pipeline::{fetch_all_icons, fetch_body, fetch_icon, icon_from_body, FetchContext, Page, SVG_SIZE};
