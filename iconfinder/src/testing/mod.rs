//! Testing utilities for icon discovery.
//!
//! This module provides:
//! - A canned-response [`Fetcher`](crate::fetch::Fetcher)
//! - Generated image bodies and captured HTML pages

pub mod fixtures;
pub mod mocks;

pub use mocks::{StaticFetcher, StaticResponse};
