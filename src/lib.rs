//! Scrapes the collateral adjectives table from Wikipedia's "List of animal names",
//! caches one image per animal and renders an HTML summary.
//!
//! The interesting part is [`process::Coordinator`]: it fans image fetches out over a
//! bounded number of tasks, skips animals whose image is already cached and records
//! per-animal failures instead of aborting the batch.

pub mod cache;
pub mod config;
mod error;
pub mod fetch;
pub mod logging;
mod macros;
pub mod model;
pub mod parse;
pub mod process;
pub mod render;
pub mod request;
pub mod resolve;

pub use error::{Error, FailureKind, FetchError, Result};

/// The article holding the collateral adjectives table.
pub const WIKI_URL: &str = "https://en.wikipedia.org/wiki/List_of_animal_names";
pub const IMAGE_DIR: &str = "tmp";
pub const OUTPUT_PATH: &str = "output.html";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Bodies shorter than this are not treated as images.
const MIN_IMAGE_BYTES: usize = 32;
/// Downloads are cut off past this size.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
const USER_AGENT: &str = concat!("animal-scrap/", env!("CARGO_PKG_VERSION"));
