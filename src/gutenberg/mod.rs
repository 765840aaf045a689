//! Project Gutenberg access: catalog, download and licence stripping.

pub mod catalog;
pub mod clean;
pub mod fetch;

pub use fetch::{BookSource, FetchError, GutenbergFetcher};
