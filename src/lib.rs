//! gutenberg-reader-rs: read Project Gutenberg books aloud.
//!
//! The server fetches and cleans books and looks up vocabulary through
//! Gemini; the CLI reads books aloud through a pluggable speech engine.

pub mod api;
pub mod client;
pub mod config;
pub mod definition;
pub mod error;
pub mod gutenberg;
pub mod history;
pub mod notifier;
pub mod offline;
pub mod reader;
pub mod session;
pub mod words;
