//! Shared types, error definitions, and utilities used across all scrapbook crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage},
    types::{NativeAttachment, NativeEmbed, Platform, RawMessage},
};
