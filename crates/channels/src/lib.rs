//! Message sources.
//!
//! A chat connector implements [`MessageSource`] so the media pipeline can
//! look up the message a command was invoked on. The connector owns the
//! network session; the pipeline only ever reads messages.

pub mod error;
pub mod source;
pub mod store;

pub use {
    error::{Error, Result},
    source::{MemorySource, MessageSource},
    store::JsonFileSource,
};
