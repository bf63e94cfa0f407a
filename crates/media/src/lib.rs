//! Media resolution pipeline: classify message references, resolve them
//! through platform extractors, normalize and dedup the assets, and build a
//! manifest.

pub mod classify;
pub mod coordinator;
pub mod error;
pub mod extractors;
pub mod html;
pub mod http;
pub mod manifest;
pub mod normalize;
pub mod pipeline;
pub mod text;
pub mod types;

pub use {
    classify::{HostTable, classify},
    coordinator::Coordinator,
    error::{Error, FetchError, Result},
    extractors::{Extractor, ExtractorSet},
    http::FetchPool,
    manifest::{Manifest, ManifestOptions, build},
    normalize::{FailureEntry, Normalized, UnsupportedEntry, normalize},
    pipeline::Pipeline,
    types::{
        AssetKind, AssetOrder, ExtractionOutcome, FailureReason, MediaAsset, NativeMedia,
        OutcomeStatus, RawAsset, Reference, ReferenceKind,
    },
};
