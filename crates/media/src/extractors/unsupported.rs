//! Platforms that are recognized but deliberately not resolved.

use {async_trait::async_trait, tokio::time::Instant};

use crate::{
    extractors::Extractor,
    types::{ExtractionOutcome, Reference},
};

/// Declared capability gap (TikTok, Reddit). Never touches the network.
pub struct UnsupportedExtractor;

#[async_trait]
impl Extractor for UnsupportedExtractor {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    async fn resolve(&self, reference: &Reference, _deadline: Instant) -> ExtractionOutcome {
        ExtractionOutcome::unsupported(reference.clone())
    }
}
