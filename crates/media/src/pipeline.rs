//! Entry point: message id in, manifest out.

use std::sync::Arc;

use {
    scrapbook_channels::MessageSource,
    scrapbook_common::RawMessage,
    scrapbook_config::ScrapbookConfig,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    classify::{HostTable, classify},
    coordinator::Coordinator,
    error::{Error, Result},
    extractors::{Extractor, ExtractorSet},
    http::FetchPool,
    manifest::{Manifest, ManifestOptions, build},
    normalize::normalize,
};

pub struct Pipeline {
    source: Arc<dyn MessageSource>,
    hosts: HostTable,
    coordinator: Coordinator,
    options: ManifestOptions,
}

impl Pipeline {
    /// Wire the production extractor set against a shared fetch pool.
    pub fn from_config(config: &ScrapbookConfig, source: Arc<dyn MessageSource>) -> Result<Self> {
        let pool = FetchPool::shared(&config.extraction.http, &config.extraction.retry)
            .map_err(|e| Error::external("failed to build HTTP client", e))?;
        let extractors: Arc<dyn Extractor> = Arc::new(ExtractorSet::from_config(config, pool));
        Ok(Self::with_extractor(config, source, extractors))
    }

    /// Same wiring with a caller-supplied extractor.
    pub fn with_extractor(
        config: &ScrapbookConfig,
        source: Arc<dyn MessageSource>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            source,
            hosts: HostTable::new(&config.platforms.hosts),
            coordinator: Coordinator::new(extractor, &config.extraction),
            options: ManifestOptions::from_config(config),
        }
    }

    /// Look a message up and build its manifest.
    pub async fn extract(&self, message_id: &str) -> Result<Manifest> {
        let message_id = message_id.trim();
        if message_id.is_empty() {
            return Err(Error::invalid_input("message id must not be empty"));
        }
        let message = self
            .source
            .fetch_message(message_id)
            .await?
            .ok_or_else(|| Error::not_found(message_id))?;
        debug!(message_id, source = self.source.name(), "message loaded");
        Ok(self.extract_message(&message).await)
    }

    /// Build the manifest for a message already in hand. Never fails.
    pub async fn extract_message(&self, message: &RawMessage) -> Manifest {
        self.extract_message_with_cancel(message, CancellationToken::new())
            .await
    }

    pub async fn extract_message_with_cancel(
        &self,
        message: &RawMessage,
        cancel: CancellationToken,
    ) -> Manifest {
        let references = classify(message, &self.hosts);
        let outcomes = self
            .coordinator
            .resolve_with_cancel(references, cancel)
            .await;
        let manifest = build(message, normalize(outcomes), &self.options);
        info!(
            message_id = %manifest.message_id,
            assets = manifest.assets.len(),
            unsupported = manifest.unsupported.len(),
            failed = manifest.failures.len(),
            "manifest built"
        );
        manifest
    }

    /// Host table used for classification.
    #[must_use]
    pub fn hosts(&self) -> &HostTable {
        &self.hosts
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::extractors::UnsupportedExtractor,
        scrapbook_channels::MemorySource,
    };

    fn pipeline(source: MemorySource) -> Pipeline {
        Pipeline::with_extractor(
            &ScrapbookConfig::default(),
            Arc::new(source),
            Arc::new(UnsupportedExtractor),
        )
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let err = pipeline(MemorySource::new()).extract("404").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref message_id } if message_id == "404"));
    }

    #[tokio::test]
    async fn blank_id_is_invalid() {
        let err = pipeline(MemorySource::new()).extract("  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn found_message_builds_manifest() {
        let source = MemorySource::from_messages([RawMessage::new(
            "1",
            "# Clips\nhttps://www.tiktok.com/@u/video/1",
        )]);
        let manifest = pipeline(source).extract("1").await.unwrap();
        assert_eq!(manifest.message_id, "1");
        assert_eq!(manifest.title, "Clips");
        assert_eq!(manifest.unsupported.len(), 1);
    }

    #[tokio::test]
    async fn production_wiring_builds() {
        let pipeline =
            Pipeline::from_config(&ScrapbookConfig::default(), Arc::new(MemorySource::new()))
                .unwrap();
        assert_eq!(
            pipeline.hosts().platform_for_str("https://youtu.be/x"),
            scrapbook_common::Platform::YouTube
        );
    }
}
