//! Platform extractors.
//!
//! Every platform resolves references through the same [`Extractor`]
//! contract. Platforms with several metadata sources express them as an
//! ordered [`StrategyChain`]; [`ExtractorSet`] routes each reference to the
//! right extractor with a table lookup on [`Platform`].

pub mod generic;
pub mod instagram;
pub mod native;
pub mod twitter;
pub mod unsupported;
pub mod youtube;

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    scrapbook_common::Platform,
    scrapbook_config::ScrapbookConfig,
    tokio::time::Instant,
    tracing::{debug, warn},
};

use crate::{
    error::FetchError,
    http::FetchPool,
    types::{ExtractionOutcome, RawAsset, Reference},
};

pub use {
    generic::GenericExtractor, instagram::InstagramExtractor, native::NativeExtractor,
    twitter::TwitterExtractor, unsupported::UnsupportedExtractor, youtube::YouTubeExtractor,
};

/// Resolves one reference into an outcome. Never fails: errors are
/// reported as `Failed` outcomes.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome;
}

/// One way of getting assets for a target (a tweet id, a post shortcode).
#[async_trait]
pub trait Strategy<T: Sync + ?Sized>: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, target: &T, deadline: Instant) -> Result<Vec<RawAsset>, FetchError>;
}

/// Strategies tried in order until one succeeds.
pub struct StrategyChain<T: Sync + ?Sized> {
    strategies: Vec<Box<dyn Strategy<T>>>,
}

impl<T: Sync + ?Sized> Default for StrategyChain<T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<T: Sync + ?Sized> StrategyChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Names in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order. Returns the first success, or the last
    /// error when all fail.
    pub async fn run(&self, target: &T, deadline: Instant) -> Result<Vec<RawAsset>, FetchError> {
        let mut last_err = FetchError::incomplete("no strategies configured");
        for strategy in &self.strategies {
            if Instant::now() >= deadline {
                return Err(FetchError::Timeout);
            }
            match strategy.attempt(target, deadline).await {
                Ok(assets) => {
                    debug!(strategy = strategy.name(), assets = assets.len(), "strategy succeeded");
                    return Ok(assets);
                },
                Err(err) => {
                    debug!(strategy = strategy.name(), error = %err, "strategy failed, trying next");
                    last_err = err;
                },
            }
        }
        Err(last_err)
    }
}

/// Closed table from platform to extractor.
pub struct ExtractorSet {
    native: Arc<dyn Extractor>,
    by_platform: HashMap<Platform, Arc<dyn Extractor>>,
    fallback: Arc<dyn Extractor>,
}

impl ExtractorSet {
    /// Start from `fallback` for every platform; override with
    /// [`ExtractorSet::with`].
    pub fn new(native: Arc<dyn Extractor>, fallback: Arc<dyn Extractor>) -> Self {
        Self {
            native,
            by_platform: HashMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with(mut self, platform: Platform, extractor: Arc<dyn Extractor>) -> Self {
        self.by_platform.insert(platform, extractor);
        self
    }

    /// The production table.
    pub fn from_config(config: &ScrapbookConfig, pool: Arc<FetchPool>) -> Self {
        let platforms = &config.platforms;
        let generic: Arc<dyn Extractor> = Arc::new(GenericExtractor::new(Arc::clone(&pool)));
        let twitter: Arc<dyn Extractor> =
            Arc::new(TwitterExtractor::from_config(&platforms.twitter, Arc::clone(&pool)));
        let unsupported: Arc<dyn Extractor> = Arc::new(UnsupportedExtractor);

        Self::new(Arc::new(NativeExtractor), Arc::clone(&generic))
            .with(
                Platform::Instagram,
                Arc::new(InstagramExtractor::from_config(&platforms.instagram, pool)),
            )
            .with(Platform::Twitter, Arc::clone(&twitter))
            .with(Platform::FxTwitter, Arc::clone(&twitter))
            .with(Platform::VxTwitter, twitter)
            .with(
                Platform::YouTube,
                Arc::new(YouTubeExtractor::new(
                    &platforms.youtube.thumbnail_quality,
                    Arc::clone(&generic),
                )),
            )
            .with(Platform::TikTok, Arc::clone(&unsupported))
            .with(Platform::Reddit, unsupported)
            .with(Platform::Generic, Arc::clone(&generic))
            .with(Platform::Unknown, generic)
    }

    /// Extractor a reference is routed to.
    #[must_use]
    pub fn route(&self, reference: &Reference) -> &Arc<dyn Extractor> {
        // Platforms with a deliberate gap never resolve, even from embedded media.
        let gap = matches!(reference.platform, Platform::TikTok | Platform::Reddit);
        if !gap && reference.resolves_natively() {
            return &self.native;
        }
        self.by_platform
            .get(&reference.platform)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl Extractor for ExtractorSet {
    fn name(&self) -> &'static str {
        "extractor-set"
    }

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome {
        let extractor = self.route(reference);
        debug!(
            url = %reference.source_url,
            platform = %reference.platform,
            extractor = extractor.name(),
            "resolving reference"
        );
        let outcome = extractor.resolve(reference, deadline).await;
        if let Some(reason) = outcome.error_kind {
            warn!(url = %reference.source_url, extractor = extractor.name(), %reason, "reference failed");
        }
        outcome
    }
}

/// Map a chain result onto an outcome.
pub(crate) fn outcome_from(
    reference: &Reference,
    result: Result<Vec<RawAsset>, FetchError>,
) -> ExtractionOutcome {
    match result {
        Ok(assets) => ExtractionOutcome::resolved(reference.clone(), assets),
        Err(err) => ExtractionOutcome::failed(reference.clone(), err.reason()),
    }
}
