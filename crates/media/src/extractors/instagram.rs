//! Instagram posts and reels through OpenGraph mirror services.
//!
//! The official embed endpoint is login-walled, so every strategy here is a
//! mirror that re-serves the post's `og:*` tags.

use std::sync::Arc;

use {
    async_trait::async_trait,
    scrapbook_common::Platform,
    scrapbook_config::InstagramConfig,
    tokio::time::Instant,
    tracing::debug,
    url::Url,
};

use crate::{
    error::FetchError,
    extractors::{Extractor, Strategy, StrategyChain, outcome_from},
    html::PageMeta,
    http::FetchPool,
    text::normalize_title,
    types::{ExtractionOutcome, RawAsset, Reference},
};

/// Overlay marker carried in the title of a reel's thumbnail.
pub const VIDEO_MARKER: &str = "video";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Photo,
    Reel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub shortcode: String,
    pub kind: PostKind,
}

impl Post {
    /// Parse a post URL on instagram.com or any mirror host.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let url = Url::parse(url.trim()).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        // `/p/<code>` or `/<user>/p/<code>`
        segments.windows(2).find_map(|pair| {
            let kind = match pair[0] {
                "p" => PostKind::Photo,
                "reel" | "reels" | "tv" => PostKind::Reel,
                _ => return None,
            };
            is_shortcode(pair[1]).then(|| Self {
                shortcode: pair[1].to_string(),
                kind,
            })
        })
    }

    fn path(&self) -> String {
        match self.kind {
            PostKind::Photo => format!("p/{}/", self.shortcode),
            PostKind::Reel => format!("reel/{}/", self.shortcode),
        }
    }

    /// The post on instagram.com itself.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        format!("https://www.instagram.com/{}", self.path())
    }
}

fn is_shortcode(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Drop the ` on Instagram: "caption"` tail mirrors copy from Instagram.
fn clean_title(title: &str) -> Option<String> {
    let lower = title.to_ascii_lowercase();
    let head = match lower.find(" on instagram") {
        Some(at) => &title[..at],
        None => title,
    };
    normalize_title(head)
}

struct MirrorStrategy {
    base: String,
    pool: Arc<FetchPool>,
}

#[async_trait]
impl Strategy<Post> for MirrorStrategy {
    fn name(&self) -> &str {
        &self.base
    }

    async fn attempt(&self, post: &Post, deadline: Instant) -> Result<Vec<RawAsset>, FetchError> {
        let url = format!("{}/{}", self.base, post.path());
        let response = self.pool.get(Platform::Instagram, &url, deadline).await?;
        let meta = PageMeta::parse(&response.body);
        let image = meta
            .image(&response.url)
            .ok_or_else(|| FetchError::malformed(format!("no og:image at {url}")))?;

        let asset = match post.kind {
            PostKind::Photo => {
                let title = meta
                    .title()
                    .and_then(clean_title)
                    .unwrap_or_else(|| format!("Instagram Post {}", post.shortcode));
                RawAsset::image(image).with_title(Some(title))
            },
            PostKind::Reel => RawAsset::thumbnail(image).with_title(Some(VIDEO_MARKER)),
        };
        Ok(vec![asset])
    }
}

pub struct InstagramExtractor {
    chain: StrategyChain<Post>,
}

impl InstagramExtractor {
    pub fn from_config(config: &InstagramConfig, pool: Arc<FetchPool>) -> Self {
        let chain = config
            .mirrors
            .iter()
            .map(|base| base.trim().trim_end_matches('/'))
            .filter(|base| !base.is_empty())
            .fold(StrategyChain::new(), |chain, base| {
                chain.with(MirrorStrategy {
                    base: base.to_string(),
                    pool: Arc::clone(&pool),
                })
            });
        Self { chain }
    }

    /// Mirror bases in the order they are tried.
    pub fn mirrors(&self) -> Vec<&str> {
        self.chain.names()
    }
}

#[async_trait]
impl Extractor for InstagramExtractor {
    fn name(&self) -> &'static str {
        "instagram"
    }

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome {
        let Some(post) = Post::parse(&reference.source_url) else {
            return ExtractionOutcome::unsupported(reference.clone());
        };
        debug!(shortcode = %post.shortcode, canonical = %post.canonical_url(), "resolving instagram post");
        outcome_from(reference, self.chain.run(&post, deadline).await)
    }
}
