//! X/Twitter: syndication API first, then the fxtwitter and vxtwitter
//! mirror APIs.

use std::sync::{Arc, LazyLock};

use {
    async_trait::async_trait,
    regex::Regex,
    scrapbook_common::Platform,
    scrapbook_config::TwitterConfig,
    serde::Deserialize,
    tokio::time::Instant,
    url::Url,
};

use crate::{
    error::FetchError,
    extractors::{Extractor, Strategy, StrategyChain, outcome_from},
    http::FetchPool,
    text::{normalize_title, strip_urls},
    types::{ExtractionOutcome, RawAsset, Reference},
};

static STATUS_ID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"/status(?:es)?/(\d+)").expect("static regex")
});

const VIDEO_URL_PATTERNS: &[&str] = &[
    "video.twimg.com",
    "/amplify_video/",
    "/ext_tw_video/",
    "/tweet_video/",
];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".avi", ".mkv", ".m4v", ".gif"];

/// A tweet to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    pub id: String,
    /// The link as posted; used for text-only tweets.
    pub url: String,
}

/// Status id from a tweet URL on any host of the family.
#[must_use]
pub fn status_id(url: &str) -> Option<String> {
    let path = Url::parse(url.trim()).ok()?.path().to_string();
    STATUS_ID.captures(&path).map(|c| c[1].to_string())
}

/// Whether a twimg URL points at a video rather than an image.
#[must_use]
pub fn is_video_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if VIDEO_URL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_twimg_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|h| h == "twimg.com" || h.ends_with(".twimg.com"))
}

/// Token the syndication endpoint expects: `(id / 1e15) * PI` in base 36
/// with zeros and the point removed.
#[must_use]
pub fn syndication_token(id: &str) -> String {
    let Ok(id) = id.parse::<u64>() else {
        return String::new();
    };
    let value = (id as f64 / 1e15) * std::f64::consts::PI;
    to_base36(value)
        .chars()
        .filter(|c| *c != '0' && *c != '.')
        .collect()
}

fn to_base36(value: f64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut int = value.trunc() as u64;
    let mut frac = value.fract();

    let mut int_digits = Vec::new();
    loop {
        int_digits.push(DIGITS[(int % 36) as usize]);
        int /= 36;
        if int == 0 {
            break;
        }
    }
    int_digits.reverse();

    let mut out = String::from_utf8_lossy(&int_digits).into_owned();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..11 {
            frac *= 36.0;
            let digit = frac.trunc() as usize;
            out.push(DIGITS[digit.min(35)] as char);
            frac = frac.fract();
            if frac == 0.0 {
                break;
            }
        }
    }
    out
}

enum Media {
    Photo(String),
    Video { url: String, poster: Option<String> },
}

/// Assets for one tweet. A tweet without media becomes a link preview of
/// itself titled with its text; a tweet with neither is incomplete.
fn tweet_assets(tweet: &Tweet, text: &str, media: Vec<Media>) -> Result<Vec<RawAsset>, FetchError> {
    let title = normalize_title(&strip_urls(text));
    if media.is_empty() {
        return match title {
            Some(title) => Ok(vec![RawAsset::link_preview(tweet.url.clone()).with_title(Some(title))]),
            None => Err(FetchError::incomplete(format!("tweet {} has no content", tweet.id))),
        };
    }
    Ok(media
        .into_iter()
        .map(|m| match m {
            Media::Photo(url) => RawAsset::image(url).with_title(title.clone()),
            Media::Video { url, poster } => RawAsset::video(url)
                .with_poster(poster)
                .with_title(title.clone()),
        })
        .collect())
}

// Syndication

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SyndicationTweet {
    text: String,
    #[serde(rename = "mediaDetails")]
    media_details: Vec<SyndicationMedia>,
}

#[derive(Debug, Deserialize)]
struct SyndicationMedia {
    #[serde(rename = "type")]
    kind: String,
    media_url_https: Option<String>,
    video_info: Option<VideoInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoInfo {
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    content_type: Option<String>,
    bitrate: Option<u64>,
    url: String,
}

fn best_mp4(variants: &[Variant]) -> Option<&str> {
    variants
        .iter()
        .filter(|v| v.content_type.as_deref() == Some("video/mp4"))
        .max_by_key(|v| v.bitrate.unwrap_or(0))
        .map(|v| v.url.as_str())
}

struct SyndicationStrategy {
    base: String,
    pool: Arc<FetchPool>,
}

#[async_trait]
impl Strategy<Tweet> for SyndicationStrategy {
    fn name(&self) -> &str {
        "syndication"
    }

    async fn attempt(&self, tweet: &Tweet, deadline: Instant) -> Result<Vec<RawAsset>, FetchError> {
        let url = format!(
            "{}/tweet-result?id={}&token={}&lang=en",
            self.base,
            tweet.id,
            syndication_token(&tweet.id)
        );
        let body: SyndicationTweet = self.pool.get_json(Platform::Twitter, &url, deadline).await?;

        let mut media = Vec::with_capacity(body.media_details.len());
        for item in body.media_details {
            match item.kind.as_str() {
                "photo" => {
                    if let Some(url) = item.media_url_https {
                        media.push(Media::Photo(url));
                    }
                },
                "video" | "animated_gif" => {
                    let variants = item.video_info.map(|v| v.variants).unwrap_or_default();
                    let url = best_mp4(&variants).ok_or_else(|| {
                        FetchError::incomplete(format!("tweet {} video has no mp4 variant", tweet.id))
                    })?;
                    media.push(Media::Video {
                        url: url.to_string(),
                        poster: item.media_url_https,
                    });
                },
                _ => {},
            }
        }
        tweet_assets(tweet, &body.text, media)
    }
}

// FxTwitter

#[derive(Debug, Deserialize)]
struct FxResponse {
    tweet: Option<FxTweet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FxTweet {
    text: String,
    media: Option<FxMediaSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FxMediaSet {
    all: Vec<FxMedia>,
    photos: Vec<FxMedia>,
    videos: Vec<FxMedia>,
}

#[derive(Debug, Deserialize)]
struct FxMedia {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: String,
    thumbnail_url: Option<String>,
}

struct FxTwitterStrategy {
    base: String,
    pool: Arc<FetchPool>,
}

#[async_trait]
impl Strategy<Tweet> for FxTwitterStrategy {
    fn name(&self) -> &str {
        "fxtwitter"
    }

    async fn attempt(&self, tweet: &Tweet, deadline: Instant) -> Result<Vec<RawAsset>, FetchError> {
        let url = format!("{}/status/{}", self.base, tweet.id);
        let body: FxResponse = self.pool.get_json(Platform::FxTwitter, &url, deadline).await?;
        let fx = body
            .tweet
            .ok_or_else(|| FetchError::malformed("fxtwitter response without tweet"))?;

        let set = fx.media.unwrap_or_default();
        let items = if set.all.is_empty() {
            let photos = set.photos.into_iter().map(|m| (Some("photo".to_string()), m));
            let videos = set.videos.into_iter().map(|m| (Some("video".to_string()), m));
            photos.chain(videos).collect::<Vec<_>>()
        } else {
            set.all.into_iter().map(|m| (m.kind.clone(), m)).collect()
        };

        let media = items
            .into_iter()
            .filter_map(|(kind, m)| match kind.as_deref() {
                Some("photo") => Some(Media::Photo(m.url)),
                Some("video" | "gif") => Some(Media::Video {
                    url: m.url,
                    poster: m.thumbnail_url,
                }),
                _ => None,
            })
            .collect();
        tweet_assets(tweet, &fx.text, media)
    }
}

// VxTwitter

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VxTweet {
    text: String,
    media_extended: Vec<VxMedia>,
}

#[derive(Debug, Deserialize)]
struct VxMedia {
    #[serde(rename = "type")]
    kind: String,
    url: String,
    thumbnail_url: Option<String>,
}

struct VxTwitterStrategy {
    base: String,
    pool: Arc<FetchPool>,
}

#[async_trait]
impl Strategy<Tweet> for VxTwitterStrategy {
    fn name(&self) -> &str {
        "vxtwitter"
    }

    async fn attempt(&self, tweet: &Tweet, deadline: Instant) -> Result<Vec<RawAsset>, FetchError> {
        let url = format!("{}/Twitter/status/{}", self.base, tweet.id);
        let body: VxTweet = self.pool.get_json(Platform::VxTwitter, &url, deadline).await?;
        let media = body
            .media_extended
            .into_iter()
            .filter_map(|m| match m.kind.as_str() {
                "image" => Some(Media::Photo(m.url)),
                "video" | "gif" => Some(Media::Video {
                    url: m.url,
                    poster: m.thumbnail_url,
                }),
                _ => None,
            })
            .collect();
        tweet_assets(tweet, &body.text, media)
    }
}

pub struct TwitterExtractor {
    chain: StrategyChain<Tweet>,
}

impl TwitterExtractor {
    pub fn from_config(config: &TwitterConfig, pool: Arc<FetchPool>) -> Self {
        let base = |s: &str| s.trim().trim_end_matches('/').to_string();
        let chain = StrategyChain::new()
            .with(SyndicationStrategy {
                base: base(&config.syndication_base),
                pool: Arc::clone(&pool),
            })
            .with(FxTwitterStrategy {
                base: base(&config.fxtwitter_base),
                pool: Arc::clone(&pool),
            })
            .with(VxTwitterStrategy {
                base: base(&config.vxtwitter_base),
                pool,
            });
        Self { chain }
    }

    pub fn strategies(&self) -> Vec<&str> {
        self.chain.names()
    }
}

#[async_trait]
impl Extractor for TwitterExtractor {
    fn name(&self) -> &'static str {
        "twitter"
    }

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome {
        let source = reference.source_url.trim();
        if let Ok(url) = Url::parse(source)
            && is_twimg_host(&url)
        {
            let asset = if is_video_url(source) {
                RawAsset::video(source)
            } else {
                RawAsset::image(source)
            };
            return ExtractionOutcome::resolved(reference.clone(), vec![asset]);
        }

        let Some(id) = status_id(source) else {
            return ExtractionOutcome::unsupported(reference.clone());
        };
        let tweet = Tweet {
            id,
            url: source.to_string(),
        };
        outcome_from(reference, self.chain.run(&tweet, deadline).await)
    }
}
