/// Config schema types (bot, site, extraction, platforms).
use {
    scrapbook_common::Platform,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapbookConfig {
    pub bot: BotConfig,
    pub site: SiteConfig,
    pub extraction: ExtractionConfig,
    pub platforms: PlatformsConfig,
}

/// Chat connector credentials. Consumed by the surrounding bot shell; the
/// pipeline itself never reads them.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot authentication token.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
    /// Server (guild) the bot registers its commands in.
    pub guild_id: Option<String>,
    /// Role allowed to run destructive commands.
    pub admin_role_id: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("guild_id", &self.guild_id)
            .field("admin_role_id", &self.admin_role_id)
            .finish()
    }
}

/// The website that renders archived manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL used to build links to hosted archive pages, e.g.
    /// `https://archive.example.org`.
    pub base_url: Option<String>,
}

impl SiteConfig {
    /// Link to the hosted page for a message, when a base URL is configured.
    #[must_use]
    pub fn archive_url(&self, message_id: &str) -> Option<String> {
        let base = self.base_url.as_deref()?.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(format!("{base}/archive/{message_id}"))
    }
}

/// Resolution coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum number of references resolving at once.
    pub max_in_flight: usize,
    /// Deadline for a single reference, fallbacks and retries included.
    pub reference_timeout_ms: u64,
    /// Deadline for a whole message; pending references are cancelled.
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub http: HttpConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            reference_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Retry policy for transient network failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// First backoff delay; doubled on every retry.
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff delay.
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 250,
            backoff_max_ms: 4_000,
        }
    }
}

/// Outbound HTTP settings shared by every extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Timeout for one HTTP request.
    pub request_timeout_secs: u64,
    /// Maximum number of HTTP redirects to follow.
    pub max_redirects: u8,
    /// Response bodies are truncated to this many bytes.
    pub max_body_bytes: usize,
    /// Refuse to connect to loopback, private and link-local addresses.
    pub block_private_hosts: bool,
    /// Global cap on concurrent outbound requests.
    pub max_connections: usize,
    /// Cap on concurrent outbound requests for a single platform.
    pub per_platform_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) scrapbook/0.3"
                .into(),
            request_timeout_secs: 10,
            max_redirects: 3,
            max_body_bytes: 1024 * 1024,
            block_private_hosts: true,
            max_connections: 16,
            per_platform_limit: 4,
        }
    }
}

/// Host matching rule for the reference classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRule {
    pub platform: Platform,
    /// Bare host names; subdomains match too.
    pub hosts: Vec<String>,
}

impl HostRule {
    pub fn new(platform: Platform, hosts: &[&str]) -> Self {
        Self {
            platform,
            hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

/// Per-platform endpoints and the classifier host table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Ordered host table; the first matching rule wins.
    pub hosts: Vec<HostRule>,
    pub twitter: TwitterConfig,
    pub instagram: InstagramConfig,
    pub youtube: YouTubeConfig,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            hosts: default_host_rules(),
            twitter: TwitterConfig::default(),
            instagram: InstagramConfig::default(),
            youtube: YouTubeConfig::default(),
        }
    }
}

/// Built-in host table. Mirrors come before the platform they mirror.
#[must_use]
pub fn default_host_rules() -> Vec<HostRule> {
    vec![
        HostRule::new(Platform::FxTwitter, &["fxtwitter.com", "fixupx.com"]),
        HostRule::new(Platform::VxTwitter, &["vxtwitter.com", "fixvx.com"]),
        HostRule::new(Platform::Twitter, &["twitter.com", "x.com", "twimg.com"]),
        HostRule::new(Platform::Instagram, &[
            "instagram.com",
            "kkinstagram.com",
            "ddinstagram.com",
        ]),
        HostRule::new(Platform::TikTok, &["tiktok.com"]),
        HostRule::new(Platform::Reddit, &["reddit.com", "redd.it"]),
        HostRule::new(Platform::YouTube, &[
            "youtube.com",
            "youtu.be",
            "youtube-nocookie.com",
        ]),
    ]
}

/// X/Twitter metadata services, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Twitter's own embed syndication API.
    pub syndication_base: String,
    pub fxtwitter_base: String,
    pub vxtwitter_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            syndication_base: "https://cdn.syndication.twimg.com".into(),
            fxtwitter_base: "https://api.fxtwitter.com".into(),
            vxtwitter_base: "https://api.vxtwitter.com".into(),
        }
    }
}

/// Instagram mirror services serving OpenGraph metadata, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub mirrors: Vec<String>,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            mirrors: vec![
                "https://www.kkinstagram.com".into(),
                "https://www.ddinstagram.com".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Thumbnail variant: `default`, `mqdefault`, `hqdefault`, `sddefault`
    /// or `maxresdefault`.
    pub thumbnail_quality: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            thumbnail_quality: "hqdefault".into(),
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
