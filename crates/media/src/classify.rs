//! Reference classifier: finds attachments, embeds and inline links in a
//! message and tags each with its source platform.

use std::{collections::HashSet, sync::LazyLock};

use {
    regex::Regex,
    scrapbook_common::{Platform, RawMessage},
    scrapbook_config::{HostRule, schema::default_host_rules},
    url::Url,
};

use crate::types::{NativeMedia, Reference, ReferenceKind};

static INLINE_URL: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[A-Za-z][A-Za-z0-9+.-]*://[^\s<>]+").expect("static regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ']', '}', '>', '\'', '"'];

/// Ordered host-to-platform rules. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTable {
    rules: Vec<(Platform, Vec<String>)>,
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new(&default_host_rules())
    }
}

impl HostTable {
    #[must_use]
    pub fn new(rules: &[HostRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| {
                let hosts = rule
                    .hosts
                    .iter()
                    .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect();
                (rule.platform, hosts)
            })
            .collect();
        Self { rules }
    }

    /// Platform for a host name. A rule host matches itself and any
    /// subdomain, on a label boundary.
    #[must_use]
    pub fn lookup(&self, host: &str) -> Option<Platform> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.rules
            .iter()
            .find(|(_, hosts)| hosts.iter().any(|h| host_matches(&host, h)))
            .map(|(platform, _)| *platform)
    }

    /// Platform for a full URL: a host rule, else `Generic` for http(s),
    /// else `Unknown`.
    #[must_use]
    pub fn platform_for(&self, url: &Url) -> Platform {
        if let Some(platform) = url.host_str().and_then(|h| self.lookup(h)) {
            return platform;
        }
        match url.scheme() {
            "http" | "https" => Platform::Generic,
            _ => Platform::Unknown,
        }
    }

    #[must_use]
    pub fn platform_for_str(&self, url: &str) -> Platform {
        Url::parse(url)
            .map(|u| self.platform_for(&u))
            .unwrap_or(Platform::Unknown)
    }
}

fn host_matches(host: &str, rule: &str) -> bool {
    host == rule
        || host
            .strip_suffix(rule)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Classify every reference in a message.
///
/// Attachments come first, then embeds, then inline links in text order.
/// Pure and total: malformed links are skipped, unknown schemes become
/// `Unknown` references.
#[must_use]
pub fn classify(message: &RawMessage, hosts: &HostTable) -> Vec<Reference> {
    let mut refs = Vec::new();

    for attachment in &message.attachments {
        if attachment.url.trim().is_empty() {
            continue;
        }
        refs.push(Reference {
            kind: ReferenceKind::NativeAttachment,
            platform: Platform::Generic,
            source_url: attachment.url.trim().to_string(),
            original_index: refs.len(),
            native: Some(NativeMedia::Attachment(attachment.clone())),
        });
    }

    for embed in &message.embeds {
        let source_url = [
            &embed.url,
            &embed.image_url,
            &embed.video_url,
            &embed.thumbnail_url,
        ]
        .into_iter()
        .flatten()
        .map(|u| u.trim())
        .find(|u| !u.is_empty());
        let Some(source_url) = source_url else {
            continue;
        };
        let platform = Url::parse(source_url)
            .ok()
            .and_then(|u| u.host_str().and_then(|h| hosts.lookup(h)))
            .unwrap_or(Platform::Generic);
        refs.push(Reference {
            kind: ReferenceKind::NativeEmbed,
            platform,
            source_url: source_url.to_string(),
            original_index: refs.len(),
            native: Some(NativeMedia::Embed(embed.clone())),
        });
    }

    let mut seen = HashSet::new();
    for url in inline_urls(&message.content) {
        if !seen.insert(url.to_string()) {
            continue;
        }
        let platform = hosts.platform_for(&url);
        refs.push(Reference::external(platform, url.as_str(), refs.len()));
    }

    refs
}

/// Inline URLs in text order, cleaned of chat link suppression and trailing
/// punctuation. Tokens that do not parse as URLs with a host are dropped.
fn inline_urls(content: &str) -> Vec<Url> {
    INLINE_URL
        .find_iter(content)
        .filter_map(|m| {
            let token = clean_token(m.as_str());
            let url = Url::parse(token).ok()?;
            url.host_str().filter(|h| !h.is_empty())?;
            Some(url)
        })
        .collect()
}

fn clean_token(token: &str) -> &str {
    let mut token = token;
    loop {
        let before = token.len();
        token = token.trim_end_matches(TRAILING_PUNCTUATION);
        // Closing parens are kept when balanced, e.g. wiki links.
        if token.ends_with(')') && token.matches(')').count() > token.matches('(').count() {
            token = &token[..token.len() - 1];
        }
        if token.len() == before {
            return token;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        scrapbook_common::{NativeAttachment, NativeEmbed},
    };

    fn table() -> HostTable {
        HostTable::default()
    }

    #[rstest]
    #[case("https://x.com/user/status/1", Platform::Twitter)]
    #[case("https://mobile.twitter.com/user/status/1", Platform::Twitter)]
    #[case("https://pbs.twimg.com/media/abc.jpg", Platform::Twitter)]
    #[case("https://fxtwitter.com/user/status/1", Platform::FxTwitter)]
    #[case("https://fixupx.com/user/status/1", Platform::FxTwitter)]
    #[case("https://vxtwitter.com/user/status/1", Platform::VxTwitter)]
    #[case("https://www.instagram.com/reel/Cxyz/", Platform::Instagram)]
    #[case("https://www.ddinstagram.com/p/Cxyz/", Platform::Instagram)]
    #[case("https://vm.tiktok.com/ZM123/", Platform::TikTok)]
    #[case("https://old.reddit.com/r/rust/", Platform::Reddit)]
    #[case("https://redd.it/abc", Platform::Reddit)]
    #[case("https://youtu.be/abc123", Platform::YouTube)]
    #[case("https://m.youtube.com/watch?v=abc", Platform::YouTube)]
    #[case("https://example.com/page", Platform::Generic)]
    #[case("https://notx.com/page", Platform::Generic)]
    #[case("ftp://files.example.com/a.zip", Platform::Unknown)]
    fn platform_detection(#[case] url: &str, #[case] expected: Platform) {
        assert_eq!(table().platform_for_str(url), expected);
    }

    #[test]
    fn label_boundary_prevents_mirror_confusion() {
        // fxtwitter.com ends with "twitter.com" but is a different site.
        assert_eq!(table().lookup("fxtwitter.com"), Some(Platform::FxTwitter));
        assert_eq!(table().lookup("FXTWITTER.COM."), Some(Platform::FxTwitter));
        assert_eq!(table().lookup("nottwitter.com"), None);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let table = HostTable::new(&[HostRule::new(Platform::YouTube, &["invidious.example"])]);
        assert_eq!(
            table.platform_for_str("https://invidious.example/watch?v=a"),
            Platform::YouTube
        );
        assert_eq!(
            table.platform_for_str("https://youtube.com/watch?v=a"),
            Platform::Generic
        );
    }

    #[rstest]
    #[case("see <https://example.com/a>", "https://example.com/a")]
    #[case("see https://example.com/a.", "https://example.com/a")]
    #[case("(https://example.com/a)", "https://example.com/a")]
    #[case(
        "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        "https://en.wikipedia.org/wiki/Rust_(programming_language)"
    )]
    #[case("\"https://example.com/q?a=1\",", "https://example.com/q?a=1")]
    #[case("wow https://example.com/a!?", "https://example.com/a")]
    fn inline_tokens_are_cleaned(#[case] content: &str, #[case] expected: &str) {
        let urls = inline_urls(content);
        assert_eq!(urls.len(), 1, "{content}");
        assert_eq!(urls[0].as_str(), Url::parse(expected).unwrap().as_str());
    }

    #[test]
    fn tokens_without_host_are_dropped() {
        assert!(inline_urls("mailto://  http:// file:///etc/passwd").is_empty());
    }

    #[test]
    fn ordering_and_kinds() {
        let msg = RawMessage::new(
            "1",
            "https://youtu.be/abc123 and https://example.com/x https://youtu.be/abc123",
        )
        .with_attachment(NativeAttachment {
            url: "https://cdn.discordapp.com/a.png".into(),
            content_type: Some("image/png".into()),
            filename: None,
        })
        .with_embed(NativeEmbed {
            url: Some("https://x.com/u/status/5".into()),
            image_url: Some("https://pbs.twimg.com/media/q.jpg".into()),
            ..Default::default()
        });

        let refs = classify(&msg, &table());
        let summary: Vec<_> = refs
            .iter()
            .map(|r| (r.original_index, r.kind, r.platform))
            .collect();
        assert_eq!(summary, vec![
            (0, ReferenceKind::NativeAttachment, Platform::Generic),
            (1, ReferenceKind::NativeEmbed, Platform::Twitter),
            (2, ReferenceKind::ExternalLink, Platform::YouTube),
            (3, ReferenceKind::ExternalLink, Platform::Generic),
        ]);
        assert_eq!(refs[1].source_url, "https://x.com/u/status/5");
    }

    #[test]
    fn embed_without_source_uses_media_url() {
        let msg = RawMessage::new("1", "").with_embed(NativeEmbed {
            image_url: Some("https://cdn.example.com/i.png".into()),
            ..Default::default()
        });
        let refs = classify(&msg, &table());
        assert_eq!(refs[0].source_url, "https://cdn.example.com/i.png");
        assert_eq!(refs[0].platform, Platform::Generic);
    }

    #[test]
    fn embed_media_url_decides_platform_without_source() {
        let msg = RawMessage::new("1", "https://pbs.twimg.com/media/Fq9abc.jpg").with_embed(
            NativeEmbed {
                image_url: Some("https://pbs.twimg.com/media/Fq9abc.jpg".into()),
                ..Default::default()
            },
        );
        let refs = classify(&msg, &table());
        assert_eq!(refs[0].kind, ReferenceKind::NativeEmbed);
        assert_eq!(refs[0].platform, Platform::Twitter);
        assert_eq!(refs[1].platform, Platform::Twitter);
    }

    #[test]
    fn classification_is_idempotent() {
        let msg = RawMessage::new(
            "1",
            "a https://x.com/u/status/1, b <https://www.instagram.com/p/C1/> ftp://h.example/x",
        );
        let first = classify(&msg, &table());
        let second = classify(&msg, &table());
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].platform, Platform::Unknown);
    }

    #[test]
    fn empty_message_has_no_references() {
        assert!(classify(&RawMessage::new("1", "   "), &table()).is_empty());
    }
}
