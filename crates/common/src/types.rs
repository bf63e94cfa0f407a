//! Chat message data model shared by connectors and the media pipeline.

use serde::{Deserialize, Serialize};

/// Source platform a reference points at.
///
/// The set is closed: extractors are keyed by this enum and adding a
/// platform means adding a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    FxTwitter,
    VxTwitter,
    TikTok,
    Reddit,
    YouTube,
    Generic,
    Unknown,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Self::Instagram,
        Self::Twitter,
        Self::FxTwitter,
        Self::VxTwitter,
        Self::TikTok,
        Self::Reddit,
        Self::YouTube,
        Self::Generic,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::FxTwitter => "fxtwitter",
            Self::VxTwitter => "vxtwitter",
            Self::TikTok => "tiktok",
            Self::Reddit => "reddit",
            Self::YouTube => "youtube",
            Self::Generic => "generic",
            Self::Unknown => "unknown",
        }
    }

    /// Collapse mirror variants onto the platform they mirror.
    ///
    /// Asset identity is computed over the family, so the same image reached
    /// through `x.com` and `fxtwitter.com` is one asset.
    #[must_use]
    pub fn family(self) -> Self {
        match self {
            Self::FxTwitter | Self::VxTwitter => Self::Twitter,
            Self::Unknown => Self::Generic,
            other => other,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| crate::Error::message(format!("unknown platform: {s}")))
    }
}

/// A file uploaded with the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeAttachment {
    pub url: String,
    /// Declared MIME-like kind, e.g. `image/png`.
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// A rich embed the chat platform attached to the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeEmbed {
    /// Page the embed was generated from.
    pub url: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl NativeEmbed {
    /// Whether the embed carries any media of its own.
    #[must_use]
    pub fn has_media(&self) -> bool {
        [&self.image_url, &self.video_url, &self.thumbnail_url]
            .into_iter()
            .any(|u| u.as_deref().is_some_and(|u| !u.trim().is_empty()))
    }
}

/// One chat message as delivered by a connector. Read-only to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    pub id: String,
    pub content: String,
    pub attachments: Vec<NativeAttachment>,
    pub embeds: Vec<NativeEmbed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// RFC 3339 timestamp, when the connector knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: NativeAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    #[must_use]
    pub fn with_embed(mut self, embed: NativeEmbed) -> Self {
        self.embeds.push(embed);
        self
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Platform::FxTwitter, Platform::Twitter)]
    #[case(Platform::VxTwitter, Platform::Twitter)]
    #[case(Platform::Twitter, Platform::Twitter)]
    #[case(Platform::Unknown, Platform::Generic)]
    #[case(Platform::YouTube, Platform::YouTube)]
    fn family_folds_mirrors(#[case] platform: Platform, #[case] expected: Platform) {
        assert_eq!(platform.family(), expected);
    }

    #[test]
    fn platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::YouTube).unwrap();
        assert_eq!(json, "\"youtube\"");
        let back: Platform = serde_json::from_str("\"fxtwitter\"").unwrap();
        assert_eq!(back, Platform::FxTwitter);
    }

    #[test]
    fn platform_from_str_round_trips_names() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn message_deserializes_with_missing_fields() {
        let msg: RawMessage = serde_json::from_str(r#"{"id": "1", "content": "hi"}"#).unwrap();
        assert_eq!(msg.id, "1");
        assert!(msg.attachments.is_empty());
        assert!(msg.embeds.is_empty());
    }

    #[test]
    fn embed_without_urls_has_no_media() {
        let embed = NativeEmbed {
            url: Some("https://example.com".into()),
            image_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(!embed.has_media());
    }
}
