//! Pipeline data model: references, extraction outcomes and assets.

use {
    scrapbook_common::{NativeAttachment, NativeEmbed, Platform},
    serde::{Deserialize, Serialize},
};

/// Where a reference came from inside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    NativeAttachment,
    NativeEmbed,
    ExternalLink,
}

/// Media descriptors delivered by the chat platform itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeMedia {
    Attachment(NativeAttachment),
    Embed(NativeEmbed),
}

impl NativeMedia {
    /// Whether the descriptor carries media that resolves without a fetch.
    #[must_use]
    pub fn has_media(&self) -> bool {
        match self {
            Self::Attachment(a) => !a.url.trim().is_empty(),
            Self::Embed(e) => e.has_media(),
        }
    }
}

/// One thing in a message that may resolve to media.
///
/// Created once by the classifier and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub platform: Platform,
    pub source_url: String,
    /// Position in the classifier's output; the primary ordering key.
    pub original_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeMedia>,
}

impl Reference {
    pub fn external(platform: Platform, source_url: impl Into<String>, index: usize) -> Self {
        Self {
            kind: ReferenceKind::ExternalLink,
            platform,
            source_url: source_url.into(),
            original_index: index,
            native: None,
        }
    }

    /// True for attachments and embeds that carry their own media.
    #[must_use]
    pub fn resolves_natively(&self) -> bool {
        self.kind != ReferenceKind::ExternalLink
            && self.native.as_ref().is_some_and(NativeMedia::has_media)
    }
}

/// Asset type. Declaration order is the ordering priority within one
/// reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Thumbnail,
    #[serde(rename = "link")]
    LinkPreview,
}

impl AssetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Thumbnail => "thumbnail",
            Self::LinkPreview => "link",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extractor output before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAsset {
    pub kind: AssetKind,
    pub url: String,
    pub poster_url: Option<String>,
    pub title: Option<String>,
}

impl RawAsset {
    pub fn new(kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            poster_url: None,
            title: None,
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::new(AssetKind::Image, url)
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::new(AssetKind::Video, url)
    }

    pub fn thumbnail(url: impl Into<String>) -> Self {
        Self::new(AssetKind::Thumbnail, url)
    }

    pub fn link_preview(url: impl Into<String>) -> Self {
        Self::new(AssetKind::LinkPreview, url)
    }

    #[must_use]
    pub fn with_poster(mut self, poster: Option<impl Into<String>>) -> Self {
        let poster: Option<String> = poster.map(Into::into);
        self.poster_url = poster.filter(|p| !p.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<impl Into<String>>) -> Self {
        let title: Option<String> = title.map(Into::into);
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Resolved,
    Unsupported,
    Failed,
}

/// Why a reference failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    FetchError,
    MalformedResponse,
    Cancelled,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::FetchError => "fetch_error",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving one reference. Exactly one per reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub reference: Reference,
    pub status: OutcomeStatus,
    pub assets: Vec<RawAsset>,
    pub error_kind: Option<FailureReason>,
}

impl ExtractionOutcome {
    pub fn resolved(reference: Reference, assets: Vec<RawAsset>) -> Self {
        Self {
            reference,
            status: OutcomeStatus::Resolved,
            assets,
            error_kind: None,
        }
    }

    pub fn unsupported(reference: Reference) -> Self {
        Self {
            reference,
            status: OutcomeStatus::Unsupported,
            assets: Vec::new(),
            error_kind: None,
        }
    }

    pub fn failed(reference: Reference, reason: FailureReason) -> Self {
        Self {
            reference,
            status: OutcomeStatus::Failed,
            assets: Vec::new(),
            error_kind: Some(reason),
        }
    }
}

/// Total order over assets: reference position, then kind, then position
/// within the outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AssetOrder {
    pub reference: usize,
    pub kind: AssetKind,
    pub position: usize,
}

/// A normalized, deduplicated asset as it appears in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub kind: AssetKind,
    pub url: String,
    pub poster_url: Option<String>,
    pub title: Option<String>,
    pub source_platform: Platform,
    pub order: AssetOrder,
}
