//! YouTube: video id derivation, no network.

use std::sync::Arc;

use {async_trait::async_trait, tokio::time::Instant, tracing::debug, url::Url};

use crate::{
    extractors::Extractor,
    types::{ExtractionOutcome, RawAsset, Reference},
};

const PATH_PREFIXES: &[&str] = &["shorts", "embed", "v", "live"];

pub struct YouTubeExtractor {
    thumbnail_quality: String,
    /// Used when no video id can be derived (channel pages, playlists).
    fallback: Arc<dyn Extractor>,
}

impl YouTubeExtractor {
    pub fn new(thumbnail_quality: &str, fallback: Arc<dyn Extractor>) -> Self {
        let quality = thumbnail_quality.trim();
        Self {
            thumbnail_quality: if quality.is_empty() {
                "hqdefault".into()
            } else {
                quality.into()
            },
            fallback,
        }
    }

    fn assets(&self, id: &str) -> Vec<RawAsset> {
        let thumbnail = format!(
            "https://img.youtube.com/vi/{id}/{}.jpg",
            self.thumbnail_quality
        );
        vec![
            RawAsset::video(format!("https://www.youtube.com/watch?v={id}"))
                .with_poster(Some(thumbnail.clone())),
            RawAsset::thumbnail(thumbnail),
        ]
    }
}

#[async_trait]
impl Extractor for YouTubeExtractor {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome {
        match video_id(&reference.source_url) {
            Some(id) => ExtractionOutcome::resolved(reference.clone(), self.assets(&id)),
            None => {
                debug!(url = %reference.source_url, "no video id, using link preview");
                self.fallback.resolve(reference, deadline).await
            },
        }
    }
}

/// Video id from any accepted URL shape.
#[must_use]
pub fn video_id(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" || host.ends_with(".youtu.be") {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if PATH_PREFIXES.contains(&prefix) => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate.filter(|id| is_valid_id(id))
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
