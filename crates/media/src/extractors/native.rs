//! Attachments and embeds delivered by the chat platform. No network.

use {
    async_trait::async_trait,
    scrapbook_common::{NativeAttachment, NativeEmbed},
    tokio::time::Instant,
    url::Url,
};

use crate::{
    extractors::Extractor,
    text::normalize_title,
    types::{AssetKind, ExtractionOutcome, NativeMedia, RawAsset, Reference},
};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "mkv", "avi", "gif", "m3u8"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "avif", "heic", "svg"];

pub struct NativeExtractor;

#[async_trait]
impl Extractor for NativeExtractor {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn resolve(&self, reference: &Reference, _deadline: Instant) -> ExtractionOutcome {
        let assets = match &reference.native {
            Some(NativeMedia::Attachment(attachment)) => vec![attachment_asset(attachment)],
            Some(NativeMedia::Embed(embed)) => embed_assets(embed, &reference.source_url),
            None => return ExtractionOutcome::unsupported(reference.clone()),
        };
        ExtractionOutcome::resolved(reference.clone(), assets)
    }
}

/// Lowercased file extension of a URL path, ignoring query and fragment.
pub(crate) fn url_extension(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Kind implied by a URL's extension, if recognizable.
pub(crate) fn kind_from_extension(url: &str) -> Option<AssetKind> {
    let ext = url_extension(url)?;
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Video)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Image)
    } else {
        None
    }
}

fn attachment_asset(attachment: &NativeAttachment) -> RawAsset {
    let url = attachment.url.trim();
    let declared = attachment
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase());
    let kind = match declared.as_deref() {
        Some(ct) if ct.starts_with("image/") => AssetKind::Image,
        Some(ct) if ct.starts_with("video/") => AssetKind::Video,
        _ => kind_from_extension(url)
            .or_else(|| attachment.filename.as_deref().and_then(kind_from_extension))
            .unwrap_or(AssetKind::LinkPreview),
    };

    let title = attachment
        .filename
        .as_deref()
        .and_then(normalize_title)
        .or_else(|| {
            (kind == AssetKind::LinkPreview)
                .then(|| url.rsplit('/').next().and_then(normalize_title))
                .flatten()
        });

    RawAsset::new(kind, url).with_title(title)
}

fn embed_assets(embed: &NativeEmbed, source_url: &str) -> Vec<RawAsset> {
    let clean = |u: &Option<String>| {
        u.as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
    };
    let image = clean(&embed.image_url);
    let video = clean(&embed.video_url);
    let thumbnail = clean(&embed.thumbnail_url);
    let title = embed.title.as_deref().and_then(normalize_title);

    let mut assets = Vec::new();
    if let Some(image) = image {
        assets.push(RawAsset::image(image).with_title(title.clone()));
    }
    let poster_used = video.is_some() && thumbnail.is_some();
    if let Some(video) = video {
        assets.push(
            RawAsset::video(video)
                .with_poster(thumbnail.clone())
                .with_title(title.clone()),
        );
    }
    if let Some(thumbnail) = thumbnail.filter(|_| !poster_used) {
        assets.push(RawAsset::thumbnail(thumbnail).with_title(title.clone()));
    }
    if assets.is_empty() {
        assets.push(RawAsset::link_preview(source_url).with_title(title));
    }
    assets
}
