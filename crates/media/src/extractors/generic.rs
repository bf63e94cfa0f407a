//! Generic link preview from page metadata.

use std::sync::Arc;

use {async_trait::async_trait, tokio::time::Instant, url::Url};

use crate::{
    error::FetchError,
    extractors::{Extractor, outcome_from},
    html::PageMeta,
    http::{FetchPool, FetchResponse},
    text::normalize_title,
    types::{ExtractionOutcome, FailureReason, RawAsset, Reference},
};

pub struct GenericExtractor {
    pool: Arc<FetchPool>,
}

impl GenericExtractor {
    pub fn new(pool: Arc<FetchPool>) -> Self {
        Self { pool }
    }

    async fn preview(
        &self,
        reference: &Reference,
        deadline: Instant,
    ) -> Result<Vec<RawAsset>, FetchError> {
        let response = self
            .pool
            .get(reference.platform, &reference.source_url, deadline)
            .await?;
        Ok(assets_from_response(&response))
    }
}

#[async_trait]
impl Extractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn resolve(&self, reference: &Reference, deadline: Instant) -> ExtractionOutcome {
        let fetchable = Url::parse(&reference.source_url)
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        if !fetchable {
            return ExtractionOutcome::failed(reference.clone(), FailureReason::FetchError);
        }
        outcome_from(reference, self.preview(reference, deadline).await)
    }
}

/// Assets for a fetched page: the media itself for direct media responses,
/// otherwise a link preview plus any `og:video`.
fn assets_from_response(response: &FetchResponse) -> Vec<RawAsset> {
    let url = response.url.to_string();
    if response.content_type.starts_with("image/") {
        return vec![RawAsset::image(url)];
    }
    if response.content_type.starts_with("video/") {
        return vec![RawAsset::video(url)];
    }

    let meta = PageMeta::parse(&response.body);
    let title = meta.title().and_then(normalize_title);
    let image = meta.image(&response.url);

    let mut assets = vec![
        RawAsset::link_preview(url)
            .with_poster(image.clone())
            .with_title(title.clone()),
    ];
    if let Some(video) = meta.video(&response.url) {
        assets.push(RawAsset::video(video).with_poster(image).with_title(title));
    }
    assets
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            http::tests::local_pool,
            types::{AssetKind, OutcomeStatus},
        },
        scrapbook_common::Platform,
        std::time::Duration,
    };

    fn extractor() -> GenericExtractor {
        GenericExtractor::new(Arc::new(local_pool(0)))
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn builds_link_preview_from_open_graph() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/post")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<head><meta property="og:title" content="  A   Post ">
                <meta property="og:image" content="/cover.jpg"></head>"#,
            )
            .create_async()
            .await;

        let url = format!("{}/post", server.url());
        let reference = Reference::external(Platform::Generic, url.clone(), 0);
        let outcome = extractor().resolve(&reference, deadline()).await;

        assert_eq!(outcome.status, OutcomeStatus::Resolved);
        assert_eq!(outcome.assets, vec![
            RawAsset::link_preview(url)
                .with_poster(Some(format!("{}/cover.jpg", server.url())))
                .with_title(Some("A Post")),
        ]);
    }

    #[tokio::test]
    async fn og_video_adds_video_asset() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/clip")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<meta property="og:video" content="https://cdn.example.com/c.mp4">"#)
            .create_async()
            .await;

        let reference =
            Reference::external(Platform::Generic, format!("{}/clip", server.url()), 0);
        let outcome = extractor().resolve(&reference, deadline()).await;
        let kinds: Vec<_> = outcome.assets.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AssetKind::LinkPreview, AssetKind::Video]);
        assert_eq!(outcome.assets[1].url, "https://cdn.example.com/c.mp4");
    }

    #[tokio::test]
    async fn direct_image_response() {
        let mut server = mockito::Server::new_async().await;
        let _img = server
            .mock("GET", "/raw")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body("RIFF")
            .create_async()
            .await;

        let reference = Reference::external(Platform::Generic, format!("{}/raw", server.url()), 0);
        let outcome = extractor().resolve(&reference, deadline()).await;
        assert_eq!(outcome.assets.len(), 1);
        assert_eq!(outcome.assets[0].kind, AssetKind::Image);
    }

    #[tokio::test]
    async fn http_error_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let reference =
            Reference::external(Platform::Generic, format!("{}/gone", server.url()), 0);
        let outcome = extractor().resolve(&reference, deadline()).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_kind, Some(FailureReason::FetchError));
        assert!(outcome.assets.is_empty());
    }

    #[tokio::test]
    async fn expired_deadline_is_timeout() {
        let reference = Reference::external(Platform::Generic, "http://example.invalid/", 0);
        let outcome = extractor().resolve(&reference, Instant::now()).await;
        assert_eq!(outcome.error_kind, Some(FailureReason::Timeout));
    }

    #[tokio::test]
    async fn non_http_scheme_is_a_fetch_error() {
        let reference = Reference::external(Platform::Unknown, "ftp://files.example.com/a", 0);
        let outcome = extractor().resolve(&reference, deadline()).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_kind, Some(FailureReason::FetchError));
    }
}
