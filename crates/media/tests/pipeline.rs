#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    scrapbook_channels::MemorySource,
    scrapbook_common::{NativeAttachment, NativeEmbed, Platform, RawMessage},
    scrapbook_config::ScrapbookConfig,
    scrapbook_media::{
        AssetKind, ExtractionOutcome, Extractor, FailureReason, HostTable, Pipeline, RawAsset,
        Reference, classify, normalize,
    },
    tokio::{net::TcpListener, time::Instant},
};

fn local_config() -> ScrapbookConfig {
    let mut config = ScrapbookConfig::default();
    config.extraction.http.block_private_hosts = false;
    config.extraction.retry.max_retries = 0;
    config
}

fn pipeline(config: &ScrapbookConfig) -> Pipeline {
    Pipeline::from_config(config, Arc::new(MemorySource::new())).unwrap()
}

#[tokio::test]
async fn attachment_and_instagram_reel() {
    let mut mirror = mockito::Server::new_async().await;
    let page = mirror
        .mock("GET", "/reel/Cr3el/")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(r#"<meta property="og:image" content="https://scontent.example/reel.jpg">"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = local_config();
    config.platforms.instagram.mirrors = vec![mirror.url()];

    let message = RawMessage::new("m1", "look https://www.instagram.com/reel/Cr3el/")
        .with_attachment(NativeAttachment {
            url: "https://cdn.discordapp.com/attachments/1/2/cat.png".into(),
            content_type: Some("image/png".into()),
            filename: Some("cat.png".into()),
        });
    let manifest = pipeline(&config).extract_message(&message).await;

    page.assert_async().await;
    let summary: Vec<_> = manifest
        .assets
        .iter()
        .map(|a| (a.kind, a.url.as_str(), a.title.as_deref()))
        .collect();
    assert_eq!(summary, vec![
        (
            AssetKind::Image,
            "https://cdn.discordapp.com/attachments/1/2/cat.png",
            Some("cat.png")
        ),
        (
            AssetKind::Thumbnail,
            "https://scontent.example/reel.jpg",
            Some("video")
        ),
    ]);
    assert!(manifest.failures.is_empty());
    assert!(manifest.unsupported.is_empty());
}

#[tokio::test]
async fn youtube_short_link_needs_no_network() {
    // Default config blocks loopback and the pool is never touched.
    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&RawMessage::new("m2", "https://youtu.be/abc123"))
        .await;

    let summary: Vec<_> = manifest
        .assets
        .iter()
        .map(|a| (a.kind, a.url.as_str()))
        .collect();
    assert_eq!(summary, vec![
        (AssetKind::Video, "https://www.youtube.com/watch?v=abc123"),
        (
            AssetKind::Thumbnail,
            "https://img.youtube.com/vi/abc123/hqdefault.jpg"
        ),
    ]);
    assert_eq!(manifest.assets[0].source_platform, Platform::YouTube);
    assert!(manifest.failures.is_empty());
}

#[tokio::test]
async fn unreachable_generic_link_times_out() {
    // Accepts connections and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = local_config();
    config.extraction.reference_timeout_ms = 300;

    let url = format!("http://{addr}/slow");
    let manifest = pipeline(&config)
        .extract_message(&RawMessage::new("m3", format!("slow site {url}")))
        .await;

    assert!(manifest.assets.is_empty());
    assert_eq!(manifest.failures.len(), 1);
    assert_eq!(manifest.failures[0].source_url, url);
    assert_eq!(manifest.failures[0].reason, FailureReason::Timeout);
    assert_eq!(manifest.to_json()["failed"][0]["reason"], "timeout");
}

#[tokio::test]
async fn same_twitter_image_in_embed_and_text_is_one_asset() {
    let image = "https://pbs.twimg.com/media/Fq9abc.jpg";
    let message = RawMessage::new("m4", format!("original: {image}")).with_embed(NativeEmbed {
        url: Some("https://x.com/someone/status/1650000000000000000".into()),
        image_url: Some(image.into()),
        ..Default::default()
    });

    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&message)
        .await;

    let images: Vec<_> = manifest
        .assets
        .iter()
        .filter(|a| a.kind == AssetKind::Image)
        .collect();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].url, image);
    assert_eq!(images[0].order.reference, 0);
    assert!(manifest.failures.is_empty());
}

#[tokio::test]
async fn tiktok_and_reddit_are_unsupported() {
    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&RawMessage::new(
            "m5",
            "https://www.tiktok.com/@u/video/7 https://www.reddit.com/r/rust/comments/x/y/",
        ))
        .await;

    assert!(manifest.assets.is_empty());
    assert!(manifest.failures.is_empty());
    let platforms: Vec<_> = manifest.unsupported.iter().map(|u| u.platform).collect();
    assert_eq!(platforms, vec![Platform::TikTok, Platform::Reddit]);
}

#[tokio::test]
async fn tiktok_and_reddit_embeds_stay_unsupported() {
    let message = RawMessage::new("m5b", "")
        .with_embed(NativeEmbed {
            url: Some("https://www.tiktok.com/@u/video/7".into()),
            thumbnail_url: Some("https://p16.tiktokcdn.com/thumb.jpg".into()),
            ..Default::default()
        })
        .with_embed(NativeEmbed {
            url: Some("https://www.reddit.com/r/rust/comments/x/y/".into()),
            image_url: Some("https://preview.redd.it/a.jpg".into()),
            ..Default::default()
        });

    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&message)
        .await;

    assert!(manifest.assets.is_empty());
    assert!(manifest.failures.is_empty());
    let platforms: Vec<_> = manifest.unsupported.iter().map(|u| u.platform).collect();
    assert_eq!(platforms, vec![Platform::TikTok, Platform::Reddit]);
}

#[tokio::test]
async fn bare_twitter_media_embed_and_inline_copy_are_one_asset() {
    let image = "https://pbs.twimg.com/media/Fq9abc.jpg";
    let message = RawMessage::new("m4b", image).with_embed(NativeEmbed {
        image_url: Some(image.into()),
        ..Default::default()
    });

    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&message)
        .await;

    assert_eq!(manifest.assets.len(), 1);
    assert_eq!(manifest.assets[0].kind, AssetKind::Image);
    assert_eq!(manifest.assets[0].source_platform, Platform::Twitter);
    assert_eq!(manifest.assets[0].order.reference, 0);
}

#[tokio::test]
async fn non_web_links_are_failures_not_unsupported() {
    let manifest = pipeline(&ScrapbookConfig::default())
        .extract_message(&RawMessage::new("m9", "grab ftp://files.example.com/a.zip"))
        .await;

    assert!(manifest.assets.is_empty());
    assert!(manifest.unsupported.is_empty());
    assert_eq!(manifest.failures.len(), 1);
    assert_eq!(manifest.failures[0].reason, FailureReason::FetchError);
}

#[tokio::test]
async fn extract_by_id_through_source() {
    let source = MemorySource::from_messages([RawMessage::new("42", "# Hello\nhttps://youtu.be/q1")]);
    let pipeline = Pipeline::from_config(&ScrapbookConfig::default(), Arc::new(source)).unwrap();

    let manifest = pipeline.extract("42").await.unwrap();
    assert_eq!(manifest.title, "Hello");
    assert_eq!(manifest.assets.len(), 2);
    assert!(pipeline.extract("43").await.is_err());
}

#[test]
fn classification_is_idempotent() {
    let message = RawMessage::new(
        "m6",
        "a https://x.com/u/status/1 b https://youtu.be/z c <https://example.com/page>.",
    )
    .with_embed(NativeEmbed {
        url: Some("https://www.instagram.com/p/Abc/".into()),
        ..Default::default()
    });
    let hosts = HostTable::default();
    assert_eq!(classify(&message, &hosts), classify(&message, &hosts));
}

#[test]
fn dedup_is_idempotent() {
    let reference = Reference::external(Platform::Generic, "https://example.com", 0);
    let outcome = ExtractionOutcome::resolved(reference, vec![
        RawAsset::image("https://example.com/a.png"),
        RawAsset::image("https://example.com/a.png"),
    ]);
    let once = normalize(vec![outcome.clone()]);
    let twice = normalize(vec![outcome.clone(), outcome]);
    assert_eq!(once.assets.len(), 1);
    assert_eq!(once.assets, twice.assets);
}

/// Resolves every reference to two assets after a per-index delay.
struct Jittered {
    delays_ms: Vec<u64>,
}

#[async_trait]
impl Extractor for Jittered {
    fn name(&self) -> &'static str {
        "jittered"
    }

    async fn resolve(&self, reference: &Reference, _: Instant) -> ExtractionOutcome {
        let delay = self
            .delays_ms
            .get(reference.original_index)
            .copied()
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let base = reference.source_url.trim_end_matches('/');
        ExtractionOutcome::resolved(reference.clone(), vec![
            RawAsset::thumbnail(format!("{base}/thumb.jpg")),
            RawAsset::image(format!("{base}/full.jpg")),
        ])
    }
}

#[tokio::test(start_paused = true)]
async fn ordering_is_stable_under_jitter() {
    let message = RawMessage::new(
        "m7",
        "https://a.example https://b.example https://c.example https://d.example",
    );
    let permutations = [
        vec![10, 20, 30, 40],
        vec![40, 30, 20, 10],
        vec![25, 5, 40, 0],
        vec![0, 0, 0, 0],
    ];

    let mut orders = Vec::new();
    for delays_ms in permutations {
        let pipeline = Pipeline::with_extractor(
            &ScrapbookConfig::default(),
            Arc::new(MemorySource::new()),
            Arc::new(Jittered { delays_ms }),
        );
        let manifest = pipeline.extract_message(&message).await;
        orders.push(
            manifest
                .assets
                .into_iter()
                .map(|a| a.url)
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(orders[0][0], "https://a.example/full.jpg");
    assert_eq!(orders[0][1], "https://a.example/thumb.jpg");
    assert!(orders.windows(2).all(|w| w[0] == w[1]));
}

/// Always fails.
struct Broken;

#[async_trait]
impl Extractor for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn resolve(&self, reference: &Reference, _: Instant) -> ExtractionOutcome {
        ExtractionOutcome::failed(reference.clone(), FailureReason::MalformedResponse)
    }
}

#[tokio::test]
async fn manifest_is_built_even_when_everything_fails() {
    let pipeline = Pipeline::with_extractor(
        &ScrapbookConfig::default(),
        Arc::new(MemorySource::new()),
        Arc::new(Broken),
    );
    for content in ["", "no links at all", "https://a.example ftp://b.example/x \u{0}"] {
        let manifest = pipeline
            .extract_message(&RawMessage::new("m8", content))
            .await;
        assert!(manifest.assets.is_empty());
        assert!(manifest.render_markdown().contains("No media found."));
        assert!(
            manifest
                .failures
                .iter()
                .all(|f| f.reason == FailureReason::MalformedResponse)
        );
    }
}
