//! Normalizer and deduplicator.

use std::collections::HashMap;

use {
    scrapbook_common::Platform,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    tracing::debug,
};

use crate::{
    text::normalize_title,
    types::{AssetKind, AssetOrder, ExtractionOutcome, FailureReason, MediaAsset, OutcomeStatus},
};

/// A recognized platform with no extraction support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedEntry {
    pub platform: Platform,
    pub source_url: String,
}

/// A reference whose resolution was attempted and did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub source_url: String,
    pub reason: FailureReason,
}

/// Normalizer output: deduplicated assets in `order`, plus the references
/// that produced none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    pub assets: Vec<MediaAsset>,
    pub unsupported: Vec<UnsupportedEntry>,
    pub failures: Vec<FailureEntry>,
}

/// Stable asset identity: 16 hex chars of SHA-256 over the platform family,
/// URL and kind.
#[must_use]
pub fn asset_id(platform: Platform, url: &str, kind: AssetKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(platform.family().as_str().as_bytes());
    hasher.update([0]);
    hasher.update(url.as_bytes());
    hasher.update([0]);
    hasher.update(kind.as_str().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Map outcomes onto the manifest schema. Outcomes are processed in input
/// order; resolution timing never affects the result.
#[must_use]
pub fn normalize(outcomes: Vec<ExtractionOutcome>) -> Normalized {
    let mut assets = Vec::new();
    let mut unsupported = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        let reference = outcome.reference;
        match outcome.status {
            OutcomeStatus::Unsupported => unsupported.push(UnsupportedEntry {
                platform: reference.platform,
                source_url: reference.source_url,
            }),
            OutcomeStatus::Failed => failures.push(FailureEntry {
                source_url: reference.source_url,
                reason: outcome.error_kind.unwrap_or(FailureReason::FetchError),
            }),
            OutcomeStatus::Resolved => {
                for (position, raw) in outcome.assets.into_iter().enumerate() {
                    let url = raw.url.trim();
                    if url.is_empty() {
                        continue;
                    }
                    assets.push(MediaAsset {
                        id: asset_id(reference.platform, url, raw.kind),
                        kind: raw.kind,
                        url: url.to_string(),
                        poster_url: raw
                            .poster_url
                            .map(|p| p.trim().to_string())
                            .filter(|p| !p.is_empty()),
                        title: raw.title.as_deref().and_then(normalize_title),
                        source_platform: reference.platform,
                        order: AssetOrder {
                            reference: reference.original_index,
                            kind: raw.kind,
                            position,
                        },
                    });
                }
            },
        }
    }

    Normalized {
        assets: dedup_assets(assets),
        unsupported,
        failures,
    }
}

/// Collapse assets sharing an `id`, keeping the one with the smaller
/// `order`, and sort by `order`.
#[must_use]
pub fn dedup_assets(assets: Vec<MediaAsset>) -> Vec<MediaAsset> {
    let before = assets.len();
    let mut by_id: HashMap<String, MediaAsset> = HashMap::with_capacity(before);
    for asset in assets {
        match by_id.get(&asset.id) {
            Some(kept) if kept.order <= asset.order => {},
            _ => {
                by_id.insert(asset.id.clone(), asset);
            },
        }
    }

    let mut unique: Vec<MediaAsset> = by_id.into_values().collect();
    unique.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
    if unique.len() < before {
        debug!(removed = before - unique.len(), "duplicate assets collapsed");
    }
    unique
}
