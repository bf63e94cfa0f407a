//! Manifest assembly and rendering.

use std::fmt::Write as _;

use {
    scrapbook_common::RawMessage,
    scrapbook_config::{ScrapbookConfig, SiteConfig},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

use crate::{
    normalize::{FailureEntry, Normalized, UnsupportedEntry},
    text::{MAX_TEXT_CHARS, normalize_text, parse_headings},
    types::MediaAsset,
};

const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone)]
pub struct ManifestOptions {
    pub site: SiteConfig,
    pub max_text_chars: usize,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

impl ManifestOptions {
    #[must_use]
    pub fn from_config(config: &ScrapbookConfig) -> Self {
        Self {
            site: config.site.clone(),
            ..Self::default()
        }
    }
}

/// Final result of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub message_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub web_url: Option<String>,
    pub text: String,
    pub assets: Vec<MediaAsset>,
    pub unsupported: Vec<UnsupportedEntry>,
    pub failures: Vec<FailureEntry>,
}

/// Assemble a manifest. Pure and total.
#[must_use]
pub fn build(message: &RawMessage, normalized: Normalized, options: &ManifestOptions) -> Manifest {
    let Normalized {
        mut assets,
        unsupported,
        failures,
    } = normalized;
    assets.sort_by(|a, b| a.order.cmp(&b.order));

    let headings = parse_headings(&message.content);
    let title = headings
        .title
        .or_else(|| assets.iter().find_map(|a| a.title.clone()))
        .unwrap_or_else(|| UNTITLED.to_string());

    Manifest {
        message_id: message.id.clone(),
        title,
        subtitle: headings.subtitle,
        web_url: options.site.archive_url(&message.id),
        text: normalize_text(&headings.body, options.max_text_chars),
        assets,
        unsupported,
        failures,
    }
}

impl Manifest {
    /// The outbound JSON document consumed by the web frontend.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let media: Vec<Value> = self
            .assets
            .iter()
            .map(|a| {
                json!({
                    "id": a.id,
                    "kind": a.kind.as_str(),
                    "url": a.url,
                    "poster": a.poster_url,
                    "title": a.title,
                    "platform": a.source_platform.as_str(),
                })
            })
            .collect();
        let unsupported: Vec<Value> = self
            .unsupported
            .iter()
            .map(|u| json!({ "platform": u.platform.as_str(), "url": u.source_url }))
            .collect();
        let failed: Vec<Value> = self
            .failures
            .iter()
            .map(|f| json!({ "url": f.source_url, "reason": f.reason.as_str() }))
            .collect();

        json!({
            "message_id": self.message_id,
            "title": self.title,
            "subtitle": self.subtitle,
            "web_url": self.web_url,
            "text": self.text,
            "media": media,
            "unsupported": unsupported,
            "failed": failed,
        })
    }

    /// Chat reply for the manifest.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut out = format!("**{}**\n", self.title);
        if let Some(subtitle) = &self.subtitle {
            let _ = writeln!(out, "*{subtitle}*");
        }
        if let Some(url) = &self.web_url {
            let _ = writeln!(out, "<{url}>");
        }
        if !self.text.is_empty() {
            let _ = write!(out, "\n{}\n", self.text);
        }

        out.push('\n');
        if self.assets.is_empty() {
            out.push_str("No media found.\n");
        } else {
            out.push_str("**Media**\n");
            for (i, asset) in self.assets.iter().enumerate() {
                let _ = write!(out, "{}. [{}] <{}>", i + 1, asset.kind, asset.url);
                if let Some(title) = &asset.title {
                    let _ = write!(out, " {title}");
                }
                out.push('\n');
            }
        }

        if !self.unsupported.is_empty() {
            out.push_str("\n**Unsupported**\n");
            for entry in &self.unsupported {
                let _ = writeln!(out, "- {}: <{}>", entry.platform, entry.source_url);
            }
        }
        if !self.failures.is_empty() {
            out.push_str("\n**Failed**\n");
            for entry in &self.failures {
                let _ = writeln!(out, "- <{}> ({})", entry.source_url, entry.reason);
            }
        }
        out
    }
}
