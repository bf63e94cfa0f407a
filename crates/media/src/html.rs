//! OpenGraph / Twitter-card metadata scraping.
//!
//! Pages are only scanned for `<meta>` tags and `<title>`; no DOM is built.

use std::{collections::HashMap, sync::LazyLock};

use {regex::Regex, url::Url};

static META_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<meta\b[^>]*>"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"(?is)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
});
static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<title[^>]*>(.*?)</title>"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

/// Page metadata keyed by lowercase `property`/`name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    tags: HashMap<String, String>,
    title_tag: Option<String>,
}

impl PageMeta {
    /// Scan an HTML document. The first occurrence of each key wins.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let mut tags = HashMap::new();
        for tag in META_TAG.find_iter(html) {
            let attrs = parse_attributes(tag.as_str());
            let key = attrs
                .get("property")
                .or_else(|| attrs.get("name"))
                .or_else(|| attrs.get("itemprop"));
            let (Some(key), Some(content)) = (key, attrs.get("content")) else {
                continue;
            };
            let content = decode_entities(content.trim());
            if content.is_empty() {
                continue;
            }
            tags.entry(key.to_ascii_lowercase()).or_insert(content);
        }

        let title_tag = TITLE_TAG
            .captures(html)
            .map(|c| decode_entities(c[1].trim()))
            .filter(|t| !t.is_empty());

        Self { tags, title_tag }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// `og:title`, then `twitter:title`, then `<title>`.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.first(&["og:title", "twitter:title"])
            .or(self.title_tag.as_deref())
    }

    /// `og:image`, then `twitter:image`, resolved against `base`.
    #[must_use]
    pub fn image(&self, base: &Url) -> Option<String> {
        self.first(&[
            "og:image",
            "og:image:url",
            "og:image:secure_url",
            "twitter:image",
            "twitter:image:src",
        ])
        .and_then(|u| resolve(base, u))
    }

    /// `og:video` (or its secure/url variants), resolved against `base`.
    #[must_use]
    pub fn video(&self, base: &Url) -> Option<String> {
        self.first(&["og:video:secure_url", "og:video:url", "og:video"])
            .and_then(|u| resolve(base, u))
    }
}

fn parse_attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?;
            Some((c[1].to_ascii_lowercase(), value.as_str().to_string()))
        })
        .collect()
}

/// Resolve a possibly relative URL; only `http`/`https` results are kept.
fn resolve(base: &Url, value: &str) -> Option<String> {
    let url = base.join(value.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Decode the common named entities and numeric character references.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        },
    }
}
