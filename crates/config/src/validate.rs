//! Configuration validation engine.
//!
//! Validates TOML configuration against the known schema, detects
//! unknown/misspelled fields, and reports limits that would stall the
//! extraction pipeline.

use std::{collections::HashMap, path::Path};

use {scrapbook_common::Platform, url::Url};

use crate::schema::ScrapbookConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "unknown-platform", "type-error",
    /// "limits", "endpoint", "hosts", "credentials"
    pub category: &'static str,
    /// Dotted path, e.g. "extraction.http.max_redirects"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of the configuration schema.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Array(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Struct};

    let bot = Struct(HashMap::from([
        ("token", Leaf),
        ("guild_id", Leaf),
        ("admin_role_id", Leaf),
    ]));

    let site = Struct(HashMap::from([("base_url", Leaf)]));

    let retry = Struct(HashMap::from([
        ("max_retries", Leaf),
        ("backoff_base_ms", Leaf),
        ("backoff_max_ms", Leaf),
    ]));

    let http = Struct(HashMap::from([
        ("user_agent", Leaf),
        ("request_timeout_secs", Leaf),
        ("max_redirects", Leaf),
        ("max_body_bytes", Leaf),
        ("block_private_hosts", Leaf),
        ("max_connections", Leaf),
        ("per_platform_limit", Leaf),
    ]));

    let extraction = Struct(HashMap::from([
        ("max_in_flight", Leaf),
        ("reference_timeout_ms", Leaf),
        ("request_timeout_ms", Leaf),
        ("retry", retry),
        ("http", http),
    ]));

    let host_rule = Struct(HashMap::from([("platform", Leaf), ("hosts", Leaf)]));

    let platforms = Struct(HashMap::from([
        ("hosts", Array(Box::new(host_rule))),
        (
            "twitter",
            Struct(HashMap::from([
                ("syndication_base", Leaf),
                ("fxtwitter_base", Leaf),
                ("vxtwitter_base", Leaf),
            ])),
        ),
        ("instagram", Struct(HashMap::from([("mirrors", Leaf)]))),
        (
            "youtube",
            Struct(HashMap::from([("thumbnail_quality", Leaf)])),
        ),
    ]));

    Struct(HashMap::from([
        ("bot", bot),
        ("site", site),
        ("extraction", extraction),
        ("platforms", platforms),
    ]))
}

const YOUTUBE_THUMBNAIL_QUALITIES: &[&str] = &[
    "default",
    "mqdefault",
    "hqdefault",
    "sddefault",
    "maxresdefault",
];

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "syntax",
            "",
            "no config file found; using defaults",
        )];
        let mut config = ScrapbookConfig::default();
        crate::loader::apply_env_overrides(&mut config);
        check_semantics(&config, &mut diagnostics);
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(&actual_path) {
            Ok(content) => validate_toml_str(&crate::env_subst::substitute_env(&content)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to read config file: {e}"),
                )],
                config_path: None,
            },
        }
    } else {
        // YAML/JSON skip the field walk; parse and run semantic checks only.
        let mut diagnostics = Vec::new();
        match crate::loader::load_config(&actual_path) {
            Ok(config) => check_semantics(&config, &mut diagnostics),
            Err(e) => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                e.to_string(),
            )),
        }
        ValidationResult {
            diagnostics,
            config_path: None,
        }
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);
    check_platform_names(&toml_value, &mut diagnostics);

    match toml::from_str::<ScrapbookConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already-loaded config.
#[must_use]
pub fn validate_config(config: &ScrapbookConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (toml::Value::Table(table), KnownKeys::Struct(fields)) => {
            let known_keys: Vec<&str> = fields.keys().copied().collect();
            for (key, child_value) in table {
                let path = join_path(prefix, key);
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child_value, child_schema, &path, diagnostics);
                    continue;
                }
                let level = if prefix.is_empty() {
                    " at top level"
                } else {
                    ""
                };
                let msg = match suggest(key, &known_keys, 3) {
                    Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
                    None => format!("unknown field{level}"),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    msg,
                ));
            }
        },
        (toml::Value::Array(arr), KnownKeys::Array(item_schema)) => {
            for (i, item) in arr.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                check_unknown_fields(item, item_schema, &path, diagnostics);
            }
        },
        _ => {},
    }
}

/// Flag misspelled platform names in `[[platforms.hosts]]` before the type
/// check rejects them with a less helpful message.
fn check_platform_names(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(rules) = value
        .get("platforms")
        .and_then(|p| p.get("hosts"))
        .and_then(|h| h.as_array())
    else {
        return;
    };
    let names: Vec<&str> = Platform::ALL.iter().map(|p| p.as_str()).collect();

    for (i, rule) in rules.iter().enumerate() {
        let Some(name) = rule.get("platform").and_then(|p| p.as_str()) else {
            continue;
        };
        if names.contains(&name) {
            continue;
        }
        let msg = match suggest(name, &names, 3) {
            Some(s) => format!("unknown platform \"{name}\" (did you mean \"{s}\"?)"),
            None => format!("unknown platform \"{name}\""),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-platform",
            format!("platforms.hosts[{i}].platform"),
            msg,
        ));
    }
}

fn check_endpoint(path: &str, value: &str, diagnostics: &mut Vec<Diagnostic>) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {},
        Ok(url) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "endpoint",
            path,
            format!("expected an http(s) URL, got scheme \"{}\"", url.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "endpoint",
            path,
            format!("invalid URL: {e}"),
        )),
    }
}

fn check_semantics(config: &ScrapbookConfig, diagnostics: &mut Vec<Diagnostic>) {
    let extraction = &config.extraction;
    let http = &extraction.http;

    let zero_limits: [(&str, u64); 7] = [
        ("extraction.max_in_flight", extraction.max_in_flight as u64),
        (
            "extraction.reference_timeout_ms",
            extraction.reference_timeout_ms,
        ),
        ("extraction.request_timeout_ms", extraction.request_timeout_ms),
        (
            "extraction.http.request_timeout_secs",
            http.request_timeout_secs,
        ),
        ("extraction.http.max_body_bytes", http.max_body_bytes as u64),
        ("extraction.http.max_connections", http.max_connections as u64),
        (
            "extraction.http.per_platform_limit",
            http.per_platform_limit as u64,
        ),
    ];
    for (path, value) in zero_limits {
        if value == 0 {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "limits",
                path,
                "must be greater than zero",
            ));
        }
    }

    if extraction.reference_timeout_ms > extraction.request_timeout_ms {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "limits",
            "extraction.reference_timeout_ms",
            "exceeds extraction.request_timeout_ms; slow references will be cancelled before \
             their own deadline",
        ));
    }
    if http.per_platform_limit > http.max_connections {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "limits",
            "extraction.http.per_platform_limit",
            "exceeds extraction.http.max_connections and has no effect",
        ));
    }
    if extraction.retry.backoff_base_ms > extraction.retry.backoff_max_ms {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "limits",
            "extraction.retry.backoff_base_ms",
            "exceeds extraction.retry.backoff_max_ms; every retry waits the maximum",
        ));
    }
    if !http.block_private_hosts {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "endpoint",
            "extraction.http.block_private_hosts",
            "private network addresses are reachable from message links",
        ));
    }

    if let Some(base) = config.site.base_url.as_deref() {
        check_endpoint("site.base_url", base, diagnostics);
    }
    let twitter = &config.platforms.twitter;
    check_endpoint(
        "platforms.twitter.syndication_base",
        &twitter.syndication_base,
        diagnostics,
    );
    check_endpoint(
        "platforms.twitter.fxtwitter_base",
        &twitter.fxtwitter_base,
        diagnostics,
    );
    check_endpoint(
        "platforms.twitter.vxtwitter_base",
        &twitter.vxtwitter_base,
        diagnostics,
    );
    for (i, mirror) in config.platforms.instagram.mirrors.iter().enumerate() {
        check_endpoint(
            &format!("platforms.instagram.mirrors[{i}]"),
            mirror,
            diagnostics,
        );
    }

    let quality = config.platforms.youtube.thumbnail_quality.as_str();
    if !YOUTUBE_THUMBNAIL_QUALITIES.contains(&quality) {
        let msg = match suggest(quality, YOUTUBE_THUMBNAIL_QUALITIES, 3) {
            Some(s) => format!("unknown thumbnail quality (did you mean \"{s}\"?)"),
            None => format!(
                "unknown thumbnail quality, expected one of {}",
                YOUTUBE_THUMBNAIL_QUALITIES.join(", ")
            ),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "endpoint",
            "platforms.youtube.thumbnail_quality",
            msg,
        ));
    }

    check_host_table(config, diagnostics);

    if config.bot.token.is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "credentials",
            "bot.token",
            "no bot token configured; only offline extraction is available",
        ));
    }
}

fn check_host_table(config: &ScrapbookConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.platforms.hosts.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "hosts",
            "platforms.hosts",
            "host table is empty; every link will resolve as a generic page",
        ));
        return;
    }

    let mut seen: HashMap<String, Platform> = HashMap::new();
    for (i, rule) in config.platforms.hosts.iter().enumerate() {
        if rule.hosts.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "hosts",
                format!("platforms.hosts[{i}].hosts"),
                "rule matches no hosts",
            ));
        }
        for host in &rule.hosts {
            let host = host.trim().trim_start_matches("www.").to_ascii_lowercase();
            if let Some(previous) = seen.get(&host) {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "hosts",
                    format!("platforms.hosts[{i}].hosts"),
                    format!("host \"{host}\" already maps to {previous}; this entry is unreachable"),
                ));
            } else {
                seen.insert(host, rule.platform);
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("extraction", "extration"), 1);
        assert_eq!(levenshtein("cat", "car"), 1);
    }

    #[test]
    fn suggest_finds_close_match() {
        assert_eq!(
            suggest("youtub", &["youtube", "twitter"], 3),
            Some("youtube")
        );
        assert_eq!(suggest("zzzzzzzz", &["youtube", "twitter"], 3), None);
    }

    #[test]
    fn empty_config_only_reports_missing_token() {
        let result = validate_toml_str("");
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 0);
        assert_eq!(find(&result, "bot.token").unwrap().severity, Severity::Info);
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("[extraction\nmax_in_flight = ");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = validate_toml_str("[extration]\nmax_in_flight = 2\n");
        let d = find(&result, "extration").unwrap();
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("did you mean \"extraction\""));
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let result = validate_toml_str("[extraction.http]\nmax_redirect = 2\n");
        let d = find(&result, "extraction.http.max_redirect").unwrap();
        assert!(d.message.contains("max_redirects"));
    }

    #[test]
    fn host_rule_entries_are_walked() {
        let toml = r#"
[[platforms.hosts]]
platform = "youtube"
hosts = ["youtube.com"]
host = "typo"
"#;
        let result = validate_toml_str(toml);
        assert!(find(&result, "platforms.hosts[0].host").is_some());
    }

    #[test]
    fn misspelled_platform_is_suggested() {
        let toml = r#"
[[platforms.hosts]]
platform = "instagam"
hosts = ["instagram.com"]
"#;
        let result = validate_toml_str(toml);
        let d = find(&result, "platforms.hosts[0].platform").unwrap();
        assert_eq!(d.category, "unknown-platform");
        assert!(d.message.contains("instagram"));
    }

    #[test]
    fn zero_limits_are_errors() {
        let result = validate_toml_str(
            "[extraction]\nmax_in_flight = 0\n[extraction.http]\nper_platform_limit = 0\n",
        );
        assert_eq!(
            find(&result, "extraction.max_in_flight").unwrap().severity,
            Severity::Error
        );
        assert!(find(&result, "extraction.http.per_platform_limit").is_some());
    }

    #[test]
    fn reference_timeout_above_request_timeout_warned() {
        let result = validate_toml_str(
            "[extraction]\nreference_timeout_ms = 60000\nrequest_timeout_ms = 1000\n",
        );
        let d = find(&result, "extraction.reference_timeout_ms").unwrap();
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn non_http_endpoint_is_error() {
        let result = validate_toml_str("[site]\nbase_url = \"ftp://archive.example\"\n");
        let d = find(&result, "site.base_url").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("ftp"));
    }

    #[test]
    fn duplicate_hosts_warned() {
        let toml = r#"
[[platforms.hosts]]
platform = "twitter"
hosts = ["x.com"]

[[platforms.hosts]]
platform = "generic"
hosts = ["www.x.com"]
"#;
        let result = validate_toml_str(toml);
        let d = find(&result, "platforms.hosts[1].hosts").unwrap();
        assert!(d.message.contains("already maps to twitter"));
    }

    #[test]
    fn empty_host_table_warned() {
        let result = validate_toml_str("[platforms]\nhosts = []\n");
        assert_eq!(
            find(&result, "platforms.hosts").unwrap().severity,
            Severity::Warning
        );
    }

    #[test]
    fn unknown_thumbnail_quality_suggested() {
        let result = validate_toml_str("[platforms.youtube]\nthumbnail_quality = \"hqdefalt\"\n");
        let d = find(&result, "platforms.youtube.thumbnail_quality").unwrap();
        assert!(d.message.contains("hqdefault"));
    }

    #[test]
    fn type_error_reported() {
        let result = validate_toml_str("[extraction]\nmax_in_flight = \"many\"\n");
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }

    #[test]
    fn validate_config_checks_loaded_values() {
        let mut config = ScrapbookConfig::default();
        config.extraction.http.max_connections = 0;
        let result = validate_config(&config);
        assert!(result.has_errors());
        assert!(find(&result, "extraction.http.max_connections").is_some());
    }

    #[test]
    fn validate_reads_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapbook.yaml");
        std::fs::write(&path, "extraction:\n  max_in_flight: 0\n").unwrap();
        let result = validate(Some(&path));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(find(&result, "extraction.max_in_flight").is_some());
    }
}
