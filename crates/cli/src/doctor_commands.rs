//! `scrapbook doctor`: config validation and environment audit.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or
//! `[info]` status indicators per item.

use std::path::Path;

use {
    anyhow::Result,
    scrapbook_config::{ScrapbookConfig, Severity, ValidationResult},
    secrecy::ExposeSecret,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Skip => DIM,
            Self::Info => CYAN,
        }
    }

    fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
            Severity::Info => Self::Info,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn handle_doctor(config_path: Option<&Path>, config: &ScrapbookConfig, verbose: bool) -> Result<()> {
    eprintln!("{BOLD}scrapbook doctor{RESET}");
    eprintln!("{BOLD}================{RESET}\n");

    let result = scrapbook_config::validate(config_path);
    let sections = vec![
        check_config(&result, verbose),
        check_credentials(config),
        check_extraction(config),
    ];

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s)");
    }
    Ok(())
}

// ── 1. Config validation ────────────────────────────────────────────────────

fn check_config(result: &ValidationResult, verbose: bool) -> Section {
    let label = result
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    let syntax_errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == "syntax" && d.severity == Severity::Error)
        .collect();
    if !syntax_errors.is_empty() {
        for d in syntax_errors {
            section.push(Status::Fail, format!("syntax: {}", d.message));
        }
        // Nothing else is meaningful on a file that does not parse.
        return section;
    }
    if result.config_path.is_some() {
        section.push(Status::Ok, "Syntax valid");
    } else {
        section.push(Status::Skip, "No config file found");
    }

    let unknown_fields: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == "unknown-field")
        .collect();
    if unknown_fields.is_empty() {
        section.push(Status::Ok, "All fields recognized");
    } else {
        for d in unknown_fields {
            section.push(Status::Fail, format!("{}: {}", d.path, d.message));
        }
    }

    for d in &result.diagnostics {
        if matches!(d.category, "syntax" | "unknown-field" | "credentials") {
            continue;
        }
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let msg = if d.path.is_empty() {
            d.message.clone()
        } else {
            format!("{}: {}", d.path, d.message)
        };
        section.push(Status::from_severity(d.severity), msg);
    }

    section
}

// ── 2. Credentials ──────────────────────────────────────────────────────────

fn check_credentials(config: &ScrapbookConfig) -> Section {
    let mut section = Section::new("Credentials");

    match &config.bot.token {
        Some(token) if !token.expose_secret().trim().is_empty() => {
            section.push(Status::Ok, "Bot token set");
        },
        _ => section.push(
            Status::Warn,
            "Bot token missing (set SCRAPBOOK_BOT_TOKEN); local extraction still works",
        ),
    }

    let optional = [
        ("Guild id", config.bot.guild_id.as_deref(), "SCRAPBOOK_GUILD_ID"),
        ("Admin role id", config.bot.admin_role_id.as_deref(), "SCRAPBOOK_ADMIN_ROLE_ID"),
        ("Site base URL", config.site.base_url.as_deref(), "SCRAPBOOK_SITE_URL"),
    ];
    for (label, value, env) in optional {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => section.push(Status::Ok, format!("{label}: {v}")),
            None => section.push(Status::Info, format!("{label} not set ({env})")),
        }
    }

    section
}

// ── 3. Extraction settings ──────────────────────────────────────────────────

fn check_extraction(config: &ScrapbookConfig) -> Section {
    let extraction = &config.extraction;
    let mut section = Section::new("Extraction");

    section.push(
        Status::Info,
        format!(
            "{} references in flight, {} ms per reference, {} ms per request",
            extraction.max_in_flight, extraction.reference_timeout_ms, extraction.request_timeout_ms
        ),
    );
    section.push(
        Status::Info,
        format!(
            "{} retries, backoff {}..{} ms",
            extraction.retry.max_retries,
            extraction.retry.backoff_base_ms,
            extraction.retry.backoff_max_ms
        ),
    );
    if extraction.http.block_private_hosts {
        section.push(Status::Ok, "Private address blocking enabled");
    } else {
        section.push(Status::Warn, "Private address blocking disabled");
    }

    let hosts: usize = config.platforms.hosts.iter().map(|r| r.hosts.len()).sum();
    section.push(
        Status::Info,
        format!(
            "{} host rules covering {hosts} hosts",
            config.platforms.hosts.len()
        ),
    );
    if config.platforms.instagram.mirrors.is_empty() {
        section.push(Status::Warn, "No Instagram mirrors configured; posts will fail");
    } else {
        section.push(
            Status::Ok,
            format!("Instagram mirrors: {}", config.platforms.instagram.mirrors.join(", ")),
        );
    }

    section
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(section: &Section) -> Vec<Status> {
        section.items.iter().map(|i| i.status).collect()
    }

    #[test]
    fn missing_token_is_a_warning() {
        let section = check_credentials(&ScrapbookConfig::default());
        assert_eq!(section.items[0].status, Status::Warn);
    }

    #[test]
    fn syntax_error_stops_config_checks() {
        let result = scrapbook_config::validate_toml_str("[extraction\nmax_in_flight = 1");
        let section = check_config(&result, false);
        assert!(statuses(&section).iter().all(|s| *s == Status::Fail));
    }

    #[test]
    fn unknown_field_fails() {
        let result = scrapbook_config::validate_toml_str("[extraction]\nmax_inflight = 4\n");
        let section = check_config(&result, false);
        assert!(section.items.iter().any(|i| i.status == Status::Fail
            && i.message.contains("max_inflight")));
    }

    #[test]
    fn disabled_ssrf_guard_warns() {
        let mut config = ScrapbookConfig::default();
        config.extraction.http.block_private_hosts = false;
        let section = check_extraction(&config);
        assert!(statuses(&section).contains(&Status::Warn));
    }
}
