use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::ScrapbookConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "scrapbook.toml",
    "scrapbook.yaml",
    "scrapbook.yml",
    "scrapbook.json",
];

/// Load config from the given path (any supported format).
///
/// Environment overrides are applied on top of the file contents.
pub fn load_config(path: &Path) -> anyhow::Result<ScrapbookConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./scrapbook.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/scrapbook/scrapbook.{toml,yaml,yml,json}` (user-global)
///
/// Returns defaults (plus env overrides) if no config file is found or the
/// file cannot be parsed.
pub fn discover_and_load() -> ScrapbookConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = ScrapbookConfig::default();
    apply_env_overrides(&mut config);
    config
}

pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/scrapbook/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "scrapbook").map(|d| d.config_dir().to_path_buf())
}

/// Apply process environment overrides: `SCRAPBOOK_BOT_TOKEN` (or `TOKEN`),
/// `SCRAPBOOK_GUILD_ID` (or `GUILD_ID`), `SCRAPBOOK_ADMIN_ROLE_ID` (or
/// `PURGE_ROLE_ID`) and `SCRAPBOOK_SITE_URL` (or `API_URL`).
pub fn apply_env_overrides(config: &mut ScrapbookConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ScrapbookConfig, lookup: impl Fn(&str) -> Option<String>) {
    let first = |names: &[&str]| {
        names
            .iter()
            .filter_map(|n| lookup(n))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    };

    if let Some(token) = first(&["SCRAPBOOK_BOT_TOKEN", "TOKEN"]) {
        config.bot.token = Some(Secret::new(token));
    }
    if let Some(guild) = first(&["SCRAPBOOK_GUILD_ID", "GUILD_ID"]) {
        config.bot.guild_id = Some(guild);
    }
    if let Some(role) = first(&["SCRAPBOOK_ADMIN_ROLE_ID", "PURGE_ROLE_ID"]) {
        config.bot.admin_role_id = Some(role);
    }
    if let Some(url) = first(&["SCRAPBOOK_SITE_URL", "API_URL"]) {
        config.site.base_url = Some(url);
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ScrapbookConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "scrapbook.toml",
            "[extraction]\nmax_in_flight = 2\n[site]\nbase_url = \"https://a.example\"\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.extraction.max_in_flight, 2);
        assert_eq!(cfg.site.base_url.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(
            &dir,
            "scrapbook.yaml",
            "extraction:\n  retry:\n    max_retries: 0\n",
        );
        assert_eq!(load_config(&yaml).unwrap().extraction.retry.max_retries, 0);

        let json = write(
            &dir,
            "scrapbook.json",
            r#"{"platforms": {"youtube": {"thumbnail_quality": "maxresdefault"}}}"#,
        );
        assert_eq!(
            load_config(&json).unwrap().platforms.youtube.thumbnail_quality,
            "maxresdefault"
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scrapbook.ini", "x=1");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/scrapbook.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn env_overrides_prefer_prefixed_names() {
        let mut cfg = ScrapbookConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "SCRAPBOOK_BOT_TOKEN" => Some("prefixed".into()),
            "TOKEN" => Some("legacy".into()),
            "GUILD_ID" => Some(" 123 ".into()),
            "SCRAPBOOK_SITE_URL" => Some(String::new()),
            "API_URL" => Some("https://legacy.example".into()),
            _ => None,
        });
        assert_eq!(cfg.bot.token.unwrap().expose_secret(), "prefixed");
        assert_eq!(cfg.bot.guild_id.as_deref(), Some("123"));
        assert!(cfg.bot.admin_role_id.is_none());
        assert_eq!(cfg.site.base_url.as_deref(), Some("https://legacy.example"));
    }

    #[test]
    fn purge_role_id_fills_admin_role() {
        let mut cfg = ScrapbookConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "PURGE_ROLE_ID" => Some("555".into()),
            _ => None,
        });
        assert_eq!(cfg.bot.admin_role_id.as_deref(), Some("555"));

        apply_env_overrides_with(&mut cfg, |name| match name {
            "SCRAPBOOK_ADMIN_ROLE_ID" => Some("777".into()),
            "PURGE_ROLE_ID" => Some("555".into()),
            _ => None,
        });
        assert_eq!(cfg.bot.admin_role_id.as_deref(), Some("777"));
    }
}
