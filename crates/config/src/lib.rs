//! Configuration loading, validation, and env substitution.
//!
//! Config files: `scrapbook.toml`, `scrapbook.yaml`, or `scrapbook.json`
//! Searched in `./` then `~/.config/scrapbook/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all
//! string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        BotConfig, ExtractionConfig, HostRule, HttpConfig, InstagramConfig, PlatformsConfig,
        RetryConfig, ScrapbookConfig, SiteConfig, TwitterConfig, YouTubeConfig,
    },
    validate::{
        Diagnostic, Severity, ValidationResult, validate, validate_config, validate_toml_str,
    },
};
