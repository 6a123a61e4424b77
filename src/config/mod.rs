//! Optimizer configuration (`sitetrim.toml` + CLI overrides).
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [webp] and [html] sections
//! ├── error          # ConfigError
//! └── mod.rs         # TrimConfig (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! site = "site"                 # Built site to optimize (relative to this file)
//! cache_dir = ".cache/images"   # Content-addressed image results
//! min_savings_bytes = 150       # Image/WebP rewrites must save more than this
//! concurrency = 0               # 0 = available processing units
//!
//! [webp]
//! encoder = "builtin"
//!
//! [html]
//! minify = true
//! ```
//!
//! The file is optional: without it every field takes its default. CLI flags
//! always win over file values.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{HtmlConfig, WebpConfig, WebpEncoder};

use crate::{cli::Cli, log};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

/// Default savings threshold for binary rewrites, in bytes.
pub const DEFAULT_MIN_SAVINGS_BYTES: u64 = 150;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sitetrim.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Directory the config was resolved against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Built site directory.
    pub site: PathBuf,

    /// Image cache directory.
    pub cache_dir: PathBuf,

    /// Minimum savings for image re-encodes and WebP derivatives.
    pub min_savings_bytes: u64,

    /// Concurrency ceiling; 0 means available processing units.
    pub concurrency: usize,

    /// WebP derivative settings
    pub webp: WebpConfig,

    /// HTML stage settings
    pub html: HtmlConfig,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            site: PathBuf::from("site"),
            cache_dir: PathBuf::from(".cache/images"),
            min_savings_bytes: DEFAULT_MIN_SAVINGS_BYTES,
            concurrency: 0,
            webp: WebpConfig::default(),
            html: HtmlConfig::default(),
        }
    }
}

impl TrimConfig {
    /// Load configuration from CLI arguments.
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(PathBuf::from("."), e))?;
        let config_path = cwd.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());
        config.finalize(&root);
        config.apply_cli(cli, &cwd);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored): {}", display_path, fields.join(", "));
    }

    /// Resolve file-relative paths against the config directory.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.site = resolve_path(root, &self.site);
        self.cache_dir = resolve_path(root, &self.cache_dir);
    }

    /// Apply CLI overrides. CLI paths are relative to the working directory.
    fn apply_cli(&mut self, cli: &Cli, cwd: &Path) {
        crate::logger::set_verbose(cli.verbose);

        if let Some(site) = &cli.site {
            self.site = resolve_path(cwd, site);
        }
        if let Some(cache_dir) = &cli.cache_dir {
            self.cache_dir = resolve_path(cwd, cache_dir);
        }
        Self::update_option(&mut self.concurrency, cli.concurrency.as_ref());
        Self::update_option(&mut self.min_savings_bytes, cli.min_savings.as_ref());
        Self::update_option(&mut self.webp.encoder, cli.webp_encoder.as_ref());
        if cli.no_webp {
            self.webp.enable = false;
        }
        if cli.no_html {
            self.html.enable = false;
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.webp.quality) {
            return Err(ConfigError::validation(
                "webp.quality",
                format!("must be within 1-100, got {}", self.webp.quality),
            ));
        }
        if self.webp.timeout_secs == 0 {
            return Err(ConfigError::validation(
                "webp.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Concurrency ceiling with `0` resolved to the host's processing units.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            n => n,
        }
    }
}

/// Expand `~` and join relative paths onto `base`.
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let expanded = PathBuf::from(expanded);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
