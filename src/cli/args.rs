//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

use crate::config::WebpEncoder;

/// Shrink a built static site in place
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Site directory to optimize (overrides `site` in the config file)
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub site: Option<PathBuf>,

    /// Config file path (default: sitetrim.toml, optional)
    #[arg(short = 'C', long, default_value = "sitetrim.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Maximum number of files transformed at once (0 = available cores)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Minimum bytes an image or WebP rewrite must save to be kept
    #[arg(short, long = "min-savings")]
    pub min_savings: Option<u64>,

    /// Directory for content-addressed image results
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// WebP encoder backend
    #[arg(long, value_enum)]
    pub webp_encoder: Option<WebpEncoder>,

    /// Skip WebP derivative generation
    #[arg(long)]
    pub no_webp: bool,

    /// Skip the HTML stage (picture rewrite + minify)
    #[arg(long)]
    pub no_html: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}
