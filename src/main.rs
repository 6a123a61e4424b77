//! sitetrim - shrink the assets of a built static site in place.

mod asset;
mod cache;
mod cli;
mod config;
mod error;
mod html;
mod image;
mod logger;
mod pipeline;
mod transform;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::TrimConfig;
use pipeline::Pipeline;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = TrimConfig::load(&cli)?;
    let pipeline = Pipeline::new(&config)?;

    // Per-file failures are already logged and never change the exit code.
    pipeline.run().log();
    Ok(())
}
