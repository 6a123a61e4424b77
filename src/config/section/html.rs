//! `[html]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [html]
//! enable = true     # Rewrite <img> into <picture> when a WebP sibling exists
//! minify = true     # Minify every document after rewriting
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Run the markup stage at all.
    pub enable: bool,

    /// Minify documents after the picture rewrite.
    pub minify: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            enable: true,
            minify: true,
        }
    }
}
