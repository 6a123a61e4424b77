//! HTML minification via `minify_html`.
//!
//! Closing tags and the `<html>`/`<head>` opening tags are always kept, so
//! the output still parses the same way in the picture rewriter on the next
//! run. Comments, bangs and processing instructions are dropped; inline
//! `<style>` and `<script>` bodies are minified too.

use crate::error::TransformError;
use crate::transform::Transform;

/// Markup chain step.
pub struct HtmlMinify {
    cfg: minify_html::Cfg,
}

impl Default for HtmlMinify {
    fn default() -> Self {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.keep_comments = false;
        cfg.minify_css = true;
        cfg.minify_js = true;
        cfg.remove_bangs = true;
        cfg.remove_processing_instructions = true;
        Self { cfg }
    }
}

impl Transform for HtmlMinify {
    fn name(&self) -> &'static str {
        "minify-html"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(minify_html::minify(input, &self.cfg))
    }
}
