//! SVG optimization using usvg.
//!
//! usvg parses the document into a simplified tree and writes it back
//! without indentation, resolving styles and dropping editor metadata.

use crate::error::TransformError;
use crate::transform::Transform;

/// Elements usvg drops or flattens without the `text` feature.
/// Documents containing any of them are returned unchanged.
const PRESERVE_MARKERS: &[&str] = &["<text", "<script", "<animate", "<set", "<foreignObject"];

/// usvg re-serialization step
#[derive(Debug, Clone)]
pub struct SvgOptimize {
    /// DPI for unit conversion.
    pub dpi: f32,
}

impl Default for SvgOptimize {
    fn default() -> Self {
        Self { dpi: 96.0 }
    }
}

impl Transform for SvgOptimize {
    fn name(&self) -> &'static str {
        "usvg"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        optimize_svg(input, self.dpi)
    }
}

/// Optimize SVG using usvg
pub fn optimize_svg(content: &[u8], dpi: f32) -> Result<Vec<u8>, TransformError> {
    let text = std::str::from_utf8(content)?;
    if PRESERVE_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Ok(content.to_vec());
    }

    let usvg_options = usvg::Options {
        dpi,
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(content, &usvg_options)
        .map_err(|e| TransformError::parse("svg", e.to_string()))?;

    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };
    Ok(tree.to_string(&write_options).into_bytes())
}
