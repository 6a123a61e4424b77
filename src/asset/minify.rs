//! Asset minification for JS and CSS files.
//!
//! Uses oxc for JavaScript and lightningcss for CSS.

use std::sync::LazyLock;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use regex::Regex;

use crate::error::TransformError;
use crate::transform::Transform;

/// `/*# sourceMappingURL=... */` trailers left by bundlers.
static SOURCE_MAP_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*# sourceMappingURL=.*?\*/").expect("valid regex"));

/// Minify JavaScript source code.
///
/// Scripts on a built site are not necessarily modules, so the source is
/// parsed as a classic script first and retried as a module.
pub fn minify_js(source: &str) -> Result<String, TransformError> {
    match minify_js_as(source, SourceType::cjs()) {
        Ok(code) => Ok(code),
        Err(_) => minify_js_as(source, SourceType::mjs()),
    }
}

fn minify_js_as(source: &str, source_type: SourceType) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TransformError::parse("javascript", error.to_string()));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Result<String, TransformError> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| TransformError::parse("css", e.to_string()))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| TransformError::parse("css", e.to_string()))?;
    Ok(result.code)
}

/// Drop source map trailers; the maps are not rewritten alongside the CSS.
pub fn strip_source_map_comments(source: &str) -> std::borrow::Cow<'_, str> {
    SOURCE_MAP_COMMENT.replace_all(source, "")
}

// =============================================================================
// Registry steps
// =============================================================================

/// oxc minify + mangle.
pub struct JsMinify;

impl Transform for JsMinify {
    fn name(&self) -> &'static str {
        "oxc"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = std::str::from_utf8(input)?;
        minify_js(source).map(String::into_bytes)
    }
}

/// lightningcss minify, with source map comments removed first.
pub struct CssMinify;

impl Transform for CssMinify {
    fn name(&self) -> &'static str {
        "lightningcss"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let source = std::str::from_utf8(input)?;
        let clean = strip_source_map_comments(source);
        minify_css(&clean).map(String::into_bytes)
    }
}
