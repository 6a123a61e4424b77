//! `<img>` to `<picture>` rewriting.
//!
//! Offers the `.webp` derivative written by the image stages as the preferred
//! source of every eligible raster `<img>`:
//!
//! ```html
//! <img src="a.png" alt="x">
//! <!-- becomes -->
//! <picture><source srcset="a.webp" type="image/webp"><img src="a.png" alt="x"></picture>
//! ```
//!
//! The document is parsed once, edits are collected by a read-only pass,
//! then spliced into the source text in order. Everything outside the
//! rewritten `<img>` tags is preserved byte-for-byte.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::error::TransformError;
use crate::utils::html::{escape_attr, unescape_attr};

/// Raster extensions that get a `.webp` derivative.
const RASTER_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Sources that never point at a local file.
const REMOTE_PREFIXES: [&str; 4] = ["http:", "https:", "//", "data:"];

/// Elements whose contents are not live `<img>` markup.
const OPAQUE_ELEMENTS: [&str; 4] = ["script", "style", "template", "textarea"];

/// One `<img>` to wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PictureEdit {
    /// Byte range of the `<img ...>` tag in the document.
    start: usize,
    end: usize,
    /// `srcset` value for the inserted `<source>`.
    srcset: String,
}

/// Rewrite every eligible `<img>` in `html`, returning the new document and
/// the number of images wrapped.
///
/// `doc_path` is the document's own path and `site` the site root, used to
/// resolve relative and site-root sources.
pub fn rewrite_pictures(
    html: &str,
    doc_path: &Path,
    site: &Path,
) -> Result<(String, usize), TransformError> {
    let edits = plan_edits(html, doc_path, site)?;
    let count = edits.len();
    Ok((apply_edits(html, &edits), count))
}

/// Collect the edits for `html` without modifying it.
fn plan_edits(
    html: &str,
    doc_path: &Path,
    site: &Path,
) -> Result<Vec<PictureEdit>, TransformError> {
    let dom = tl::parse(html, tl::ParserOptions::default())
        .map_err(|e| TransformError::parse("html", e.to_string()))?;
    let parser = dom.parser();

    let Some(images) = dom.query_selector("img") else {
        return Ok(Vec::new());
    };

    // Containment is checked on byte spans so the result does not depend on
    // how the parser nests <source> or what it makes of script bodies.
    let pictures = element_spans(&dom, html, "picture");
    let opaque: Vec<_> = OPAQUE_ELEMENTS
        .iter()
        .flat_map(|name| element_spans(&dom, html, name))
        .collect();

    let doc_dir = doc_path.parent().unwrap_or(site);
    let mut edits = Vec::new();

    for handle in images {
        let Some(tag) = handle.get(parser).and_then(|node| node.as_tag()) else {
            continue;
        };
        let Some((start, end)) = span_of(html, tag.raw().as_bytes()) else {
            continue;
        };
        let inside =
            |&(outer_start, outer_end): &(usize, usize)| outer_start < start && end <= outer_end;
        if pictures.iter().any(inside) || opaque.iter().any(inside) {
            continue;
        }
        let Some(Some(src)) = tag.attributes().get("src") else {
            continue;
        };
        let src = src.as_utf8_str();
        let Some(srcset) = webp_srcset(&unescape_attr(&src)) else {
            continue;
        };
        if resolve_local(&srcset, doc_dir, site).is_some_and(|p| p.is_file()) {
            edits.push(PictureEdit { start, end, srcset });
        }
    }

    edits.sort_by_key(|e| e.start);
    edits.dedup_by(|next, prev| next.start < prev.end);
    Ok(edits)
}

/// Splice `edits` (sorted, non-overlapping) into `html`.
fn apply_edits(html: &str, edits: &[PictureEdit]) -> String {
    if edits.is_empty() {
        return html.to_owned();
    }

    let mut out = String::with_capacity(html.len() + edits.len() * 64);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&html[cursor..edit.start]);
        out.push_str("<picture><source srcset=\"");
        out.push_str(&escape_attr(&edit.srcset));
        out.push_str("\" type=\"image/webp\">");
        out.push_str(&html[edit.start..edit.end]);
        out.push_str("</picture>");
        cursor = edit.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// The `.webp` sibling reference for an eligible `src`, in the author's form
/// with any query or fragment removed.
fn webp_srcset(src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let lower = src.to_ascii_lowercase();
    if REMOTE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let path = src.split(['?', '#']).next()?;
    let (stem, ext) = path.rsplit_once('.')?;
    if stem.is_empty() || ext.contains('/') {
        return None;
    }
    RASTER_EXTENSIONS
        .iter()
        .any(|raster| ext.eq_ignore_ascii_case(raster))
        .then(|| format!("{}.webp", stem))
}

/// Filesystem path for a site-root (`/a.webp`) or document-relative reference.
fn resolve_local(reference: &str, doc_dir: &Path, site: &Path) -> Option<PathBuf> {
    let decoded = percent_decode_str(reference).decode_utf8().ok()?;
    Some(match decoded.strip_prefix('/') {
        Some(rooted) => site.join(rooted),
        None => doc_dir.join(decoded.as_ref()),
    })
}

/// Byte ranges of every `name` element in the document.
fn element_spans(dom: &tl::VDom<'_>, html: &str, name: &str) -> Vec<(usize, usize)> {
    let parser = dom.parser();
    let Some(handles) = dom.query_selector(name) else {
        return Vec::new();
    };
    handles
        .filter_map(|handle| handle.get(parser).and_then(|node| node.as_tag()))
        .filter_map(|tag| span_of(html, tag.raw().as_bytes()))
        .collect()
}

/// Byte range of `slice` within `html`, when it is a subslice of it.
fn span_of(html: &str, slice: &[u8]) -> Option<(usize, usize)> {
    let base = html.as_ptr() as usize;
    let start = (slice.as_ptr() as usize).checked_sub(base)?;
    let end = start.checked_add(slice.len())?;
    let raw = html.get(start..end)?;
    raw.starts_with('<').then_some((start, end))
}
