//! Lossless GIF block stripping.
//!
//! Drops comment extensions and application extensions other than the
//! animation-loop ones (`NETSCAPE2.0`, `ANIMEXTS1.0`). Image data, graphic
//! control and plain text blocks are copied verbatim.

use crate::error::TransformError;
use crate::transform::Transform;

const EXTENSION: u8 = 0x21;
const IMAGE: u8 = 0x2C;
const TRAILER: u8 = 0x3B;

const COMMENT_LABEL: u8 = 0xFE;
const APPLICATION_LABEL: u8 = 0xFF;

const LOOP_APPLICATIONS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

pub struct GifStrip;

impl Transform for GifStrip {
    fn name(&self) -> &'static str {
        "gif-strip"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        strip_gif_extensions(input)
    }
}

/// Remove comment and non-loop application extensions from a GIF stream.
pub fn strip_gif_extensions(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    if !(input.starts_with(b"GIF87a") || input.starts_with(b"GIF89a")) {
        return Err(malformed("missing GIF header"));
    }
    // Header (6) + logical screen descriptor (7).
    let packed = *input.get(10).ok_or_else(|| malformed("truncated header"))?;
    let mut pos = 13 + color_table_len(packed);
    if pos > input.len() {
        return Err(malformed("truncated global color table"));
    }

    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&input[..pos]);

    loop {
        match input.get(pos) {
            Some(&TRAILER) => {
                out.push(TRAILER);
                return Ok(out);
            }
            Some(&EXTENSION) => {
                let label = *input
                    .get(pos + 1)
                    .ok_or_else(|| malformed("truncated extension"))?;
                let end = skip_sub_blocks(input, pos + 2)?;
                if keep_extension(label, &input[pos + 2..end]) {
                    out.extend_from_slice(&input[pos..end]);
                }
                pos = end;
            }
            Some(&IMAGE) => {
                let packed = *input
                    .get(pos + 9)
                    .ok_or_else(|| malformed("truncated image descriptor"))?;
                // Descriptor (10) + local color table + LZW minimum code size (1).
                let data = pos + 10 + color_table_len(packed) + 1;
                let end = skip_sub_blocks(input, data)?;
                out.extend_from_slice(&input[pos..end]);
                pos = end;
            }
            Some(_) => return Err(malformed("unknown block")),
            None => return Err(malformed("missing trailer")),
        }
    }
}

/// Size in bytes of the color table announced by a packed field.
#[inline]
fn color_table_len(packed: u8) -> usize {
    if packed & 0x80 == 0 {
        0
    } else {
        3 << ((packed & 0x07) + 1)
    }
}

/// Return the offset just past the zero-length terminator of the
/// sub-block sequence starting at `pos`.
fn skip_sub_blocks(input: &[u8], mut pos: usize) -> Result<usize, TransformError> {
    loop {
        let size = *input
            .get(pos)
            .ok_or_else(|| malformed("truncated data sub-blocks"))?;
        pos += 1;
        if size == 0 {
            return Ok(pos);
        }
        pos += usize::from(size);
    }
}

/// `blocks` starts at the first sub-block size byte.
fn keep_extension(label: u8, blocks: &[u8]) -> bool {
    match label {
        COMMENT_LABEL => false,
        APPLICATION_LABEL => blocks
            .get(1..12)
            .is_some_and(|id| LOOP_APPLICATIONS.contains(&id)),
        _ => true,
    }
}

#[inline]
const fn malformed(reason: &'static str) -> TransformError {
    TransformError::malformed("gif", reason)
}
