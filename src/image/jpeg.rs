//! Lossless JPEG metadata stripping.
//!
//! Walks the marker segments up to the start of scan and drops the ones
//! that do not affect decoding or display:
//!
//! | Marker      | Kept when                         |
//! |-------------|-----------------------------------|
//! | APP0        | always (JFIF)                     |
//! | APP1        | `Exif` payload (orientation)      |
//! | APP2        | `ICC_PROFILE` payload             |
//! | APP14       | `Adobe` payload (color transform) |
//! | APP3-APP15  | never                             |
//! | COM         | never                             |
//!
//! Entropy-coded data after SOS is copied verbatim.

use crate::error::TransformError;
use crate::transform::Transform;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;

pub struct JpegStrip;

impl Transform for JpegStrip {
    fn name(&self) -> &'static str {
        "jpeg-strip"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        strip_jpeg_metadata(input)
    }
}

/// Remove non-essential marker segments from a JPEG stream.
pub fn strip_jpeg_metadata(input: &[u8]) -> Result<Vec<u8>, TransformError> {
    if !input.starts_with(&[0xFF, SOI]) {
        return Err(malformed("missing SOI marker"));
    }

    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&[0xFF, SOI]);
    let mut pos = 2;

    loop {
        if input.get(pos) != Some(&0xFF) {
            return Err(malformed("expected marker"));
        }
        // Fill bytes: any number of 0xFF may precede the marker code.
        while input.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *input
            .get(pos + 1)
            .ok_or_else(|| malformed("truncated marker"))?;

        match marker {
            EOI => {
                out.extend_from_slice(&[0xFF, EOI]);
                return Ok(out);
            }
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&[0xFF, marker]);
                pos += 2;
                continue;
            }
            _ => {}
        }

        let len = match input.get(pos + 2..pos + 4) {
            Some(&[hi, lo]) => usize::from(u16::from_be_bytes([hi, lo])),
            _ => return Err(malformed("truncated segment length")),
        };
        if len < 2 {
            return Err(malformed("invalid segment length"));
        }
        let end = pos + 2 + len;
        if end > input.len() {
            return Err(malformed("truncated segment"));
        }

        if marker == SOS {
            out.extend_from_slice(&input[pos..]);
            return Ok(out);
        }

        if keep_segment(marker, &input[pos + 4..end]) {
            out.extend_from_slice(&input[pos..end]);
        }
        pos = end;
    }
}

fn keep_segment(marker: u8, payload: &[u8]) -> bool {
    match marker {
        COM => false,
        0xE0 => true,
        0xE1 => payload.starts_with(b"Exif\0"),
        0xE2 => payload.starts_with(b"ICC_PROFILE\0"),
        0xEE => payload.starts_with(b"Adobe"),
        0xE3..=0xEF => false,
        _ => true,
    }
}

#[inline]
const fn malformed(reason: &'static str) -> TransformError {
    TransformError::malformed("jpeg", reason)
}
