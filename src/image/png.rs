//! PNG optimization: palette quantization, then deflate optimization.
//!
//! ```text
//! png → png-quantize (imagequant, quality 70-95) → oxipng (zopfli)
//! ```
//!
//! Quantization is lossy. When the palette cannot reach the minimum
//! quality the true-color pixels are kept and only oxipng runs. Animated
//! PNGs (an `acTL` chunk before the first `IDAT`) pass through both steps
//! untouched, since only the default frame would survive a decode.

use std::num::NonZeroU8;

use image::ImageFormat;
use imagequant::RGBA;
use oxipng::{Deflaters, Options, StripChunks};

use crate::error::TransformError;
use crate::transform::Transform;

const SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

const ZOPFLI_ITERATIONS: NonZeroU8 = NonZeroU8::MIN.saturating_add(14);

/// Lossy palette reduction.
#[derive(Debug, Clone, Copy)]
pub struct PngQuantize {
    /// Below this quality the image is left true-color.
    pub min_quality: u8,
    pub target_quality: u8,
    /// 1 (slowest, best) to 10 (fastest).
    pub speed: i32,
}

impl Default for PngQuantize {
    fn default() -> Self {
        Self {
            min_quality: 70,
            target_quality: 95,
            speed: 2,
        }
    }
}

impl Transform for PngQuantize {
    fn name(&self) -> &'static str {
        "png-quantize"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if is_animated(input)? {
            return Ok(input.to_vec());
        }
        let img = image::load_from_memory_with_format(input, ImageFormat::Png)?.to_rgba8();
        let (width, height) = img.dimensions();
        let pixels: Vec<RGBA> = img
            .pixels()
            .map(|p| RGBA::new(p[0], p[1], p[2], p[3]))
            .collect();

        let mut attr = imagequant::new();
        attr.set_speed(self.speed)?;
        attr.set_quality(self.min_quality, self.target_quality)?;
        let mut image = attr.new_image(pixels, width as usize, height as usize, 0.0)?;

        let mut result = match attr.quantize(&mut image) {
            Ok(result) => result,
            Err(imagequant::Error::QualityTooLow) => return Ok(input.to_vec()),
            Err(e) => return Err(e.into()),
        };
        result.set_dithering_level(1.0)?;
        let (palette, indexes) = result.remapped(&mut image)?;
        encode_indexed(width, height, &palette, &indexes)
    }
}

/// Lossless deflate and filter search.
#[derive(Debug, Clone)]
pub struct PngDeflate {
    options: Options,
}

impl Default for PngDeflate {
    fn default() -> Self {
        let mut options = Options::from_preset(6);
        options.strip = StripChunks::Safe;
        options.deflate = Deflaters::Zopfli {
            iterations: ZOPFLI_ITERATIONS,
        };
        Self { options }
    }
}

impl Transform for PngDeflate {
    fn name(&self) -> &'static str {
        "oxipng"
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if is_animated(input)? {
            return Ok(input.to_vec());
        }
        Ok(oxipng::optimize_from_memory(input, &self.options)?)
    }
}

/// Write an 8-bit indexed PNG. Trailing opaque palette entries are left
/// out of `tRNS`.
fn encode_indexed(
    width: u32,
    height: u32,
    palette: &[RGBA],
    indexes: &[u8],
) -> Result<Vec<u8>, TransformError> {
    let rgb: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    let mut alpha: Vec<u8> = palette.iter().map(|c| c.a).collect();
    while alpha.last() == Some(&u8::MAX) {
        alpha.pop();
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(rgb);
    if !alpha.is_empty() {
        encoder.set_trns(alpha);
    }
    let mut writer = encoder.write_header()?;
    writer.write_image_data(indexes)?;
    writer.finish()?;
    Ok(out)
}

/// Whether the stream declares an animation (`acTL` before the first `IDAT`).
fn is_animated(input: &[u8]) -> Result<bool, TransformError> {
    if !input.starts_with(SIGNATURE) {
        return Err(TransformError::malformed("png", "missing signature"));
    }
    let mut pos = SIGNATURE.len();
    while let Some(header) = pos.checked_add(8).and_then(|end| input.get(pos..end)) {
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        match &header[4..8] {
            b"acTL" => return Ok(true),
            b"IDAT" | b"IEND" => return Ok(false),
            _ => {}
        }
        // length + type + data + crc
        pos = pos.saturating_add(12).saturating_add(len);
    }
    Ok(false)
}
