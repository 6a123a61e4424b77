//! WebP derivative encoding.
//!
//! - `builtin`: lossy libwebp encode at the configured quality, in-process
//! - `magick`: lossy encode at the configured quality via ImageMagick

use std::time::Duration;

use image::DynamicImage;

use crate::config::{WebpConfig, WebpEncoder};
use crate::error::TransformError;
use crate::transform::Transform;
use crate::utils::exec::{Cmd, ExecError};

#[derive(Debug, Clone)]
pub struct WebpEncode {
    encoder: WebpEncoder,
    quality: u8,
    timeout: Duration,
}

impl WebpEncode {
    pub fn from_config(config: &WebpConfig) -> Self {
        Self {
            encoder: config.encoder,
            quality: config.quality,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Transform for WebpEncode {
    fn name(&self) -> &'static str {
        match self.encoder {
            WebpEncoder::Builtin => "libwebp",
            WebpEncoder::Magick => "magick",
        }
    }

    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        match self.encoder {
            WebpEncoder::Builtin => encode_lossy(input, self.quality),
            WebpEncoder::Magick => self.encode_magick(input),
        }
    }
}

impl WebpEncode {
    fn encode_magick(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let quality = self.quality.to_string();
        Cmd::new("magick")
            .args(["-", "-quality", quality.as_str(), "webp:-"])
            .stdin(input)
            .timeout(self.timeout)
            .run()
            .map_err(|e| match e {
                ExecError::Timeout { limit, .. } => TransformError::Timeout {
                    tool: "magick",
                    secs: limit.as_secs(),
                },
                source => TransformError::External {
                    tool: "magick",
                    source,
                },
            })
    }
}

/// Encode any decodable raster as lossy WebP at `quality` (1-100).
pub fn encode_lossy(input: &[u8], quality: u8) -> Result<Vec<u8>, TransformError> {
    let img = image::load_from_memory(input)?;
    // libwebp only takes 8-bit RGB(A).
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let encoder = webp::Encoder::from_image(&img)
        .map_err(|reason| TransformError::parse("webp", reason))?;
    Ok(encoder.encode(f32::from(quality)).to_vec())
}
