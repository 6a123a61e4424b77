//! `[webp]` section configuration.
//!
//! Controls generation of `.webp` derivatives next to raster images.
//!
//! # Example
//!
//! ```toml
//! [webp]
//! enable = true               # Generate WebP siblings for .jpg/.jpeg/.png
//! encoder = "builtin"         # Encoder backend: builtin | magick
//! quality = 85                # Lossy quality (1-100)
//! timeout_secs = 60           # Kill an external encoder after this long
//! ```

use serde::{Deserialize, Serialize};

/// WebP encoder backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WebpEncoder {
    /// In-process libwebp encoder.
    #[default]
    Builtin,
    /// Use ImageMagick (`magick` command).
    Magick,
}

impl WebpEncoder {
    /// Name of the external program this backend needs, if any.
    pub const fn program(self) -> Option<&'static str> {
        match self {
            Self::Builtin => None,
            Self::Magick => Some("magick"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebpConfig {
    /// Generate WebP derivatives.
    pub enable: bool,

    /// Encoder backend.
    pub encoder: WebpEncoder,

    /// Quality for lossy encoding (1-100).
    pub quality: u8,

    /// Timeout for the external encoder, in seconds.
    pub timeout_secs: u64,
}

impl Default for WebpConfig {
    fn default() -> Self {
        Self {
            enable: true,
            encoder: WebpEncoder::Builtin,
            quality: 85,
            timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webp_defaults() {
        let config: WebpConfig = toml::from_str("").unwrap();
        assert!(config.enable);
        assert_eq!(config.encoder, WebpEncoder::Builtin);
        assert_eq!(config.quality, 85);
    }

    #[test]
    fn test_webp_encoder_parse() {
        let config: WebpConfig = toml::from_str(r#"encoder = "magick""#).unwrap();
        assert_eq!(config.encoder, WebpEncoder::Magick);
        assert_eq!(config.encoder.program(), Some("magick"));
        assert_eq!(WebpEncoder::Builtin.program(), None);
    }
}
