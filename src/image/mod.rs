//! Image transforms.
//!
//! # Modules
//!
//! - [`png`]: palette quantization and oxipng deflate optimization
//! - [`jpeg`]: marker segment stripping
//! - [`gif`]: extension block stripping
//! - [`svg`]: usvg re-serialization
//! - [`webp`]: WebP derivative encoding (libwebp / magick)

mod gif;
mod jpeg;
mod png;
mod svg;
mod webp;

pub use gif::GifStrip;
pub use jpeg::JpegStrip;
pub use self::png::{PngDeflate, PngQuantize};
pub use svg::SvgOptimize;
pub use self::webp::WebpEncode;
