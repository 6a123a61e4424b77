//! Transform registry.
//!
//! Every external minifier/codec is wrapped as a [`Transform`] step
//! (`bytes -> bytes`). The registry maps each slot (asset kind, image
//! sub-kind, or the WebP derivative) to an ordered chain of steps and is
//! resolved once, before any stage runs.
//!
//! ```text
//! script      → oxc
//! stylesheet  → lightningcss
//! png         → png-quantize → oxipng
//! jpeg        → jpeg-strip
//! gif         → gif-strip
//! svg         → usvg
//! webp        → libwebp | magick
//! markup      → minify-html
//! ```

use rustc_hash::FxHashMap;

use crate::asset::minify::{CssMinify, JsMinify};
use crate::asset::{AssetKind, ImageFormat};
use crate::config::TrimConfig;
use crate::error::{InitError, TransformError};
use crate::html::HtmlMinify;
use crate::image::{GifStrip, JpegStrip, PngDeflate, PngQuantize, SvgOptimize, WebpEncode};

/// A single opaque transform step.
pub trait Transform: Send + Sync {
    /// Short name for log output.
    fn name(&self) -> &'static str;

    /// Transform `input` into a candidate.
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Ordered list of steps; each step consumes the previous step's output.
pub type Chain = Vec<Box<dyn Transform>>;

/// Registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Asset(AssetKind),
    /// `.webp` sibling of a raster image.
    WebpDerivative,
}

/// Run every step of `chain` in order. An empty chain returns the input.
pub fn apply_chain(chain: &[Box<dyn Transform>], input: &[u8]) -> Result<Vec<u8>, TransformError> {
    let Some((first, rest)) = chain.split_first() else {
        return Ok(input.to_vec());
    };
    let mut output = first.apply(input)?;
    for step in rest {
        output = step.apply(&output)?;
    }
    Ok(output)
}

/// Static mapping from slot to transform chain.
#[derive(Default)]
pub struct Registry {
    chains: FxHashMap<Slot, Chain>,
}

impl Registry {
    /// Build the registry for `config`.
    ///
    /// Fails when a configured external program is not installed.
    pub fn resolve(config: &TrimConfig) -> Result<Self, InitError> {
        let registry = Self::default()
            .with(Slot::Asset(AssetKind::Script), vec![Box::new(JsMinify)])
            .with(Slot::Asset(AssetKind::Stylesheet), vec![Box::new(CssMinify)])
            .with(
                image(ImageFormat::Png),
                vec![Box::new(PngQuantize::default()), Box::new(PngDeflate::default())],
            )
            .with(image(ImageFormat::Jpeg), vec![Box::new(JpegStrip)])
            .with(image(ImageFormat::Gif), vec![Box::new(GifStrip)])
            .with(image(ImageFormat::Svg), vec![Box::new(SvgOptimize::default())]);

        let registry = if config.html.minify {
            registry.with(Slot::Asset(AssetKind::Markup), vec![Box::new(HtmlMinify::default())])
        } else {
            registry.with(Slot::Asset(AssetKind::Markup), Vec::new())
        };

        if !config.webp.enable {
            return Ok(registry);
        }
        if let Some(program) = config.webp.encoder.program()
            && which::which(program).is_err()
        {
            return Err(InitError::MissingTool(program));
        }
        Ok(registry.with(
            Slot::WebpDerivative,
            vec![Box::new(WebpEncode::from_config(&config.webp))],
        ))
    }

    /// Register (or replace) the chain for `slot`.
    pub fn with(mut self, slot: Slot, chain: Chain) -> Self {
        self.chains.insert(slot, chain);
        self
    }

    /// Chain for `slot`; unregistered slots have an empty chain.
    pub fn chain(&self, slot: Slot) -> &[Box<dyn Transform>] {
        self.chains.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run the chain registered for `slot`.
    pub fn apply(&self, slot: Slot, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        apply_chain(self.chain(slot), input)
    }
}

#[inline]
const fn image(format: ImageFormat) -> Slot {
    Slot::Asset(AssetKind::Image(format))
}
