//! Asset kind definitions.

use std::path::Path;

/// Image sub-kind, selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageFormat {
    /// Rasters that get a `.webp` derivative.
    pub const fn has_webp_derivative(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Svg => "svg",
        }
    }
}

/// Kind of site asset, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Script,
    Stylesheet,
    Image(ImageFormat),
    Markup,
}

impl AssetKind {
    /// Infer kind from extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext {
            "js" => Self::Script,
            "css" => Self::Stylesheet,
            "html" => Self::Markup,
            "png" => Self::Image(ImageFormat::Png),
            "jpg" | "jpeg" => Self::Image(ImageFormat::Jpeg),
            "gif" => Self::Image(ImageFormat::Gif),
            "svg" => Self::Image(ImageFormat::Svg),
            _ => return None,
        };
        Some(kind)
    }
}
