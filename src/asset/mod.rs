//! Site assets: kinds, traversal, and code minification.

mod kind;
pub mod minify;
mod scan;

pub use kind::{AssetKind, ImageFormat};
pub use scan::scan_assets;
