//! HTML stage helpers: `<picture>` rewriting and minification.

mod minify;
mod picture;

pub use minify::HtmlMinify;
pub use picture::rewrite_pictures;
