//! Configuration section definitions.
//!
//! Each module corresponds to a section in `sitetrim.toml`:
//!
//! | Module | TOML Section | Purpose                              |
//! |--------|--------------|--------------------------------------|
//! | `html` | `[html]`     | Picture rewrite and HTML minify      |
//! | `webp` | `[webp]`     | WebP derivative generation           |

mod html;
mod webp;

pub use html::HtmlConfig;
pub use webp::{WebpConfig, WebpEncoder};
