//! Error taxonomy.
//!
//! | Error            | Scope     | Handling                                   |
//! |------------------|-----------|--------------------------------------------|
//! | `TransformError` | per file  | file skipped, logged, zero savings         |
//! | `TaskError`      | per file  | caught at the runner, never propagates     |
//! | `CacheError`     | per entry | treated as a miss / store skipped          |
//! | `InitError`      | run       | aborts the run with a non-zero exit        |

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::utils::exec::ExecError;

/// An external minifier or codec rejected its input.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{kind} parse error: {message}")]
    Parse { kind: &'static str, message: String },

    #[error("input is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("image codec error")]
    Image(#[from] image::ImageError),

    #[error("malformed {format}: {reason}")]
    Malformed {
        format: &'static str,
        reason: &'static str,
    },

    #[error("palette quantization failed")]
    Quantize(#[from] imagequant::Error),

    #[error("png encode error")]
    PngEncode(#[from] png::EncodingError),

    #[error("oxipng error")]
    Oxipng(#[from] oxipng::PngError),

    #[error("`{tool}` failed")]
    External {
        tool: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("`{tool}` timed out after {secs}s")]
    Timeout { tool: &'static str, secs: u64 },
}

impl TransformError {
    pub fn parse(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            message: message.into(),
        }
    }

    pub const fn malformed(format: &'static str, reason: &'static str) -> Self {
        Self::Malformed { format, reason }
    }
}

/// Failure of a single per-file task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("IO error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transform panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to read or write an image cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Unrecoverable failure while setting up the pipeline.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("site directory `{}` does not exist", .0.display())]
    SiteNotFound(PathBuf),

    #[error("`{0}` is required by the configured WebP encoder but was not found in PATH")]
    MissingTool(&'static str),

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_format_includes_sources() {
        let err = TaskError::io(
            "site/app.js",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = anyhow::Error::new(err);
        assert_eq!(format!("{:#}", err), "IO error on `site/app.js`: denied");
    }

    #[test]
    fn test_transform_error_is_transparent() {
        let err: TaskError = TransformError::parse("javascript", "unexpected token").into();
        assert_eq!(err.to_string(), "javascript parse error: unexpected token");
    }
}
