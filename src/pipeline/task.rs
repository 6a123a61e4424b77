//! Per-file tasks, one per stage kind.
//!
//! Every task reads its file, runs the registered chain, asks the stage's
//! savings policy whether to commit, and writes only when it does. Errors
//! are returned to the runner; nothing here logs a failure itself.

use std::fs;
use std::path::{Path, PathBuf};

use super::policy::Outcome;
use super::{Pipeline, Stage};
use crate::asset::{AssetKind, ImageFormat};
use crate::error::{TaskError, TransformError};
use crate::html::rewrite_pictures;
use crate::transform::Slot;
use crate::utils::size::fmt_size;
use crate::{debug, log};

impl Pipeline {
    /// Process one file of `stage`.
    pub(super) fn process(&self, stage: Stage, path: &Path) -> Result<Outcome, TaskError> {
        match stage {
            Stage::Scripts => self.minify_code(stage, AssetKind::Script, path),
            Stage::Stylesheets => self.minify_code(stage, AssetKind::Stylesheet, path),
            Stage::Images => match AssetKind::from_path(path) {
                Some(AssetKind::Image(format)) => self.optimize_image(format, path),
                _ => Err(TransformError::malformed("image", "unrecognized extension").into()),
            },
            Stage::Webp => self.derive_webp(path),
            Stage::Markup => self.rewrite_markup(path),
        }
    }

    fn minify_code(&self, stage: Stage, kind: AssetKind, path: &Path) -> Result<Outcome, TaskError> {
        let original = read(path)?;
        let candidate = self.registry.apply(Slot::Asset(kind), &original)?;

        let outcome = Outcome::new(stage.policy(self.min_savings), original.len(), candidate.len());
        if outcome.committed() {
            write(path, &candidate)?;
        }
        self.report(stage, path, &outcome);
        Ok(outcome)
    }

    fn optimize_image(&self, format: ImageFormat, path: &Path) -> Result<Outcome, TaskError> {
        let original = read(path)?;
        let ext = extension(path, format.name());
        let slot = Slot::Asset(AssetKind::Image(format));

        let cached = self
            .cache
            .lookup_or_compute(&original, ext, |bytes| self.registry.apply(slot, bytes))?;
        if cached.hit {
            debug!("cache"; "hit {}", self.relative(path).display());
        }

        let outcome = Outcome::new(
            Stage::Images.policy(self.min_savings),
            original.len(),
            cached.bytes.len(),
        );
        if outcome.committed() {
            write(path, &cached.bytes)?;
            // The rewritten file must map to itself next run.
            self.cache.remember_optimal(&cached.bytes, ext);
        }
        self.report(Stage::Images, path, &outcome);
        Ok(outcome)
    }

    /// Write, refresh or remove the `.webp` sibling of a raster image.
    ///
    /// When several rasters share a stem (`a.jpg`, `a.png`) only the first
    /// in [`DERIVATIVE_SOURCES`] order owns `a.webp`; the others are skipped.
    fn derive_webp(&self, path: &Path) -> Result<Outcome, TaskError> {
        let source = read(path)?;
        let target = path.with_extension("webp");

        if let Some(owner) = derivative_owner(path)
            && !same_extension(&owner, path)
        {
            log!(
                "webp";
                "{}: skipped, {} is derived from {}",
                self.relative(path).display(),
                self.relative(&target).display(),
                self.relative(&owner).display()
            );
            return Ok(Outcome::unchanged(source.len()));
        }

        let candidate = self.registry.apply(Slot::WebpDerivative, &source)?;
        let outcome = Outcome::new(
            Stage::Webp.policy(self.min_savings),
            source.len(),
            candidate.len(),
        );
        if outcome.committed() {
            if fs::read(&target).is_ok_and(|existing| existing == candidate) {
                debug!("webp"; "{} up to date", self.relative(&target).display());
                return Ok(Outcome::unchanged(source.len()));
            }
            write(&target, &candidate)?;
            self.report(Stage::Webp, &target, &outcome);
        } else if target.is_file() {
            fs::remove_file(&target).map_err(|e| TaskError::io(&target, e))?;
            log!("webp"; "{}: removed stale derivative", self.relative(&target).display());
        } else {
            self.report(Stage::Webp, path, &outcome);
        }
        Ok(outcome)
    }

    /// Wrap eligible images in `<picture>`, then minify. Not savings-gated.
    fn rewrite_markup(&self, path: &Path) -> Result<Outcome, TaskError> {
        let original = read(path)?;
        let html = std::str::from_utf8(&original).map_err(TransformError::from)?;

        let (rewritten, wrapped) = rewrite_pictures(html, path, &self.site)?;
        let candidate = self
            .registry
            .apply(Slot::Asset(AssetKind::Markup), rewritten.as_bytes())?;

        if candidate == original {
            debug!("html"; "{} unchanged", self.relative(path).display());
            return Ok(Outcome::unchanged(original.len()));
        }

        write(path, &candidate)?;
        let outcome = Outcome::new(
            Stage::Markup.policy(self.min_savings),
            original.len(),
            candidate.len(),
        );
        if wrapped > 0 {
            log!("html"; "{}: {} wrapped in <picture>", self.relative(path).display(), wrapped);
        }
        self.report(Stage::Markup, path, &outcome);
        Ok(outcome)
    }

    /// Per-file status line.
    fn report(&self, stage: Stage, path: &Path, outcome: &Outcome) {
        let rel = self.relative(path).display();
        if outcome.committed() {
            log!(
                stage.name();
                "{}: {} → {} (saved {})",
                rel,
                fmt_size(outcome.original),
                fmt_size(outcome.candidate),
                fmt_size(outcome.saved())
            );
        } else if outcome.candidate < outcome.original {
            let diff = outcome.original - outcome.candidate;
            log!(stage.name(); "{}: skipped, saving {} below threshold", rel, fmt_size(diff));
        } else {
            log!(stage.name(); "{}: skipped, no savings", rel);
        }
    }

    pub(super) fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.site).unwrap_or(path)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TaskError> {
    fs::read(path).map_err(|e| TaskError::io(path, e))
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    fs::write(path, bytes).map_err(|e| TaskError::io(path, e))
}

/// Raster extensions that can own a `.webp` sibling, in precedence order.
const DERIVATIVE_SOURCES: [&str; 3] = ["jpg", "jpeg", "png"];

/// The existing raster that owns the `.webp` sibling of `path`.
fn derivative_owner(path: &Path) -> Option<PathBuf> {
    DERIVATIVE_SOURCES
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn same_extension(a: &Path, b: &Path) -> bool {
    match (a.extension(), b.extension()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn extension<'a>(path: &'a Path, fallback: &'a str) -> &'a str {
    path.extension().and_then(|e| e.to_str()).unwrap_or(fallback)
}
