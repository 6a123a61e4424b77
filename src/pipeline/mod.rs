//! Stage sequencer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐
//! │ scripts  │→ │  styles  │→ │  images  │→ │   webp   │→ │  markup  │
//! └──────────┘  └──────────┘  └──────────┘  └──────────┘  └──────────┘
//!      each stage: scan → Runner fan-out (bounded) → join → summary
//! ```
//!
//! Stages run strictly one after another. The markup stage reads the `.webp`
//! files the webp stage left on disk, so it must not start before every webp
//! task has settled; [`Runner::run`] returning is that guarantee.

mod policy;
mod runner;
mod stats;
mod task;

use policy::SavingsPolicy;
use runner::Runner;
use stats::{Report, StageReport, StageTotals};

use std::path::PathBuf;

use crate::asset::{AssetKind, scan_assets};
use crate::cache::ImageCache;
use crate::config::TrimConfig;
use crate::debug;
use crate::error::InitError;
use crate::transform::Registry;

/// One pass over one asset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Scripts,
    Stylesheets,
    Images,
    /// `.webp` siblings of the raster images.
    Webp,
    Markup,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 5] = [
        Self::Scripts,
        Self::Stylesheets,
        Self::Images,
        Self::Webp,
        Self::Markup,
    ];

    /// Log prefix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scripts => "js",
            Self::Stylesheets => "css",
            Self::Images => "img",
            Self::Webp => "webp",
            Self::Markup => "html",
        }
    }

    pub const fn policy(self, min_savings: u64) -> SavingsPolicy {
        match self {
            Self::Scripts | Self::Stylesheets => SavingsPolicy::AnySavings,
            Self::Images | Self::Webp => SavingsPolicy::Threshold(min_savings),
            Self::Markup => SavingsPolicy::Unconditional,
        }
    }

    /// Whether the stage produces new files from sources another stage owns.
    pub const fn is_derivative(self) -> bool {
        matches!(self, Self::Webp)
    }

    pub const fn accepts(self, kind: AssetKind) -> bool {
        match (self, kind) {
            (Self::Scripts, AssetKind::Script)
            | (Self::Stylesheets, AssetKind::Stylesheet)
            | (Self::Images, AssetKind::Image(_))
            | (Self::Markup, AssetKind::Markup) => true,
            (Self::Webp, AssetKind::Image(format)) => format.has_webp_derivative(),
            _ => false,
        }
    }

    const fn commit_verb(self) -> &'static str {
        match self {
            Self::Webp => "derived",
            _ => "rewritten",
        }
    }
}

/// Everything resolved before the first stage runs.
pub struct Pipeline {
    site: PathBuf,
    /// Cache directory, when it lives inside the site.
    exclude: Option<PathBuf>,
    min_savings: u64,
    stages: Vec<Stage>,
    runner: Runner,
    registry: Registry,
    cache: ImageCache,
}

impl Pipeline {
    /// Resolve the transform registry, worker pool and cache for `config`.
    pub fn new(config: &TrimConfig) -> Result<Self, InitError> {
        ensure_site(config)?;
        Self::with_registry(config, Registry::resolve(config)?)
    }

    /// Like [`Pipeline::new`] with an explicit registry.
    pub fn with_registry(config: &TrimConfig, registry: Registry) -> Result<Self, InitError> {
        ensure_site(config)?;

        let stages = Stage::ALL
            .into_iter()
            .filter(|stage| match stage {
                Stage::Webp => config.webp.enable,
                Stage::Markup => config.html.enable,
                _ => true,
            })
            .collect();

        Ok(Self {
            site: config.site.clone(),
            exclude: config
                .cache_dir
                .starts_with(&config.site)
                .then(|| config.cache_dir.clone()),
            min_savings: config.min_savings_bytes,
            stages,
            runner: Runner::new(config.effective_concurrency())?,
            registry,
            cache: ImageCache::open(&config.cache_dir),
        })
    }

    /// Run every enabled stage in order and return the settled reports.
    pub fn run(&self) -> Report {
        debug!(
            "pipeline";
            "{} with {} workers",
            self.site.display(),
            self.runner.concurrency()
        );

        let mut report = Report::default();
        for &stage in &self.stages {
            let stage_report = self.run_stage(stage);
            stage_report.log();
            report.push(stage_report);
        }
        report
    }

    /// Run one stage to completion.
    pub fn run_stage(&self, stage: Stage) -> StageReport {
        let files = scan_assets(&self.site, self.exclude.as_deref(), |kind| {
            stage.accepts(kind)
        });
        let totals = StageTotals::default();
        let settled = self
            .runner
            .run(&files, &totals, |path| self.process(stage, path));
        debug!(
            stage.name();
            "{} settled, {} failed",
            settled.outcomes.len(),
            settled.failed.len()
        );

        StageReport {
            stage,
            totals: totals.snapshot(),
            failed: settled.failed.len(),
        }
    }
}

fn ensure_site(config: &TrimConfig) -> Result<(), InitError> {
    if config.site.is_dir() {
        Ok(())
    } else {
        Err(InitError::SiteNotFound(config.site.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ImageFormat;
    use crate::error::TransformError;
    use crate::transform::{Slot, Transform};
    use image::codecs::jpeg::JpegEncoder;
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Site {
        _dir: TempDir,
        config: TrimConfig,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let site = dir.path().join("site");
            fs::create_dir_all(&site).unwrap();
            let config = TrimConfig {
                root: dir.path().to_path_buf(),
                site,
                cache_dir: dir.path().join("cache"),
                concurrency: 4,
                ..TrimConfig::default()
            };
            Self { _dir: dir, config }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.config.site.join(rel)
        }

        fn write(&self, rel: &str, bytes: impl AsRef<[u8]>) {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }

        fn read(&self, rel: &str) -> Vec<u8> {
            fs::read(self.path(rel)).unwrap()
        }
    }

    /// Flat-color PNG written with the weakest compression.
    fn loose_png(size: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(size, size, Rgba([30, 60, 90, 255]));
        let mut out = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter);
        DynamicImage::ImageRgba8(img).write_with_encoder(encoder).unwrap();
        out
    }

    /// Smooth photo-like gradient saved as a high quality JPEG.
    fn photo_jpeg(size: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(size, size, |x, y| {
            Rgb([x as u8, y as u8, ((x + y) / 2) as u8])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 95)
            .encode_image(&img)
            .unwrap();
        out
    }

    /// Keeps the first four bytes.
    struct Head;

    impl Transform for Head {
        fn name(&self) -> &'static str {
            "head"
        }

        fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
            Ok(input[..4].to_vec())
        }
    }

    /// Trims trailing whitespace; rejects inputs containing `BROKEN`.
    struct TrimOrFail;

    impl Transform for TrimOrFail {
        fn name(&self) -> &'static str {
            "trim-or-fail"
        }

        fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
            if input.windows(6).any(|w| w == b"BROKEN") {
                return Err(TransformError::parse("javascript", "unexpected token"));
            }
            Ok(input.trim_ascii_end().to_vec())
        }
    }

    /// Produces a candidate larger than its input.
    struct Grow;

    impl Transform for Grow {
        fn name(&self) -> &'static str {
            "grow"
        }

        fn apply(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
            let mut out = input.to_vec();
            out.extend_from_slice(&[0; 64]);
            Ok(out)
        }
    }

    #[test]
    fn test_missing_site_is_fatal() {
        let mut site = Site::new();
        site.config.site = site.config.site.join("nope");
        assert!(matches!(
            Pipeline::new(&site.config),
            Err(InitError::SiteNotFound(_))
        ));
    }

    #[test]
    fn test_stage_selection() {
        let mut site = Site::new();
        assert_eq!(Pipeline::new(&site.config).unwrap().stages, Stage::ALL);

        site.config.webp.enable = false;
        site.config.html.enable = false;
        assert_eq!(
            Pipeline::new(&site.config).unwrap().stages,
            [Stage::Scripts, Stage::Stylesheets, Stage::Images]
        );
    }

    #[test]
    fn test_stage_accepts() {
        assert!(Stage::Webp.accepts(AssetKind::Image(ImageFormat::Jpeg)));
        assert!(!Stage::Webp.accepts(AssetKind::Image(ImageFormat::Svg)));
        assert!(Stage::Images.accepts(AssetKind::Image(ImageFormat::Gif)));
        assert!(!Stage::Scripts.accepts(AssetKind::Stylesheet));
    }

    #[test]
    fn test_one_bad_file_does_not_stop_the_stage() {
        let site = Site::new();
        site.write("a.js", "let a = 1;   \n\n");
        site.write("b.js", "BROKEN(   \n");
        site.write("c/d.js", "let d = 2;\n");

        let registry =
            Registry::default().with(Slot::Asset(AssetKind::Script), vec![Box::new(TrimOrFail)]);
        let pipeline = Pipeline::with_registry(&site.config, registry).unwrap();
        let report = pipeline.run_stage(Stage::Scripts);

        assert_eq!(report.failed, 1);
        assert_eq!(report.totals.files, 2);
        assert_eq!(report.totals.saved, 6);
        assert_eq!(site.read("a.js"), b"let a = 1;");
        assert_eq!(site.read("b.js"), b"BROKEN(   \n");
    }

    #[test]
    fn test_code_stages_converge() {
        let site = Site::new();
        site.write("app.js", "function add(first, second) {\n    return first + second;\n}\nconsole.log(add(1, 2));\n");
        site.write("style.css", "body {\n    color: #ff0000;\n    margin: 0px;\n}\n");

        let pipeline = Pipeline::new(&site.config).unwrap();
        let first = pipeline.run();
        assert!(first.stage(Stage::Scripts).unwrap().totals.saved > 0);
        assert!(first.stage(Stage::Stylesheets).unwrap().totals.saved > 0);

        let js = site.read("app.js");
        let css = site.read("style.css");
        let second = pipeline.run();
        assert_eq!(second.stage(Stage::Scripts).unwrap().totals.saved, 0);
        assert_eq!(second.stage(Stage::Stylesheets).unwrap().totals.saved, 0);
        assert_eq!(site.read("app.js"), js);
        assert_eq!(site.read("style.css"), css);
    }

    #[test]
    fn test_full_run_is_idempotent() {
        let mut site = Site::new();
        site.config.min_savings_bytes = 0;
        site.write("img/a.jpg", photo_jpeg(256));
        site.write("img/b.png", loose_png(256));
        site.write(
            "index.html",
            "<!DOCTYPE html>\n<html>\n  <body>\n    <img src=\"img/a.jpg\" alt=\"a\">\n    <img src=\"https://cdn.example/c.png\">\n  </body>\n</html>\n",
        );

        let pipeline = Pipeline::new(&site.config).unwrap();
        let first = pipeline.run();
        assert_eq!(first.failed(), 0);
        assert_eq!(first.stage(Stage::Images).unwrap().totals.committed, 1);
        assert!(first.stage(Stage::Webp).unwrap().totals.committed >= 1);
        assert!(site.path("img/a.webp").is_file());

        let html = String::from_utf8(site.read("index.html")).unwrap();
        let unquoted = html.replace('"', "");
        assert!(
            unquoted.contains("<picture><source srcset=img/a.webp type=image/webp><img src=img/a.jpg alt=a></picture>"),
            "{html}"
        );
        assert!(unquoted.contains("<img src=https://cdn.example/c.png>"), "{html}");

        let jpg = site.read("img/a.jpg");
        let png = site.read("img/b.png");
        let webp = site.read("img/a.webp");
        let second = pipeline.run();
        assert_eq!(second.failed(), 0);
        for stage in Stage::ALL {
            assert_eq!(second.stage(stage).unwrap().totals.committed, 0, "{}", stage.name());
        }
        assert_eq!(second.overall().saved, 0);
        assert_eq!(site.read("img/a.jpg"), jpg);
        assert_eq!(site.read("img/b.png"), png);
        assert_eq!(site.read("img/a.webp"), webp);
        assert_eq!(site.read("index.html"), html.as_bytes());
    }

    #[test]
    fn test_shared_stem_has_one_derivative_owner() {
        let site = Site::new();
        site.write("a.png", [b'P'; 400]);
        site.write("a.jpg", [b'J'; 400]);

        let registry = Registry::default().with(Slot::WebpDerivative, vec![Box::new(Head)]);
        let pipeline = Pipeline::with_registry(&site.config, registry).unwrap();
        let report = pipeline.run_stage(Stage::Webp);

        assert_eq!(report.failed, 0);
        assert_eq!(report.totals.files, 2);
        assert_eq!(report.totals.committed, 1);
        assert_eq!(site.read("a.webp"), b"JJJJ");
    }

    #[test]
    fn test_stale_webp_is_removed() {
        let site = Site::new();
        site.write("a.png", loose_png(8));
        site.write("a.webp", "stale");

        let registry = Registry::default().with(Slot::WebpDerivative, vec![Box::new(Grow)]);
        let pipeline = Pipeline::with_registry(&site.config, registry).unwrap();
        let report = pipeline.run_stage(Stage::Webp);

        assert_eq!(report.totals.committed, 0);
        assert!(!site.path("a.webp").exists());
        assert!(site.path("a.png").exists());
    }

    #[test]
    fn test_cache_inside_site_is_not_scanned() {
        let mut site = Site::new();
        site.config.cache_dir = site.path(".cache/images");
        site.write("a.gif", "GIF89a");
        site.write(".cache/images/0123.png", "cached");

        let registry = Registry::default();
        let pipeline = Pipeline::with_registry(&site.config, registry).unwrap();
        let report = pipeline.run_stage(Stage::Images);
        assert_eq!(report.totals.files, 1);
    }

    #[test]
    fn test_html_without_images_is_minified() {
        let mut site = Site::new();
        site.config.webp.enable = false;
        site.write("page.html", "<div>\n  <p>hello   world</p>\n</div>\n");

        let pipeline = Pipeline::new(&site.config).unwrap();
        let report = pipeline.run_stage(Stage::Markup);
        assert_eq!(report.totals.committed, 1);
        let html = String::from_utf8(site.read("page.html")).unwrap();
        assert!(html.contains("<p>hello world</p>"), "{html}");
        assert!(!html.contains('\n'), "{html}");
    }

    #[test]
    fn test_image_below_threshold_is_left_alone() {
        let site = Site::new();
        let original = loose_png(4);
        site.write("tiny.png", &original);

        let pipeline = Pipeline::new(&site.config).unwrap();
        let report = pipeline.run_stage(Stage::Images);
        assert_eq!(report.totals.committed, 0);
        assert_eq!(site.read("tiny.png"), original);
    }

    #[test]
    fn test_relative_paths() {
        let site = Site::new();
        let pipeline = Pipeline::new(&site.config).unwrap();
        let inner = site.path("a/b.js");
        assert_eq!(pipeline.relative(&inner), Path::new("a/b.js"));
    }
}
