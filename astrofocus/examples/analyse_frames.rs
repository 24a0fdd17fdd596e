//! Runs star detection over a directory of FITS frames and feeds the focus
//! curve solver with each frame's FOCUSPOS.
//!
//! ```text
//! cargo run --example analyse_frames -- <frame-dir> [config.yaml]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use astrofocus::{
    FocusConfig, FocusCurveSolver, Image, SampleKind, StarDetectionConfig, StarDetector,
    median_star_property,
};
use common::file_utils::fits_files;
use common::log_setup::setup_logging;
use common::{FileFormat, deserialize};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AnalysisConfig {
    detection: StarDetectionConfig,
    focus: FocusConfig,
    kind: SampleKind,
    snr_min: f32,
    max_stars: usize,
    max_iterations: usize,
    fit_iterations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            detection: StarDetectionConfig::default(),
            focus: FocusConfig::default(),
            kind: SampleKind::Hfd,
            snr_min: 10.0,
            max_stars: astrofocus::DEFAULT_MAX_STARS,
            max_iterations: astrofocus::DEFAULT_MAX_ITERATIONS,
            fit_iterations: 20,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let format = FileFormat::from_file_name(&path.to_string_lossy())?;
    deserialize(&text, format).with_context(|| format!("failed to parse {}", path.display()))
}

fn main() -> Result<()> {
    setup_logging("info", Path::new("logs"))?;

    let mut args = std::env::args().skip(1);
    let Some(dir) = args.next().map(PathBuf::from) else {
        bail!("usage: analyse_frames <frame-dir> [config.yaml]");
    };
    let config = load_config(args.next().map(PathBuf::from).as_deref())?;

    let mut frames = Vec::new();
    for path in fits_files(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
        match Image::from_file(&path) {
            Ok(image) => frames.push((path, image)),
            Err(err) => tracing::warn!(path = %path.display(), %err, "skipping frame"),
        }
    }
    frames.sort_by_key(|(_, image)| image.meta().focus_position);
    tracing::info!(frames = frames.len(), dir = %dir.display(), "loaded frames");

    let detector = StarDetector::from_config(config.detection.clone());
    let mut solver = FocusCurveSolver::new(config.kind, config.focus.clone());

    for (path, image) in &frames {
        let position = image.meta().focus_position;
        if position < 0 {
            tracing::warn!(path = %path.display(), "frame has no FOCUSPOS");
            continue;
        }

        let result = detector.find_stars(image, config.snr_min, config.max_stars, config.max_iterations);
        let metric = median_star_property(&result.stars, config.kind);
        let outcome = solver.sample_at(position, metric, result.stars.len(), config.fit_iterations);

        tracing::info!(
            path = %path.display(),
            position,
            stars = result.stars.len(),
            metric,
            background = result.diagnostics.background,
            noise = result.diagnostics.noise,
            "frame analysed"
        );

        if let Some(solution) = outcome.solution {
            println!(
                "best focus {} ({} {:.3}, error {:.4}, sampled {}..={})",
                solution.position.round() as i32,
                config.kind.name(),
                solution.curve.b,
                solution.error,
                outcome.min_position,
                outcome.max_position,
            );
        }
    }

    if frames.is_empty() {
        bail!("no FITS frames in {}", dir.display());
    }
    println!("final solver state: {:?}", solver.state());
    Ok(())
}
