//! Tests for the star detection pipeline.

use common::buffer2::Buffer2;
use glam::DVec2;

use super::background::estimate_background;
use super::labeling::connected_components;
use super::*;
use crate::image::{Image, SensorType};
use crate::testing::{
    StarField, SyntheticStar, four_level_field, init_tracing, real_frame, real_frame_in,
};

fn star_bits(stars: &[Star]) -> Vec<[u64; 5]> {
    stars
        .iter()
        .map(|s| {
            [
                s.pos.x.to_bits(),
                s.pos.y.to_bits(),
                s.snr.to_bits() as u64,
                s.hfd.to_bits() as u64,
                s.fwhm.to_bits() as u64,
            ]
        })
        .collect()
}

fn nearest(stars: &[Star], target: DVec2) -> Option<&Star> {
    stars
        .iter()
        .min_by(|a, b| a.pos.distance(target).total_cmp(&b.pos.distance(target)))
}

// ============================================================================
// Counts and ordering
// ============================================================================

#[test]
fn test_counts_follow_snr_levels() {
    init_tracing();
    let image = four_level_field().image();

    assert_eq!(find_stars(&image, 10.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).len(), 9);
    assert_eq!(find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).len(), 6);
    assert_eq!(find_stars(&image, 50.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).len(), 3);
}

#[test]
fn test_stars_meet_snr_min_and_are_sorted() {
    let image = four_level_field().image();
    let stars = find_stars(&image, 10.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    assert!(stars.iter().all(|s| s.snr >= 10.0));
    assert!(stars.windows(2).all(|w| w[0].snr >= w[1].snr));
}

#[test]
fn test_raising_snr_min_never_adds_stars() {
    let image = four_level_field().image();
    let mut previous: Option<Vec<Star>> = None;

    for snr_min in [0.0, 5.0, 10.0, 15.0, 20.0, 30.0, 50.0, 80.0, 200.0] {
        let stars = find_stars(&image, snr_min, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
        if let Some(previous) = &previous {
            assert!(stars.len() <= previous.len(), "snr_min {snr_min}");
            for star in &stars {
                assert!(
                    previous.iter().any(|p| p.pos == star.pos),
                    "star at {} appeared at snr_min {snr_min}",
                    star.pos
                );
            }
        }
        previous = Some(stars);
    }
}

#[test]
fn test_detection_is_deterministic() {
    let image = four_level_field().image();
    let first = find_stars(&image, 5.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    let second = find_stars(&image, 5.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    assert_eq!(star_bits(&first), star_bits(&second));
}

#[test]
fn test_max_stars_keeps_brightest() {
    let image = four_level_field().image();
    let all = find_stars(&image, 10.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    let top = find_stars(&image, 10.0, 4, DEFAULT_MAX_ITERATIONS);

    assert_eq!(top.len(), 4);
    assert_eq!(star_bits(&top), star_bits(&all[..4]));
    assert!(find_stars(&image, 10.0, 0, DEFAULT_MAX_ITERATIONS).is_empty());
}

#[test]
fn test_zero_iterations_still_runs_one_pass() {
    let image = four_level_field().image();
    let result = StarDetector::new().find_stars(&image, 10.0, DEFAULT_MAX_STARS, 0);
    assert_eq!(result.diagnostics.iterations, 1);
    assert_eq!(result.stars.len(), 9);
}

// ============================================================================
// Degenerate frames
// ============================================================================

#[test]
fn test_noise_only_frame_has_no_stars() {
    let image = StarField::new(128, 128).image();
    assert!(find_stars(&image, 10.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).is_empty());
}

#[test]
fn test_flat_frame_has_no_stars() {
    let image = StarField::new(64, 64).with_background(1000.0, 0.0).image();
    let result = StarDetector::new().find_stars(&image, 5.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    assert!(result.stars.is_empty());
    assert_eq!(result.diagnostics.pixels_above_threshold, 0);
    assert!(result.diagnostics.noise > 0.0);
}

#[test]
fn test_border_star_is_rejected() {
    let image = StarField::new(96, 96)
        .with_star(SyntheticStar::new(1.0, 48.0, 2.0, 800.0))
        .with_star(SyntheticStar::new(60.0, 40.0, 2.0, 800.0))
        .image();
    let result = StarDetector::new().find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    assert!(result.diagnostics.rejected_edge >= 1);
    assert_eq!(result.stars.len(), 1);
    assert!(result.stars[0].pos.distance(DVec2::new(60.0, 40.0)) < 0.2);
}

#[test]
fn test_saturated_star_rejected_by_default() {
    let image = StarField::new(96, 96)
        .with_star(SyntheticStar::new(48.0, 48.0, 2.0, 70_000.0))
        .image();
    let result = StarDetector::new().find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    assert!(result.stars.is_empty());
    assert_eq!(result.diagnostics.rejected_saturated, 1);
}

#[test]
fn test_saturated_star_kept_when_allowed_but_unmeasurable() {
    let image = StarField::new(96, 96)
        .with_star(SyntheticStar::new(48.0, 48.0, 2.0, 70_000.0))
        .image();
    let detector = StarDetector::from_config(StarDetectionConfig {
        max_saturated_pixels: usize::MAX,
        ..Default::default()
    });
    let stars = detector
        .find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS)
        .stars;

    assert_eq!(stars.len(), 1);
    assert!(stars[0].hfd.is_nan());
    assert!(stars[0].fwhm.is_nan());
    assert!(!stars[0].is_measurable());
    assert_eq!(stars[0].peak, 65535.0);
}

// ============================================================================
// Measurement accuracy
// ============================================================================

#[test]
fn test_centroids_are_subpixel_accurate() {
    let truths = [
        DVec2::new(40.3, 50.7),
        DVec2::new(90.5, 30.25),
        DVec2::new(60.8, 100.1),
    ];
    let mut field = StarField::new(140, 140);
    for t in &truths {
        field = field.with_star(SyntheticStar::new(t.x as f32, t.y as f32, 2.0, 800.0));
    }
    let stars = find_stars(&field.image(), 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    assert_eq!(stars.len(), 3);
    for t in truths {
        let star = nearest(&stars, t).unwrap();
        assert!(star.pos.distance(t) < 0.15, "{} vs {}", star.pos, t);
    }
}

#[test]
fn test_hfd_and_fwhm_match_gaussian_width() {
    let sigma = 2.0f32;
    let expected = 2.0 * (2.0 * 2f32.ln()).sqrt() * sigma;
    let image = four_level_field().image();
    let stars = find_stars(&image, 30.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    assert_eq!(stars.len(), 6);
    for star in &stars {
        assert!(star.is_measurable());
        assert!((star.hfd - expected).abs() / expected < 0.15, "hfd {}", star.hfd);
        assert!((star.fwhm - expected).abs() / expected < 0.15, "fwhm {}", star.fwhm);
        assert!(star.flux > 0.0);
    }
}

#[test]
fn test_wider_stars_have_larger_hfd() {
    let image = StarField::new(160, 100)
        .with_star(SyntheticStar::new(40.0, 50.0, 1.5, 1500.0))
        .with_star(SyntheticStar::new(120.0, 50.0, 3.5, 1500.0))
        .image();
    let stars = find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    let narrow = nearest(&stars, DVec2::new(40.0, 50.0)).unwrap();
    let wide = nearest(&stars, DVec2::new(120.0, 50.0)).unwrap();
    assert!(wide.hfd > 1.8 * narrow.hfd);
    assert!(wide.fwhm > 1.8 * narrow.fwhm);
}

// ============================================================================
// Background, labeling, CFA
// ============================================================================

#[test]
fn test_background_estimate_ignores_stars() {
    let pixels = four_level_field().render();
    let background = estimate_background(pixels.pixels(), &BackgroundConfig::default());

    assert!((background.level - 1000.0).abs() < 1.0, "{}", background.level);
    assert!((background.noise - 10.0).abs() < 0.5, "{}", background.noise);
}

#[test]
fn test_background_subsamples_large_frames() {
    let pixels = StarField::new(200, 200).render();
    let config = BackgroundConfig {
        max_samples: 5000,
        ..Default::default()
    };
    let background = estimate_background(pixels.pixels(), &config);

    assert!((background.level - 1000.0).abs() < 1.5);
    assert!((background.noise - 10.0).abs() < 1.0);
}

#[test]
fn test_diagonal_pixels_join_only_with_eight_connectivity() {
    let mut mask = Buffer2::new_filled(4, 4, false);
    mask[(1, 1)] = true;
    mask[(2, 2)] = true;

    assert_eq!(connected_components(&mask, Connectivity::Four).1, 2);
    assert_eq!(connected_components(&mask, Connectivity::Eight).1, 1);
}

#[test]
fn test_union_find_merges_u_shape() {
    // Two arms that only meet on the bottom row.
    #[rustfmt::skip]
    let mask: Vec<bool> = [
        1, 0, 1,
        1, 0, 1,
        1, 1, 1,
    ].iter().map(|&v| v == 1).collect();
    let (labels, count) = connected_components(&Buffer2::new(3, 3, mask), Connectivity::Four);

    assert_eq!(count, 1);
    assert!(labels.iter().all(|&l| l <= 1));
    assert_eq!(labels[(2, 0)], 1);
}

#[test]
fn test_labels_number_components_in_scan_order() {
    #[rustfmt::skip]
    let mask: Vec<bool> = [
        0, 0, 0, 1,
        1, 0, 0, 1,
        1, 0, 0, 0,
    ].iter().map(|&v| v == 1).collect();
    let (labels, count) = connected_components(&Buffer2::new(4, 3, mask), Connectivity::Four);

    assert_eq!(count, 2);
    assert_eq!(labels[(3, 0)], 1);
    assert_eq!(labels[(0, 1)], 2);
}

#[test]
fn test_bayer_frame_is_median_filtered() {
    let field = four_level_field();
    let mono = field.image();
    let mut meta = mono.meta().clone();
    meta.sensor_type = SensorType::Rggb;
    let bayer = mono.clone().with_meta(meta);

    let detector = StarDetector::new();
    let mono_result = detector.find_stars(&mono, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    let bayer_result = detector.find_stars(&bayer, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);

    // A 3x3 median cuts Gaussian noise to well under two thirds.
    assert!(bayer_result.diagnostics.noise < 0.7 * mono_result.diagnostics.noise);
    for star in &mono_result.stars {
        let matched = nearest(&bayer_result.stars, star.pos).unwrap();
        assert!(matched.pos.distance(star.pos) < 0.5);
    }

    let unfiltered = StarDetector::from_config(StarDetectionConfig {
        median_filter_cfa: false,
        ..Default::default()
    })
    .find_stars(&bayer, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS);
    assert_eq!(unfiltered.diagnostics, mono_result.diagnostics);
}

#[test]
fn test_config_loads_from_yaml() {
    let yaml = "initial_sigma: 5.0\nconnectivity: Eight\nbackground:\n  sigma_clip_kappa: 2.5\n";
    let config: StarDetectionConfig = common::deserialize(yaml, common::FileFormat::Yaml).unwrap();
    config.validate();

    assert_eq!(config.initial_sigma, 5.0);
    assert_eq!(config.connectivity, Connectivity::Eight);
    assert_eq!(config.background.sigma_clip_kappa, 2.5);
    assert_eq!(config.background.sigma_clip_iterations, 5);
    assert_eq!(config.min_area, StarDetectionConfig::default().min_area);
}

#[test]
#[should_panic(expected = "initial_sigma")]
fn test_validate_rejects_initial_below_min() {
    StarDetectionConfig {
        initial_sigma: 1.0,
        ..Default::default()
    }
    .validate();
}

// ============================================================================
// Real frames
// ============================================================================

#[test]
#[should_panic(expected = "real frame")]
fn test_missing_real_frame_fails_loudly() {
    let dir = common::test_utils::test_output_path("");
    real_frame_in(Some(dir), "no_such_frame.fits");
}

#[test]
#[should_panic(expected = "ASTROFOCUS_TEST_DATA_DIR")]
fn test_unset_real_frame_dir_fails_loudly() {
    real_frame_in(None, "PHD2SimGuider.fits");
}

#[test]
#[cfg_attr(not(feature = "real-data"), ignore)]
fn test_real_frame_snr_levels() {
    init_tracing();
    let path = real_frame("image_file-snr-20_stars-28_1280x960x16.fits");
    let image = Image::read_fits(&path).unwrap();
    assert_eq!((image.width(), image.height()), (1280, 960));

    assert_eq!(find_stars(&image, 20.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).len(), 28);
    assert_eq!(find_stars(&image, 30.0, DEFAULT_MAX_STARS, DEFAULT_MAX_ITERATIONS).len(), 13);
}

#[test]
#[cfg_attr(not(feature = "real-data"), ignore)]
fn test_real_guider_frame() {
    init_tracing();
    let path = real_frame("PHD2SimGuider.fits");
    let image = Image::read_fits(&path).unwrap();

    let stars = find_stars(&image, 5.0, DEFAULT_MAX_STARS, 3);
    assert_eq!(stars.len(), 10);
    assert!(stars.iter().all(|s| s.snr >= 5.0));

    let stars = find_stars(&image, 30.0, DEFAULT_MAX_STARS, 3);
    assert_eq!(stars.len(), 2);
}
