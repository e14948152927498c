//! End-to-end tests for the likelihood pipeline
//!
//! Builds tracks and samples the way a host binding layer would, then
//! exercises subsetting, filtering, covariance preparation, and both
//! likelihood entry points together.

use approx::assert_relative_eq;
use trackfit::{
    datum_log_likelihood, sample_log_likelihood, Comparator, CovarianceMatrix, Datum,
    LikelihoodOptions, Matrix, Sample, Track, TrackFitError,
};

/// A gently curved track through (x, y, z) space with density falling off
/// along its length.
fn curved_track(n: usize) -> Track {
    let points: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let x = 0.2 * i as f64;
            vec![x, x * x * 0.1, (-x).exp()]
        })
        .collect();
    let weights: Vec<f64> = (0..n).map(|i| 1.0 / (1.0 + 0.3 * i as f64)).collect();
    Track::new(&points, &["x", "y", "z"], &weights).unwrap()
}

/// Observations scattered around the track with mild offsets; some only
/// measure a subset of the quantities.
fn nearby_sample() -> Sample {
    let mut sample = Sample::new();
    sample.add(Datum::new(&[0.4, 0.02, 0.68], &["x", "y", "z"]).unwrap());
    sample.add(Datum::new(&[1.0, 0.11], &["x", "y"]).unwrap());
    sample.add(Datum::new(&[1.6, 0.21], &["x", "y"]).unwrap());
    sample.add(Datum::new(&[0.8], &["x"]).unwrap());

    let mut cov = CovarianceMatrix::identity(2);
    cov.set(0, 0, 0.25);
    cov.set(1, 1, 0.04);
    sample.add(Datum::with_covariance(&[2.0, 0.42], &["x", "y"], cov).unwrap());
    sample
}

#[test]
fn test_full_pipeline_runs() {
    let track = curved_track(40);
    let mut sample = nearby_sample();

    let logl = sample_log_likelihood(&mut sample, &track, &LikelihoodOptions::default()).unwrap();
    assert!(logl.is_finite());

    // every covariance inverse was prepared by the call
    for datum in &sample {
        assert!(datum.covariance().cached_inverse().is_some());
    }
}

#[test]
fn test_near_sample_beats_far_sample() {
    let track = curved_track(40);
    let mut near = nearby_sample();

    let mut far = Sample::new();
    for i in 0..near.len() {
        let d = near.get(i).unwrap();
        let labels: Vec<&str> = d.labels().iter().map(|s| s.as_str()).collect();
        let shifted: Vec<f64> = d.vector().as_slice().iter().map(|v| v + 25.0).collect();
        far.add(Datum::new(&shifted, &labels).unwrap());
    }

    let options = LikelihoodOptions::default();
    let logl_near = sample_log_likelihood(&mut near, &track, &options).unwrap();
    let logl_far = sample_log_likelihood(&mut far, &track, &options).unwrap();
    assert!(
        logl_near > logl_far,
        "observations near the track must be more likely: {} vs {}",
        logl_near,
        logl_far
    );
}

#[test]
fn test_all_option_combinations_run() {
    let track = curved_track(25);
    for corrections in [false, true] {
        for normalize in [false, true] {
            for per_obs in [false, true] {
                let mut sample = nearby_sample();
                let options = LikelihoodOptions {
                    use_line_segment_corrections: corrections,
                    normalize_weights: normalize,
                    normalize_per_observation: per_obs,
                    n_threads: 2,
                };
                let logl = sample_log_likelihood(&mut sample, &track, &options).unwrap();
                assert!(
                    logl.is_finite(),
                    "non-finite log-likelihood for corrections={}, normalize={}, per_obs={}",
                    corrections,
                    normalize,
                    per_obs
                );
            }
        }
    }
}

#[test]
fn test_deterministic_across_thread_counts() {
    let track = curved_track(60);
    let mut reference = None;
    for n_threads in [1usize, 2, 3, 8] {
        let mut sample = nearby_sample();
        let options = LikelihoodOptions {
            n_threads,
            use_line_segment_corrections: true,
            ..LikelihoodOptions::default()
        };
        let logl = sample_log_likelihood(&mut sample, &track, &options).unwrap();
        match reference {
            None => reference = Some(logl),
            Some(r) => assert_eq!(
                r.to_bits(),
                logl.to_bits(),
                "thread count {} changed the result",
                n_threads
            ),
        }
    }
}

#[test]
fn test_filter_then_evaluate() {
    let track = curved_track(40);
    let sample = nearby_sample();

    // keep only observations with x > 0.5 that actually measure x
    let mut filtered = sample.filter("x", Comparator::Gt, 0.5, false);
    assert!(filtered.len() < sample.len());
    assert!(filtered
        .iter()
        .all(|d| d.get("x").map(|x| x > 0.5).unwrap_or(false)));

    let logl =
        sample_log_likelihood(&mut filtered, &track, &LikelihoodOptions::default()).unwrap();
    assert!(logl.is_finite());
}

#[test]
fn test_subset_then_evaluate_matches_partial_data() {
    // restricting a 2-D datum to one label must equal a natively 1-D datum
    let track = curved_track(40);
    let options = LikelihoodOptions::default();

    let full = Datum::new(&[1.0, 0.11], &["x", "y"]).unwrap();
    let mut restricted = full.subset(&["x"]).unwrap();
    let mut native = Datum::new(&[1.0], &["x"]).unwrap();

    let a = datum_log_likelihood(&mut restricted, &track, &options).unwrap();
    let b = datum_log_likelihood(&mut native, &track, &options).unwrap();
    assert_relative_eq!(a, b, epsilon = 1e-12);
}

#[test]
fn test_sample_subset_by_labels_drops_partial_observations() {
    let sample = nearby_sample();
    let xy = sample.subset_by_labels(&["x", "y"]);
    // the x-only datum cannot satisfy {x, y} and is skipped
    assert_eq!(xy.len(), sample.len() - 1);
    assert!(xy.iter().all(|d| d.dim() == 2));
}

#[test]
fn test_weights_survive_every_code_path_bit_for_bit() {
    let track = curved_track(30);
    let before: Vec<u64> = track.weights().iter().map(|w| w.to_bits()).collect();

    for corrections in [false, true] {
        for normalize in [false, true] {
            let mut sample = nearby_sample();
            let options = LikelihoodOptions {
                use_line_segment_corrections: corrections,
                normalize_weights: normalize,
                n_threads: 2,
                ..LikelihoodOptions::default()
            };
            let _ = sample_log_likelihood(&mut sample, &track, &options).unwrap();
            let after: Vec<u64> = track.weights().iter().map(|w| w.to_bits()).collect();
            assert_eq!(before, after);
        }
    }
}

#[test]
fn test_datum_on_track_point_is_local_maximum() {
    let track = curved_track(40);
    let options = LikelihoodOptions::default();

    // exactly on point 10 of the track
    let on_point: Vec<f64> = track.point(10).as_slice().to_vec();
    let mut exact = Datum::new(&on_point, &["x", "y", "z"]).unwrap();
    let logl_exact = datum_log_likelihood(&mut exact, &track, &options).unwrap();

    // the same observation nudged away in every component
    let nudged: Vec<f64> = on_point.iter().map(|v| v + 0.8).collect();
    let mut offset = Datum::new(&nudged, &["x", "y", "z"]).unwrap();
    let logl_offset = datum_log_likelihood(&mut offset, &track, &options).unwrap();

    assert!(logl_exact > logl_offset);
}

#[test]
fn test_tighter_uncertainty_sharpens_preference() {
    let track = curved_track(40);
    let options = LikelihoodOptions::default();
    let labels = ["x", "y", "z"];
    let off_track = [1.0, 1.0, 1.0];

    let mut loose_cov = CovarianceMatrix::identity(3);
    for i in 0..3 {
        loose_cov.set(i, i, 10.0);
    }
    let mut loose = Datum::with_covariance(&off_track, &labels, loose_cov).unwrap();
    let mut tight = Datum::new(&off_track, &labels).unwrap();

    let logl_loose = datum_log_likelihood(&mut loose, &track, &options).unwrap();
    let logl_tight = datum_log_likelihood(&mut tight, &track, &options).unwrap();

    // an off-track point is punished harder when the uncertainty is small
    assert!(logl_tight < logl_loose);
}

#[test]
fn test_singular_covariance_reported_with_datum_index() {
    let track = curved_track(10);
    let mut sample = Sample::new();
    sample.add(Datum::new(&[0.1], &["x"]).unwrap());
    sample.add(
        Datum::with_covariance(&[0.2], &["x"], CovarianceMatrix::from_matrix(Matrix::new(1, 1)))
            .unwrap(),
    );
    let err =
        sample_log_likelihood(&mut sample, &track, &LikelihoodOptions::default()).unwrap_err();
    match err {
        TrackFitError::SingularMatrix { context } => assert!(context.contains("datum 1")),
        other => panic!("unexpected error: {}", other),
    }
}
