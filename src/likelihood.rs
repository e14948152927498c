//! Marginal likelihood of observations against a model-predicted track
//!
//! For each observation the evaluator:
//!
//! 1. **Subsets** the track to the quantities the datum actually measures,
//!    in the datum's label order. A measured quantity the track does not
//!    predict fails that datum's evaluation; data are never silently
//!    dropped.
//! 2. **Evaluates** every track point: the chi-squared (squared Mahalanobis
//!    distance) between the datum and the point through the datum's inverse
//!    covariance, weighted by the predicted density along the track, with an
//!    optional multiplicative correction for the finite length of the line
//!    segment to the next point.
//! 3. **Reduces** the point contributions to a single marginal likelihood
//!    and takes its natural log.
//!
//! Sample-level evaluation sums the per-datum log-likelihoods, optionally in
//! parallel over observations with a caller-fixed worker count. Parallel
//! partial results are collected in input order and summed serially, so the
//! result is deterministic for every thread count (it is also identical to
//! the serial summation order; floating-point addition order is part of the
//! contract here, not an accident).

use std::f64::consts::PI;

use rayon::prelude::*;
use serde::Serialize;
use smallvec::SmallVec;
use statrs::function::erf::erf;

use crate::datum::Datum;
use crate::errors::TrackFitError;
use crate::matrix::Matrix;
use crate::quadrature::Quadrature;
use crate::sample::Sample;
use crate::track::Track;

/// Relative tolerance for the line-segment correction quadrature.
pub const LINE_SEGMENT_CORRECTION_TOLERANCE: f64 = 1e-3;
/// Starting bin count for the line-segment correction quadrature.
pub const LINE_SEGMENT_CORRECTION_MIN_BINS: usize = 64;
/// Bin budget for the line-segment correction quadrature.
pub const LINE_SEGMENT_CORRECTION_MAX_BINS: usize = 1_000_000;

/// Beyond this, `exp(b^2 / 2a)` in the closed-form correction overflows.
const MAX_STABLE_LOG: f64 = 700.0;
/// Minimum erf-difference magnitude before the closed form is trusted; a
/// smaller bracket means the two erf terms cancelled catastrophically.
const MIN_STABLE_BRACKET: f64 = 1e-8;

/// Evaluation context threaded through every likelihood call.
///
/// This replaces ambient per-track flags: a track carries only data, and the
/// caller states per call how it is to be evaluated.
#[derive(Debug, Clone, Serialize)]
pub struct LikelihoodOptions {
    /// Multiply each point contribution by the finite-line-segment
    /// correction factor (the final point's factor is exactly zero).
    pub use_line_segment_corrections: bool,
    /// Scale a working copy of the track weights to sum to 1 for the
    /// duration of the call. The track itself is never mutated, so the
    /// weights a caller reads back are bit-identical to what it stored.
    /// When unset, the sum of log-weights is subtracted from the
    /// sample-level total as an explicit normalization term instead.
    pub normalize_weights: bool,
    /// Divide each observation's marginal likelihood by
    /// `sqrt(2 pi det(C))` before taking the log.
    pub normalize_per_observation: bool,
    /// Worker count for the data-parallel loops. `1` runs serially; larger
    /// values run on a dedicated pool of exactly that many threads.
    pub n_threads: usize,
}

impl Default for LikelihoodOptions {
    fn default() -> Self {
        Self {
            use_line_segment_corrections: false,
            normalize_weights: true,
            normalize_per_observation: false,
            n_threads: 1,
        }
    }
}

/// Log-likelihood of observing an entire sample given a track.
///
/// Covariance inverses are computed and cached up front (serially), then
/// observations are evaluated independently, in parallel when
/// `options.n_threads > 1`. Any failing observation fails the whole call;
/// there are no partial results.
///
/// # Errors
/// - `SingularMatrix` when any observation's covariance is not invertible.
/// - `UnmatchedQuantity` when any observation measures a quantity the track
///   does not predict.
/// - `Configuration` for a zero worker count, or weights that sum to zero
///   when `normalize_weights` is set.
/// - `InvariantViolation` if a chi-squared reduction is not 1x1.
pub fn sample_log_likelihood(
    sample: &mut Sample,
    track: &Track,
    options: &LikelihoodOptions,
) -> Result<f64, TrackFitError> {
    let pool = build_pool(options.n_threads)?;
    sample.invert_all_covariances()?;
    let weights = working_weights(track, options)?;

    log::debug!(
        "evaluating sample of {} data against track of {} points ({} threads, corrections: {})",
        sample.len(),
        track.len(),
        options.n_threads,
        options.use_line_segment_corrections
    );

    let evaluate = |datum: &Datum| datum_log_likelihood_prepared(datum, track, &weights, options);
    let per_datum: Result<Vec<f64>, TrackFitError> = match &pool {
        Some(pool) => pool.install(|| sample.as_slice().par_iter().map(evaluate).collect()),
        None => sample.iter().map(evaluate).collect(),
    };
    // deterministic reduction: per-datum results in input order, serial sum
    let mut total: f64 = per_datum?.iter().sum();

    if !options.normalize_weights {
        for &w in track.weights() {
            total -= w.ln();
        }
    }
    Ok(total)
}

/// Log-likelihood of observing a single datum given a track.
///
/// The track may predict quantities the datum does not measure; those are
/// ignored. Every quantity the datum measures must be predicted, otherwise
/// the call fails with `UnmatchedQuantity`; a direct single-datum call
/// requires all of its labels to be present.
///
/// # Errors
/// As [`sample_log_likelihood`], for this datum alone.
pub fn datum_log_likelihood(
    datum: &mut Datum,
    track: &Track,
    options: &LikelihoodOptions,
) -> Result<f64, TrackFitError> {
    let pool = build_pool(options.n_threads)?;
    datum.covariance_mut().ensure_inverse()?;
    let weights = working_weights(track, options)?;
    match &pool {
        Some(pool) => pool.install(|| {
            datum_log_likelihood_inner(datum, track, &weights, options, true)
        }),
        None => datum_log_likelihood_inner(datum, track, &weights, options, false),
    }
}

/// Per-datum evaluation for the sample loop: inverses and weights are
/// already prepared, and point evaluation stays serial because the sample
/// loop owns the parallelism.
fn datum_log_likelihood_prepared(
    datum: &Datum,
    track: &Track,
    weights: &[f64],
    options: &LikelihoodOptions,
) -> Result<f64, TrackFitError> {
    let logl = datum_log_likelihood_inner(datum, track, weights, options, false)?;
    log::trace!("datum log-likelihood: {}", logl);
    Ok(logl)
}

fn datum_log_likelihood_inner(
    datum: &Datum,
    track: &Track,
    weights: &[f64],
    options: &LikelihoodOptions,
    parallel_points: bool,
) -> Result<f64, TrackFitError> {
    let sub = track_subset(datum, track)?;
    let inverse = datum.covariance().cached_inverse().ok_or_else(|| {
        TrackFitError::InvariantViolation {
            description: "covariance inverse was not prepared before evaluation".to_string(),
        }
    })?;

    let evaluate = |index: usize| -> Result<f64, TrackFitError> {
        let chi2 = chi_squared(datum, &sub, inverse, index)?;
        let mut contribution = weights[index] * (-0.5 * chi2).exp();
        if options.use_line_segment_corrections {
            contribution *= segment_correction(datum, &sub, inverse, index)?;
        }
        Ok(contribution)
    };

    let contributions: Result<Vec<f64>, TrackFitError> = if parallel_points {
        (0..sub.len()).into_par_iter().map(evaluate).collect()
    } else {
        (0..sub.len()).map(evaluate).collect()
    };
    // deterministic reduction, as in the sample loop
    let mut marginal: f64 = contributions?.iter().sum();

    if options.normalize_per_observation {
        marginal /= (2.0 * PI * datum.covariance().matrix().determinant()).sqrt();
    }
    Ok(marginal.ln())
}

/// The working weight vector for one likelihood call.
///
/// With `normalize_weights` the weights are scaled to sum to 1 (the
/// reference constant) in a call-local copy; otherwise they are used as
/// stored. Either way the track is left untouched.
fn working_weights(
    track: &Track,
    options: &LikelihoodOptions,
) -> Result<Vec<f64>, TrackFitError> {
    if !options.normalize_weights || track.is_empty() {
        return Ok(track.weights().to_vec());
    }
    let total: f64 = track.weights().iter().sum();
    if total == 0.0 {
        return Err(TrackFitError::Configuration {
            description: "track weights sum to zero and cannot be normalized".to_string(),
        });
    }
    Ok(track.weights().iter().map(|w| w / total).collect())
}

/// The track restricted to the quantities a datum measures, columns in the
/// datum's label order so the chi-squared matrix products line up without
/// any further bookkeeping.
fn track_subset(datum: &Datum, track: &Track) -> Result<Track, TrackFitError> {
    let mut columns: SmallVec<[usize; 8]> = SmallVec::with_capacity(datum.dim());
    for label in datum.labels() {
        let index = track
            .label_index(label)
            .ok_or_else(|| TrackFitError::UnmatchedQuantity {
                label: label.clone(),
            })?;
        columns.push(index);
    }
    let points: Vec<Vec<f64>> = (0..track.len())
        .map(|i| columns.iter().map(|&c| track.prediction(i, c)).collect())
        .collect();
    let labels: Vec<&str> = datum.labels().iter().map(|s| s.as_str()).collect();
    Track::new(&points, &labels, track.weights())
}

/// Chi-squared between a datum and one track point:
/// `delta C^-1 delta^T` with `delta = datum - point`, evaluated through the
/// matrix kernel. The product must reduce to 1x1; anything else is an
/// internal consistency failure that aborts the whole call.
fn chi_squared(
    datum: &Datum,
    sub: &Track,
    inverse: &Matrix,
    index: usize,
) -> Result<f64, TrackFitError> {
    let delta = datum.vector().subtract(&sub.point(index));
    let weighted = delta.multiply(inverse);
    let result = weighted.multiply(&delta.transpose());
    if result.rows() == 1 && result.cols() == 1 {
        Ok(result[(0, 0)])
    } else {
        Err(TrackFitError::InvariantViolation {
            description: format!(
                "chi-squared reduced to a {}x{} matrix instead of 1x1",
                result.rows(),
                result.cols()
            ),
        })
    }
}

/// Correction factor for the finite length of the line segment from point
/// `index` to point `index + 1`.
///
/// The factor is `integral of exp(-(a q^2 - 2 b q) / 2) over q in [0, 1]`
/// with `a = seg C^-1 seg^T` and `b = delta C^-1 seg^T`. The final point has
/// no following segment and its factor is exactly zero.
fn segment_correction(
    datum: &Datum,
    sub: &Track,
    inverse: &Matrix,
    index: usize,
) -> Result<f64, TrackFitError> {
    if index + 1 >= sub.len() {
        // zero-length trailing segment contributes nothing
        return Ok(0.0);
    }
    let current = sub.point(index);
    let next = sub.point(index + 1);
    let delta = datum.vector().subtract(&current);
    let segment = next.subtract(&current);
    let segment_t = segment.transpose();

    let a = scalar_product(&segment, inverse, &segment_t, "line segment correction (a)")?;
    let b = scalar_product(&delta, inverse, &segment_t, "line segment correction (b)")?;
    Ok(correction_factor(a, b))
}

/// `row1 C^-1 row2^T` reduced to a scalar, with the same 1x1 invariant check
/// as the chi-squared reduction.
fn scalar_product(
    row: &Matrix,
    inverse: &Matrix,
    column: &Matrix,
    context: &str,
) -> Result<f64, TrackFitError> {
    let result = row.multiply(inverse).multiply(column);
    if result.rows() == 1 && result.cols() == 1 {
        Ok(result[(0, 0)])
    } else {
        Err(TrackFitError::InvariantViolation {
            description: format!(
                "{} reduced to a {}x{} matrix instead of 1x1",
                context,
                result.rows(),
                result.cols()
            ),
        })
    }
}

/// Evaluate the correction factor from its `a` and `b` coefficients.
///
/// The closed form is
/// `sqrt(pi/2a) exp(b^2/2a) [erf((a-b)/sqrt(2a)) - erf(-b/sqrt(2a))]`.
/// It is the rare case where the analytic solution is less stable than the
/// numerical one: the product of an extremely large exponential and an
/// extremely small erf difference exhausts double precision. When that
/// regime is detected the factor is integrated by quadrature instead.
fn correction_factor(a: f64, b: f64) -> f64 {
    if a <= 0.0 {
        // zero-length segment in the subset space: the integrand is
        // identically 1
        return 1.0;
    }
    let root = (2.0 * a).sqrt();
    let bracket = erf((a - b) / root) - erf(-b / root);
    let log_prefactor = 0.5 * (PI / (2.0 * a)).ln() + b * b / (2.0 * a);
    if bracket.abs() >= MIN_STABLE_BRACKET && log_prefactor <= MAX_STABLE_LOG {
        return bracket * log_prefactor.exp();
    }

    let quadrature = Quadrature {
        lower: 0.0,
        upper: 1.0,
        tolerance: LINE_SEGMENT_CORRECTION_TOLERANCE,
        min_bins: LINE_SEGMENT_CORRECTION_MIN_BINS,
        max_bins: LINE_SEGMENT_CORRECTION_MAX_BINS,
    };
    let out = quadrature.integrate(|q| (-0.5 * (a * q * q - 2.0 * b * q)).exp());
    if !out.converged {
        log::warn!(
            "line segment correction quadrature did not converge (a = {}, b = {}, error = {:e}); \
             using best-effort estimate",
            a,
            b,
            out.error
        );
    }
    out.result
}

fn build_pool(n_threads: usize) -> Result<Option<rayon::ThreadPool>, TrackFitError> {
    match n_threads {
        0 => Err(TrackFitError::Configuration {
            description: "worker count must be at least 1".to_string(),
        }),
        1 => Ok(None),
        n => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map(Some)
            .map_err(|e| TrackFitError::Configuration {
                description: format!("failed to build worker pool: {}", e),
            }),
    }
}
