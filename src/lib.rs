/*!
# Trackfit - marginal likelihood of data against a predicted track

Fits a continuous, model-predicted curve ("track") through noisy,
partially-observed measurement vectors by evaluating a marginal likelihood.
Each observation carries its own measurement-uncertainty covariance and may
be missing some of the quantities the track predicts; dimension matching is
done by exact string-label equality.

## Modules

- [`matrix`] - Dense matrix kernel (cofactor determinants, adjugate inverses)
- [`covariance`] - Covariance matrices with cached inverses
- [`quadrature`] - Adaptive composite Simpson integration
- [`datum`] / [`track`] / [`sample`] - Data entities with label-based subsetting
- [`likelihood`] - The per-datum and per-sample log-likelihood evaluators
- [`errors`] - Error taxonomy

## Example

```rust
use trackfit::{Datum, LikelihoodOptions, Sample, Track, sample_log_likelihood};

// A model-predicted line through an (x, y) space, denser near the origin.
let points: Vec<Vec<f64>> = (0..50).map(|i| {
    let x = 0.1 * i as f64;
    vec![x, 2.0 * x]
}).collect();
let weights: Vec<f64> = (0..50).map(|i| 1.0 / (1.0 + i as f64)).collect();
let track = Track::new(&points, &["x", "y"], &weights).unwrap();

// Observations; the second one is missing a "y" measurement entirely,
// so it is compared against the track's "x" predictions alone.
let mut sample = Sample::new();
sample.add(Datum::new(&[1.0, 2.1], &["x", "y"]).unwrap());
sample.add(Datum::new(&[2.0], &["x"]).unwrap());

let logl = sample_log_likelihood(&mut sample, &track, &LikelihoodOptions::default()).unwrap();
assert!(logl.is_finite());
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Dense matrix kernel: the computational substrate for everything else
pub mod matrix;

/// Covariance matrices with cached, on-demand inverses
pub mod covariance;

/// Adaptive composite Simpson quadrature
pub mod quadrature;

/// Observed data vectors with uncertainties and labels
pub mod datum;

/// Model-predicted tracks through the observed space
pub mod track;

/// Collections of observations
pub mod sample;

/// The likelihood evaluators
pub mod likelihood;

/// Error types
pub mod errors;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use covariance::CovarianceMatrix;
pub use datum::Datum;
pub use errors::TrackFitError;
pub use likelihood::{
    datum_log_likelihood, sample_log_likelihood, LikelihoodOptions,
    LINE_SEGMENT_CORRECTION_MAX_BINS, LINE_SEGMENT_CORRECTION_MIN_BINS,
    LINE_SEGMENT_CORRECTION_TOLERANCE,
};
pub use matrix::Matrix;
pub use quadrature::{Quadrature, QuadratureResult};
pub use sample::{Comparator, Sample};
pub use track::Track;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
