//! Adaptive composite Simpson quadrature
//!
//! Simpson estimates are built from trapezoid sums at `n` and `n/2` bins via
//! Richardson extrapolation, and the bin count doubles until successive
//! estimates agree to the requested relative tolerance or the bin budget is
//! exhausted. Non-convergence is not an error: the best available estimate
//! is always returned together with a flag, and the caller decides.
//!
//! Integrand parameters beyond the integration variable are closure
//! captures.

use serde::Serialize;

/// One-shot specification of a definite integral.
///
/// Reusable across calls; each call to [`Quadrature::integrate`] is
/// independent.
#[derive(Debug, Clone, Serialize)]
pub struct Quadrature {
    /// Lower bound of integration
    pub lower: f64,
    /// Upper bound of integration
    pub upper: f64,
    /// Relative tolerance on successive Simpson estimates
    pub tolerance: f64,
    /// Initial bin count (rounded up to even)
    pub min_bins: usize,
    /// Bin budget; refinement stops once the count reaches this
    pub max_bins: usize,
}

/// Outcome of a quadrature evaluation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuadratureResult {
    /// The last computed Simpson estimate
    pub result: f64,
    /// Relative change between the last two estimates
    pub error: f64,
    /// Number of bins in the last evaluation
    pub bins: usize,
    /// Whether the tolerance was met before the bin budget ran out
    pub converged: bool,
}

impl Quadrature {
    /// Evaluate the integral of `f` over `[lower, upper]`.
    ///
    /// The estimate starts at `min_bins` bins and doubles each refinement.
    /// A zero estimate forces another refinement rather than dividing by
    /// zero in the relative-error computation.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F) -> QuadratureResult {
        let mut n = self.min_bins.max(2);
        if n % 2 == 1 {
            n += 1;
        }
        let mut old_estimate = 0.0;
        let mut estimate;
        let mut error;
        loop {
            estimate = simpsons_rule(&f, self.lower, self.upper, n);
            error = if estimate != 0.0 {
                (old_estimate / estimate - 1.0).abs()
            } else {
                // treat as maximal to force refinement
                1.0
            };
            old_estimate = estimate;
            if error <= self.tolerance || n >= self.max_bins {
                break;
            }
            n *= 2;
        }
        QuadratureResult {
            result: estimate,
            error,
            bins: n,
            converged: error <= self.tolerance,
        }
    }
}

/// Simpson's rule as the Richardson extrapolation of two trapezoid sums:
/// `(4 T(n) - T(n/2)) / 3`.
fn simpsons_rule<F: Fn(f64) -> f64>(f: &F, lower: f64, upper: f64, n_bins: usize) -> f64 {
    (4.0 * trapezoid_rule(f, lower, upper, n_bins) - trapezoid_rule(f, lower, upper, n_bins / 2))
        / 3.0
}

/// Composite trapezoid rule over `n_bins` equal-width bins.
fn trapezoid_rule<F: Fn(f64) -> f64>(f: &F, lower: f64, upper: f64, n_bins: usize) -> f64 {
    let bin_width = (upper - lower) / n_bins as f64;
    let mut total = 0.0;
    for i in 0..=n_bins {
        let x = lower + i as f64 * bin_width;
        let fx = f(x);
        if i == 0 || i == n_bins {
            total += fx / 2.0;
        } else {
            total += fx;
        }
    }
    bin_width * total
}
