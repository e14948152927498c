//! Observed data vectors
//!
//! A [`Datum`] is one observation: a 1xD row vector, a DxD measurement
//! uncertainty covariance, and D labels naming the physical quantity each
//! component measures. Labels are matched by exact, case-sensitive equality
//! everywhere in the crate.

use crate::covariance::CovarianceMatrix;
use crate::errors::TrackFitError;
use crate::matrix::Matrix;

/// One observation in the observed space.
///
/// The vector and labels are immutable after construction; the covariance
/// values may be updated (which drops its cached inverse).
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    vector: Matrix,
    covariance: CovarianceMatrix,
    labels: Vec<String>,
}

impl Datum {
    /// Create a datum with an identity covariance (independent unit
    /// variances), matching each value to its label positionally.
    ///
    /// # Errors
    /// `Configuration` when the value and label counts differ, the datum is
    /// empty, or a label repeats.
    pub fn new(values: &[f64], labels: &[&str]) -> Result<Self, TrackFitError> {
        Self::with_covariance(
            values,
            labels,
            CovarianceMatrix::identity(values.len().max(1)),
        )
    }

    /// Create a datum with an explicit covariance.
    ///
    /// # Errors
    /// `Configuration` when the value, label, and covariance dimensions
    /// disagree, the datum is empty, or a label repeats.
    pub fn with_covariance(
        values: &[f64],
        labels: &[&str],
        covariance: CovarianceMatrix,
    ) -> Result<Self, TrackFitError> {
        if values.is_empty() {
            return Err(TrackFitError::Configuration {
                description: "datum must have at least one component".to_string(),
            });
        }
        if values.len() != labels.len() {
            return Err(TrackFitError::Configuration {
                description: format!(
                    "datum has {} values but {} labels",
                    values.len(),
                    labels.len()
                ),
            });
        }
        if covariance.size() != values.len() {
            return Err(TrackFitError::Configuration {
                description: format!(
                    "datum has {} components but a {}x{} covariance",
                    values.len(),
                    covariance.size(),
                    covariance.size()
                ),
            });
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(TrackFitError::Configuration {
                    description: format!("duplicate label '{}' in datum", label),
                });
            }
        }
        let mut vector = Matrix::new(1, values.len());
        for (j, &v) in values.iter().enumerate() {
            vector[(0, j)] = v;
        }
        Ok(Self {
            vector,
            covariance,
            labels: labels.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Dimensionality of the observation.
    #[inline]
    pub fn dim(&self) -> usize {
        self.vector.cols()
    }

    /// The observation as a 1xD row vector.
    #[inline]
    pub fn vector(&self) -> &Matrix {
        &self.vector
    }

    /// The measurement-uncertainty covariance.
    #[inline]
    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    /// Mutable access to the covariance, for updating uncertainties or
    /// (re)computing the cached inverse.
    #[inline]
    pub fn covariance_mut(&mut self) -> &mut CovarianceMatrix {
        &mut self.covariance
    }

    /// The quantity labels, one per component.
    #[inline]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Index of `label` within this datum, if measured.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Value measured for `label`, if present.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.label_index(label).map(|j| self.vector[(0, j)])
    }

    /// A new datum holding only the requested labels, in the requested
    /// order, with the matching principal submatrix of the covariance.
    ///
    /// Returns `None` when any requested label is not measured by this
    /// datum; batch callers skip such data rather than aborting. The
    /// sub-covariance starts with no cached inverse, so the inverse of the
    /// submatrix is computed fresh when needed (it is not a submatrix of the
    /// parent's inverse).
    pub fn subset(&self, labels: &[&str]) -> Option<Datum> {
        if labels.is_empty() {
            return None;
        }
        let mut indices = Vec::with_capacity(labels.len());
        for label in labels {
            indices.push(self.label_index(label)?);
        }
        let mut values = Vec::with_capacity(indices.len());
        for &j in &indices {
            values.push(self.vector[(0, j)]);
        }
        let mut sub_cov = Matrix::new(indices.len(), indices.len());
        for (a, &i) in indices.iter().enumerate() {
            for (b, &j) in indices.iter().enumerate() {
                sub_cov[(a, b)] = self.covariance.get(i, j);
            }
        }
        Some(
            Datum::with_covariance(&values, labels, CovarianceMatrix::from_matrix(sub_cov))
                .expect("subset dimensions are consistent by construction"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_defaults_to_identity_covariance() {
        let d = Datum::new(&[1.0, 2.0], &["a", "b"]).unwrap();
        assert_eq!(d.dim(), 2);
        assert_eq!(d.covariance().matrix(), &Matrix::identity(2));
        assert_eq!(d.get("a"), Some(1.0));
        assert_eq!(d.get("b"), Some(2.0));
        assert_eq!(d.get("c"), None);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Datum::new(&[1.0, 2.0], &["a"]).unwrap_err();
        assert!(matches!(err, TrackFitError::Configuration { .. }));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let err = Datum::new(&[1.0, 2.0], &["a", "a"]).unwrap_err();
        assert!(matches!(err, TrackFitError::Configuration { .. }));
    }

    #[test]
    fn test_empty_datum_rejected() {
        let err = Datum::new(&[], &[]).unwrap_err();
        assert!(matches!(err, TrackFitError::Configuration { .. }));
    }

    #[test]
    fn test_covariance_dimension_mismatch_rejected() {
        let cov = CovarianceMatrix::identity(3);
        let err = Datum::with_covariance(&[1.0, 2.0], &["a", "b"], cov).unwrap_err();
        assert!(matches!(err, TrackFitError::Configuration { .. }));
    }

    #[test]
    fn test_subset_extracts_principal_submatrix() {
        // subsetting {a, c} from {a, b, c}
        let mut cov = CovarianceMatrix::identity(3);
        cov.set(0, 0, 4.0);
        cov.set(1, 1, 9.0);
        cov.set(2, 2, 16.0);
        cov.set(0, 2, 2.0);
        cov.set(2, 0, 2.0);
        let d = Datum::with_covariance(&[1.0, 2.0, 3.0], &["a", "b", "c"], cov).unwrap();

        let mut sub = d.subset(&["a", "c"]).unwrap();
        assert_eq!(sub.labels(), &["a".to_string(), "c".to_string()]);
        assert_eq!(sub.vector().as_slice(), &[1.0, 3.0]);
        assert_eq!(sub.covariance().get(0, 0), 4.0);
        assert_eq!(sub.covariance().get(0, 1), 2.0);
        assert_eq!(sub.covariance().get(1, 0), 2.0);
        assert_eq!(sub.covariance().get(1, 1), 16.0);

        // the submatrix inverts correctly: [[4,2],[2,16]]^-1 = [[16,-2],[-2,4]]/60
        let inv = sub.covariance_mut().ensure_inverse().unwrap();
        assert_relative_eq!(inv[(0, 0)], 16.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(0, 1)], -2.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 1)], 4.0 / 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_subset_preserves_requested_order() {
        let d = Datum::new(&[1.0, 2.0, 3.0], &["a", "b", "c"]).unwrap();
        let sub = d.subset(&["c", "a"]).unwrap();
        assert_eq!(sub.vector().as_slice(), &[3.0, 1.0]);
    }

    #[test]
    fn test_subset_with_missing_label_is_none() {
        let d = Datum::new(&[1.0, 2.0], &["a", "b"]).unwrap();
        assert!(d.subset(&["a", "z"]).is_none());
        assert!(d.subset(&[]).is_none());
    }
}
