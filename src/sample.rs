//! Samples of observations
//!
//! A [`Sample`] owns a collection of [`Datum`] objects, not every one of
//! which need measure the same quantities. Besides aggregation for the
//! likelihood evaluator it supports batch covariance inversion, label-based
//! subsetting, and filtering on a measured quantity.

use crate::datum::Datum;
use crate::errors::TrackFitError;

/// Comparison operator for [`Sample::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `==`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparator {
    /// Parse from the conventional operator spelling.
    pub fn parse(s: &str) -> Option<Comparator> {
        match s {
            "==" => Some(Comparator::Eq),
            "<" => Some(Comparator::Lt),
            "<=" => Some(Comparator::Le),
            ">" => Some(Comparator::Gt),
            ">=" => Some(Comparator::Ge),
            _ => None,
        }
    }

    /// Apply the comparison with `lhs` on the left.
    #[inline]
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
        }
    }
}

/// An append-only collection of observations, each owned by the sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    data: Vec<Datum>,
}

impl Sample {
    /// Create an empty sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a datum, transferring ownership to the sample.
    pub fn add(&mut self, datum: Datum) {
        self.data.push(datum);
    }

    /// Number of observations.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the sample holds no observations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The observation at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Datum> {
        self.data.get(index)
    }

    /// All observations as a slice, in insertion order.
    #[inline]
    pub fn as_slice(&self) -> &[Datum] {
        &self.data
    }

    /// Iterate over the observations.
    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.data.iter()
    }

    /// Mutable iteration, for callers updating measurement uncertainties
    /// in place between evaluations.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Datum> {
        self.data.iter_mut()
    }

    /// Compute and cache the covariance inverse of every observation.
    ///
    /// # Errors
    /// `SingularMatrix` identifying the first observation whose covariance
    /// has determinant zero.
    pub fn invert_all_covariances(&mut self) -> Result<(), TrackFitError> {
        for (i, datum) in self.data.iter_mut().enumerate() {
            datum
                .covariance_mut()
                .ensure_inverse()
                .map_err(|_| TrackFitError::SingularMatrix {
                    context: format!("covariance of datum {} is not invertible", i),
                })?;
        }
        Ok(())
    }

    /// A new sample restricted to the requested labels.
    ///
    /// Observations missing any requested label are skipped rather than
    /// failing the whole sample; the result may be smaller than the input,
    /// or empty.
    pub fn subset_by_labels(&self, labels: &[&str]) -> Sample {
        Sample {
            data: self.data.iter().filter_map(|d| d.subset(labels)).collect(),
        }
    }

    /// A new sample containing the observations whose measurement of
    /// `label` satisfies `comparator value`.
    ///
    /// Observations with no measurement for `label` are kept when
    /// `keep_unmeasured` is set and dropped otherwise.
    pub fn filter(
        &self,
        label: &str,
        comparator: Comparator,
        value: f64,
        keep_unmeasured: bool,
    ) -> Sample {
        Sample {
            data: self
                .data
                .iter()
                .filter(|d| match d.get(label) {
                    Some(measured) => comparator.compare(measured, value),
                    None => keep_unmeasured,
                })
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Sample {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
