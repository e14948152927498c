//! Covariance matrix with cached inverse
//!
//! The likelihood evaluator needs the inverse of every datum's covariance at
//! every track point, so the inverse is computed once and cached. Any
//! mutation of the covariance values drops the cache; the next
//! [`CovarianceMatrix::ensure_inverse`] recomputes it.

use crate::errors::TrackFitError;
use crate::matrix::Matrix;

/// A square measurement-uncertainty covariance matrix plus its lazily
/// computed inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    matrix: Matrix,
    inverse: Option<Matrix>,
}

impl CovarianceMatrix {
    /// Create a `size` x `size` identity covariance (independent unit
    /// variances).
    pub fn identity(size: usize) -> Self {
        Self {
            matrix: Matrix::identity(size),
            inverse: None,
        }
    }

    /// Wrap an existing matrix.
    ///
    /// # Panics
    /// If the matrix is not square.
    pub fn from_matrix(matrix: Matrix) -> Self {
        assert!(
            matrix.is_square(),
            "covariance matrix must be square, got {}x{}",
            matrix.rows(),
            matrix.cols()
        );
        Self {
            matrix,
            inverse: None,
        }
    }

    /// Dimension of the covariance (rows == cols).
    #[inline]
    pub fn size(&self) -> usize {
        self.matrix.rows()
    }

    /// Read-only view of the covariance values.
    #[inline]
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Covariance element at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// Set the covariance element at `(i, j)`, dropping the cached inverse.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.matrix[(i, j)] = value;
        self.inverse = None;
    }

    /// Mutable access to the covariance values. The cached inverse is
    /// dropped up front, since any element may change through this borrow.
    pub fn matrix_mut(&mut self) -> &mut Matrix {
        self.inverse = None;
        &mut self.matrix
    }

    /// Drop the cached inverse. Needed after mutating the covariance through
    /// any path that bypasses [`CovarianceMatrix::set`].
    pub fn invalidate(&mut self) {
        self.inverse = None;
    }

    /// The cached inverse, if one has been computed since the last mutation.
    #[inline]
    pub fn cached_inverse(&self) -> Option<&Matrix> {
        self.inverse.as_ref()
    }

    /// Compute the inverse if it is not already cached and return it.
    ///
    /// Singularity is a recoverable condition: the caller decides whether a
    /// non-invertible covariance aborts the surrounding operation.
    pub fn ensure_inverse(&mut self) -> Result<&Matrix, TrackFitError> {
        if self.inverse.is_none() {
            let inv = self
                .matrix
                .invert()
                .ok_or_else(|| TrackFitError::SingularMatrix {
                    context: format!("{size}x{size} covariance matrix", size = self.size()),
                })?;
            self.inverse = Some(inv);
        }
        Ok(self.inverse.as_ref().unwrap())
    }
}
