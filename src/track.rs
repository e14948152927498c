//! Model-predicted tracks
//!
//! A [`Track`] is an ordered sequence of N model-predicted D-dimensional
//! points, N weights giving the predicted observed density along the curve,
//! and D labels naming the predicted quantities. Likelihood evaluation never
//! mutates a track: weight normalization works on a call-local copy, so the
//! weights a caller reads back are bit-identical to what it stored.

use crate::errors::TrackFitError;
use crate::matrix::Matrix;

/// A model-predicted curve through the observed space.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Flattened N x D predictions, row-major
    predictions: Vec<f64>,
    n_points: usize,
    dim: usize,
    labels: Vec<String>,
    weights: Vec<f64>,
}

impl Track {
    /// Create a track from N points of D components each.
    ///
    /// # Errors
    /// `Configuration` when any point's width disagrees with the label
    /// count, the weight count differs from the point count, a label
    /// repeats, or there are no labels.
    pub fn new(points: &[Vec<f64>], labels: &[&str], weights: &[f64]) -> Result<Self, TrackFitError> {
        if labels.is_empty() {
            return Err(TrackFitError::Configuration {
                description: "track must predict at least one quantity".to_string(),
            });
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(TrackFitError::Configuration {
                    description: format!("duplicate label '{}' in track", label),
                });
            }
        }
        if weights.len() != points.len() {
            return Err(TrackFitError::Configuration {
                description: format!(
                    "track has {} points but {} weights",
                    points.len(),
                    weights.len()
                ),
            });
        }
        let dim = labels.len();
        let mut predictions = Vec::with_capacity(points.len() * dim);
        for (i, point) in points.iter().enumerate() {
            if point.len() != dim {
                return Err(TrackFitError::Configuration {
                    description: format!(
                        "track point {} has {} components, expected {}",
                        i,
                        point.len(),
                        dim
                    ),
                });
            }
            predictions.extend_from_slice(point);
        }
        Ok(Self {
            predictions,
            n_points: points.len(),
            dim,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            weights: weights.to_vec(),
        })
    }

    /// Number of points along the track.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_points
    }

    /// True when the track has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_points == 0
    }

    /// Number of predicted quantities per point.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The quantity labels, one per column.
    #[inline]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The per-point weights (unnormalized predicted density times selection
    /// function).
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Index of `label` among the predicted quantities, if present.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Component `col` of point `index`.
    #[inline]
    pub fn prediction(&self, index: usize, col: usize) -> f64 {
        assert!(
            index < self.n_points && col < self.dim,
            "prediction ({}, {}) out of range for track with {} points of dimension {}",
            index,
            col,
            self.n_points,
            self.dim
        );
        self.predictions[index * self.dim + col]
    }

    /// Point `index` as a 1xD row vector.
    pub fn point(&self, index: usize) -> Matrix {
        assert!(
            index < self.n_points,
            "point {} out of range for track with {} points",
            index,
            self.n_points
        );
        Matrix::from_row_slice(1, self.dim, &self.predictions[index * self.dim..(index + 1) * self.dim])
    }
}
