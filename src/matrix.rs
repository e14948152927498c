//! Dense matrix kernel
//!
//! Small row-major `f64` matrix type with the algebra the likelihood
//! evaluator is built on: addition, subtraction, multiplication, transpose,
//! determinant, and inversion. Determinants use cofactor expansion along the
//! axis with the most zeros; inverses go through the adjugate.
//!
//! Shape mismatches are programming errors and panic with a diagnostic
//! reporting both shapes. Callers that need graceful failure must validate
//! dimensions first. Singularity, by contrast, is an expected outcome and is
//! reported as `None` from [`Matrix::invert`].

use std::fmt;
use std::ops::{Index, IndexMut};

/// Dense 2-D matrix of real numbers with row-major storage.
///
/// Dimensions are fixed at construction; [`Matrix::resize`] is the only
/// operation that changes them, and it reallocates and zero-fills.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a `rows` x `cols` matrix with every element zero.
    ///
    /// # Panics
    /// If either dimension is zero.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(
            rows > 0 && cols > 0,
            "matrix dimensions must be positive, got {}x{}",
            rows,
            cols
        );
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a matrix from a row-major slice of `rows * cols` elements.
    ///
    /// # Panics
    /// If `values.len() != rows * cols` or either dimension is zero.
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "expected {} elements for a {}x{} matrix, got {}",
            rows * cols,
            rows,
            cols,
            values.len()
        );
        let mut m = Self::new(rows, cols);
        m.data.copy_from_slice(values);
        m
    }

    /// Create a matrix from nested rows. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        assert!(!rows.is_empty(), "matrix must have at least one row");
        let cols = rows[0].len();
        let mut m = Self::new(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(
                row.len(),
                cols,
                "row {} has {} elements, expected {}",
                i,
                row.len(),
                cols
            );
            m.data[i * cols..(i + 1) * cols].copy_from_slice(row);
        }
        m
    }

    /// Create the `n` x `n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when the matrix is square.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reallocate to new dimensions and zero-fill every element.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        assert!(
            rows > 0 && cols > 0,
            "matrix dimensions must be positive, got {}x{}",
            rows,
            cols
        );
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, 0.0);
    }

    /// Element-wise sum, allocating the result.
    ///
    /// # Panics
    /// If the dimensions differ.
    pub fn add(&self, other: &Matrix) -> Matrix {
        let mut out = Matrix::new(self.rows, self.cols);
        self.add_into(other, &mut out);
        out
    }

    /// Element-wise sum into a caller-supplied buffer, which is resized and
    /// zeroed first.
    pub fn add_into(&self, other: &Matrix, out: &mut Matrix) {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "matrix dimensions incompatible for addition: {}x{} vs {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        out.resize(self.rows, self.cols);
        for (o, (a, b)) in out
            .data
            .iter_mut()
            .zip(self.data.iter().zip(other.data.iter()))
        {
            *o = a + b;
        }
    }

    /// Element-wise difference, allocating the result.
    ///
    /// # Panics
    /// If the dimensions differ.
    pub fn subtract(&self, other: &Matrix) -> Matrix {
        let mut out = Matrix::new(self.rows, self.cols);
        self.subtract_into(other, &mut out);
        out
    }

    /// Element-wise difference into a caller-supplied buffer.
    pub fn subtract_into(&self, other: &Matrix, out: &mut Matrix) {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "matrix dimensions incompatible for subtraction: {}x{} vs {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        out.resize(self.rows, self.cols);
        for (o, (a, b)) in out
            .data
            .iter_mut()
            .zip(self.data.iter().zip(other.data.iter()))
        {
            *o = a - b;
        }
    }

    /// Matrix product `self * other`, allocating the result.
    ///
    /// # Panics
    /// If `self.cols() != other.rows()`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let mut out = Matrix::new(self.rows, other.cols);
        self.multiply_into(other, &mut out);
        out
    }

    /// Matrix product into a caller-supplied buffer, which is resized to
    /// `self.rows() x other.cols()` and zeroed first.
    pub fn multiply_into(&self, other: &Matrix, out: &mut Matrix) {
        assert!(
            self.cols == other.rows,
            "matrix dimensions incompatible for multiplication: {}x{} vs {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        out.resize(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
    }

    /// Transpose, allocating the result.
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::new(self.cols, self.rows);
        self.transpose_into(&mut out);
        out
    }

    /// Transpose into a caller-supplied buffer.
    pub fn transpose_into(&self, out: &mut Matrix) {
        out.resize(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
    }

    /// The minor of this matrix: a copy with `row` and `col` removed.
    ///
    /// # Panics
    /// If the matrix is 1x1 in the removed direction or the indices are out
    /// of range.
    pub fn minor(&self, row: usize, col: usize) -> Matrix {
        assert!(
            row < self.rows && col < self.cols,
            "minor indices ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        let mut out = Matrix::new(self.rows - 1, self.cols - 1);
        let mut r = 0;
        for i in 0..self.rows {
            if i == row {
                continue;
            }
            let mut c = 0;
            for j in 0..self.cols {
                if j == col {
                    continue;
                }
                out.data[r * out.cols + c] = self.data[i * self.cols + j];
                c += 1;
            }
            r += 1;
        }
        out
    }

    /// Determinant by cofactor expansion.
    ///
    /// Expands along the row or column containing the most zero entries
    /// (rows scanned before columns, first maximum wins), and skips terms
    /// with a zero leading coefficient. This keeps the recursion shallow for
    /// sparse matrices without changing the result.
    ///
    /// # Panics
    /// If the matrix is not square.
    pub fn determinant(&self) -> f64 {
        assert!(
            self.is_square(),
            "determinant requires a square matrix, got {}x{}",
            self.rows,
            self.cols
        );
        match self.rows {
            1 => self.data[0],
            2 => self.data[0] * self.data[3] - self.data[1] * self.data[2],
            _ => {
                let (axis, index) = self.expansion_axis();
                let mut det = 0.0;
                match axis {
                    Axis::Row => {
                        for j in 0..self.cols {
                            let a = self.data[index * self.cols + j];
                            if a == 0.0 {
                                continue;
                            }
                            det += cofactor_sign(index, j) * a * self.minor(index, j).determinant();
                        }
                    }
                    Axis::Col => {
                        for i in 0..self.rows {
                            let a = self.data[i * self.cols + index];
                            if a == 0.0 {
                                continue;
                            }
                            det += cofactor_sign(i, index) * a * self.minor(i, index).determinant();
                        }
                    }
                }
                det
            }
        }
    }

    /// Inverse via the adjugate.
    ///
    /// Returns `None` when the determinant is exactly zero; there is no
    /// tolerance, matching the recoverable "no inverse" signal expected by
    /// the covariance layer.
    ///
    /// # Panics
    /// If the matrix is not square.
    pub fn invert(&self) -> Option<Matrix> {
        assert!(
            self.is_square(),
            "inversion requires a square matrix, got {}x{}",
            self.rows,
            self.cols
        );
        let det = self.determinant();
        if det == 0.0 {
            return None;
        }
        if self.rows == 1 {
            return Some(Matrix::from_row_slice(1, 1, &[1.0 / det]));
        }
        // adjugate = transpose of the cofactor matrix
        let mut out = Matrix::new(self.rows, self.cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                let cof = cofactor_sign(i, j) * self.minor(i, j).determinant();
                out.data[j * self.cols + i] = cof / det;
            }
        }
        Some(out)
    }

    /// Pick the expansion axis for the determinant: the row or column with
    /// the most zeros, rows scanned first.
    fn expansion_axis(&self) -> (Axis, usize) {
        let mut best = (Axis::Row, 0);
        let mut best_zeros = 0;
        for i in 0..self.rows {
            let zeros = (0..self.cols)
                .filter(|&j| self.data[i * self.cols + j] == 0.0)
                .count();
            if zeros > best_zeros {
                best = (Axis::Row, i);
                best_zeros = zeros;
            }
        }
        for j in 0..self.cols {
            let zeros = (0..self.rows)
                .filter(|&i| self.data[i * self.cols + j] == 0.0)
                .count();
            if zeros > best_zeros {
                best = (Axis::Col, j);
                best_zeros = zeros;
            }
        }
        best
    }

    /// Row-major view of the underlying storage.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Row,
    Col,
}

#[inline]
fn cofactor_sign(i: usize, j: usize) -> f64 {
    if (i + j) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        &mut self.data[i * self.cols + j]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            for j in 0..self.cols {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>12.6}", self.data[i * self.cols + j])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
