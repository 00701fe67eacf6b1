// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::LinalgError;
use nalgebra::DMatrix;
use num_complex::Complex;

/// Solves `a x = b` through an LU decomposition of `a`
pub(crate) fn solve(
    a: &DMatrix<Complex<f64>>,
    b: &DMatrix<Complex<f64>>,
    operation: &'static str,
) -> Result<DMatrix<Complex<f64>>, LinalgError> {
    a.clone()
        .lu()
        .solve(b)
        .ok_or(LinalgError::Singular { operation })
}

/// Dense inverse of `a`
pub(crate) fn invert(
    a: DMatrix<Complex<f64>>,
    operation: &'static str,
) -> Result<DMatrix<Complex<f64>>, LinalgError> {
    a.try_inverse().ok_or(LinalgError::Singular { operation })
}

/// The largest modulus of any element in `matrix`
pub(crate) fn max_abs(matrix: &DMatrix<Complex<f64>>) -> f64 {
    matrix
        .iter()
        .fold(0_f64, |max, element| max.max(element.norm()))
}

/// `(M + M^T) / 2`, restoring the half of the zone discarded under time-reversal symmetry
pub(crate) fn transpose_average(matrix: &DMatrix<Complex<f64>>) -> DMatrix<Complex<f64>> {
    (matrix + matrix.transpose()) * Complex::from(0.5)
}

/// An `n x indices.len()` matrix whose columns are the unit vectors `e_i` for `i` in `indices`
pub(crate) fn unit_columns(n: usize, indices: &[usize]) -> DMatrix<Complex<f64>> {
    let mut identity = DMatrix::zeros(n, indices.len());
    for (column, &row) in indices.iter().enumerate() {
        identity[(row, column)] = Complex::from(1_f64);
    }
    identity
}

/// The square sub-block of `matrix` on `indices`
pub(crate) fn restrict(matrix: &DMatrix<Complex<f64>>, indices: &[usize]) -> DMatrix<Complex<f64>> {
    matrix.select_rows(indices.iter()).select_columns(indices.iter())
}

/// Tests for hermiticity of a matrix
#[cfg(test)]
pub(crate) fn is_hermitian(matrix: &DMatrix<Complex<f64>>) -> bool {
    let adjoint = matrix.adjoint();
    matrix.is_square()
        && matrix
            .iter()
            .zip(adjoint.iter())
            .all(|(element, adjoint_element)| {
                (element - adjoint_element).norm() < std::f64::EPSILON * 100_f64
            })
}

#[cfg(test)]
mod test {
    use super::{is_hermitian, restrict, solve, transpose_average, unit_columns};
    use nalgebra::DMatrix;
    use num_complex::Complex;

    #[test]
    fn real_non_hermitian_matrix_returns_false() {
        let matrix = DMatrix::from_row_slice(3, 3, &[1., 2., 3., 4., 5., 6., 7., 8., 9.])
            .map(Complex::from);
        assert!(!is_hermitian(&matrix));
    }

    #[test]
    fn complex_hermitian_matrices_return_true() {
        let matrix = DMatrix::from_row_slice(
            3,
            3,
            &[
                Complex::new(1., 0.),
                Complex::new(1., -2.),
                Complex::new(0., 0.),
                Complex::new(1., 2.),
                Complex::new(0., 0.),
                Complex::new(0., -1.),
                Complex::new(0., 0.),
                Complex::new(0., 1.),
                Complex::new(1., 0.),
            ],
        );
        assert!(is_hermitian(&matrix));
    }

    #[test]
    fn solving_against_unit_columns_extracts_inverse_columns() {
        let matrix = DMatrix::from_row_slice(3, 3, &[4., 1., 0., 1., 3., 1., 0., 1., 2.])
            .map(Complex::from);
        let inverse = matrix.clone().try_inverse().unwrap();
        let columns = solve(&matrix, &unit_columns(3, &[0, 2]), "test").unwrap();
        let selected = columns.select_rows([0, 2].iter());
        let expected = restrict(&inverse, &[0, 2]);
        for (a, b) in selected.iter().zip(expected.iter()) {
            approx::assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            approx::assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn transpose_average_is_symmetric() {
        let matrix = DMatrix::from_fn(4, 4, |i, j| Complex::new(i as f64, (j * j) as f64));
        let averaged = transpose_average(&matrix);
        assert_eq!(averaged, averaged.transpose());
    }
}
