// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Brillouin zone
//!
//! A finite sample of reciprocal-space points with weights summing to one. Samples are immutable,
//! a query at a shifted set of points works on the copy returned by `shifted`.
//!
//! When the sample uses time-reversal symmetry only one of each `±k` pair is stored, carrying the
//! weight of both. Integrating a quantity obeying `M(-k) = M(k)^T` then restores the discarded half
//! by the symmetrisation `(M + M^T) / 2`.

use crate::{error::ConfigurationError, utilities::matrices::transpose_average};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use num_complex::Complex;
use rayon::prelude::*;
use std::collections::HashMap;

/// Number of k-points evaluated concurrently before their contributions are accumulated
const CHUNK_SIZE: usize = 64;

#[derive(Clone, Debug, PartialEq)]
/// Weighted reciprocal-space sample with an optional time-reversal symmetry
pub struct BrillouinZone {
    /// The k-points in units of the reciprocal lattice vectors, one per row
    k: Array2<f64>,
    weights: Array1<f64>,
    trs: bool,
}

impl BrillouinZone {
    /// A sample from explicit points, `weights` must sum to one
    pub fn new(k: Array2<f64>, weights: Array1<f64>, trs: bool) -> Result<Self, ConfigurationError> {
        if k.ncols() != 3 {
            return Err(ConfigurationError::BrillouinZone(format!(
                "k-points must have 3 components, found {}",
                k.ncols()
            )));
        }
        if k.nrows() != weights.len() {
            return Err(ConfigurationError::BrillouinZone(format!(
                "{} k-points but {} weights",
                k.nrows(),
                weights.len()
            )));
        }
        if weights.is_empty() {
            return Err(ConfigurationError::BrillouinZone(
                "the sample is empty".to_string(),
            ));
        }
        let total = weights.sum();
        if (total - 1.).abs() > 1e-10 {
            return Err(ConfigurationError::BrillouinZone(format!(
                "weights sum to {total}, expected 1"
            )));
        }
        Ok(Self { k, weights, trs })
    }

    /// The Γ-point alone
    pub fn gamma() -> Self {
        Self {
            k: Array2::zeros((1, 3)),
            weights: Array1::ones(1),
            trs: false,
        }
    }

    /// A Monkhorst-Pack grid with `nk` points along each reciprocal vector
    ///
    /// Along an axis with `n` points the grid sits at `(2i - n + 1) / 2n` for `i = 0..n`, which is
    /// symmetric about Γ and contains Γ for odd `n`. With `trs` each `±k` pair is collapsed onto the
    /// first member encountered.
    pub fn monkhorst_pack(nk: [usize; 3], trs: bool) -> Result<Self, ConfigurationError> {
        if nk.iter().any(|&n| n == 0) {
            return Err(ConfigurationError::BrillouinZone(format!(
                "grid {nk:?} has an empty axis"
            )));
        }
        let total = nk.iter().product::<usize>();
        let weight = 1. / total as f64;
        let numerator = |i: usize, n: usize| 2 * i as i64 - n as i64 + 1;

        let mut kept: Vec<[i64; 3]> = Vec::with_capacity(total);
        let mut weights: Vec<f64> = Vec::with_capacity(total);
        let mut position: HashMap<[i64; 3], usize> = HashMap::with_capacity(total);
        for i in 0..nk[0] {
            for j in 0..nk[1] {
                for l in 0..nk[2] {
                    let point = [
                        numerator(i, nk[0]),
                        numerator(j, nk[1]),
                        numerator(l, nk[2]),
                    ];
                    let partner = point.map(|m| -m);
                    match position.get(&partner) {
                        Some(&index) if trs => weights[index] += weight,
                        _ => {
                            position.insert(point, kept.len());
                            kept.push(point);
                            weights.push(weight);
                        }
                    }
                }
            }
        }

        let flat = kept
            .iter()
            .flat_map(|point| {
                point
                    .iter()
                    .zip(nk.iter())
                    .map(|(&m, &n)| m as f64 / (2 * n) as f64)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let k = Array2::from_shape_vec((kept.len(), 3), flat)
            .map_err(|e| ConfigurationError::BrillouinZone(e.to_string()))?;
        Ok(Self {
            k,
            weights: Array1::from(weights),
            trs,
        })
    }

    /// Number of k-points
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the sample holds no k-points
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Whether only half of the zone is stored
    pub fn trs(&self) -> bool {
        self.trs
    }

    /// The k-points in units of the reciprocal lattice vectors
    pub fn points(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.k.outer_iter().map(|row| [row[0], row[1], row[2]])
    }

    /// Weight of each k-point
    pub fn weights(&self) -> impl Iterator<Item = &f64> {
        self.weights.iter()
    }

    /// A copy with every point displaced by `shift`
    pub fn shifted(&self, shift: &[f64; 3]) -> Self {
        let mut k = self.k.clone();
        for mut row in k.outer_iter_mut() {
            row.iter_mut()
                .zip(shift.iter())
                .for_each(|(component, delta)| *component += delta);
        }
        Self {
            k,
            weights: self.weights.clone(),
            trs: self.trs,
        }
    }

    /// Weighted sum `Σ_k w_k f(k)` over the stored points
    ///
    /// Points are evaluated concurrently, contributions are accumulated in sample order so the
    /// result does not depend on the number of threads.
    pub fn average<F, E>(&self, f: F) -> Result<DMatrix<Complex<f64>>, E>
    where
        F: Fn(&[f64; 3]) -> Result<DMatrix<Complex<f64>>, E> + Sync + Send,
        E: Send,
    {
        let points = self.points().collect::<Vec<_>>();
        let weights = self.weights.iter().copied().collect::<Vec<_>>();
        let mut sum: Option<DMatrix<Complex<f64>>> = None;
        for (points, weights) in points.chunks(CHUNK_SIZE).zip(weights.chunks(CHUNK_SIZE)) {
            let evaluated = points
                .par_iter()
                .map(|k| f(k))
                .collect::<Result<Vec<_>, E>>()?;
            for (matrix, &weight) in evaluated.into_iter().zip(weights.iter()) {
                let term = matrix * Complex::from(weight);
                sum = Some(match sum {
                    Some(sum) => sum + term,
                    None => term,
                });
            }
        }
        Ok(sum.unwrap_or_else(|| DMatrix::zeros(0, 0)))
    }

    /// `average`, followed by the symmetrisation `(M + M^T) / 2` when the sample uses time-reversal
    /// symmetry
    pub fn integrate<F, E>(&self, f: F) -> Result<DMatrix<Complex<f64>>, E>
    where
        F: Fn(&[f64; 3]) -> Result<DMatrix<Complex<f64>>, E> + Sync + Send,
        E: Send,
    {
        let average = self.average(f)?;
        if self.trs {
            return Ok(transpose_average(&average));
        }
        Ok(average)
    }
}

#[cfg(test)]
mod test {
    use super::BrillouinZone;
    use crate::error::ConfigurationError;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use ndarray::{array, Array1};
    use num_complex::Complex;
    use proptest::prelude::*;

    #[test]
    fn time_reversal_halves_an_even_grid() {
        let full = BrillouinZone::monkhorst_pack([1, 8, 1], false).unwrap();
        let half = BrillouinZone::monkhorst_pack([1, 8, 1], true).unwrap();
        assert_eq!(full.len(), 8);
        assert_eq!(half.len(), 4);
        for weight in half.weights() {
            assert_relative_eq!(*weight, 0.25);
        }
    }

    #[test]
    fn odd_grids_contain_gamma_once() {
        let half = BrillouinZone::monkhorst_pack([1, 5, 1], true).unwrap();
        assert_eq!(half.len(), 3);
        let gamma = half
            .points()
            .zip(half.weights())
            .find(|(k, _)| k.iter().all(|&x| x == 0.))
            .unwrap();
        assert_relative_eq!(*gamma.1, 0.2);
    }

    #[test]
    fn shifting_leaves_the_original_untouched() {
        let bz = BrillouinZone::monkhorst_pack([1, 4, 1], false).unwrap();
        let shifted = bz.shifted(&[0., 0., 0.25]);
        assert!(bz.points().all(|k| k[2] == 0.));
        assert!(shifted.points().all(|k| k[2] == 0.25));
        assert_eq!(
            bz.points().map(|k| k[1]).collect::<Vec<_>>(),
            shifted.points().map(|k| k[1]).collect::<Vec<_>>()
        );
    }

    #[test]
    fn explicit_samples_must_be_normalised() {
        let k = array![[0., 0., 0.], [0.5, 0., 0.]];
        let error = BrillouinZone::new(k.clone(), Array1::from(vec![0.5, 0.6]), false);
        assert!(matches!(error, Err(ConfigurationError::BrillouinZone(_))));
        assert!(BrillouinZone::new(k, Array1::from(vec![0.5, 0.5]), false).is_ok());
    }

    #[test]
    fn averaging_a_constant_returns_the_constant() {
        let bz = BrillouinZone::monkhorst_pack([3, 4, 1], true).unwrap();
        let constant = DMatrix::from_fn(2, 2, |i, j| Complex::new(i as f64, j as f64));
        let average = bz
            .average(|_| Ok::<_, ()>(constant.clone()))
            .unwrap();
        for (a, b) in average.iter().zip(constant.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn averages_do_not_depend_on_the_number_of_threads() {
        let bz = BrillouinZone::monkhorst_pack([7, 11, 3], false).unwrap();
        let integrand = |k: &[f64; 3]| {
            Ok::<_, ()>(DMatrix::from_fn(3, 3, |i, j| {
                Complex::new((k[0] * (i + 1) as f64).cos(), (k[1] - k[2] * j as f64).sin())
            }))
        };
        let averages = [1, 4]
            .into_iter()
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap()
                    .install(|| bz.average(integrand))
                    .unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(averages[0], averages[1]);
    }

    #[test]
    fn integration_with_time_reversal_symmetrises() {
        let bz = BrillouinZone::monkhorst_pack([1, 4, 1], true).unwrap();
        let integrated = bz
            .integrate(|k| {
                Ok::<_, ()>(DMatrix::from_row_slice(
                    2,
                    2,
                    &[
                        Complex::from(1.),
                        Complex::new(0., k[1]),
                        Complex::from(3.),
                        Complex::from(1.),
                    ],
                ))
            })
            .unwrap();
        assert_eq!(integrated, integrated.transpose());
        assert_relative_eq!(integrated[(0, 1)].re, 1.5);
    }

    #[test]
    fn errors_from_the_integrand_propagate() {
        let bz = BrillouinZone::monkhorst_pack([1, 3, 1], false).unwrap();
        let result = bz.average(|k| {
            if k[1] > 0. {
                Err("positive k")
            } else {
                Ok(DMatrix::zeros(1, 1))
            }
        });
        assert_eq!(result, Err("positive k"));
    }

    proptest! {
        #[test]
        fn monkhorst_pack_weights_are_normalised(
            na in 1_usize..7, nb in 1_usize..7, nc in 1_usize..4, trs in any::<bool>()
        ) {
            let bz = BrillouinZone::monkhorst_pack([na, nb, nc], trs).unwrap();
            let total: f64 = bz.weights().sum();
            prop_assert!((total - 1.).abs() < 1e-12);
            let expected = na * nb * nc;
            if trs {
                prop_assert_eq!(bz.len(), expected / 2 + expected % 2);
            } else {
                prop_assert_eq!(bz.len(), expected);
            }
        }
    }
}
