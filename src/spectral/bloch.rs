// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Bloch
//!
//! Reconstruction of supercell matrices from the matrices of a smaller periodic cell.
//!
//! A supercell built from `b_A x b_B x b_C` copies of a cell has a reciprocal-space matrix at `K`
//! which is fully determined by the small-cell matrices at the folded points
//! `k_j = (K + j) / b` for `j` in `[0, b_A) x [0, b_B) x [0, b_C)`. Copies are indexed with the
//! A-axis varying fastest, so block `I` of the result belongs to the copy at
//! `(I mod b_A, (I / b_A) mod b_B, I / (b_A b_B))`.

use itertools::iproduct;
use nalgebra::DMatrix;
use num_complex::Complex;
use std::f64::consts::PI;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Unfolding of a cell repeated `unfold[i]` times along each lattice vector
pub struct Bloch {
    unfold: [usize; 3],
}

impl Bloch {
    /// Zero repetitions are treated as a single copy
    pub fn new(unfold: [usize; 3]) -> Self {
        Self {
            unfold: unfold.map(|n| n.max(1)),
        }
    }

    /// Copies of the small cell along each axis
    pub fn unfold_factors(&self) -> [usize; 3] {
        self.unfold
    }

    /// Number of copies of the small cell in the supercell
    pub fn len(&self) -> usize {
        self.unfold.iter().product()
    }

    /// Whether the supercell is the small cell itself
    pub fn is_trivial(&self) -> bool {
        self.len() == 1
    }

    /// The small-cell k-points needed to reconstruct the supercell matrix at `k`
    pub fn unfold_points(&self, k: &[f64; 3]) -> Vec<[f64; 3]> {
        let [ua, ub, uc] = self.unfold;
        iproduct!(0..uc, 0..ub, 0..ua)
            .map(|(c, b, a)| {
                [
                    (k[0] + a as f64) / ua as f64,
                    (k[1] + b as f64) / ub as f64,
                    (k[2] + c as f64) / uc as f64,
                ]
            })
            .collect()
    }

    /// Supercell matrix at `k` assembled from the small-cell function `f`
    ///
    /// The supercell is unfolded one axis at a time, C outermost and A innermost, each step
    /// combining the matrices of the step below. Along an axis with `b` copies block `(i, l)` is
    /// `(1/b) Σ_j f(k_j) exp(2πi k_j (i - l))`, which only depends on `i - l`. With no repetitions
    /// `f(k)` is returned directly.
    pub fn unfold<F, E>(&self, k: &[f64; 3], f: F) -> Result<DMatrix<Complex<f64>>, E>
    where
        F: Fn(&[f64; 3]) -> Result<DMatrix<Complex<f64>>, E>,
    {
        self.unfold_axis(2, k, &|kc: &[f64; 3]| {
            self.unfold_axis(1, kc, &|kb: &[f64; 3]| self.unfold_axis(0, kb, &f))
        })
    }

    /// One level of the unfolding, along lattice vector `axis`
    fn unfold_axis<E>(
        &self,
        axis: usize,
        k: &[f64; 3],
        f: &dyn Fn(&[f64; 3]) -> Result<DMatrix<Complex<f64>>, E>,
    ) -> Result<DMatrix<Complex<f64>>, E> {
        let copies = self.unfold[axis];
        if copies == 1 {
            return f(k);
        }
        let normalisation = 1. / copies as f64;

        // Entry `d + copies - 1` holds the block coupling copies a distance `d` apart
        let mut distances: Vec<DMatrix<Complex<f64>>> = Vec::with_capacity(2 * copies - 1);
        for j in 0..copies {
            let mut point = *k;
            point[axis] = (k[axis] + j as f64) * normalisation;
            let small = f(&point)?;
            if distances.is_empty() {
                distances = vec![DMatrix::zeros(small.nrows(), small.ncols()); 2 * copies - 1];
            }
            for (index, distance) in distances.iter_mut().enumerate() {
                let d = index as f64 - (copies - 1) as f64;
                let phase = Complex::new(0., 2. * PI * point[axis] * d).exp() * normalisation;
                *distance += &small * phase;
            }
        }

        let n = distances[0].nrows();
        let mut unfolded = DMatrix::zeros(copies * n, copies * n);
        for i in 0..copies {
            for l in 0..copies {
                unfolded
                    .slice_mut((i * n, l * n), (n, n))
                    .copy_from(&distances[i + copies - 1 - l]);
            }
        }
        Ok(unfolded)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Block-Toeplitz assembly of `tile` consecutive layers of a semi-infinite stack
///
/// Layer `i + d` is reached from layer `i` by `d` applications of the forward transfer matrix, and
/// layer `i` from layer `i + d` by `d` applications of the backward one. Blocks are indexed
/// `layer * n + orbital`.
pub struct TransferTiling {
    tile: usize,
}

impl TransferTiling {
    /// Assembly of `tile` layers, at least one
    pub fn new(tile: usize) -> Self {
        Self {
            tile: tile.max(1),
        }
    }

    /// Number of layers
    pub fn tile(&self) -> usize {
        self.tile
    }

    /// The `tile x tile` block matrix generated from `diagonal` by the two transfer matrices
    pub fn assemble(
        &self,
        diagonal: &DMatrix<Complex<f64>>,
        forward: &DMatrix<Complex<f64>>,
        backward: &DMatrix<Complex<f64>>,
    ) -> DMatrix<Complex<f64>> {
        let n = diagonal.nrows();
        let mut tiled = DMatrix::zeros(self.tile * n, self.tile * n);
        let mut lower = diagonal.clone();
        let mut upper = diagonal.clone();
        for distance in 0..self.tile {
            if distance > 0 {
                lower = forward * &lower;
                upper = backward * &upper;
            }
            for layer in 0..self.tile - distance {
                tiled
                    .slice_mut(((layer + distance) * n, layer * n), (n, n))
                    .copy_from(&lower);
                tiled
                    .slice_mut((layer * n, (layer + distance) * n), (n, n))
                    .copy_from(&upper);
            }
        }
        tiled
    }
}
