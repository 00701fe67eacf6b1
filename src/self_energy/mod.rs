// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Self Energy
//!
//! Self-energies of semi-infinite leads, and of finite regions cut from a periodic system which is
//! open along one axis.
//!
//! [`RecursiveSelfEnergy`] decimates a semi-infinite stack of principal layers. [`RealSpaceSelfEnergy`]
//! combines the decimation with Brillouin zone integration and Bloch unfolding to give the
//! self-energy of a finite patch of the periodic system.

pub mod real_space;
pub mod recursive;

pub use real_space::{RealSpaceOptions, RealSpaceSelfEnergy, RealSpaceSelfEnergyBuilder};
pub use recursive::RecursiveSelfEnergy;

use crate::{
    constants::{DEFAULT_EPS, DEFAULT_ETA, DEFAULT_MAX_ITERATIONS},
    error::ConfigurationError,
    operator::SparseOperator,
};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::Deserialize;

/// Energy with the broadening `eta` applied when the imaginary part vanishes
pub fn broadened(energy: Complex<f64>, eta: f64) -> Complex<f64> {
    if energy.im == 0. {
        Complex::new(energy.re, eta)
    } else {
        energy
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
/// Numerical settings of the decimation
pub struct DecimationSettings {
    /// Broadening added to purely real energies
    pub eta: f64,
    /// The recursion stops once every element of the renormalised coupling is below `eps`
    pub eps: f64,
    /// Iterations attempted before the recursion is reported as unconverged
    pub max_iterations: usize,
}

impl Default for DecimationSettings {
    fn default() -> Self {
        Self {
            eta: DEFAULT_ETA,
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl DecimationSettings {
    /// Rejects settings under which the recursion cannot converge to the retarded self-energy
    ///
    /// Real energies are evaluated at `E + i eta`, so `eta` must be strictly positive.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.eta > 0. && self.eta.is_finite()) {
            return Err(ConfigurationError::NonPositiveBroadening(self.eta));
        }
        if !(self.eps > 0. && self.eps.is_finite()) {
            return Err(ConfigurationError::NonPositiveTolerance(self.eps));
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::NoIterations);
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Whether the overlap between neighbouring layers takes part in the inter-layer coupling
pub(crate) enum Basis {
    Orthogonal,
    NonOrthogonal,
}

impl Basis {
    pub(crate) fn of(operator: &SparseOperator) -> Self {
        if operator.is_orthogonal() {
            Basis::Orthogonal
        } else {
            Basis::NonOrthogonal
        }
    }

    /// The forward and backward inter-layer couplings of `coupling` at `energy` and `k`
    ///
    /// Orthogonal: `(P1, P1^H)`. Non-orthogonal: `(P1 - S1 E, P1^H - S1^H E)`.
    pub(crate) fn couplings(
        self,
        coupling: &SparseOperator,
        energy: Complex<f64>,
        k: &[f64; 3],
    ) -> (DMatrix<Complex<f64>>, DMatrix<Complex<f64>>) {
        let p = coupling.pk(k);
        match self {
            Basis::Orthogonal => {
                let adjoint = p.adjoint();
                (p, adjoint)
            }
            Basis::NonOrthogonal => {
                let s = coupling.sk(k);
                let backward = p.adjoint() - s.adjoint() * energy;
                (p - s * energy, backward)
            }
        }
    }
}
