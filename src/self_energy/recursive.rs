// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Recursive
//!
//! Self-energy of a semi-infinite stack of identical principal layers through the Lopez-Sancho
//! decimation. Each iteration eliminates every second layer of the stack, doubling the range of the
//! renormalised couplings `alpha` (forward) and `beta` (backward). The recursion stops once the
//! renormalised forward coupling has decayed below `eps`.

use super::{broadened, Basis, DecimationSettings};
use crate::{
    error::{ConfigurationError, DecimationError},
    operator::{Direction, SemiInfinite, SparseOperator},
    utilities::matrices::{invert, max_abs, solve},
};
use nalgebra::DMatrix;
use num_complex::Complex;
use std::fmt;

#[derive(Clone, Debug)]
/// Lopez-Sancho decimation of a semi-infinite stack of principal layers
pub struct RecursiveSelfEnergy {
    semi_infinite: SemiInfinite,
    /// The intra-layer operator, periodicity along the semi-infinite axis removed
    principal: SparseOperator,
    /// The coupling from a layer into its neighbour in the semi-infinite direction
    coupling: SparseOperator,
    basis: Basis,
    settings: DecimationSettings,
}

/// Converged quantities of a single decimation
struct Decimated {
    /// `S0 E - P0`
    operand: DMatrix<Complex<f64>>,
    /// The renormalised bulk operand
    bulk: DMatrix<Complex<f64>>,
    /// Accumulated `-Σ_surface`
    surface: DMatrix<Complex<f64>>,
}

impl RecursiveSelfEnergy {
    /// Prepares the principal and coupling layers of `operator` along `semi_infinite`
    ///
    /// Couplings reaching further than the neighbouring layer are discarded with a warning.
    pub fn new(
        operator: &SparseOperator,
        semi_infinite: SemiInfinite,
        settings: DecimationSettings,
    ) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        let axis = semi_infinite.axis;
        let mut nsc = operator.nsc();
        if nsc[axis.index()] == 1 {
            return Err(ConfigurationError::NoSemiInfiniteCoupling(axis));
        }

        nsc[axis.index()] = 1;
        let principal = operator.with_nsc(nsc)?;

        nsc[axis.index()] = 3;
        let nearest = operator.with_nsc(nsc)?;
        if nearest.nnz() < operator.nnz() {
            tracing::warn!(
                "Couplings beyond the neighbouring layer along {} are discarded ({} elements)",
                axis,
                operator.nnz() - nearest.nnz()
            );
        }
        let sign = semi_infinite.direction.sign();
        let coupling = nearest.retain_images(|offset| offset[axis.index()] == sign);

        Ok(Self {
            semi_infinite,
            basis: Basis::of(operator),
            principal,
            coupling,
            settings,
        })
    }

    /// Axis and direction of the lead
    pub fn semi_infinite(&self) -> SemiInfinite {
        self.semi_infinite
    }

    /// The intra-layer operator
    pub fn principal(&self) -> &SparseOperator {
        &self.principal
    }

    /// The coupling into the next layer of the lead
    pub fn coupling(&self) -> &SparseOperator {
        &self.coupling
    }

    /// Numerical settings of the recursion
    pub fn settings(&self) -> &DecimationSettings {
        &self.settings
    }

    /// Inter-layer couplings towards and back from the semi-infinite direction at `energy`
    pub(crate) fn couplings(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
    ) -> (DMatrix<Complex<f64>>, DMatrix<Complex<f64>>) {
        self.basis.couplings(&self.coupling, energy, k)
    }

    fn decimate(&self, energy: Complex<f64>, k: &[f64; 3]) -> Result<Decimated, DecimationError> {
        let operand = self.principal.inverse_operand(energy, k);
        let n = operand.nrows();
        let (mut alpha, mut beta) = self.couplings(energy, k);
        let mut bulk = operand.clone();
        let mut surface = DMatrix::zeros(n, n);
        let mut residual = max_abs(&alpha);

        for iteration in 1..=self.settings.max_iterations {
            let mut stacked = DMatrix::zeros(n, 2 * n);
            stacked.columns_mut(0, n).copy_from(&alpha);
            stacked.columns_mut(n, n).copy_from(&beta);
            let transfer = solve(&bulk, &stacked, "decimation")?;
            let tau_alpha = transfer.columns(0, n);
            let tau_beta = transfer.columns(n, n);

            let forward = &alpha * tau_beta;
            bulk -= &forward + &beta * tau_alpha;
            surface -= forward;

            alpha = &alpha * tau_alpha;
            beta = &beta * tau_beta;

            residual = max_abs(&alpha);
            if residual < self.settings.eps {
                tracing::trace!("Decimation converged in {} iterations", iteration);
                return Ok(Decimated {
                    operand,
                    bulk,
                    surface,
                });
            }
        }
        Err(DecimationError::Convergence {
            iterations: self.settings.max_iterations,
            residual,
        })
    }

    /// The bulk Green's function `[S0 E - P0 - Σ_L - Σ_R]^-1`
    pub fn green(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
    ) -> Result<DMatrix<Complex<f64>>, DecimationError> {
        let energy = broadened(energy, self.settings.eta);
        let decimated = self.decimate(energy, k)?;
        Ok(invert(decimated.bulk, "bulk green's function")?)
    }

    /// The self-energy of the semi-infinite lead
    ///
    /// With `bulk` the dressed operand `S0 E - P0 - Σ` is returned instead.
    pub fn self_energy(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
        bulk: bool,
    ) -> Result<DMatrix<Complex<f64>>, DecimationError> {
        let energy = broadened(energy, self.settings.eta);
        let decimated = self.decimate(energy, k)?;
        if bulk {
            return Ok(decimated.operand + decimated.surface);
        }
        Ok(-decimated.surface)
    }

    /// Left and right self-energies from a single decimation
    ///
    /// Both leads share the reference energy, and `Σ_L + Σ_R + G^-1 = S0 E - P0`. With `bulk` each
    /// is returned as its dressed operand `S0 E - P0 - Σ`.
    pub fn self_energy_lr(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
        bulk: bool,
    ) -> Result<(DMatrix<Complex<f64>>, DMatrix<Complex<f64>>), DecimationError> {
        let energy = broadened(energy, self.settings.eta);
        let Decimated {
            operand,
            bulk: renormalised,
            surface,
        } = self.decimate(energy, k)?;
        // `surface` belongs to the lead in the semi-infinite direction
        let (own, other) = if bulk {
            (&operand + &surface, renormalised - &surface)
        } else {
            (-&surface, surface - renormalised + operand)
        };
        Ok(match self.semi_infinite.direction {
            Direction::Positive => (other, own),
            Direction::Negative => (own, other),
        })
    }
}

impl fmt::Display for RecursiveSelfEnergy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecursiveSelfEnergy{{direction: {}, orbitals: {}, orthogonal: {}, nnz: {}}}",
            self.semi_infinite,
            self.principal.num_orbitals(),
            self.principal.is_orthogonal(),
            self.principal.nnz() + self.coupling.nnz()
        )
    }
}

#[cfg(test)]
mod test {
    use super::RecursiveSelfEnergy;
    use crate::{
        error::{ConfigurationError, DecimationError},
        operator::{
            test::{chain, non_orthogonal_ladder, square},
            Axis, Direction, SemiInfinite,
        },
        self_energy::DecimationSettings,
    };
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use num_complex::Complex;

    fn assert_matrices_close(a: &DMatrix<Complex<f64>>, b: &DMatrix<Complex<f64>>, epsilon: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x.re, y.re, epsilon = epsilon);
            assert_relative_eq!(x.im, y.im, epsilon = epsilon);
        }
    }

    #[test]
    fn chain_self_energy_matches_the_closed_form() {
        let t = -1_f64;
        for direction in [Direction::Positive, Direction::Negative] {
            let lead = RecursiveSelfEnergy::new(
                &chain(0., t),
                SemiInfinite::new(Axis::A, direction),
                DecimationSettings::default(),
            )
            .unwrap();
            for energy in [-1.2, 0.3, 0.5, 1.7] {
                let sigma = lead
                    .self_energy(Complex::from(energy), &[0.; 3], false)
                    .unwrap();
                let expected = (Complex::from(energy)
                    - Complex::new(0., (4. * t * t - energy * energy).sqrt()))
                    / 2.;
                assert_relative_eq!(sigma[(0, 0)].re, expected.re, epsilon = 1e-3);
                assert_relative_eq!(sigma[(0, 0)].im, expected.im, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn bulk_green_function_of_a_chain_matches_the_closed_form() {
        let lead = RecursiveSelfEnergy::new(
            &chain(0., -1.),
            "-A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        for energy in [-0.8, 0.1, 1.3] {
            let green = lead.green(Complex::from(energy), &[0.; 3]).unwrap();
            let expected = Complex::new(0., -1. / (4. - energy * energy).sqrt());
            assert_relative_eq!(green[(0, 0)].re, expected.re, epsilon = 1e-3);
            assert_relative_eq!(green[(0, 0)].im, expected.im, epsilon = 1e-3);
        }
    }

    #[test]
    fn bulk_self_energy_is_the_dressed_operand() {
        let lead = RecursiveSelfEnergy::new(
            &chain(0.2, -1.),
            "+A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        let energy = Complex::new(0.4, 1e-3);
        let k = [0.; 3];
        let sigma = lead.self_energy(energy, &k, false).unwrap();
        let dressed = lead.self_energy(energy, &k, true).unwrap();
        let operand = lead.principal().inverse_operand(energy, &k);
        assert_matrices_close(&(operand - sigma), &dressed, 1e-12);
    }

    #[test]
    fn left_and_right_self_energies_recover_the_bulk_green_function() {
        for operator in [chain(0.1, -1.), non_orthogonal_ladder()] {
            for direction in [Direction::Positive, Direction::Negative] {
                let lead = RecursiveSelfEnergy::new(
                    &operator,
                    SemiInfinite::new(Axis::A, direction),
                    DecimationSettings::default(),
                )
                .unwrap();
                let energy = Complex::new(0.35, 1e-3);
                let k = [0.; 3];
                let operand = lead.principal().inverse_operand(energy, &k);
                let inverse_green = lead.green(energy, &k).unwrap().try_inverse().unwrap();

                let (left, right) = lead.self_energy_lr(energy, &k, false).unwrap();
                assert_matrices_close(&(&left + &right + &inverse_green), &operand, 1e-6);

                let (left, right) = lead.self_energy_lr(energy, &k, true).unwrap();
                assert_matrices_close(&(left + right), &(&operand + &inverse_green), 1e-6);
            }
        }
    }

    #[test]
    fn the_lead_in_the_semi_infinite_direction_is_the_single_sided_self_energy() {
        let operator = non_orthogonal_ladder();
        let energy = Complex::new(-0.2, 1e-3);
        let k = [0.; 3];
        let positive = RecursiveSelfEnergy::new(
            &operator,
            "+A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        let negative = RecursiveSelfEnergy::new(
            &operator,
            "-A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        let (_, right) = positive.self_energy_lr(energy, &k, false).unwrap();
        let (left, _) = negative.self_energy_lr(energy, &k, false).unwrap();
        assert_matrices_close(&right, &positive.self_energy(energy, &k, false).unwrap(), 1e-10);
        assert_matrices_close(&left, &negative.self_energy(energy, &k, false).unwrap(), 1e-10);
    }

    #[test]
    fn transverse_k_enters_the_principal_layer() {
        let lead = RecursiveSelfEnergy::new(
            &square(-1.),
            "-A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        // At k_B = 1/4 the transverse band energy vanishes and the chain result is recovered
        let energy = 0.5;
        let sigma = lead
            .self_energy(Complex::from(energy), &[0., 0.25, 0.], false)
            .unwrap();
        let expected = (Complex::from(energy) - Complex::new(0., (4. - energy * energy).sqrt())) / 2.;
        assert_relative_eq!(sigma[(0, 0)].re, expected.re, epsilon = 1e-3);
        assert_relative_eq!(sigma[(0, 0)].im, expected.im, epsilon = 1e-3);
    }

    #[test]
    fn exhausting_the_iteration_cap_reports_the_residual() {
        let settings = DecimationSettings {
            max_iterations: 1,
            ..DecimationSettings::default()
        };
        let lead = RecursiveSelfEnergy::new(&chain(0., -1.), "+A".parse().unwrap(), settings)
            .unwrap();
        let result = lead.self_energy(Complex::from(0.5), &[0.; 3], false);
        match result {
            Err(DecimationError::Convergence {
                iterations,
                residual,
            }) => {
                assert_eq!(iterations, 1);
                assert!(residual > settings.eps);
            }
            other => panic!("expected a convergence failure, found {other:?}"),
        }
    }

    #[test]
    fn vanishing_broadening_is_rejected_before_decimating() {
        let settings = DecimationSettings {
            eta: 0.,
            ..DecimationSettings::default()
        };
        let result = RecursiveSelfEnergy::new(&chain(0., -1.), "+A".parse().unwrap(), settings);
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::NonPositiveBroadening(0.)
        );
    }

    #[test]
    fn a_lead_without_periodic_images_is_rejected() {
        let operator = chain(0., -1.).with_nsc([1, 1, 1]).unwrap();
        let result = RecursiveSelfEnergy::new(
            &operator,
            "+A".parse().unwrap(),
            DecimationSettings::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::NoSemiInfiniteCoupling(Axis::A)
        );
    }

    #[test]
    fn display_names_the_direction() {
        let lead = RecursiveSelfEnergy::new(
            &chain(0., -1.),
            "-A".parse().unwrap(),
            DecimationSettings::default(),
        )
        .unwrap();
        assert!(lead.to_string().starts_with("RecursiveSelfEnergy{direction: -A"));
    }
}
