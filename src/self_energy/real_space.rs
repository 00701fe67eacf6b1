// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Real Space
//!
//! Green's functions and self-energies of a finite region cut from a periodic system. The region
//! is `unfold[s]` layers deep along the semi-infinite axis `s` and `unfold[k]` cells wide along each
//! integrated k-axis. Along `s` the surroundings are two semi-infinite leads, found by decimation,
//! and along the k-axes the surroundings are recovered by Brillouin zone integration of the
//! Bloch-unfolded Green's function.
//!
//! Region orbitals are ordered with the layers along `s` varying fastest, followed by the copies
//! along the k-axes in ascending axis order.
//!
//! A calculator is built, configured and initialised before it can be queried
//!
//! ```ignore
//! let mut calculator = RealSpaceSelfEnergyBuilder::new()
//!     .with_parent(&operator)
//!     .with_semi_axis(Axis::A)
//!     .with_k_axes(&[Axis::B])
//!     .with_unfold([3, 4, 1])
//!     .build()?;
//! calculator.set_options(RealSpaceOptions::default());
//! calculator.initialize()?;
//! let sigma = calculator.self_energy(energy, &[0.; 3], false, true)?;
//! ```

use super::{broadened, DecimationSettings, RecursiveSelfEnergy};
use crate::{
    constants::{DEFAULT_DK, DEFAULT_EPS, DEFAULT_ETA, DEFAULT_MAX_ITERATIONS},
    error::{ConfigurationError, PreconditionError, SelfEnergyError},
    operator::{Axis, Direction, SemiInfinite, SparseOperator},
    spectral::{Bloch, BrillouinZone, TransferTiling},
    utilities::matrices::{invert, restrict, solve, unit_columns},
};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::Deserialize;
use std::borrow::Cow;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
/// Numerical options of a real-space calculation, fixed until the next `initialize`
pub struct RealSpaceOptions {
    /// Broadening added to purely real energies
    pub eta: f64,
    /// Density of the default k-grid, in points per unit reciprocal length
    pub dk: f64,
    /// Whether the default k-grid uses time-reversal symmetry
    pub trs: bool,
    /// Convergence threshold of the decimation
    pub eps: f64,
    /// Iteration cap of the decimation
    pub max_iterations: usize,
    /// An explicit integration sample, replacing the grid derived from `dk` and `trs`
    #[serde(skip)]
    pub bz: Option<BrillouinZone>,
}

impl Default for RealSpaceOptions {
    fn default() -> Self {
        Self {
            eta: DEFAULT_ETA,
            dk: DEFAULT_DK,
            trs: true,
            eps: DEFAULT_EPS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            bz: None,
        }
    }
}

impl RealSpaceOptions {
    fn decimation_settings(&self) -> DecimationSettings {
        DecimationSettings {
            eta: self.eta,
            eps: self.eps,
            max_iterations: self.max_iterations,
        }
    }
}

/// Builder for [`RealSpaceSelfEnergy`], a parent operator and a semi-infinite axis are required
pub struct RealSpaceSelfEnergyBuilder<RefParent, SemiAxis> {
    parent: RefParent,
    semi_axis: SemiAxis,
    k_axes: Vec<Axis>,
    unfold: [usize; 3],
    options: Option<RealSpaceOptions>,
}

impl RealSpaceSelfEnergyBuilder<(), ()> {
    /// An empty builder, with no k-axes and no unfolding
    pub fn new() -> Self {
        Self {
            parent: (),
            semi_axis: (),
            k_axes: Vec::new(),
            unfold: [1, 1, 1],
            options: None,
        }
    }
}

impl Default for RealSpaceSelfEnergyBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefParent, SemiAxis> RealSpaceSelfEnergyBuilder<RefParent, SemiAxis> {
    /// The periodic operator the region is cut from
    pub fn with_parent(
        self,
        parent: &SparseOperator,
    ) -> RealSpaceSelfEnergyBuilder<&SparseOperator, SemiAxis> {
        RealSpaceSelfEnergyBuilder {
            parent,
            semi_axis: self.semi_axis,
            k_axes: self.k_axes,
            unfold: self.unfold,
            options: self.options,
        }
    }

    /// The axis along which the region is coupled to two semi-infinite leads
    pub fn with_semi_axis(self, semi_axis: Axis) -> RealSpaceSelfEnergyBuilder<RefParent, Axis> {
        RealSpaceSelfEnergyBuilder {
            parent: self.parent,
            semi_axis,
            k_axes: self.k_axes,
            unfold: self.unfold,
            options: self.options,
        }
    }

    /// Axes integrated over the Brillouin zone
    pub fn with_k_axes(self, k_axes: &[Axis]) -> Self {
        Self {
            k_axes: k_axes.to_vec(),
            ..self
        }
    }

    /// Number of parent cells in the region along each axis
    pub fn with_unfold(self, unfold: [usize; 3]) -> Self {
        Self { unfold, ..self }
    }

    /// Options applied on construction, leaving the calculator ready for `initialize`
    pub fn with_options(self, options: RealSpaceOptions) -> Self {
        Self {
            options: Some(options),
            ..self
        }
    }
}

impl<'a> RealSpaceSelfEnergyBuilder<&'a SparseOperator, Axis> {
    /// Validates the region against the periodicity of the parent
    #[tracing::instrument(name = "Real space self-energy builder", level = "info", skip(self))]
    pub fn build(self) -> Result<RealSpaceSelfEnergy, ConfigurationError> {
        let semi_axis = self.semi_axis;
        let nsc = self.parent.nsc();

        let mut k_axes = self.k_axes.clone();
        k_axes.sort();
        k_axes.dedup();
        if k_axes.len() != self.k_axes.len() || k_axes.len() > 2 {
            return Err(ConfigurationError::KAxes(self.k_axes));
        }
        if k_axes.contains(&semi_axis) {
            return Err(ConfigurationError::SemiInfiniteAxisIntegrated(semi_axis));
        }
        for &axis in k_axes.iter() {
            if nsc[axis.index()] < 3 {
                return Err(ConfigurationError::NonPeriodicKAxis {
                    axis,
                    nsc: nsc[axis.index()],
                });
            }
        }
        if nsc[semi_axis.index()] != 3 {
            return Err(ConfigurationError::SemiInfiniteImages {
                axis: semi_axis,
                nsc: nsc[semi_axis.index()],
            });
        }

        let unfold = self.unfold.map(|n| n.max(1));
        for axis in Axis::ALL {
            let factor = unfold[axis.index()];
            if factor > 1 && axis != semi_axis && !k_axes.contains(&axis) {
                return Err(ConfigurationError::UnfoldAlongFixedAxis { axis, factor });
            }
        }

        let state = match self.options {
            Some(options) => State::Configured(options),
            None => State::Unconfigured,
        };
        Ok(RealSpaceSelfEnergy {
            parent: self.parent.clone(),
            semi_axis,
            k_axes,
            unfold,
            state,
        })
    }
}

#[derive(Clone, Debug)]
/// How a single k-point Green's function of the region is obtained along the semi-infinite axis
enum Layering {
    /// One layer, dressed directly by both leads
    Single,
    /// Several layers, generated from one diagonal block by the transfer matrices
    Tiled(TransferTiling),
}

#[derive(Clone, Debug)]
struct Prepared {
    options: RealSpaceOptions,
    lead: RecursiveSelfEnergy,
    /// The region operator, without periodicity along the semi-infinite and k-axes
    region: SparseOperator,
    /// Region orbitals coupling out of the region
    coupling_orbitals: Vec<usize>,
    bz: BrillouinZone,
    layering: Layering,
    bloch: Bloch,
}

#[derive(Clone, Debug)]
enum State {
    Unconfigured,
    Configured(RealSpaceOptions),
    Ready(Box<Prepared>),
}

#[derive(Clone, Debug)]
/// Self-energy of a finite region of a system which is semi-infinite along one axis
pub struct RealSpaceSelfEnergy {
    parent: SparseOperator,
    semi_axis: Axis,
    /// Integrated axes, sorted
    k_axes: Vec<Axis>,
    unfold: [usize; 3],
    state: State,
}

impl RealSpaceSelfEnergy {
    /// The untiled periodic operator
    pub fn parent(&self) -> &SparseOperator {
        &self.parent
    }

    /// The semi-infinite axis
    pub fn semi_axis(&self) -> Axis {
        self.semi_axis
    }

    /// The integrated axes in ascending order
    pub fn k_axes(&self) -> &[Axis] {
        &self.k_axes
    }

    /// Cells of the parent in the region along each axis
    pub fn unfold(&self) -> [usize; 3] {
        self.unfold
    }

    /// The options currently in force, if any have been set
    pub fn options(&self) -> Option<&RealSpaceOptions> {
        match &self.state {
            State::Unconfigured => None,
            State::Configured(options) => Some(options),
            State::Ready(prepared) => Some(&prepared.options),
        }
    }

    /// Whether queries can be answered
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Replaces the options, `initialize` must be called again before querying
    pub fn set_options(&mut self, options: RealSpaceOptions) {
        self.state = State::Configured(options);
    }

    /// Discards everything prepared by `initialize` together with the options
    pub fn clear(&mut self) {
        self.state = State::Unconfigured;
    }

    /// Builds the lead, the region operator, its coupling orbitals and the integration sample
    #[tracing::instrument(name = "Real space self-energy", level = "info", skip(self))]
    pub fn initialize(&mut self) -> Result<(), SelfEnergyError> {
        let options = match &self.state {
            State::Unconfigured => return Err(PreconditionError::NotConfigured.into()),
            State::Configured(options) => options.clone(),
            State::Ready(prepared) => prepared.options.clone(),
        };

        // The transfer matrices below assume the lead extends along the negative axis
        let lead = RecursiveSelfEnergy::new(
            &self.parent,
            SemiInfinite::new(self.semi_axis, Direction::Negative),
            options.decimation_settings(),
        )?;
        let region = self.real_space_parent()?;
        let (_, atoms) = self.real_space_coupling()?;
        let coupling_orbitals = region.atom_orbitals(&atoms)?;
        tracing::debug!(
            "Region of {} orbitals, {} couple out of the region",
            region.num_orbitals(),
            coupling_orbitals.len()
        );

        let bz = match &options.bz {
            Some(bz) => bz.clone(),
            None => self.default_brillouin_zone(&options)?,
        };

        let tile = self.unfold[self.semi_axis.index()];
        let layering = if tile == 1 {
            Layering::Single
        } else {
            Layering::Tiled(TransferTiling::new(tile))
        };
        let mut unfold = self.unfold;
        unfold[self.semi_axis.index()] = 1;

        self.state = State::Ready(Box::new(Prepared {
            options,
            lead,
            region,
            coupling_orbitals,
            bz,
            layering,
            bloch: Bloch::new(unfold),
        }));
        Ok(())
    }

    /// Monkhorst-Pack grid of the unfolded cell with `ceil(dk |b|)` points along each k-axis
    fn default_brillouin_zone(
        &self,
        options: &RealSpaceOptions,
    ) -> Result<BrillouinZone, ConfigurationError> {
        let lengths = self.parent.lattice().scaled(self.unfold).reciprocal_lengths();
        let mut nk = [1; 3];
        for axis in self.k_axes.iter() {
            nk[axis.index()] = ((options.dk * lengths[axis.index()]).ceil() as usize).max(1);
        }
        tracing::debug!("Default k-grid {:?}, time-reversal symmetry {}", nk, options.trs);
        BrillouinZone::monkhorst_pack(nk, options.trs)
    }

    /// The parent tiled along the semi-infinite axis, then along each k-axis
    fn tiled_parent(&self) -> Result<SparseOperator, ConfigurationError> {
        let s = self.semi_axis;
        self.k_axes
            .iter()
            .try_fold(self.parent.tile(self.unfold[s.index()], s)?, |tiled, &axis| {
                tiled.tile(self.unfold[axis.index()], axis)
            })
    }

    /// `nsc` of `operator` with the semi-infinite and k-axes set to `open` and the rest to `closed`
    fn region_nsc(
        &self,
        operator: &SparseOperator,
        open: Option<usize>,
        closed: Option<usize>,
    ) -> [usize; 3] {
        let mut nsc = operator.nsc();
        for axis in Axis::ALL {
            let replacement = if axis == self.semi_axis || self.k_axes.contains(&axis) {
                open
            } else {
                closed
            };
            if let Some(n) = replacement {
                nsc[axis.index()] = n;
            }
        }
        nsc
    }

    /// The region operator, without periodicity along the semi-infinite and k-axes
    pub fn real_space_parent(&self) -> Result<SparseOperator, ConfigurationError> {
        let tiled = self.tiled_parent()?;
        let nsc = self.region_nsc(&tiled, Some(1), None);
        tiled.with_nsc(nsc)
    }

    /// The region operator restricted to the atoms coupling out of the region, and those atoms
    ///
    /// Periodicity along axes which are neither semi-infinite nor integrated is ignored when
    /// deciding which atoms couple out.
    pub fn real_space_coupling(&self) -> Result<(SparseOperator, Vec<usize>), ConfigurationError> {
        let tiled = self.tiled_parent()?;
        let open = tiled.with_nsc(self.region_nsc(&tiled, None, Some(1)))?;
        let atoms = open.coupling_atoms()?;
        let restricted = tiled.sub_atoms(&atoms)?;
        let nsc = self.region_nsc(&restricted, Some(1), None);
        Ok((restricted.with_nsc(nsc)?, atoms))
    }

    fn prepared(&self) -> Result<&Prepared, PreconditionError> {
        match &self.state {
            State::Ready(prepared) => Ok(prepared),
            _ => Err(PreconditionError::NotInitialized),
        }
    }

    /// Region orbitals coupling out of the region
    pub fn coupling_orbitals(&self) -> Result<&[usize], PreconditionError> {
        Ok(&self.prepared()?.coupling_orbitals)
    }

    /// The integration sample prepared by `initialize`
    pub fn brillouin_zone(&self) -> Result<&BrillouinZone, PreconditionError> {
        Ok(&self.prepared()?.bz)
    }

    /// Green's function of the region at `k`, in units of the reciprocal vectors of the region
    ///
    /// A nonzero `k` may only have components along axes which are neither semi-infinite nor
    /// integrated, and requires a sample without time-reversal symmetry.
    pub fn green(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
    ) -> Result<DMatrix<Complex<f64>>, SelfEnergyError> {
        let prepared = self.prepared()?;
        let energy = broadened(energy, prepared.options.eta);

        let bz = if k.iter().any(|&component| component != 0.) {
            for &axis in std::iter::once(&self.semi_axis).chain(self.k_axes.iter()) {
                let value = k[axis.index()];
                if value != 0. {
                    return Err(PreconditionError::IntegratedAxisK { axis, value }.into());
                }
            }
            if prepared.bz.trs() {
                return Err(PreconditionError::TimeReversalWithExplicitK.into());
            }
            Cow::Owned(prepared.bz.shifted(k))
        } else {
            Cow::Borrowed(&prepared.bz)
        };

        bz.integrate(|point| {
            prepared
                .bloch
                .unfold(point, |small| self.layer_green(prepared, energy, small))
        })
    }

    /// Green's function of the layers along the semi-infinite axis at a single k-point of the parent
    fn layer_green(
        &self,
        prepared: &Prepared,
        energy: Complex<f64>,
        k: &[f64; 3],
    ) -> Result<DMatrix<Complex<f64>>, SelfEnergyError> {
        let lead = &prepared.lead;
        match &prepared.layering {
            Layering::Single => {
                let (left, right) = lead.self_energy_lr(energy, k, false)?;
                let operand = lead.principal().inverse_operand(energy, k) - left - right;
                Ok(invert(operand, "layer green's function")?)
            }
            Layering::Tiled(tiling) => {
                let (left, right) = lead.self_energy_lr(energy, k, true)?;
                // Couplings as blocks of `S E - P`, from a layer into the layer behind and ahead
                let (forward, backward) = lead.couplings(energy, k);
                let behind = -forward;
                let ahead = -backward;

                let upper = -solve(&left, &ahead, "upper transfer matrix")?;
                let diagonal = invert(&right + &behind * &upper, "layer green's function")?;
                let lower = -solve(&right, &behind, "lower transfer matrix")?;
                Ok(tiling.assemble(&diagonal, &lower, &upper))
            }
        }
    }

    /// Self-energy of the region at `k`
    ///
    /// With `bulk` the dressed operand `S E - P - Σ`, the inverse Green's function, is returned.
    /// With `coupling` the result is restricted to the orbitals coupling out of the region, found
    /// from selected columns of the inverse rather than the full inverse.
    pub fn self_energy(
        &self,
        energy: Complex<f64>,
        k: &[f64; 3],
        bulk: bool,
        coupling: bool,
    ) -> Result<DMatrix<Complex<f64>>, SelfEnergyError> {
        let prepared = self.prepared()?;
        let energy = broadened(energy, prepared.options.eta);
        let green = self.green(energy, k)?;

        if coupling {
            let orbitals = &prepared.coupling_orbitals;
            let columns = unit_columns(green.nrows(), orbitals);
            let inverse = solve(&green, &columns, "coupling self-energy")?.select_rows(orbitals.iter());
            if bulk {
                return Ok(inverse);
            }
            let operand = restrict(&prepared.region.inverse_operand(energy, k), orbitals);
            return Ok(operand - inverse);
        }

        let inverse = invert(green, "region self-energy")?;
        if bulk {
            return Ok(inverse);
        }
        Ok(prepared.region.inverse_operand(energy, k) - inverse)
    }
}
