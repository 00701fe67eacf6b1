// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Realspace-NEGF computes open-boundary Green's functions and self-energies of finite regions
//! cut from periodic tight-binding systems
//!
//! # Overview
//! A region of a periodic system is opened along one lattice vector, where it couples to two
//! semi-infinite leads, and may remain periodic along up to two further lattice vectors. The
//! self-energy of the leads is found with the Lopez-Sancho decimation
//! ([Lopez Sancho 1985](https://doi.org/10.1088/0305-4608/15/4/009)). Periodic directions are
//! integrated over the Brillouin zone, with Bloch's theorem relating the Green's function of the
//! region to that of the underlying unit cell. The resulting real-space self-energy describes a
//! finite patch embedded in an otherwise infinite system.
//!
//! # Usage
//! The library is driven through a `RealSpaceSelfEnergy`, built from a `SparseOperator`. The binary
//! computes the density of states of a region defined in a `.toml` file:
//!
//! ```toml
//! [model]
//! cell = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 10.0]]
//! nsc = [3, 3, 1]
//! orbitals_per_atom = [1]
//!
//! [[model.hoppings]]
//! from = 0
//! to = 0
//! offset = [1, 0, 0]
//! value = -1.0
//!
//! [region]
//! semi_axis = 0
//! k_axes = [1]
//! unfold = [3, 4, 1]
//!
//! [spectral]
//! number_of_energy_points = 201
//! minimum_energy = -4.0
//! maximum_energy = 4.0
//! ```
//!
//! where further hoppings are appended with subsequent `model.hoppings` fields.

#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

/// The command line application and tracing set-up
pub mod app;

/// Default numerical settings
pub mod constants;

/// Error handling
pub mod error;

/// Lattices and sparse lattice-periodic operators
pub mod operator;

/// Decimation and real-space self-energies
pub mod self_energy;

/// Brillouin zone sampling, Bloch unfolding and energy grids
pub mod spectral;

/// Helper functions
mod utilities;

pub use error::{ConfigurationError, DecimationError, PreconditionError, SelfEnergyError};
pub use operator::{Axis, Direction, Lattice, SemiInfinite, SparseOperator, SparseOperatorBuilder};
pub use self_energy::{
    DecimationSettings, RealSpaceOptions, RealSpaceSelfEnergy, RealSpaceSelfEnergyBuilder,
    RecursiveSelfEnergy,
};
pub use spectral::{Bloch, BrillouinZone};
