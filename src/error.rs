// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Error
//!
//! Errors raised while configuring, initialising and evaluating self-energies. Configuration and
//! precondition failures are raised before any numerical work is attempted, numerical failures
//! carry enough information to diagnose the failing call.

use crate::operator::Axis;
use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
/// Malformed axis, supercell, sampling or numerical set-up
pub enum ConfigurationError {
    /// The semi-infinite axis is also listed as a k-axis
    #[error("the semi-infinite axis {0} cannot also be a k-axis")]
    #[diagnostic(code(realspace::semi_axis_integrated))]
    SemiInfiniteAxisIntegrated(Axis),
    /// A k-axis without periodic images
    #[error("k-axis {axis} has {nsc} periodic images, at least 3 are required")]
    #[diagnostic(code(realspace::k_axis_not_periodic))]
    NonPeriodicKAxis {
        /// The offending axis
        axis: Axis,
        /// Its supercell count
        nsc: usize,
    },
    /// The semi-infinite axis couples beyond, or not to, its neighbouring layers
    #[error("the semi-infinite axis {axis} must have exactly 3 periodic images, found {nsc}")]
    #[diagnostic(code(realspace::semi_axis_images))]
    SemiInfiniteImages {
        /// The semi-infinite axis
        axis: Axis,
        /// Its supercell count
        nsc: usize,
    },
    /// The operator has no images along the semi-infinite axis
    #[error("no coupling along the semi-infinite axis {0}")]
    #[diagnostic(code(realspace::no_coupling))]
    NoSemiInfiniteCoupling(Axis),
    /// Unfolding along an axis which is kept finite
    #[error("unfolding by {factor} along axis {axis}, which is neither semi-infinite nor integrated")]
    #[diagnostic(code(realspace::unfold_fixed_axis))]
    UnfoldAlongFixedAxis {
        /// The finite axis
        axis: Axis,
        /// The requested unfolding
        factor: usize,
    },
    /// Repeated k-axes, or more than two
    #[error("k-axes must be distinct and at most two, found {0:?}")]
    #[diagnostic(code(realspace::k_axes))]
    KAxes(Vec<Axis>),
    /// The broadening of real energies must be positive and finite
    #[error("the broadening eta must be positive and finite, found {0}")]
    #[diagnostic(
        code(realspace::broadening),
        help("a non-positive eta gives the advanced Green's function or stalls the decimation")
    )]
    NonPositiveBroadening(f64),
    /// The decimation threshold must be positive
    #[error("the convergence threshold eps must be positive and finite, found {0}")]
    #[diagnostic(code(realspace::tolerance))]
    NonPositiveTolerance(f64),
    /// The decimation must be allowed at least one iteration
    #[error("the decimation iteration cap must be at least 1")]
    #[diagnostic(code(realspace::iterations))]
    NoIterations,
    /// Supercell counts are `2n + 1`
    #[error("the number of supercells along axis {axis} must be odd, found {nsc}")]
    EvenSupercellCount {
        /// The offending axis
        axis: Axis,
        /// The supercell count
        nsc: usize,
    },
    /// Lattice vectors spanning less than three dimensions
    #[error("lattice vectors are linearly dependent")]
    SingularCell,
    /// An axis string other than `+A`, `-A`, `+B`, `-B`, `+C`, `-C`
    #[error("invalid axis specification `{0}`, expected one of +A, -A, +B, -B, +C, -C")]
    InvalidAxis(String),
    /// Orbital index past the end of the cell
    #[error("orbital index {index} out of range for {count} orbitals")]
    OrbitalOutOfRange {
        /// The index
        index: usize,
        /// Orbitals in the cell
        count: usize,
    },
    /// Atom index past the end of the cell
    #[error("atom index {index} out of range for {count} atoms")]
    AtomOutOfRange {
        /// The index
        index: usize,
        /// Atoms in the cell
        count: usize,
    },
    /// An element placed in an image outside the supercell
    #[error("image {offset:?} lies outside the supercell {nsc:?}")]
    ImageOutOfRange {
        /// Offset of the image
        offset: [i32; 3],
        /// Supercell counts
        nsc: [usize; 3],
    },
    /// Sparsity pattern assembly failed
    #[error("failed to assemble the coupling pattern: {0}")]
    Pattern(String),
    /// Weights, points or their lengths are inconsistent
    #[error("invalid Brillouin zone sample: {0}")]
    BrillouinZone(String),
    /// An empty or reversed energy grid
    #[error("energy range {start}..{end} with {points} points is empty")]
    EnergyRange {
        /// Lower end
        start: f64,
        /// Upper end
        end: f64,
        /// Number of points
        points: usize,
    },
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
/// A query was made in a state which cannot answer it
pub enum PreconditionError {
    /// `initialize` was called before options were set
    #[error("options must be set before initialisation")]
    NotConfigured,
    /// A query was made before `initialize`
    #[error("the real-space self-energy has not been initialised")]
    NotInitialized,
    /// An explicit k-point with a halved Brillouin zone
    #[error("an explicit k-point requires a Brillouin zone sample without time-reversal symmetry")]
    TimeReversalWithExplicitK,
    /// An explicit k-component along the semi-infinite axis or a k-axis
    #[error("the k-point must vanish along the integrated axis {axis}, found {value}")]
    IntegratedAxisK {
        /// The integrated axis
        axis: Axis,
        /// The requested component
        value: f64,
    },
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
/// Dense linear algebra failures
pub enum LinalgError {
    /// LU decomposition hit a zero pivot
    #[error("singular matrix encountered during {operation}")]
    Singular {
        /// What was being solved
        operation: &'static str,
    },
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
/// Failures of the Lopez-Sancho recursion
pub enum DecimationError {
    /// The iteration cap was reached
    #[error("decimation did not converge after {iterations} iterations, max |alpha| = {residual:e}")]
    #[diagnostic(help("increase `max_iterations` or the broadening `eta`"))]
    Convergence {
        /// Iterations performed
        iterations: usize,
        /// Largest element of the renormalised coupling on exit
        residual: f64,
    },
    /// A singular layer operand
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
/// Errors returned by the public self-energy and Green's function queries
pub enum SelfEnergyError {
    /// Invalid set-up
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Query in the wrong state
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// Lead decimation failed
    #[error(transparent)]
    Decimation(#[from] DecimationError),
    /// Region inversion failed
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}
