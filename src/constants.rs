// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Constants
//!
//! Default numerical settings used when the caller does not provide their own

/// Broadening added to purely real energies
pub const DEFAULT_ETA: f64 = 1e-4;
/// Decimation convergence threshold on max |alpha|
pub const DEFAULT_EPS: f64 = 1e-14;
/// Decimation iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
/// k-points per inverse Angstrom of reciprocal vector length
pub const DEFAULT_DK: f64 = 1000.;
