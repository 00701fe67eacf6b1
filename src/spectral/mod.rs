// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Spectral
//!
//! This module provides the discrete reciprocal and energy spaces on which Green's functions are
//! sampled, together with the Bloch machinery relating matrices of a cell to those of its
//! supercells.

pub mod bloch;
pub mod brillouin_zone;
pub mod energy;

pub use bloch::{Bloch, TransferTiling};
pub use brillouin_zone::BrillouinZone;
pub use energy::{EnergySpace, EnergySpaceBuilder};
