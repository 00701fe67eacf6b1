// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Energy
//!
//! Uniform real energy grids.

use crate::error::ConfigurationError;
use ndarray::Array1;
use std::ops::Range;

/// Builder for an [`EnergySpace`], the range is required
pub struct EnergySpaceBuilder<EnergyRange> {
    number_of_points: usize,
    energy_range: EnergyRange,
}

impl EnergySpaceBuilder<()> {
    /// An empty builder
    pub fn new() -> Self {
        Self {
            number_of_points: 0,
            energy_range: (),
        }
    }
}

impl Default for EnergySpaceBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EnergyRange> EnergySpaceBuilder<EnergyRange> {
    /// Number of grid points, including both ends of the range
    pub fn with_number_of_points(self, number_of_points: usize) -> Self {
        EnergySpaceBuilder {
            number_of_points,
            energy_range: self.energy_range,
        }
    }

    /// Lower and upper ends of the grid
    pub fn with_energy_range(self, energy_range: Range<f64>) -> EnergySpaceBuilder<Range<f64>> {
        EnergySpaceBuilder {
            number_of_points: self.number_of_points,
            energy_range,
        }
    }
}

impl EnergySpaceBuilder<Range<f64>> {
    /// Evenly spaced energies including both ends of the range
    pub fn build(self) -> Result<EnergySpace, ConfigurationError> {
        let Range { start, end } = self.energy_range;
        if self.number_of_points == 0 || !(end >= start) {
            return Err(ConfigurationError::EnergyRange {
                start,
                end,
                points: self.number_of_points,
            });
        }
        let grid = if self.number_of_points == 1 {
            Array1::from_elem(1, start)
        } else {
            Array1::linspace(start, end, self.number_of_points)
        };
        Ok(EnergySpace { grid })
    }
}

#[derive(Clone, Debug)]
/// Real energies at which the Green's function is sampled
pub struct EnergySpace {
    grid: Array1<f64>,
}

impl EnergySpace {
    /// Number of grid points
    pub fn num_points(&self) -> usize {
        self.grid.len()
    }

    /// The energies in ascending order
    pub fn points(&self) -> impl Iterator<Item = &f64> + '_ {
        self.grid.iter()
    }
}
