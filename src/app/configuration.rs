// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Configuration
//!
//! The model, region and numerical settings of a calculation, read from a `.toml` file. Any value
//! can be overridden from the environment, `REALSPACE__OPTIONS__ETA=1e-3` replaces `options.eta`.

use super::error::AppError;
use crate::{
    error::ConfigurationError,
    operator::{Axis, Lattice, Offset, SparseOperator, SparseOperatorBuilder},
    self_energy::RealSpaceOptions,
};
use config::{Config, Environment, File};
use nalgebra::Matrix3;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub(crate) struct Configuration {
    pub(crate) model: ModelConfiguration,
    pub(crate) region: RegionConfiguration,
    #[serde(default)]
    pub(crate) options: RealSpaceOptions,
    pub(crate) spectral: SpectralConfiguration,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelConfiguration {
    /// Lattice vectors, one per row
    pub(crate) cell: [[f64; 3]; 3],
    pub(crate) nsc: [usize; 3],
    pub(crate) orbitals_per_atom: Vec<usize>,
    /// On-site energy of each orbital
    #[serde(default)]
    pub(crate) onsite: Vec<f64>,
    #[serde(default)]
    pub(crate) hoppings: Vec<HoppingConfiguration>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HoppingConfiguration {
    pub(crate) from: usize,
    pub(crate) to: usize,
    #[serde(default)]
    pub(crate) offset: Offset,
    pub(crate) value: f64,
    /// Overlap of the two orbitals, making the basis non-orthogonal
    pub(crate) overlap: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegionConfiguration {
    pub(crate) semi_axis: Axis,
    #[serde(default)]
    pub(crate) k_axes: Vec<Axis>,
    #[serde(default = "single_cell")]
    pub(crate) unfold: [usize; 3],
}

fn single_cell() -> [usize; 3] {
    [1, 1, 1]
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpectralConfiguration {
    pub(crate) number_of_energy_points: usize,
    pub(crate) minimum_energy: f64,
    pub(crate) maximum_energy: f64,
}

impl Configuration {
    pub(crate) fn build(path: &Path) -> Result<Self, AppError> {
        let s = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("REALSPACE").separator("__"))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}

impl ModelConfiguration {
    pub(crate) fn build_operator(&self) -> Result<SparseOperator, ConfigurationError> {
        let cell = Matrix3::from_fn(|i, j| self.cell[i][j]);
        let lattice = Lattice::new(cell, self.nsc)?;
        let mut builder = SparseOperatorBuilder::new()
            .with_lattice(&lattice)
            .with_orbitals_per_atom(&self.orbitals_per_atom);
        for (orbital, &value) in self.onsite.iter().enumerate() {
            builder = builder.with_onsite(orbital, value);
        }
        for hopping in self.hoppings.iter() {
            builder = builder.with_hopping(hopping.from, hopping.to, hopping.offset, hopping.value);
            if let Some(overlap) = hopping.overlap {
                builder = builder.with_overlap(hopping.from, hopping.to, hopping.offset, overlap);
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;
    use crate::operator::Axis;
    use approx::assert_relative_eq;
    use config::{Config, File, FileFormat};

    const SQUARE: &str = r#"
        [model]
        cell = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 10.0]]
        nsc = [3, 3, 1]
        orbitals_per_atom = [1]
        onsite = [0.1]

        [[model.hoppings]]
        from = 0
        to = 0
        offset = [1, 0, 0]
        value = -1.0

        [[model.hoppings]]
        from = 0
        to = 0
        offset = [0, 1, 0]
        value = -1.0

        [region]
        semi_axis = 0
        k_axes = [1]
        unfold = [2, 3, 1]

        [options]
        eta = 1e-3
        dk = 50.0

        [spectral]
        number_of_energy_points = 11
        minimum_energy = -1.0
        maximum_energy = 1.0
    "#;

    fn parse(source: &str) -> Configuration {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn model_description_builds_the_operator() {
        let configuration = parse(SQUARE);
        assert_eq!(configuration.region.semi_axis, Axis::A);
        assert_eq!(configuration.region.k_axes, vec![Axis::B]);
        assert_relative_eq!(configuration.options.eta, 1e-3);
        assert!(configuration.options.trs);

        let operator = configuration.model.build_operator().unwrap();
        assert!(operator.is_orthogonal());
        let gamma = operator.pk(&[0.; 3]);
        assert_relative_eq!(gamma[(0, 0)].re, 0.1 - 4., epsilon = 1e-12);
    }

    #[test]
    fn overlaps_make_the_basis_non_orthogonal() {
        let source = SQUARE.replace("value = -1.0\n", "value = -1.0\n        overlap = 0.1\n");
        let operator = parse(&source).model.build_operator().unwrap();
        assert!(!operator.is_orthogonal());
        assert_relative_eq!(operator.sk(&[0.; 3])[(0, 0)].re, 1.4, epsilon = 1e-12);
    }
}
