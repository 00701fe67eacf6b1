// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Lattice
//!
//! Lattice vectors, supercell image bookkeeping and the axis specifications used to
//! describe semi-infinite directions.

use crate::error::ConfigurationError;
use nalgebra::{Matrix3, RowVector3};
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// Integer offset of a periodic image in units of the lattice vectors
pub type Offset = [i32; 3];

/// The principal image
pub const PRIMARY: Offset = [0, 0, 0];

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "usize")]
/// One of the three lattice vectors
pub enum Axis {
    /// First lattice vector
    A,
    /// Second lattice vector
    B,
    /// Third lattice vector
    C,
}

impl Axis {
    /// All axes in storage order
    pub const ALL: [Axis; 3] = [Axis::A, Axis::B, Axis::C];

    /// Position of the axis in `[f64; 3]` style arrays
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for Axis {
    type Error = ConfigurationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Axis::ALL
            .get(value)
            .copied()
            .ok_or_else(|| ConfigurationError::InvalidAxis(value.to_string()))
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Axis::A => "A",
            Axis::B => "B",
            Axis::C => "C",
        };
        write!(f, "{label}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Sense in which a semi-infinite lead extends away from the principal layer
pub enum Direction {
    /// Along the lattice vector
    Positive,
    /// Against the lattice vector
    Negative,
}

impl Direction {
    /// `+1` or `-1`
    pub fn sign(self) -> i32 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    /// The opposite direction
    pub fn reversed(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// A semi-infinite propagation direction, written `+A`, `-B`, ...
pub struct SemiInfinite {
    /// The lattice vector the lead extends along
    pub axis: Axis,
    /// Whether the lead extends with or against `axis`
    pub direction: Direction,
}

impl SemiInfinite {
    /// Lead extending along `direction` of `axis`
    pub fn new(axis: Axis, direction: Direction) -> Self {
        Self { axis, direction }
    }
}

impl FromStr for SemiInfinite {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidAxis(s.to_string());
        let trimmed = s.trim().to_uppercase();
        let mut chars = trimmed.chars();
        let direction = match chars.next() {
            Some('+') => Direction::Positive,
            Some('-') => Direction::Negative,
            _ => return Err(invalid()),
        };
        let axis = match (chars.next(), chars.next()) {
            (Some('A'), None) => Axis::A,
            (Some('B'), None) => Axis::B,
            (Some('C'), None) => Axis::C,
            _ => return Err(invalid()),
        };
        Ok(Self { axis, direction })
    }
}

impl fmt::Display for SemiInfinite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            Direction::Positive => '+',
            Direction::Negative => '-',
        };
        write!(f, "{sign}{}", self.axis)
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Lattice vectors (rows of `cell`) and the number of periodic images along each of them
pub struct Lattice {
    cell: Matrix3<f64>,
    reciprocal: Matrix3<f64>,
    nsc: [usize; 3],
}

impl Lattice {
    /// Creates a lattice, the rows of `cell` are the lattice vectors and every entry of `nsc` must be odd
    pub fn new(cell: Matrix3<f64>, nsc: [usize; 3]) -> Result<Self, ConfigurationError> {
        check_nsc(nsc)?;
        let inverse = cell.try_inverse().ok_or(ConfigurationError::SingularCell)?;
        Ok(Self {
            cell,
            reciprocal: inverse.transpose() * (2. * std::f64::consts::PI),
            nsc,
        })
    }

    /// Lattice vectors, one per row
    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    /// Reciprocal lattice vectors as rows, including the factor 2π
    pub fn reciprocal(&self) -> &Matrix3<f64> {
        &self.reciprocal
    }

    /// Length of each reciprocal lattice vector
    pub fn reciprocal_lengths(&self) -> [f64; 3] {
        let mut lengths = [0_f64; 3];
        for (length, row) in lengths.iter_mut().zip(self.reciprocal.row_iter()) {
            *length = row.norm();
        }
        lengths
    }

    /// Number of supercell images along each axis
    pub fn nsc(&self) -> [usize; 3] {
        self.nsc
    }

    /// The same lattice vectors with a different image count
    pub fn with_nsc(&self, nsc: [usize; 3]) -> Result<Self, ConfigurationError> {
        check_nsc(nsc)?;
        Ok(Self {
            nsc,
            ..self.clone()
        })
    }

    /// Total number of periodic images
    pub fn number_of_images(&self) -> usize {
        self.nsc.iter().product()
    }

    /// Whether `offset` is one of the images retained by `nsc`
    pub fn contains(&self, offset: &Offset) -> bool {
        offset
            .iter()
            .zip(self.nsc.iter())
            .all(|(&o, &n)| o.unsigned_abs() as usize <= n / 2)
    }

    /// All retained images, the principal image first
    pub fn images(&self) -> Vec<Offset> {
        let half = self.nsc.map(|n| (n / 2) as i32);
        let mut images = vec![PRIMARY];
        for a in -half[0]..=half[0] {
            for b in -half[1]..=half[1] {
                for c in -half[2]..=half[2] {
                    if [a, b, c] != PRIMARY {
                        images.push([a, b, c]);
                    }
                }
            }
        }
        images
    }

    /// Lattice with the vector along `axis` repeated `reps` times
    pub fn tiled(&self, reps: usize, axis: Axis, nsc: [usize; 3]) -> Result<Self, ConfigurationError> {
        check_nsc(nsc)?;
        let mut cell = self.cell;
        let mut reciprocal = self.reciprocal;
        let scaled: RowVector3<f64> = cell.row(axis.index()) * reps as f64;
        cell.set_row(axis.index(), &scaled);
        let scaled: RowVector3<f64> = reciprocal.row(axis.index()) / reps as f64;
        reciprocal.set_row(axis.index(), &scaled);
        Ok(Self {
            cell,
            reciprocal,
            nsc,
        })
    }

    /// Lattice spanned by `unfold[i]` repetitions of each lattice vector, keeping `nsc`
    pub fn scaled(&self, unfold: [usize; 3]) -> Self {
        Axis::ALL.iter().fold(self.clone(), |lattice, &axis| {
            let mut next = lattice.clone();
            let reps = unfold[axis.index()] as f64;
            let scaled: RowVector3<f64> = lattice.cell.row(axis.index()) * reps;
            next.cell.set_row(axis.index(), &scaled);
            let scaled: RowVector3<f64> = lattice.reciprocal.row(axis.index()) / reps;
            next.reciprocal.set_row(axis.index(), &scaled);
            next
        })
    }
}

fn check_nsc(nsc: [usize; 3]) -> Result<(), ConfigurationError> {
    for axis in Axis::ALL {
        let n = nsc[axis.index()];
        if n % 2 == 0 {
            return Err(ConfigurationError::EvenSupercellCount { axis, nsc: n });
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{Axis, Direction, Lattice, SemiInfinite, PRIMARY};
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn semi_infinite_specifications_round_trip_through_strings() {
        for label in ["+A", "-A", "+B", "-B", "+C", "-C"] {
            let parsed: SemiInfinite = label.parse().unwrap();
            assert_eq!(parsed.to_string(), label);
        }
        let lower: SemiInfinite = "-b".parse().unwrap();
        assert_eq!(lower, SemiInfinite::new(Axis::B, Direction::Negative));
        assert!("A".parse::<SemiInfinite>().is_err());
        assert!("+D".parse::<SemiInfinite>().is_err());
        assert!("+AB".parse::<SemiInfinite>().is_err());
    }

    #[test]
    fn even_supercell_counts_are_rejected() {
        assert!(Lattice::new(Matrix3::identity(), [3, 2, 1]).is_err());
    }

    #[test]
    fn images_start_with_the_principal_cell() {
        let lattice = Lattice::new(Matrix3::identity(), [3, 3, 1]).unwrap();
        let images = lattice.images();
        assert_eq!(images.len(), lattice.number_of_images());
        assert_eq!(images[0], PRIMARY);
        assert!(images.iter().all(|image| lattice.contains(image)));
        assert!(!lattice.contains(&[0, 0, 1]));
    }

    #[test]
    fn reciprocal_vectors_are_dual_to_the_cell() {
        let cell = Matrix3::new(2., 0., 0., 1., 3., 0., 0., 0., 10.);
        let lattice = Lattice::new(cell, [1, 1, 1]).unwrap();
        let product = lattice.cell() * lattice.reciprocal().transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 2. * std::f64::consts::PI } else { 0. };
                assert_relative_eq!(product[(i, j)], expected, epsilon = 1e-12);
            }
        }
        let tiled = lattice.scaled([2, 1, 1]);
        assert_relative_eq!(
            tiled.reciprocal_lengths()[0],
            lattice.reciprocal_lengths()[0] / 2.,
            epsilon = 1e-12
        );
    }
}
