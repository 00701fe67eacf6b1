// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Operator
//!
//! A sparse, lattice-periodic operator `P` with an optional overlap `S`. Each periodic image
//! retained by the lattice holds one `CsMat` block coupling the orbitals of the principal cell
//! to the orbitals of that image. Dense reciprocal-space matrices are produced as
//!
//! P(k) = Σ_R P_R exp(2πi k·R)
//!
//! with `k` in units of the reciprocal lattice vectors.
//!
//! An operator is constructed through the `SparseOperatorBuilder` as
//!
//! ```ignore
//! SparseOperatorBuilder::new()
//!     .with_lattice(&lattice)
//!     .with_orbitals_per_atom(&[1, 1])
//!     .with_onsite(0, 0.1)
//!     .with_hopping(0, 1, [0, 0, 0], -2.7)
//!     .build()?;
//! ```
//!
//! All transformations (`with_nsc`, `retain_images`, `tile`, `sub_atoms`) return new operators and
//! leave `self` untouched.

pub mod lattice;

pub use lattice::{Axis, Direction, Lattice, Offset, SemiInfinite, PRIMARY};

use crate::error::ConfigurationError;
use nalgebra::DMatrix;
use nalgebra_sparse::pattern::SparsityPattern;
use num_complex::Complex;
use num_traits::Zero;
use sprs::{CsMat, TriMat};
use std::collections::{BTreeMap, BTreeSet};

/// Blocks of a sparse operator, keyed by the image they couple into
type Images = BTreeMap<Offset, CsMat<f64>>;

#[derive(Clone, Debug)]
/// The sparse operator view consumed by the self-energy calculators
pub struct SparseOperator {
    lattice: Lattice,
    /// Number of orbitals on each atom
    orbitals_per_atom: Vec<usize>,
    /// Index of the first orbital on each atom, with the total number of orbitals appended
    atom_offsets: Vec<usize>,
    /// The coupling (Hamiltonian-like) blocks
    coupling: Images,
    /// The overlap blocks, `None` for an orthogonal basis
    overlap: Option<Images>,
}

impl SparseOperator {
    /// The lattice and its supercell extent
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Number of supercell images along each axis
    pub fn nsc(&self) -> [usize; 3] {
        self.lattice.nsc()
    }

    /// Orbitals in the unit cell
    pub fn num_orbitals(&self) -> usize {
        self.atom_offsets[self.atom_offsets.len() - 1]
    }

    /// Atoms in the unit cell
    pub fn num_atoms(&self) -> usize {
        self.orbitals_per_atom.len()
    }

    /// Number of orbitals carried by each atom
    pub fn orbitals_per_atom(&self) -> &[usize] {
        &self.orbitals_per_atom
    }

    /// Whether the basis is orthogonal, in which case `S(k)` is the identity
    pub fn is_orthogonal(&self) -> bool {
        self.overlap.is_none()
    }

    /// Number of stored non-zero coupling elements across all images
    pub fn nnz(&self) -> usize {
        self.coupling.values().map(|block| block.nnz()).sum()
    }

    /// The images which carry at least one coupling element
    pub fn images(&self) -> impl Iterator<Item = &Offset> + '_ {
        self.coupling.keys()
    }

    /// Dense `P(k)`
    pub fn pk(&self, k: &[f64; 3]) -> DMatrix<Complex<f64>> {
        fold(&self.coupling, k, self.num_orbitals())
    }

    /// Dense `S(k)`, the identity for an orthogonal basis
    pub fn sk(&self, k: &[f64; 3]) -> DMatrix<Complex<f64>> {
        match &self.overlap {
            Some(overlap) => fold(overlap, k, self.num_orbitals()),
            None => DMatrix::identity(self.num_orbitals(), self.num_orbitals()),
        }
    }

    /// Dense `S(k) E - P(k)`
    pub fn inverse_operand(&self, energy: Complex<f64>, k: &[f64; 3]) -> DMatrix<Complex<f64>> {
        self.sk(k) * energy - self.pk(k)
    }

    /// A copy with the number of periodic images changed to `nsc`
    ///
    /// Couplings into images outside the new supercell are discarded.
    pub fn with_nsc(&self, nsc: [usize; 3]) -> Result<Self, ConfigurationError> {
        let lattice = self.lattice.with_nsc(nsc)?;
        let operator = self.retain_images(|offset| lattice.contains(offset));
        Ok(Self {
            lattice,
            ..operator
        })
    }

    /// A copy holding only the blocks whose image satisfies `keep`
    ///
    /// The lattice, and hence the number of periodic images, is unchanged.
    pub fn retain_images(&self, keep: impl Fn(&Offset) -> bool) -> Self {
        let filter = |images: &Images| -> Images {
            images
                .iter()
                .filter(|(offset, _)| keep(offset))
                .map(|(offset, block)| (*offset, block.clone()))
                .collect()
        };
        Self {
            lattice: self.lattice.clone(),
            orbitals_per_atom: self.orbitals_per_atom.clone(),
            atom_offsets: self.atom_offsets.clone(),
            coupling: filter(&self.coupling),
            overlap: self.overlap.as_ref().map(filter),
        }
    }

    /// Repeats the principal cell `reps` times along `axis`
    ///
    /// Orbitals of copy `c` occupy indices `c * n + i`, where `n` is the number of orbitals in `self`.
    pub fn tile(&self, reps: usize, axis: Axis) -> Result<Self, ConfigurationError> {
        let reps = reps.max(1);
        if reps == 1 {
            return Ok(self.clone());
        }
        let ax = axis.index();
        let mut nsc = self.nsc();
        let half = nsc[ax] / 2;
        nsc[ax] = 2 * ((half + reps - 1) / reps) + 1;
        let lattice = self.lattice.tiled(reps, axis, nsc)?;

        let n = self.num_orbitals();
        let tile_images = |images: &Images| -> Images {
            let mut triplets: BTreeMap<Offset, TriMat<f64>> = BTreeMap::new();
            for (offset, block) in images.iter() {
                for copy in 0..reps as i32 {
                    let shifted = copy + offset[ax];
                    let target_copy = shifted.rem_euclid(reps as i32) as usize;
                    let mut target_offset = *offset;
                    target_offset[ax] = shifted.div_euclid(reps as i32);
                    let entry = triplets
                        .entry(target_offset)
                        .or_insert_with(|| TriMat::new((n * reps, n * reps)));
                    for (&value, (row, column)) in block.iter() {
                        entry.add_triplet(
                            copy as usize * n + row,
                            target_copy * n + column,
                            value,
                        );
                    }
                }
            }
            triplets
                .into_iter()
                .map(|(offset, triplets)| (offset, triplets.to_csr()))
                .collect()
        };

        let orbitals_per_atom = self.orbitals_per_atom.repeat(reps);
        Ok(Self {
            lattice,
            atom_offsets: offsets_from_counts(&orbitals_per_atom),
            orbitals_per_atom,
            coupling: tile_images(&self.coupling),
            overlap: self.overlap.as_ref().map(tile_images),
        })
    }

    /// The operator restricted to `atoms`, in the order given
    pub fn sub_atoms(&self, atoms: &[usize]) -> Result<Self, ConfigurationError> {
        let orbitals = self.atom_orbitals(atoms)?;
        let mut map = vec![None; self.num_orbitals()];
        for (new, &old) in orbitals.iter().enumerate() {
            map[old] = Some(new);
        }
        let n = orbitals.len();
        let restrict = |images: &Images| -> Images {
            images
                .iter()
                .filter_map(|(offset, block)| {
                    let mut triplets = TriMat::new((n, n));
                    for (&value, (row, column)) in block.iter() {
                        if let (Some(row), Some(column)) = (map[row], map[column]) {
                            triplets.add_triplet(row, column, value);
                        }
                    }
                    (triplets.nnz() > 0).then(|| (*offset, triplets.to_csr()))
                })
                .collect()
        };
        let orbitals_per_atom = atoms
            .iter()
            .map(|&atom| self.orbitals_per_atom[atom])
            .collect::<Vec<_>>();
        Ok(Self {
            lattice: self.lattice.clone(),
            atom_offsets: offsets_from_counts(&orbitals_per_atom),
            orbitals_per_atom,
            coupling: restrict(&self.coupling),
            overlap: self.overlap.as_ref().map(restrict),
        })
    }

    /// All orbital indices belonging to `atoms`, in the order given
    pub fn atom_orbitals(&self, atoms: &[usize]) -> Result<Vec<usize>, ConfigurationError> {
        let mut orbitals = Vec::new();
        for &atom in atoms {
            if atom >= self.num_atoms() {
                return Err(ConfigurationError::AtomOutOfRange {
                    index: atom,
                    count: self.num_atoms(),
                });
            }
            orbitals.extend(self.atom_offsets[atom]..self.atom_offsets[atom + 1]);
        }
        Ok(orbitals)
    }

    /// The atom hosting `orbital`
    pub fn orbital_atom(&self, orbital: usize) -> Result<usize, ConfigurationError> {
        if orbital >= self.num_orbitals() {
            return Err(ConfigurationError::OrbitalOutOfRange {
                index: orbital,
                count: self.num_orbitals(),
            });
        }
        Ok(self.atom_offsets.partition_point(|&start| start <= orbital) - 1)
    }

    /// Sparsity pattern of the couplings leaving the principal cell, folded back into it
    ///
    /// Lane `i` lists every orbital `j` such that `i` couples to `j` in some image other than the
    /// principal one. Only the pattern is inspected, values are discarded.
    pub fn coupling_pattern(&self) -> Result<SparsityPattern, ConfigurationError> {
        let n = self.num_orbitals();
        let mut lanes = vec![BTreeSet::new(); n];
        for (_, block) in self
            .coupling
            .iter()
            .filter(|(offset, _)| **offset != PRIMARY)
        {
            for (row, lane) in block.outer_iterator().enumerate() {
                lanes[row].extend(lane.indices().iter().copied());
            }
        }
        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut indices = Vec::new();
        for lane in lanes {
            indices.extend(lane);
            offsets.push(indices.len());
        }
        SparsityPattern::try_from_offsets_and_indices(n, n, offsets, indices)
            .map_err(|e| ConfigurationError::Pattern(format!("{e:?}")))
    }

    /// Orbitals whose rows reach outside the principal cell
    pub fn coupling_orbitals(&self) -> Result<Vec<usize>, ConfigurationError> {
        let pattern = self.coupling_pattern()?;
        Ok((0..pattern.major_dim())
            .filter(|&row| !pattern.lane(row).is_empty())
            .collect())
    }

    /// Atoms hosting at least one coupling orbital, in ascending order
    pub fn coupling_atoms(&self) -> Result<Vec<usize>, ConfigurationError> {
        let mut atoms = self
            .coupling_orbitals()?
            .into_iter()
            .map(|orbital| self.orbital_atom(orbital))
            .collect::<Result<Vec<_>, _>>()?;
        atoms.dedup();
        Ok(atoms)
    }
}

fn fold(images: &Images, k: &[f64; 3], n: usize) -> DMatrix<Complex<f64>> {
    let mut dense = DMatrix::zeros(n, n);
    for (offset, block) in images.iter() {
        let phase = offset
            .iter()
            .zip(k.iter())
            .map(|(&o, &k)| o as f64 * k)
            .sum::<f64>()
            * 2.
            * std::f64::consts::PI;
        let phase = Complex::new(0., phase).exp();
        for (&value, (row, column)) in block.iter() {
            dense[(row, column)] += phase * value;
        }
    }
    dense
}

fn offsets_from_counts(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    offsets.push(0);
    for count in counts {
        offsets.push(offsets[offsets.len() - 1] + count);
    }
    offsets
}

#[derive(Copy, Clone, Debug)]
struct Element {
    row: usize,
    column: usize,
    offset: Offset,
    value: f64,
}

/// Builder for a `SparseOperator`
///
/// Every bond is supplied once, the conjugate partner coupling `column -> row` in image `-offset`
/// is added automatically.
pub struct SparseOperatorBuilder<RefLattice, RefAtoms> {
    lattice: RefLattice,
    orbitals_per_atom: RefAtoms,
    coupling: Vec<Element>,
    overlap: Vec<Element>,
}

impl SparseOperatorBuilder<(), ()> {
    /// Initialise an empty instance of `SparseOperatorBuilder`
    pub fn new() -> Self {
        Self {
            lattice: (),
            orbitals_per_atom: (),
            coupling: Vec::new(),
            overlap: Vec::new(),
        }
    }
}

impl Default for SparseOperatorBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefLattice, RefAtoms> SparseOperatorBuilder<RefLattice, RefAtoms> {
    /// Attach the lattice
    pub fn with_lattice(self, lattice: &Lattice) -> SparseOperatorBuilder<&Lattice, RefAtoms> {
        SparseOperatorBuilder {
            lattice,
            orbitals_per_atom: self.orbitals_per_atom,
            coupling: self.coupling,
            overlap: self.overlap,
        }
    }

    /// Attach the number of orbitals hosted by each atom
    pub fn with_orbitals_per_atom(
        self,
        orbitals_per_atom: &[usize],
    ) -> SparseOperatorBuilder<RefLattice, &[usize]> {
        SparseOperatorBuilder {
            lattice: self.lattice,
            orbitals_per_atom,
            coupling: self.coupling,
            overlap: self.overlap,
        }
    }

    /// Diagonal element of the principal cell
    pub fn with_onsite(mut self, orbital: usize, value: f64) -> Self {
        self.coupling.push(Element {
            row: orbital,
            column: orbital,
            offset: PRIMARY,
            value,
        });
        self
    }

    /// Coupling from `row` in the principal cell to `column` in image `offset`
    pub fn with_hopping(mut self, row: usize, column: usize, offset: Offset, value: f64) -> Self {
        push_bond(&mut self.coupling, row, column, offset, value);
        self
    }

    /// Overlap between `row` in the principal cell and `column` in image `offset`
    ///
    /// Supplying any overlap element makes the basis non-orthogonal, the diagonal then
    /// defaults to one for every orbital without an explicit on-site overlap.
    pub fn with_overlap(mut self, row: usize, column: usize, offset: Offset, value: f64) -> Self {
        push_bond(&mut self.overlap, row, column, offset, value);
        self
    }
}

impl<'a> SparseOperatorBuilder<&'a Lattice, &'a [usize]> {
    /// Validates the supplied elements and assembles the operator
    pub fn build(self) -> Result<SparseOperator, ConfigurationError> {
        let atom_offsets = offsets_from_counts(self.orbitals_per_atom);
        let n = atom_offsets[atom_offsets.len() - 1];
        let coupling = assemble(&self.coupling, self.lattice, n)?;
        let overlap = if self.overlap.is_empty() {
            None
        } else {
            let explicit: BTreeSet<usize> = self
                .overlap
                .iter()
                .filter(|element| element.offset == PRIMARY && element.row == element.column)
                .map(|element| element.row)
                .collect();
            let mut elements = self.overlap.clone();
            elements.extend((0..n).filter(|i| !explicit.contains(i)).map(|i| Element {
                row: i,
                column: i,
                offset: PRIMARY,
                value: 1.,
            }));
            Some(assemble(&elements, self.lattice, n)?)
        };
        Ok(SparseOperator {
            lattice: self.lattice.clone(),
            orbitals_per_atom: self.orbitals_per_atom.to_vec(),
            atom_offsets,
            coupling,
            overlap,
        })
    }
}

fn push_bond(elements: &mut Vec<Element>, row: usize, column: usize, offset: Offset, value: f64) {
    elements.push(Element {
        row,
        column,
        offset,
        value,
    });
    if row != column || offset != PRIMARY {
        elements.push(Element {
            row: column,
            column: row,
            offset: offset.map(|o| -o),
            value,
        });
    }
}

fn assemble(elements: &[Element], lattice: &Lattice, n: usize) -> Result<Images, ConfigurationError> {
    let mut triplets: BTreeMap<Offset, TriMat<f64>> = BTreeMap::new();
    for element in elements {
        for index in [element.row, element.column] {
            if index >= n {
                return Err(ConfigurationError::OrbitalOutOfRange { index, count: n });
            }
        }
        if !lattice.contains(&element.offset) {
            return Err(ConfigurationError::ImageOutOfRange {
                offset: element.offset,
                nsc: lattice.nsc(),
            });
        }
        if element.value.is_zero() {
            continue;
        }
        triplets
            .entry(element.offset)
            .or_insert_with(|| TriMat::new((n, n)))
            .add_triplet(element.row, element.column, element.value);
    }
    Ok(triplets
        .into_iter()
        .map(|(offset, triplets)| (offset, triplets.to_csr()))
        .collect())
}

#[cfg(test)]
pub(crate) mod test {
    use super::{Axis, Lattice, SparseOperator, SparseOperatorBuilder};
    use crate::utilities::matrices::is_hermitian;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;
    use num_complex::Complex;

    /// One orbital per cell, nearest neighbour hopping `t` along A
    pub(crate) fn chain(onsite: f64, t: f64) -> SparseOperator {
        let lattice = Lattice::new(Matrix3::identity(), [3, 1, 1]).unwrap();
        SparseOperatorBuilder::new()
            .with_lattice(&lattice)
            .with_orbitals_per_atom(&[1])
            .with_onsite(0, onsite)
            .with_hopping(0, 0, [1, 0, 0], t)
            .build()
            .unwrap()
    }

    /// Two-orbital chain with a non-orthogonal basis
    pub(crate) fn non_orthogonal_ladder() -> SparseOperator {
        let lattice = Lattice::new(Matrix3::identity(), [3, 1, 1]).unwrap();
        SparseOperatorBuilder::new()
            .with_lattice(&lattice)
            .with_orbitals_per_atom(&[1, 1])
            .with_onsite(0, 0.2)
            .with_onsite(1, -0.3)
            .with_hopping(0, 1, [0, 0, 0], -0.8)
            .with_hopping(0, 0, [1, 0, 0], -1.)
            .with_hopping(1, 1, [1, 0, 0], -1.1)
            .with_hopping(0, 1, [1, 0, 0], 0.2)
            .with_overlap(0, 1, [0, 0, 0], 0.05)
            .with_overlap(0, 0, [1, 0, 0], 0.1)
            .with_overlap(1, 1, [1, 0, 0], 0.08)
            .build()
            .unwrap()
    }

    /// Square lattice, one orbital per cell, hopping `t` along A and B
    pub(crate) fn square(t: f64) -> SparseOperator {
        let lattice =
            Lattice::new(Matrix3::new(1., 0., 0., 0., 1., 0., 0., 0., 10.), [3, 3, 1]).unwrap();
        SparseOperatorBuilder::new()
            .with_lattice(&lattice)
            .with_orbitals_per_atom(&[1])
            .with_hopping(0, 0, [1, 0, 0], t)
            .with_hopping(0, 0, [0, 1, 0], t)
            .build()
            .unwrap()
    }

    #[test]
    fn chain_dispersion_matches_the_cosine_band() {
        let operator = chain(0.1, -1.);
        for &k in &[0., 0.1, 0.25, 0.4] {
            let pk = operator.pk(&[k, 0., 0.]);
            let expected = 0.1 - 2. * (2. * std::f64::consts::PI * k).cos();
            assert_relative_eq!(pk[(0, 0)].re, expected, epsilon = 1e-12);
            assert_relative_eq!(pk[(0, 0)].im, 0., epsilon = 1e-12);
        }
    }

    #[test]
    fn reciprocal_space_matrices_are_hermitian() {
        let operator = non_orthogonal_ladder();
        assert!(!operator.is_orthogonal());
        let k = [0.17, 0., 0.];
        assert!(is_hermitian(&operator.pk(&k)));
        assert!(is_hermitian(&operator.sk(&k)));
        assert_relative_eq!(operator.sk(&[0.; 3])[(0, 0)].re, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn truncating_supercells_removes_inter_cell_couplings() {
        let operator = chain(0., -1.);
        let truncated = operator.with_nsc([1, 1, 1]).unwrap();
        assert_eq!(truncated.nnz(), 0);
        assert_eq!(operator.nnz(), 2);
        assert!(operator.with_nsc([2, 1, 1]).is_err());
    }

    #[test]
    fn tiled_operator_matches_a_finite_chain_at_gamma() {
        let operator = chain(0., -1.).tile(3, Axis::A).unwrap();
        assert_eq!(operator.num_orbitals(), 3);
        assert_eq!(operator.nsc(), [3, 1, 1]);
        let principal = operator.with_nsc([1, 1, 1]).unwrap().pk(&[0.; 3]);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if (i as i32 - j as i32).abs() == 1 { -1. } else { 0. };
                assert_relative_eq!(principal[(i, j)].re, expected);
            }
        }
        let periodic = operator.pk(&[0.; 3]);
        assert_relative_eq!(periodic[(0, 2)].re, -1.);
        assert_relative_eq!(periodic[(2, 0)].re, -1.);
    }

    #[test]
    fn coupling_orbitals_sit_on_the_boundary() {
        let operator = square(-1.)
            .tile(3, Axis::A)
            .unwrap()
            .tile(3, Axis::B)
            .unwrap();
        let orbitals = operator.coupling_orbitals().unwrap();
        assert_eq!(orbitals.len(), 8);
        // copy (1, 1) is the centre of the 3x3 patch
        assert!(!orbitals.contains(&4));
        assert_eq!(operator.coupling_atoms().unwrap(), orbitals);
    }

    #[test]
    fn sub_atoms_keeps_internal_bonds_only() {
        let operator = chain(0.5, -1.).tile(4, Axis::A).unwrap();
        let sub = operator.sub_atoms(&[1, 2]).unwrap();
        assert_eq!(sub.num_orbitals(), 2);
        let pk = sub.pk(&[0.; 3]);
        assert_relative_eq!(pk[(0, 0)].re, 0.5);
        assert_relative_eq!(pk[(0, 1)].re, -1.);
        assert!(operator.sub_atoms(&[7]).is_err());
        assert_eq!(pk[(1, 0)], Complex::new(-1., 0.));
    }
}
