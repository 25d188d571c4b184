//! Hamiltonian construction and mutation (§4.2): the regular hopping
//! table, Anderson on-site disorder, structural disorder (impurity
//! patterns with anchors and border lists), vacancies, and the
//! precomputed velocity tables derived from them.

pub mod disorder;
pub mod hopping;
pub mod velocity;

pub use disorder::{AndersonDisorder, BorderBond, BorderOnsite, ImpurityPattern, VacancyList};
pub use hopping::{Hopping, RegularPart};
pub use velocity::{build_velocity, hermiticity_sign, VelocityTable};

use crate::error::KpmResult;
use crate::lattice::Lattice;
use crate::rng::WorkerRng;
use crate::scalar::Scalar;

/// One thread's view of the Hamiltonian: the regular part plus every form
/// of disorder it carries, and the velocity tables needed for whichever
/// quantities were requested.
#[derive(Clone, Debug)]
pub struct Hamiltonian<T: Scalar> {
    pub regular: RegularPart<T>,
    pub onsite: Vec<AndersonDisorder<T>>,
    pub impurities: Vec<ImpurityPattern<T>>,
    pub vacancies: VacancyList,
    velocities: Vec<(Vec<usize>, VelocityTable<T>)>,
}

impl<T: Scalar> Hamiltonian<T> {
    pub fn builder(orbitals: usize, n_tiles: usize) -> HamiltonianBuilder<T> {
        HamiltonianBuilder {
            regular: RegularPart::new(orbitals),
            onsite: vec![AndersonDisorder::None; orbitals],
            impurities: Vec::new(),
            vacancies: VacancyList::new(n_tiles),
            n_tiles,
        }
    }

    /// Redraw every random part of this Hamiltonian (on-site disorder
    /// values and structural-disorder anchor placements) for a new
    /// disorder realization. Vacancy lists are fixed at construction time
    /// and are not touched here — only continuously-distributed disorder
    /// is redrawn per realization, per spec §4.2.
    pub fn generate_disorder(&mut self, lattice: &Lattice, rng: &mut WorkerRng) {
        for policy in self.onsite.iter_mut() {
            policy.generate(rng);
        }
        for pattern in self.impurities.iter_mut() {
            pattern.generate(lattice, rng);
        }
    }

    /// Precompute and cache the velocity table for `axes`, or return the
    /// cached one if already built with the same axis list.
    pub fn velocity_table(&mut self, axes: &[usize]) -> KpmResult<&VelocityTable<T>> {
        if let Some(pos) = self.velocities.iter().position(|(a, _)| a == axes) {
            return Ok(&self.velocities[pos].1);
        }
        let table = build_velocity(&self.regular, axes)?;
        self.velocities.push((axes.to_vec(), table));
        Ok(&self.velocities.last().unwrap().1)
    }
}

pub struct HamiltonianBuilder<T: Scalar> {
    regular: RegularPart<T>,
    onsite: Vec<AndersonDisorder<T>>,
    impurities: Vec<ImpurityPattern<T>>,
    vacancies: VacancyList,
    n_tiles: usize,
}

impl<T: Scalar> HamiltonianBuilder<T> {
    pub fn hopping(mut self, src_orbital: usize, hop: Hopping<T>) -> Self {
        self.regular.add_hopping(src_orbital, hop);
        self
    }

    pub fn onsite_disorder(mut self, orbital: usize, policy: AndersonDisorder<T>) -> Self {
        self.onsite[orbital] = policy;
        self
    }

    pub fn impurity_pattern(mut self, anchor_density: f64, build: impl FnOnce(&mut ImpurityPattern<T>)) -> Self {
        let mut pattern = ImpurityPattern::new(self.n_tiles, anchor_density);
        build(&mut pattern);
        self.impurities.push(pattern);
        self
    }

    pub fn vacancy(mut self, tile_index: usize, site: crate::lattice::SiteIndex) -> Self {
        self.vacancies.per_tile[tile_index].push(site);
        self
    }

    pub fn build(self) -> Hamiltonian<T> {
        Hamiltonian {
            regular: self.regular,
            onsite: self.onsite,
            impurities: self.impurities,
            vacancies: self.vacancies,
            velocities: Vec::new(),
        }
    }
}
