//! Per-subvolume state (C4): a population vector shared by all methods,
//! plus the method-specific propensity caches of spec §3.

use crate::crs::CompositionRejectionSampler;
use crate::jagged::JaggedMatrix;

/// Fields common to every method's subvolume layout.
#[derive(Debug, Clone)]
pub struct SubvolumeBase {
    pub population: Vec<u64>,
    pub total_propensity: f64,
}

impl SubvolumeBase {
    pub fn new(species_count: usize) -> Self {
        SubvolumeBase {
            population: vec![0; species_count],
            total_propensity: 0.0,
        }
    }

    pub fn population(&self, species: usize) -> u64 {
        self.population[species]
    }

    /// Applies `delta` to a species' population. `delta` is signed so
    /// both reactant depletion and product creation go through the same
    /// call; callers (see [`crate::update`]) are responsible for never
    /// driving a population negative.
    pub fn population_update(&mut self, species: usize, delta: i64) {
        let current = self.population[species] as i64;
        debug_assert!(
            current + delta >= 0,
            "population_update would drive species {species} negative"
        );
        self.population[species] = (current + delta).max(0) as u64;
    }
}

/// Dense propensity vector, one entry per reaction (spec §3, DM).
#[derive(Debug, Clone)]
pub struct SubvolumeDm {
    pub base: SubvolumeBase,
    pub pi: Vec<f64>,
}

/// Partial-propensity matrix plus its row-sum and group-propensity
/// vectors (spec §3, PDM). Row 0 is the reservoir row.
#[derive(Debug, Clone)]
pub struct SubvolumePdm {
    pub base: SubvolumeBase,
    pub pi: JaggedMatrix<f64>,
    pub lambda: Vec<f64>,
    pub sigma: Vec<f64>,
}

/// PDM fields plus one composition-rejection sampler per species row over
/// that row's partial propensities, and one over the species rows
/// themselves (spec §3, PSSA-CR).
#[derive(Debug, Clone)]
pub struct SubvolumePssaCr {
    pub pdm: SubvolumePdm,
    pub crsd_pi: Vec<CompositionRejectionSampler>,
    pub crsd_sigma: CompositionRejectionSampler,
}

/// The method-tagged subvolume, dispatched on once per `Update`/
/// `Grouping`/`Sampling` call rather than through virtual dispatch (spec
/// §9's "cyclic references / polymorphism" note).
#[derive(Debug, Clone)]
pub enum Subvolume {
    Dm(SubvolumeDm),
    Pdm(SubvolumePdm),
    PssaCr(SubvolumePssaCr),
}

impl Subvolume {
    pub fn base(&self) -> &SubvolumeBase {
        match self {
            Subvolume::Dm(s) => &s.base,
            Subvolume::Pdm(s) => &s.base,
            Subvolume::PssaCr(s) => &s.pdm.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut SubvolumeBase {
        match self {
            Subvolume::Dm(s) => &mut s.base,
            Subvolume::Pdm(s) => &mut s.base,
            Subvolume::PssaCr(s) => &mut s.pdm.base,
        }
    }

    pub fn population(&self, species: usize) -> u64 {
        self.base().population(species)
    }

    pub fn total_propensity(&self) -> f64 {
        self.base().total_propensity
    }

    pub fn as_pdm(&self) -> &SubvolumePdm {
        match self {
            Subvolume::Pdm(s) => s,
            Subvolume::PssaCr(s) => &s.pdm,
            Subvolume::Dm(_) => panic!("not a PDM-family subvolume"),
        }
    }

    pub fn as_pdm_mut(&mut self) -> &mut SubvolumePdm {
        match self {
            Subvolume::Pdm(s) => s,
            Subvolume::PssaCr(s) => &mut s.pdm,
            Subvolume::Dm(_) => panic!("not a PDM-family subvolume"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_update_applies_signed_delta() {
        let mut base = SubvolumeBase::new(2);
        base.population_update(0, 5);
        base.population_update(0, -2);
        assert_eq!(base.population(0), 3);
    }

    #[test]
    fn subvolume_dispatches_to_base_regardless_of_method() {
        let dm = Subvolume::Dm(SubvolumeDm {
            base: SubvolumeBase::new(1),
            pi: vec![],
        });
        assert_eq!(dm.population(0), 0);
    }
}
