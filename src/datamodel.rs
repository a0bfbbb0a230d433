//! The data model (C5): network metadata, grid topology, per-subvolume
//! state, global totals, the delayed-reaction queue, and (for grids with
//! more than one subvolume) the top-level composition-rejection sampler
//! over subvolumes.

use crate::config::{BoundaryCondition, Method};
use crate::crs::CompositionRejectionSampler;
use crate::jagged::JaggedMatrix;
use crate::network::{Delay, Species, SpeciesTerm};
use crate::subvolume::Subvolume;

/// Either a chemical reaction or a diffusion pseudo-reaction, the
/// method-agnostic representation grouping builds from a
/// [`crate::network::Network`] (spec §3).
#[derive(Debug, Clone)]
pub enum ReactionKind {
    Chemical,
    /// Carries the index of the single species that diffuses.
    Diffusion { species: usize },
}

#[derive(Debug, Clone)]
pub struct ReactionWrapper {
    pub kind: ReactionKind,
    /// Reactant terms followed by product terms. Empty for diffusion.
    pub terms: Vec<SpeciesTerm>,
    pub reactants_count: usize,
    /// The rate constant `k` for a chemical reaction, or `D / h^2` for a
    /// diffusion pseudo-reaction.
    pub rate: f64,
    pub delay: Option<Delay>,
}

impl ReactionWrapper {
    pub fn is_diffusive(&self) -> bool {
        matches!(self.kind, ReactionKind::Diffusion { .. })
    }

    pub fn diffusive_species(&self) -> usize {
        match self.kind {
            ReactionKind::Diffusion { species } => species,
            ReactionKind::Chemical => panic!("not a diffusion reaction"),
        }
    }

    pub fn reactants_count(&self) -> usize {
        self.reactants_count
    }

    pub fn species_references_count(&self) -> usize {
        self.terms.len()
    }

    pub fn reactant_at(&self, i: usize) -> &SpeciesTerm {
        &self.terms[i]
    }

    pub fn species_reference_at(&self, i: usize) -> &SpeciesTerm {
        &self.terms[i]
    }

    pub fn is_set_delay(&self) -> bool {
        self.delay.is_some()
    }

    /// A one-line rendering used both in `Unsupported` diagnostics and in
    /// the grouping summary log (SPEC_FULL §C.2, §C.3).
    pub fn describe(&self, species: &[Species]) -> String {
        if let ReactionKind::Diffusion { species: s } = self.kind {
            return format!("diffusion({}) @ rate={}", species[s].name, self.rate);
        }
        let side = |terms: &[SpeciesTerm]| -> String {
            if terms.is_empty() {
                return "∅".to_string();
            }
            terms
                .iter()
                .map(|t| {
                    let name = &species[t.species].name;
                    if t.stoichiometry_abs() == 1 {
                        name.clone()
                    } else {
                        format!("{}{}", t.stoichiometry_abs(), name)
                    }
                })
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!(
            "{} --> {} @ rate={}",
            side(&self.terms[..self.reactants_count]),
            side(&self.terms[self.reactants_count..]),
            self.rate
        )
    }
}

/// A dependency record in `U3`: which cell of `Π` must be recomputed, and
/// with what stoichiometry/rate, when the indexing species' population
/// changes (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct PropensityIndex {
    pub i: usize,
    pub j: usize,
    pub stoichiometry: u64,
    pub rate: f64,
}

/// One entry of `DataModel::pdm_layout`: which reaction a `Π` cell
/// belongs to, and how its partial-propensity value is recomputed from
/// the current population (spec §3, PDM/PSSA-CR). Shared by every
/// subvolume, since the network's structure does not vary across the
/// grid.
///
/// A cell's row is always `species + 1` for the species that determines
/// it (row `0` for a zeroth-order reaction). Exactly one of two shapes
/// applies:
/// - `other_species` is `None`: the reaction depends on the row species
///   alone, with total stoichiometry `self_stoichiometry` there (`1` for
///   an ordinary unimolecular reaction, `>1` for a homoreaction like
///   `2A -> ...`). The cached value is
///   `rate * homoreactions(pop[row - 1], self_stoichiometry)`.
/// - `other_species` is `Some(j)`: a bimolecular heteroreaction. Grouping
///   always picks the row species to be the one with stoichiometry `1`
///   (spec §4.3's bimolecular constraint guarantees at least one is), so
///   the cached value is
///   `rate * heteroreactions(pop[j], other_stoichiometry)`; the row
///   species' own (linear) contribution is folded in afterwards via
///   `σ[row] = pop[row - 1] * λ[row]`.
#[derive(Debug, Clone, Copy)]
pub struct PdmEntry {
    pub reaction: usize,
    pub other_species: Option<usize>,
    /// Stoichiometry of the other species; meaningful only when
    /// `other_species.is_some()`.
    pub other_stoichiometry: u64,
    /// Stoichiometry of the row species itself; meaningful only when
    /// `other_species.is_none()` (`0` for row-0 zeroth-order entries).
    pub self_stoichiometry: u64,
}

/// A chemical reaction scheduled to fire at `fire_time` (spec §3/§4.4).
/// Ties in `fire_time` break by `sequence`, the order reactions were
/// scheduled in, giving a deterministic total order independent of
/// whatever sort the queue implementation uses (SPEC_FULL §C.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayedReaction {
    pub subvolume: usize,
    pub reaction: usize,
    pub fire_time: f64,
    pub sequence: u64,
}

impl Eq for DelayedReaction {}

impl PartialOrd for DelayedReaction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedReaction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fire_time
            .partial_cmp(&other.fire_time)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// The full per-trial simulation state (spec §3/§5).
#[derive(Debug, Clone)]
pub struct DataModel {
    pub species: Vec<Species>,
    pub reactions: Vec<ReactionWrapper>,
    pub dims: Vec<u32>,
    pub boundary: BoundaryCondition,
    pub cell_size: f64,
    pub method: Method,

    pub subvolumes: Vec<Subvolume>,
    pub total_propensity: f64,

    /// Kept sorted by `(fire_time, sequence)`; head-only reads are hot,
    /// inserts are rare (spec §9).
    pub delayed: Vec<DelayedReaction>,
    next_sequence: u64,

    /// `U3[species_index + 1]`: the list of `Π` cells that depend on that
    /// species' population (spec §3, PDM/PSSA-CR only; empty for DM).
    pub u3: JaggedMatrix<PropensityIndex>,

    /// Row layout of `Π`, shared by every subvolume's `SubvolumePdm::pi`:
    /// row 0 holds zeroth-order reactions, row `s + 1` holds the
    /// reactions for which species `s` is the propensity-determining
    /// species (PDM/PSSA-CR only; empty for DM).
    pub pdm_layout: JaggedMatrix<PdmEntry>,

    /// Present once grouping's `postInitialize` has run, when there is
    /// more than one subvolume.
    pub crsd_volume: Option<CompositionRejectionSampler>,

    /// The subvolume and reaction selected by the most recent sampling
    /// step (consumed by `Update`).
    pub nu: usize,
    pub nu_d: Option<usize>,
    pub mu: usize,
}

impl DataModel {
    pub fn empty() -> Self {
        DataModel {
            species: Vec::new(),
            reactions: Vec::new(),
            dims: vec![1],
            boundary: BoundaryCondition::Periodic,
            cell_size: 1.0,
            method: Method::Dm,
            subvolumes: Vec::new(),
            total_propensity: 0.0,
            delayed: Vec::new(),
            next_sequence: 0,
            u3: JaggedMatrix::new(),
            pdm_layout: JaggedMatrix::new(),
            crsd_volume: None,
            nu: 0,
            nu_d: None,
            mu: 0,
        }
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn reactions_count(&self) -> usize {
        self.reactions.len()
    }

    pub fn dims_count(&self) -> usize {
        self.dims.len()
    }

    pub fn subvolumes_count(&self) -> usize {
        self.subvolumes.len()
    }

    pub fn subvolume(&self, idx: usize) -> &Subvolume {
        &self.subvolumes[idx]
    }

    pub fn subvolume_mut(&mut self, idx: usize) -> &mut Subvolume {
        &mut self.subvolumes[idx]
    }

    /// Pushes a delayed reaction, keeping `delayed` sorted by
    /// `(fire_time, sequence)` (spec §4.4/§5).
    pub fn schedule_delayed(&mut self, subvolume: usize, reaction: usize, fire_time: f64) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = DelayedReaction {
            subvolume,
            reaction,
            fire_time,
            sequence,
        };
        let pos = self.delayed.partition_point(|e| *e < entry);
        self.delayed.insert(pos, entry);
    }

    /// Pops the earliest-scheduled delayed reaction whose `fire_time` is
    /// at most `now`, if any.
    pub fn pop_due_delayed(&mut self, now: f64) -> Option<DelayedReaction> {
        if let Some(front) = self.delayed.first() {
            if front.fire_time <= now {
                return Some(self.delayed.remove(0));
            }
        }
        None
    }
}

/// Converts a per-axis subscript into a flat subvolume index (row-major,
/// last axis fastest-varying).
pub fn sub2ind(dims: &[u32], sub: &[u32]) -> usize {
    let mut idx = 0usize;
    for (&d, &s) in dims.iter().zip(sub.iter()) {
        idx = idx * d as usize + s as usize;
    }
    idx
}

/// The inverse of [`sub2ind`].
pub fn ind2sub(dims: &[u32], mut idx: usize) -> Vec<u32> {
    let mut sub = vec![0u32; dims.len()];
    for axis in (0..dims.len()).rev() {
        let d = dims[axis] as usize;
        sub[axis] = (idx % d) as u32;
        idx /= d;
    }
    sub
}

/// Lists the `2 * dims.len()` lattice neighbours of subvolume `idx` under
/// a boundary condition. `Periodic` always returns exactly
/// `2 * dims.len()` neighbours; `Absorbing` omits directions that would
/// leave the grid (the caller treats a missing destination as "consume
/// the molecule", spec §4.5); `Reflective` substitutes the source
/// subvolume itself for any direction that would leave the grid
/// (SPEC_FULL §C.1).
pub fn neighbors(dims: &[u32], idx: usize, boundary: BoundaryCondition) -> Vec<usize> {
    let sub = ind2sub(dims, idx);
    let mut out = Vec::with_capacity(2 * dims.len());
    for axis in 0..dims.len() {
        let d = dims[axis] as i64;
        for &delta in &[-1i64, 1i64] {
            let mut next = sub.clone();
            let raw = sub[axis] as i64 + delta;
            if raw >= 0 && raw < d {
                next[axis] = raw as u32;
                out.push(sub2ind(dims, &next));
                continue;
            }
            match boundary {
                BoundaryCondition::Periodic => {
                    next[axis] = raw.rem_euclid(d) as u32;
                    out.push(sub2ind(dims, &next));
                }
                BoundaryCondition::Absorbing => {
                    // no destination: caller drops this direction
                }
                BoundaryCondition::Reflective => {
                    out.push(idx);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub2ind_ind2sub_roundtrip() {
        let dims = [3u32, 4, 2];
        for idx in 0..24usize {
            let sub = ind2sub(&dims, idx);
            assert_eq!(sub2ind(&dims, &sub), idx);
        }
    }

    #[test]
    fn periodic_neighbors_always_full_count() {
        let dims = [3u32, 3];
        for idx in 0..9 {
            let ns = neighbors(&dims, idx, BoundaryCondition::Periodic);
            assert_eq!(ns.len(), 4);
        }
    }

    #[test]
    fn absorbing_neighbors_drop_out_of_grid_directions() {
        let dims = [3u32];
        let ns = neighbors(&dims, 0, BoundaryCondition::Absorbing);
        assert_eq!(ns, vec![1]);
        let ns = neighbors(&dims, 2, BoundaryCondition::Absorbing);
        assert_eq!(ns, vec![1]);
    }

    #[test]
    fn reflective_neighbors_stay_in_place_at_edges() {
        let dims = [3u32];
        let ns = neighbors(&dims, 0, BoundaryCondition::Reflective);
        assert_eq!(ns, vec![0, 1]);
    }

    #[test]
    fn delayed_queue_orders_by_time_then_insertion() {
        let mut dm = DataModel::empty();
        dm.schedule_delayed(0, 0, 5.0);
        dm.schedule_delayed(0, 1, 2.0);
        dm.schedule_delayed(0, 2, 2.0);
        assert_eq!(dm.delayed[0].reaction, 1);
        assert_eq!(dm.delayed[1].reaction, 2);
        assert_eq!(dm.delayed[2].reaction, 0);

        assert_eq!(dm.pop_due_delayed(1.0), None);
        let popped = dm.pop_due_delayed(2.0).unwrap();
        assert_eq!(popped.reaction, 1);
        let popped = dm.pop_due_delayed(2.0).unwrap();
        assert_eq!(popped.reaction, 2);
    }
}
