//! The sampling driver (C8): draws the waiting time to the next event,
//! then which subvolume, which reaction, and (for a diffusion event)
//! which neighbouring subvolume it moves the molecule to.

use crate::config::Method;
use crate::datamodel::{neighbors, DataModel};
use crate::rng::RngSource;
use crate::subvolume::Subvolume;
use crate::update::total_propensity;

/// One fully-resolved event, ready for [`crate::update`] to apply.
#[derive(Debug, Clone, Copy)]
pub struct SampledEvent {
    pub time: f64,
    pub subvolume: usize,
    pub reaction: usize,
    /// `Some` only for a diffusion reaction; the subvolume the molecule
    /// moves to (may equal `subvolume` itself under a reflective
    /// boundary).
    pub destination: Option<usize>,
}

/// Draws the time to the next event, exponentially distributed with rate
/// equal to the model's total propensity (spec §4.1). Returns `None` once
/// the total propensity has reached zero -- the simulation is quiescent
/// and no further event will ever fire.
pub fn draw_waiting_time(model: &DataModel, now: f64, rng: &mut impl RngSource) -> Option<f64> {
    let total = total_propensity(model);
    if !(total > 0.0) {
        return None;
    }
    Some(now + rng.unit_exponential() / total)
}

/// Picks which subvolume the next event occurs in. A single-subvolume
/// grid always picks subvolume 0; a multi-subvolume grid draws from the
/// top-level composition-rejection sampler built by
/// [`crate::grouping::post_initialize`].
fn select_subvolume(model: &DataModel, rng: &mut impl RngSource) -> usize {
    if model.subvolumes.len() == 1 {
        return 0;
    }
    match &model.crsd_volume {
        Some(crsd) => crsd.sample(rng).unwrap_or(0),
        None => select_subvolume_by_scan(model, rng),
    }
}

fn select_subvolume_by_scan(model: &DataModel, rng: &mut impl RngSource) -> usize {
    let total: f64 = model.subvolumes.iter().map(Subvolume::total_propensity).sum();
    let mut target = rng.uniform01() * total;
    for (idx, sv) in model.subvolumes.iter().enumerate() {
        let p = sv.total_propensity();
        if target < p {
            return idx;
        }
        target -= p;
    }
    model.subvolumes.len() - 1
}

/// Picks which reaction fires within a subvolume already known to have
/// positive total propensity, dispatching on the sampling method (spec
/// §4.1/§4.2).
fn select_reaction(model: &DataModel, subvolume: usize, rng: &mut impl RngSource) -> usize {
    match model.method {
        Method::Dm => select_reaction_dm(model, subvolume, rng),
        Method::Pdm => select_reaction_pdm(model, subvolume, rng),
        Method::PssaCr => select_reaction_pssacr(model, subvolume, rng),
    }
}

fn select_reaction_dm(model: &DataModel, subvolume: usize, rng: &mut impl RngSource) -> usize {
    let sv = match model.subvolume(subvolume) {
        Subvolume::Dm(sv) => sv,
        _ => unreachable!("DM method always uses SubvolumeDm"),
    };
    let mut target = rng.uniform01() * sv.base.total_propensity;
    for (idx, &p) in sv.pi.iter().enumerate() {
        if target < p {
            return idx;
        }
        target -= p;
    }
    sv.pi.len() - 1
}

/// Picks the propensity-determining row by a linear scan over `σ`, then
/// the column within that row by a linear scan over `Π[row]` (the cached
/// partial propensities), and maps `(row, col)` back to a reaction
/// through `pdm_layout` (spec §4.2). `σ` already folds in the row
/// species' population (see [`crate::update::recompute_pdm`]), so this is
/// the two-level draw the method is named for, without any additional
/// bucketing.
fn select_reaction_pdm(model: &DataModel, subvolume: usize, rng: &mut impl RngSource) -> usize {
    let pdm = model.subvolume(subvolume).as_pdm();
    let rows = pdm.sigma.len();

    let mut target = rng.uniform01() * pdm.base.total_propensity;
    let mut row = rows.saturating_sub(1);
    for (r, &s) in pdm.sigma.iter().enumerate() {
        if target < s {
            row = r;
            break;
        }
        target -= s;
    }

    // σ[row] = pop[row - 1] * λ[row] (or λ[0] for row 0); undo that
    // population factor to land back in λ[row]'s units, the same units
    // Π[row]'s columns are in.
    let population_factor = if row == 0 {
        1.0
    } else {
        pdm.base.population[row - 1] as f64
    };
    let mut within = if population_factor > 0.0 {
        target / population_factor
    } else {
        0.0
    };

    let cols = pdm.pi.row(row);
    for (col, &value) in cols.iter().enumerate() {
        if within < value {
            return model.pdm_layout.get(row, col).reaction;
        }
        within -= value;
    }
    model.pdm_layout.get(row, cols.len().saturating_sub(1)).reaction
}

fn select_reaction_pssacr(model: &DataModel, subvolume: usize, rng: &mut impl RngSource) -> usize {
    let sv = match model.subvolume(subvolume) {
        Subvolume::PssaCr(sv) => sv,
        _ => unreachable!("PSSA-CR method always uses SubvolumePssaCr"),
    };
    let row = sv
        .crsd_sigma
        .sample(rng)
        .expect("select_reaction_pssacr called with zero total propensity");
    let col = sv.crsd_pi[row]
        .sample(rng)
        .expect("a row with positive sigma weight must have a positive-weight column");
    model.pdm_layout.get(row, col).reaction
}

/// Picks a destination subvolume for a diffusion event, uniformly among
/// the source subvolume's lattice neighbours under the grid's boundary
/// condition. Returns `None` only under an absorbing boundary when the
/// diffusing direction has no neighbour (the molecule is simply removed,
/// spec §4.5).
fn select_diffusion_destination(
    model: &DataModel,
    source: usize,
    rng: &mut impl RngSource,
) -> Option<usize> {
    let candidates = neighbors(&model.dims, source, model.boundary);
    if candidates.is_empty() {
        return None;
    }
    let idx = (rng.uniform01() * candidates.len() as f64) as usize;
    Some(candidates[idx.min(candidates.len() - 1)])
}

/// Draws one complete event: waiting time, subvolume, reaction, and (for
/// a diffusion reaction) destination. Returns `None` once the model is
/// quiescent.
pub fn sample_event(model: &DataModel, now: f64, rng: &mut impl RngSource) -> Option<SampledEvent> {
    let time = draw_waiting_time(model, now, rng)?;
    let subvolume = select_subvolume(model, rng);
    let reaction = select_reaction(model, subvolume, rng);
    let destination = if model.reactions[reaction].is_diffusive() {
        select_diffusion_destination(model, subvolume, rng)
    } else {
        None
    };
    Some(SampledEvent {
        time,
        subvolume,
        reaction,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryCondition, GridConfig, InitialPopulation, OutputFlags};
    use crate::grouping::{initialize, post_initialize, preinitialize};
    use crate::network::{Network, SpeciesTerm};
    use crate::rng::DefaultRng;
    use rand::SeedableRng;

    fn decaying_species_model(method: Method) -> DataModel {
        let mut net = Network::new();
        let a = net.add_species("A", 50);
        net.add_reaction(1.0, &[SpeciesTerm::new(a, 1)], &[]).unwrap();
        let grid = GridConfig::single_subvolume();
        let mut model = preinitialize(&net, &grid, method, OutputFlags::empty()).unwrap();
        initialize(&mut model, &net, InitialPopulation::Default, None).unwrap();
        post_initialize(&mut model);
        model
    }

    #[test]
    fn draw_waiting_time_is_none_once_quiescent() {
        let mut net = Network::new();
        net.add_species("A", 0);
        let grid = GridConfig::single_subvolume();
        let mut model = preinitialize(&net, &grid, Method::Dm, OutputFlags::empty()).unwrap();
        initialize(&mut model, &net, InitialPopulation::Default, None).unwrap();
        post_initialize(&mut model);
        let mut rng = DefaultRng::seed_from_u64(1);
        assert!(draw_waiting_time(&model, 0.0, &mut rng).is_none());
    }

    #[test]
    fn dm_always_selects_the_only_reaction() {
        let model = decaying_species_model(Method::Dm);
        let mut rng = DefaultRng::seed_from_u64(2);
        for _ in 0..20 {
            assert_eq!(select_reaction_dm(&model, 0, &mut rng), 0);
        }
    }

    #[test]
    fn pdm_always_selects_the_only_reaction() {
        let model = decaying_species_model(Method::Pdm);
        let mut rng = DefaultRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(select_reaction_pdm(&model, 0, &mut rng), 0);
        }
    }

    #[test]
    fn diffusion_destination_is_always_a_lattice_neighbor() {
        let mut net = Network::new();
        let a = net.add_species("A", 5);
        net.set_diffusion(a, Some(1.0));
        let grid = GridConfig {
            dims: vec![4],
            boundary: BoundaryCondition::Periodic,
            cell_size: 1.0,
        };
        let mut model = preinitialize(&net, &grid, Method::Dm, OutputFlags::empty()).unwrap();
        initialize(&mut model, &net, InitialPopulation::Concentrate, None).unwrap();
        post_initialize(&mut model);
        let mut rng = DefaultRng::seed_from_u64(4);
        for _ in 0..50 {
            let dest = select_diffusion_destination(&model, 2, &mut rng).unwrap();
            assert!(neighbors(&model.dims, 2, model.boundary).contains(&dest));
        }
    }
}
