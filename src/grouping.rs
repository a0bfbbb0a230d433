//! Model assembly (C6): turns a [`Network`] plus a [`GridConfig`] and
//! [`Method`] into a ready-to-run [`DataModel`], then seeds its initial
//! population and propensity caches.
//!
//! Split into the three passes spec §4.3 names: `preinitialize` (shape
//! the caches, independent of population), `initialize` (fill in
//! population), `post_initialize` (derive every propensity from that
//! population, once, and build the top-level subvolume sampler).

use log::info;

use crate::callback::PopulationInitializer;
use crate::config::{BoundaryCondition, GridConfig, InitialPopulation, Method, OutputFlags};
use crate::crs::CompositionRejectionSampler;
use crate::datamodel::{DataModel, PdmEntry, PropensityIndex, ReactionKind, ReactionWrapper};
use crate::error::{Error, Result};
use crate::jagged::JaggedMatrix;
use crate::network::Network;
use crate::subvolume::{Subvolume, SubvolumeBase, SubvolumeDm, SubvolumePdm, SubvolumePssaCr};
use crate::update::{diffusion_rate, recompute_subvolume};

/// Builds every reaction wrapper (chemical reactions plus one diffusion
/// pseudo-reaction per diffusive species), validates them against
/// `method`'s restrictions, and shapes a fresh, population-less
/// `DataModel`. When `output_flags` requests it (`Info`, or the more
/// detailed `Trace`), logs a one-line-per-reaction summary of the parsed
/// network (SPEC_FULL §C.2), mirroring `pSSAlib`'s
/// `printReactionNetwork`-gated-by-info-log behaviour.
pub fn preinitialize(
    network: &Network,
    grid: &GridConfig,
    method: Method,
    output_flags: OutputFlags,
) -> Result<DataModel> {
    if grid.dims.is_empty() || grid.dims.iter().any(|&d| d == 0) {
        return Err(Error::BadConfig(
            "grid must have at least one axis, each of positive extent".to_string(),
        ));
    }

    let mut reactions: Vec<ReactionWrapper> = network
        .reactions
        .iter()
        .map(|r| ReactionWrapper {
            kind: ReactionKind::Chemical,
            terms: r.terms.clone(),
            reactants_count: r.reactants_count,
            rate: r.rate,
            delay: r.delay,
        })
        .collect();

    for (species, s) in network.species.iter().enumerate() {
        if let Some(d) = s.diffusion_constant {
            if d < 0.0 {
                return Err(Error::ModelInvalid(format!(
                    "species {species} has a negative diffusion constant"
                )));
            }
            // spec §4.3: a diffusion pseudo-reaction's DM propensity is
            // `k * pop(species) * 2 * dimsCount`, not just `k * pop(species)`
            // -- the `2 * dimsCount` factor accounts for every lattice
            // direction a molecule could leave in, since the specific
            // direction is only resolved afterwards by `select_diffusion_
            // destination`'s uniform draw among neighbours.
            reactions.push(ReactionWrapper {
                kind: ReactionKind::Diffusion { species },
                terms: vec![crate::network::SpeciesTerm::new(species, 1)],
                reactants_count: 1,
                rate: diffusion_rate(d, grid.cell_size) * 2.0 * grid.dims_count() as f64,
                delay: None,
            });
        }
    }

    if matches!(method, Method::Pdm | Method::PssaCr) {
        for (idx, r) in reactions.iter().enumerate() {
            validate_partial_propensity_shape(idx, r)?;
        }
    }

    if output_flags.intersects(OutputFlags::INFO | OutputFlags::TRACE) {
        info!(
            "grouping {} species, {} reactions ({} subvolume(s), method={method:?})",
            network.species.len(),
            reactions.len(),
            grid.subvolumes_count(),
        );
        if output_flags.contains(OutputFlags::TRACE) {
            for (idx, r) in reactions.iter().enumerate() {
                log::trace!("  reaction {idx}: {}", r.describe(&network.species));
            }
        }
    }

    let (u3, pdm_layout) = if matches!(method, Method::Pdm | Method::PssaCr) {
        build_layout(&reactions, network.species_count())
    } else {
        (JaggedMatrix::new(), JaggedMatrix::new())
    };

    let subvolumes_count = grid.subvolumes_count();
    let species_count = network.species_count();
    let row_cols: Vec<usize> = (0..pdm_layout.rows_count())
        .map(|row| pdm_layout.get_cols(row))
        .collect();
    let row_floors = row_min_floors(&pdm_layout, &reactions);
    let mut subvolumes = Vec::with_capacity(subvolumes_count);
    for _ in 0..subvolumes_count {
        subvolumes.push(make_subvolume(method, species_count, &row_cols, &row_floors));
    }

    Ok(DataModel {
        species: network.species.clone(),
        reactions,
        dims: grid.dims.clone(),
        boundary: grid.boundary,
        cell_size: grid.cell_size,
        method,
        subvolumes,
        total_propensity: 0.0,
        delayed: Vec::new(),
        u3,
        pdm_layout,
        crsd_volume: None,
        nu: 0,
        nu_d: None,
        mu: 0,
    })
}

/// PDM/PSSA-CR can only decompose a reaction into row/column partial
/// propensities when it references at most two distinct reactant
/// species, and when two distinct species are both involved their
/// stoichiometry must each be exactly one (spec §9's "bimolecular
/// stoichiometry" constraint).
fn validate_partial_propensity_shape(idx: usize, reaction: &ReactionWrapper) -> Result<()> {
    let reactants = &reaction.terms[..reaction.reactants_count];
    let mut species_seen: Vec<(usize, u64)> = Vec::new();
    for term in reactants {
        if let Some(e) = species_seen.iter_mut().find(|(s, _)| *s == term.species) {
            e.1 += term.stoichiometry_abs();
        } else {
            species_seen.push((term.species, term.stoichiometry_abs()));
        }
    }
    match species_seen.len() {
        0 | 1 => Ok(()),
        2 => {
            if species_seen.iter().all(|&(_, m)| m == 1) {
                Ok(())
            } else {
                Err(Error::Unsupported(format!(
                    "reaction {idx} has two reactant species but one has stoichiometry > 1"
                )))
            }
        }
        _ => Err(Error::Unsupported(format!(
            "reaction {idx} references more than two distinct reactant species"
        ))),
    }
}

/// Assigns each reaction to a `Π` row (its propensity-determining
/// species, or row 0 for a zeroth-order reaction) and builds `U3`, the
/// per-species list of cells to revisit when that species' population
/// changes.
///
/// For a bimolecular reaction over two distinct species, the row must be
/// the species with stoichiometry `1` in that reaction: only then does
/// the reaction's full propensity factor as `pop[row] * Π[row][col]`
/// (linear in the row species), which is the algebraic identity the
/// whole partial-propensity split depends on.
/// `validate_partial_propensity_shape` has already guaranteed at least
/// one of the two qualifies.
fn build_layout(
    reactions: &[ReactionWrapper],
    species_count: usize,
) -> (JaggedMatrix<PropensityIndex>, JaggedMatrix<PdmEntry>) {
    let mut pdm_layout = JaggedMatrix::new();
    let mut u3 = JaggedMatrix::new();

    for (reaction_idx, reaction) in reactions.iter().enumerate() {
        let reactants = &reaction.terms[..reaction.reactants_count];
        let mut species_seen: Vec<(usize, u64)> = Vec::new();
        for term in reactants {
            if let Some(e) = species_seen.iter_mut().find(|(s, _)| *s == term.species) {
                e.1 += term.stoichiometry_abs();
            } else {
                species_seen.push((term.species, term.stoichiometry_abs()));
            }
        }

        let (row_entry, other) = match species_seen.len() {
            0 => (None, None),
            1 => (Some(species_seen[0]), None),
            _ => {
                let (a, b) = (species_seen[0], species_seen[1]);
                if a.1 == 1 {
                    (Some(a), Some(b))
                } else {
                    // validate_partial_propensity_shape guarantees b.1 == 1
                    // whenever a.1 != 1.
                    (Some(b), Some(a))
                }
            }
        };

        let (row, self_stoichiometry, other_species, other_stoichiometry) = match (row_entry, other) {
            (None, None) => (0usize, 0u64, None, 0u64),
            (Some((s, m)), None) => (s + 1, m, None, 0u64),
            (Some((s, m)), Some((os, om))) => (s + 1, m, Some(os), om),
        };

        let col = pdm_layout.push(
            row,
            PdmEntry {
                reaction: reaction_idx,
                other_species,
                other_stoichiometry,
                self_stoichiometry,
            },
        );

        let entry = PropensityIndex {
            i: row,
            j: col,
            stoichiometry: self_stoichiometry.max(other_stoichiometry),
            rate: reaction.rate,
        };
        if row > 0 {
            u3.push(row, entry);
        }
        if let Some(j) = other_species {
            u3.push(j + 1, entry);
        }
    }

    let _ = species_count;
    (u3, pdm_layout)
}

/// The smallest strictly positive value each row's `Π` column can ever
/// produce, independent of the actual (not-yet-known) population: the
/// combinatorial factor `heteroreactions`/`homoreactions` is smallest and
/// still nonzero exactly at the stoichiometry threshold (`h(m, m) = 1`,
/// `h'(m, m) = 1 / m`), so this is `rate` for a heteroreaction column and
/// `rate / self_stoichiometry` for a homoreaction column (spec §4.3: "the
/// smallest non-zero partial propensity that a single molecule could
/// produce"). Used as each `crsdΠ[row]` sampler's `min_value` floor,
/// fixed once at grouping time and never lowered (spec §4.1).
fn row_min_floors(layout: &JaggedMatrix<PdmEntry>, reactions: &[ReactionWrapper]) -> Vec<f64> {
    (0..layout.rows_count())
        .map(|row| {
            layout
                .row(row)
                .iter()
                .map(|entry| {
                    let rate = reactions[entry.reaction].rate;
                    if row == 0 || entry.other_species.is_some() {
                        rate
                    } else {
                        rate / entry.self_stoichiometry.max(1) as f64
                    }
                })
                .filter(|&v| v > 0.0)
                .fold(f64::INFINITY, f64::min)
        })
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

/// `row_cols[row]` is the number of columns `pdm_layout` assigned to that
/// row, used to size each row's `crsdΠ` sampler (one slot per column) up
/// front -- it is never resized afterwards, only refilled via
/// `update_value` as populations change. `row_floors[row]` seeds that
/// sampler's `min_value` (see [`row_min_floors`]); the per-subvolume
/// `crsdΣ` sampler uses the smallest of those floors, since it samples
/// over the same rows.
fn make_subvolume(
    method: Method,
    species_count: usize,
    row_cols: &[usize],
    row_floors: &[f64],
) -> Subvolume {
    let pdm_rows = row_cols.len();
    match method {
        Method::Dm => Subvolume::Dm(SubvolumeDm {
            base: SubvolumeBase::new(species_count),
            pi: Vec::new(),
        }),
        Method::Pdm => Subvolume::Pdm(SubvolumePdm {
            base: SubvolumeBase::new(species_count),
            pi: JaggedMatrix::new(),
            lambda: vec![0.0; pdm_rows],
            sigma: Vec::new(),
        }),
        Method::PssaCr => {
            let crsd_pi = row_cols
                .iter()
                .zip(row_floors.iter())
                .map(|(&cols, &floor)| CompositionRejectionSampler::new(cols, floor))
                .collect();
            let sigma_floor = row_floors
                .iter()
                .copied()
                .filter(|&v| v > 0.0)
                .fold(f64::INFINITY, f64::min);
            let sigma_floor = if sigma_floor.is_finite() { sigma_floor } else { 0.0 };
            Subvolume::PssaCr(SubvolumePssaCr {
                pdm: SubvolumePdm {
                    base: SubvolumeBase::new(species_count),
                    pi: JaggedMatrix::new(),
                    lambda: vec![0.0; pdm_rows],
                    sigma: Vec::new(),
                },
                crsd_pi,
                crsd_sigma: CompositionRejectionSampler::new(pdm_rows, sigma_floor),
            })
        }
    }
}

/// Fills in the initial population of every subvolume according to
/// `strategy` (spec §4.3).
pub fn initialize(
    model: &mut DataModel,
    network: &Network,
    strategy: InitialPopulation,
    initializer: Option<&mut dyn PopulationInitializer>,
) -> Result<()> {
    let subvolumes_count = model.subvolumes.len();
    let species_count = network.species_count();

    let mut population = vec![vec![0u64; species_count]; subvolumes_count];

    match strategy {
        InitialPopulation::Distribute => {
            // Floor-divides each species' initial amount by the subvolume
            // count and drops the remainder, matching
            // `GroupingModule::initialize`'s `std::floor(initialAmount *
            // invSubvolCount)` in the reference engine exactly: the
            // remainder is not redistributed, so the total across
            // subvolumes is not necessarily conserved.
            for (s, species) in network.species.iter().enumerate() {
                let share = species.initial_amount / subvolumes_count as u64;
                for row in population.iter_mut() {
                    row[s] = share;
                }
            }
        }
        InitialPopulation::Concentrate => {
            let centre = subvolumes_count / 2;
            for (s, species) in network.species.iter().enumerate() {
                population[centre][s] = species.initial_amount;
            }
        }
        InitialPopulation::Multiply => {
            for (s, species) in network.species.iter().enumerate() {
                for row in population.iter_mut() {
                    row[s] = species.initial_amount;
                }
            }
        }
        InitialPopulation::UserDefined => {
            let initializer = initializer.ok_or_else(|| {
                Error::BadConfig(
                    "InitialPopulation::UserDefined requires a population initializer".to_string(),
                )
            })?;
            initializer.initialize(model, &mut population);
        }
        InitialPopulation::Default => {
            if subvolumes_count != 1 {
                return Err(Error::BadConfig(
                    "InitialPopulation::Default requires exactly one subvolume".to_string(),
                ));
            }
            for (s, species) in network.species.iter().enumerate() {
                population[0][s] = species.initial_amount;
            }
        }
    }

    for (sv, pop) in model.subvolumes.iter_mut().zip(population.into_iter()) {
        sv.base_mut().population = pop;
    }
    Ok(())
}

/// Computes every subvolume's initial propensity caches, then (for grids
/// with more than one subvolume) builds the top-level composition-
/// rejection sampler over subvolumes used to pick which one fires next
/// (spec §4.1, PSSA-CR; used for any multi-subvolume grid here since it
/// is a strict improvement over a linear scan regardless of method).
pub fn post_initialize(model: &mut DataModel) {
    let reactions = model.reactions.clone();
    let layout = model.pdm_layout.clone();
    for sv in model.subvolumes.iter_mut() {
        recompute_subvolume(sv, &reactions, &layout);
    }

    model.total_propensity = model
        .subvolumes
        .iter()
        .map(Subvolume::total_propensity)
        .sum();

    if model.subvolumes.len() > 1 {
        let positive_min = model
            .subvolumes
            .iter()
            .map(Subvolume::total_propensity)
            .filter(|&p| p > 0.0)
            .fold(f64::INFINITY, f64::min);
        let min_value = if positive_min.is_finite() { positive_min } else { 0.0 };
        let mut crsd = CompositionRejectionSampler::new(model.subvolumes.len(), min_value);
        for (idx, sv) in model.subvolumes.iter().enumerate() {
            crsd.update_value(idx, sv.total_propensity());
        }
        model.crsd_volume = Some(crsd);
    }
}
