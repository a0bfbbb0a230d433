//! Propensity maintenance (C7): turns a population change into refreshed
//! `Π`/`λ`/`σ` caches, and applies the population changes a fired event
//! implies.
//!
//! `recompute_dm`/`recompute_pdm`/`recompute_subvolume` rebuild a
//! subvolume's caches from scratch; [`crate::grouping::post_initialize`]
//! uses them once per trial, when there is nothing yet to update
//! incrementally. The hot path (`apply_reaction`/`apply_diffusion`/
//! `fire_delayed`) instead walks `U3`, the per-species dependency list
//! `Grouping` builds alongside `pdm_layout`, and touches only the `Π`
//! cells and `λ`/`σ` rows a changed species' population can affect
//! (spec §1/§2/§3; see `update_pdm_caches`). DM has no `U3` (it is
//! always `O(reactions)` per event by construction, the same bound the
//! reference engine's Direct Method has), so its subvolumes still use a
//! full `recompute_dm` per event.

use crate::combinatorics::{heteroreactions, homoreactions};
use crate::datamodel::{DataModel, PdmEntry, PropensityIndex, ReactionWrapper};
use crate::error::{Error, Result};
use crate::jagged::JaggedMatrix;
use crate::network::SpeciesTerm;
use crate::subvolume::{Subvolume, SubvolumeDm, SubvolumePdm};

/// The mass-action propensity of one reaction: `rate` times the number of
/// ways to draw its reactants out of the current population, grouping
/// reactant terms by species first so a homo-reaction (two reactant terms
/// for the same species) uses the combination count rather than the
/// product of two independent draws (spec §2).
pub fn mass_action_propensity(rate: f64, reactants: &[SpeciesTerm], population: &[u64]) -> f64 {
    let mut grouped: Vec<(usize, u64)> = Vec::with_capacity(reactants.len());
    for term in reactants {
        if let Some(existing) = grouped.iter_mut().find(|(s, _)| *s == term.species) {
            existing.1 += term.stoichiometry_abs();
        } else {
            grouped.push((term.species, term.stoichiometry_abs()));
        }
    }
    let mut value = rate;
    for (species, m) in grouped {
        value *= heteroreactions(population[species], m);
    }
    value
}

/// The cached value of one `Π` cell, following [`PdmEntry`]'s two shapes:
/// `rate * homoreactions(pop[row - 1], self_stoichiometry)` when the
/// reaction depends on the row species alone, or
/// `rate * heteroreactions(pop[other], other_stoichiometry)` when it is a
/// bimolecular heteroreaction (the row species' own contribution is
/// linear and is folded in afterwards via `σ[row] = pop[row - 1] *
/// λ[row]`, not here). Row `0` (zeroth-order reactions) has no
/// population dependence at all: the cell is just `rate`.
fn partial_propensity_value(rate: f64, row: usize, entry: &PdmEntry, population: &[u64]) -> f64 {
    if row == 0 {
        return rate;
    }
    match entry.other_species {
        Some(other) => rate * heteroreactions(population[other], entry.other_stoichiometry),
        None => rate * homoreactions(population[row - 1], entry.self_stoichiometry),
    }
}

/// Rebuilds a DM subvolume's dense propensity vector and total.
pub fn recompute_dm(sv: &mut SubvolumeDm, reactions: &[ReactionWrapper]) {
    if sv.pi.len() != reactions.len() {
        sv.pi.resize(reactions.len(), 0.0);
    }
    let mut total = 0.0;
    for (idx, reaction) in reactions.iter().enumerate() {
        let value = mass_action_propensity(
            reaction.rate,
            &reaction.terms[..reaction.reactants_count],
            &sv.base.population,
        );
        sv.pi[idx] = value;
        total += value;
    }
    sv.base.total_propensity = total;
}

/// Rebuilds a PDM (or the PDM half of a PSSA-CR) subvolume's row-based
/// caches from `layout`, which assigns every reaction to the row of its
/// propensity-determining species (row 0 for zeroth-order reactions).
///
/// `Π[row][col]` holds the *partial* propensity of [`PdmEntry`] (not the
/// reaction's full mass-action propensity); `λ[row] = Σ_col Π[row][col]`;
/// and `σ[row] = pop[row - 1] * λ[row]` for `row >= 1`, `σ[0] = λ[0]`
/// (spec §3's invariants 2 and 3). `σ`'s sum across all rows is the
/// subvolume's total propensity (invariant 1), because every row's own
/// population factor is linear by construction (see
/// [`crate::grouping::build_layout`]).
pub fn recompute_pdm(
    sv: &mut SubvolumePdm,
    reactions: &[ReactionWrapper],
    layout: &JaggedMatrix<PdmEntry>,
) {
    let rows = layout.rows_count();
    let mut pi = JaggedMatrix::new();
    pi.reserve(rows, 1);
    let mut lambda = vec![0.0; rows];
    for row in 0..rows {
        let cols = layout.get_cols(row);
        let mut row_total = 0.0;
        for col in 0..cols {
            let entry = layout.get(row, col);
            let rate = reactions[entry.reaction].rate;
            let value = partial_propensity_value(rate, row, entry, &sv.base.population);
            pi.push(row, value);
            row_total += value;
        }
        lambda[row] = row_total;
    }
    let mut sigma = vec![0.0; rows];
    for row in 0..rows {
        sigma[row] = if row == 0 {
            lambda[0]
        } else {
            sv.base.population[row - 1] as f64 * lambda[row]
        };
    }
    sv.base.total_propensity = sigma.iter().sum();
    sv.pi = pi;
    sv.lambda = lambda;
    sv.sigma = sigma;
}

/// Rebuilds every cache owned by `subvolume`, including the per-row and
/// per-subvolume composition-rejection samplers for PSSA-CR.
pub fn recompute_subvolume(
    subvolume: &mut Subvolume,
    reactions: &[ReactionWrapper],
    layout: &JaggedMatrix<PdmEntry>,
) {
    match subvolume {
        Subvolume::Dm(sv) => recompute_dm(sv, reactions),
        Subvolume::Pdm(sv) => recompute_pdm(sv, reactions, layout),
        Subvolume::PssaCr(sv) => {
            recompute_pdm(&mut sv.pdm, reactions, layout);
            for row in 0..sv.pdm.pi.rows_count() {
                if row >= sv.crsd_pi.len() {
                    continue;
                }
                for (col, &value) in sv.pdm.pi.row(row).iter().enumerate() {
                    sv.crsd_pi[row].update_value(col, value);
                }
                sv.crsd_sigma.update_value(row, sv.pdm.sigma[row]);
            }
        }
    }
}

/// The rows and cells one call to [`update_pdm_caches`] actually touched,
/// so a PSSA-CR subvolume can rebin only those CR samplers and the
/// invariant check below can rescan only those rows, rather than the
/// whole subvolume.
#[derive(Debug, Default)]
struct PdmUpdateTrace {
    dirty_rows: Vec<usize>,
    touched_cells: Vec<(usize, usize)>,
}

impl PdmUpdateTrace {
    fn mark_row(&mut self, row: usize) {
        if !self.dirty_rows.contains(&row) {
            self.dirty_rows.push(row);
        }
    }
}

/// Walks `U3[species + 1]` for every species in `changed_species`,
/// recomputing only the `Π[i][j]` cells that species' population can
/// affect and folding the resulting deltas into `λ`/`σ`/the subvolume
/// total, instead of rebuilding every row from scratch (spec §1/§2).
///
/// `U3[s + 1]` mixes two kinds of entry, told apart by comparing
/// `entry.i` to the row `s` indexes (`s + 1`):
/// - a *row* entry (`entry.i == s + 1`): `s` is the row species. If the
///   cell is a self-dependency (`other_species.is_none()`, e.g. a
///   homoreaction column), its value depends on `pop[s]` directly and
///   must be recomputed. If the cell is a heteroreaction column instead
///   (`other_species.is_some()`), its value does not change, but the
///   row's `σ = pop[s] * λ` still needs refreshing since `pop[s]` moved.
/// - an *other* entry (`entry.i != s + 1`): `s` is the heteroreaction's
///   other species, so the cell's value depends on `pop[s]` and must be
///   recomputed regardless of which species rows it.
///
/// Either way the row is marked dirty and gets one `σ` refresh at the
/// end, after every touched cell's `λ` delta has been folded in.
fn update_pdm_caches(
    sv: &mut SubvolumePdm,
    reactions: &[ReactionWrapper],
    layout: &JaggedMatrix<PdmEntry>,
    u3: &JaggedMatrix<PropensityIndex>,
    changed_species: &[usize],
) -> PdmUpdateTrace {
    let mut trace = PdmUpdateTrace::default();

    for &species in changed_species {
        let row_for_species = species + 1;
        for index in u3.row(row_for_species) {
            let entry = layout.get(index.i, index.j);
            let is_row_entry = index.i == row_for_species;
            let cell_value_depends_on_species = !is_row_entry || entry.other_species.is_none();
            if cell_value_depends_on_species {
                let rate = reactions[entry.reaction].rate;
                let new_value = partial_propensity_value(rate, index.i, entry, &sv.base.population);
                let old_value = *sv.pi.get(index.i, index.j);
                if new_value != old_value {
                    *sv.pi.get_mut(index.i, index.j) = new_value;
                    sv.lambda[index.i] += new_value - old_value;
                }
                trace.touched_cells.push((index.i, index.j));
            }
            trace.mark_row(index.i);
        }
    }

    let mut total_delta = 0.0;
    for &row in &trace.dirty_rows {
        let old_sigma = sv.sigma[row];
        let new_sigma = if row == 0 {
            sv.lambda[0]
        } else {
            sv.base.population[row - 1] as f64 * sv.lambda[row]
        };
        sv.sigma[row] = new_sigma;
        total_delta += new_sigma - old_sigma;
    }
    sv.base.total_propensity += total_delta;

    trace
}

/// Spec §3's cache invariants, rechecked over only the rows `Update` just
/// touched: `λ[row]` must equal the fresh sum of `Π[row][*]`, and
/// `σ[row]` must equal `pop[row - 1] * λ[row]` (`λ[0]` for the reservoir
/// row). Since `Π` is the source of truth recomputed a few lines above,
/// a mismatch here can only mean this module's own bookkeeping drifted.
fn check_pdm_invariants(sv: &SubvolumePdm, trace: &PdmUpdateTrace) -> Result<()> {
    const REL_EPS: f64 = 1e-6;
    for &row in &trace.dirty_rows {
        let fresh_lambda: f64 = sv.pi.row(row).iter().sum();
        if (fresh_lambda - sv.lambda[row]).abs() > REL_EPS * fresh_lambda.abs().max(1.0) {
            return Err(Error::InternalInvariant(format!(
                "row {row}: cached lambda {} disagrees with fresh sum {fresh_lambda}",
                sv.lambda[row]
            )));
        }
        let expected_sigma = if row == 0 {
            sv.lambda[0]
        } else {
            sv.base.population[row - 1] as f64 * sv.lambda[row]
        };
        if (expected_sigma - sv.sigma[row]).abs() > REL_EPS * expected_sigma.abs().max(1.0) {
            return Err(Error::InternalInvariant(format!(
                "row {row}: cached sigma {} disagrees with pop[row-1]*lambda {expected_sigma}",
                sv.sigma[row]
            )));
        }
    }
    Ok(())
}

/// Refreshes one subvolume's caches after `changed_species`' populations
/// moved, dispatching on method: DM has no `U3` to walk and always
/// rebuilds in full; PDM and PSSA-CR walk `U3` incrementally and verify
/// the touched rows' invariants before returning.
fn update_subvolume_caches(
    model: &mut DataModel,
    subvolume_idx: usize,
    changed_species: &[usize],
) -> Result<()> {
    let reactions = &model.reactions;
    let layout = &model.pdm_layout;
    let u3 = &model.u3;
    match &mut model.subvolumes[subvolume_idx] {
        Subvolume::Dm(sv) => recompute_dm(sv, reactions),
        Subvolume::Pdm(sv) => {
            let trace = update_pdm_caches(sv, reactions, layout, u3, changed_species);
            check_pdm_invariants(sv, &trace)?;
        }
        Subvolume::PssaCr(sv) => {
            let trace = update_pdm_caches(&mut sv.pdm, reactions, layout, u3, changed_species);
            for &(row, col) in &trace.touched_cells {
                if row < sv.crsd_pi.len() {
                    sv.crsd_pi[row].update_value(col, *sv.pdm.pi.get(row, col));
                }
            }
            for &row in &trace.dirty_rows {
                sv.crsd_sigma.update_value(row, sv.pdm.sigma[row]);
            }
            check_pdm_invariants(&sv.pdm, &trace)?;
        }
    }
    rebin_volume(model, subvolume_idx);
    Ok(())
}

/// Applies the population change of one reactant/product term, skipping
/// species flagged `reservoir` or `constant` (spec §3).
fn apply_term(population: &mut [u64], term: &SpeciesTerm) {
    if term.constant || term.reservoir {
        return;
    }
    let current = population[term.species] as i64;
    let next = current + term.stoichiometry;
    population[term.species] = next.max(0) as u64;
}

/// Rebins `subvolume_idx` in `crsd_volume` to its current total
/// propensity, then refreshes `model.total_propensity` from the sum over
/// every subvolume (spec §3 invariants 4/5: `globalTotal = Σ_sv
/// sv.totalPropensity`, `crsdVolume.weight(sv) = sv.totalPropensity`).
/// A no-op when there is only one subvolume (no `crsd_volume` exists).
fn rebin_volume(model: &mut DataModel, subvolume_idx: usize) {
    if let Some(crsd) = model.crsd_volume.as_mut() {
        crsd.update_value(subvolume_idx, model.subvolumes[subvolume_idx].total_propensity());
    }
    model.total_propensity = model
        .subvolumes
        .iter()
        .map(Subvolume::total_propensity)
        .sum();
}

/// Applies a list of terms to `population`, returning the distinct
/// species actually touched (skipping `reservoir`/`constant` terms, see
/// [`apply_term`]) so the caller knows which `U3` rows to walk.
fn apply_terms(population: &mut [u64], terms: &[SpeciesTerm]) -> Vec<usize> {
    let mut changed = Vec::with_capacity(terms.len());
    for term in terms {
        if term.constant || term.reservoir {
            continue;
        }
        apply_term(population, term);
        if !changed.contains(&term.species) {
            changed.push(term.species);
        }
    }
    changed
}

/// Applies a fired chemical reaction's non-delayed terms to a
/// subvolume's population, then refreshes its caches.
pub fn apply_reaction(
    model: &mut DataModel,
    subvolume_idx: usize,
    reaction_idx: usize,
    reactants_only: bool,
) -> Result<()> {
    let reaction = model.reactions[reaction_idx].clone();
    let changed = {
        let population = &mut model.subvolumes[subvolume_idx].base_mut().population;
        let terms: &[SpeciesTerm] = if reactants_only {
            &reaction.terms[..reaction.reactants_count]
        } else {
            &reaction.terms
        };
        apply_terms(population, terms)
    };
    update_subvolume_caches(model, subvolume_idx, &changed)
}

/// Applies a fired diffusion event: one molecule of `species` leaves
/// `source` and arrives at `dest`. When `dest == source` (the reflective
/// boundary's self-destination, SPEC_FULL §C.1), this is a true no-op:
/// the event still consumes simulation time, but no population or cache
/// changes, since the molecule was never actually removed.
pub fn apply_diffusion(
    model: &mut DataModel,
    source: usize,
    dest: usize,
    species: usize,
) -> Result<()> {
    if dest == source {
        return Ok(());
    }
    model.subvolumes[source]
        .base_mut()
        .population_update(species, -1);
    model.subvolumes[dest]
        .base_mut()
        .population_update(species, 1);
    update_subvolume_caches(model, source, &[species])?;
    update_subvolume_caches(model, dest, &[species])
}

/// Starts a delayed reaction: a consuming delay depletes its reactants
/// immediately and schedules the products for `fire_time = now + tau`; a
/// non-consuming delay leaves the population untouched until the products
/// are added when the delay fires (spec §4.4).
pub fn start_delayed(
    model: &mut DataModel,
    subvolume_idx: usize,
    reaction_idx: usize,
    now: f64,
) -> Result<()> {
    let reaction = model.reactions[reaction_idx].clone();
    let delay = reaction.delay.expect("start_delayed on a non-delayed reaction");
    if delay.consuming {
        apply_reaction(model, subvolume_idx, reaction_idx, true)?;
    }
    model.schedule_delayed(subvolume_idx, reaction_idx, now + delay.tau);
    Ok(())
}

/// Applies a due delayed reaction's products (for a non-consuming delay,
/// the reactants were never removed; for a consuming delay, they were
/// already removed in [`start_delayed`]).
pub fn fire_delayed(model: &mut DataModel, subvolume_idx: usize, reaction_idx: usize) -> Result<()> {
    let reaction = model.reactions[reaction_idx].clone();
    let changed = {
        let population = &mut model.subvolumes[subvolume_idx].base_mut().population;
        apply_terms(population, &reaction.terms[reaction.reactants_count..])
    };
    update_subvolume_caches(model, subvolume_idx, &changed)
}

/// Total volume-wide propensity: the sum of every subvolume's total
/// propensity (DM/PDM) or equivalently the composition-rejection
/// sampler's total (PSSA-CR), used by `Sampling` to draw the waiting
/// time to the next event (spec §4.1).
pub fn total_propensity(model: &DataModel) -> f64 {
    if let Some(crsd) = &model.crsd_volume {
        crsd.total()
    } else {
        model.subvolumes.iter().map(Subvolume::total_propensity).sum()
    }
}

/// `ReactionKind::Diffusion`'s rate is `D / h^2`; this is exposed so
/// `Grouping` can derive it once per diffusive species.
pub fn diffusion_rate(diffusion_constant: f64, cell_size: f64) -> f64 {
    diffusion_constant / (cell_size * cell_size)
}
