//! The kernel loop (C9): orchestrates `Grouping` → repeated `Sampling`/
//! `Update` steps → recorded output, for as many independent trials as
//! `SimulationConfig::samples_total` asks for.
//!
//! This plays the role the teacher crate's `Gillespie::advance_until`
//! plays for a single well-mixed compartment, generalised to a spatial
//! grid, three sampling methods, and delayed reactions.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, trace};

use crate::callback::{PopulationInitializer, ProgressCallback, ReactionCallback};
use crate::config::{GridConfig, OutputFlags, SimulationConfig};
use crate::datamodel::DataModel;
use crate::error::Result;
use crate::grouping::{initialize, post_initialize, preinitialize};
use crate::network::Network;
use crate::rng::RngSource;
use crate::sampling::sample_event;
use crate::update::{apply_diffusion, apply_reaction, fire_delayed, start_delayed};

/// One trial's recorded output: total (summed over every subvolume)
/// population of each species at each sampled time point.
#[derive(Debug, Clone)]
pub struct Trial {
    pub time_points: Vec<f64>,
    /// `populations[k][s]` is species `s`'s total population at
    /// `time_points[k]`.
    pub populations: Vec<Vec<u64>>,
}

/// Runs `config.samples_total` independent trials of `network` on `grid`,
/// reporting fired events through `reaction_cb` and coarse progress
/// through `progress_cb`.
pub struct Simulation<'a> {
    pub network: &'a Network,
    pub grid: &'a GridConfig,
    pub config: &'a SimulationConfig,
}

impl<'a> Simulation<'a> {
    pub fn new(network: &'a Network, grid: &'a GridConfig, config: &'a SimulationConfig) -> Self {
        Simulation { network, grid, config }
    }

    /// Runs every trial, returning one [`Trial`] per sample.
    ///
    /// `cancel`, if given, is polled between events (spec §5): once set, the
    /// driver stops as soon as the in-flight event has been fully applied
    /// and returns every trial completed so far, including the partial one
    /// in progress, rather than an error -- partial results through the
    /// last fully processed event remain valid.
    pub fn run(
        &self,
        rng: &mut impl RngSource,
        mut reaction_cb: impl ReactionCallback,
        mut progress_cb: impl ProgressCallback,
        mut population_initializer: Option<&mut dyn PopulationInitializer>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Trial>> {
        let time_points = self.sample_grid();
        let mut trials = Vec::with_capacity(self.config.samples_total);

        for trial in 0..self.config.samples_total {
            if is_cancelled(cancel) {
                break;
            }
            let trajectory = self.run_one_trial(
                rng,
                &time_points,
                &mut reaction_cb,
                population_initializer.as_deref_mut(),
                cancel,
            )?;
            trials.push(trajectory);

            if self.config.output_flags.contains(OutputFlags::STATUS) {
                progress_cb.on_progress(
                    trial + 1,
                    self.config.samples_total,
                    100.0 * (trial + 1) as f64 / self.config.samples_total as f64,
                );
            }
        }

        if self.config.output_flags.contains(OutputFlags::INFO) {
            info!(
                "completed {} trial(s) of {} from t={} to t={}",
                trials.len(),
                self.network,
                self.config.time_start,
                self.config.time_end
            );
        }

        Ok(trials)
    }

    fn sample_grid(&self) -> Vec<f64> {
        let mut points = Vec::new();
        let mut t = self.config.time_start;
        while t <= self.config.time_end {
            points.push(t);
            t += self.config.time_step;
        }
        if points.last().copied() != Some(self.config.time_end) {
            points.push(self.config.time_end);
        }
        points
    }

    fn run_one_trial(
        &self,
        rng: &mut impl RngSource,
        time_points: &[f64],
        reaction_cb: &mut impl ReactionCallback,
        population_initializer: Option<&mut dyn PopulationInitializer>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Trial> {
        let mut model = preinitialize(
            self.network,
            self.grid,
            self.config.method,
            self.config.output_flags,
        )?;
        initialize(
            &mut model,
            self.network,
            self.config.initial_population,
            population_initializer,
        )?;
        post_initialize(&mut model);

        let mut recorded = Vec::with_capacity(time_points.len());
        let mut next_sample = 0usize;
        let mut t = self.config.time_start;

        record_due_samples(&model, time_points, &mut next_sample, t, &mut recorded);

        loop {
            if t >= self.config.time_end || is_cancelled(cancel) {
                break;
            }

            let due_delayed = model.delayed.first().map(|d| d.fire_time);
            let sampled = sample_event(&model, t, rng);

            let next_time = match (due_delayed, sampled.as_ref().map(|e| e.time)) {
                (Some(dt), Some(et)) => dt.min(et),
                (Some(dt), None) => dt,
                (None, Some(et)) => et,
                (None, None) => break,
            };
            if next_time > self.config.time_end {
                t = self.config.time_end;
                record_due_samples(&model, time_points, &mut next_sample, t, &mut recorded);
                break;
            }

            if due_delayed.is_some_and(|dt| dt <= sampled.as_ref().map_or(f64::INFINITY, |e| e.time)) {
                let due = model.pop_due_delayed(next_time).expect("checked due above");
                t = next_time;
                fire_delayed(&mut model, due.subvolume, due.reaction)?;
                if self.config.output_flags.contains(OutputFlags::TRACE) {
                    trace!("t={t}: delayed reaction {} fired in subvolume {}", due.reaction, due.subvolume);
                }
            } else {
                let event = sampled.expect("next_time came from sampled when no delayed is due");
                t = event.time;
                apply_one_event(&mut model, &event)?;
                if self.config.output_flags.contains(OutputFlags::TRACE) {
                    trace!(
                        "t={t}: reaction {} fired in subvolume {}",
                        event.reaction,
                        event.subvolume
                    );
                }
            }

            reaction_cb.on_reaction(&model, t);
            record_due_samples(&model, time_points, &mut next_sample, t, &mut recorded);
        }

        Ok(Trial {
            time_points: time_points.to_vec(),
            populations: recorded,
        })
    }
}

/// Spec §5's cancellation check: a relaxed load is enough since the flag
/// only ever transitions false -> true and every trial is single-threaded,
/// no ordering with other memory operations is implied by checking it.
fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn apply_one_event(model: &mut DataModel, event: &crate::sampling::SampledEvent) -> Result<()> {
    model.nu = event.subvolume;
    model.mu = event.reaction;
    model.nu_d = event.destination;

    if model.reactions[event.reaction].is_diffusive() {
        let species = model.reactions[event.reaction].diffusive_species();
        let dest = event.destination.unwrap_or(event.subvolume);
        apply_diffusion(model, event.subvolume, dest, species)
    } else if model.reactions[event.reaction].is_set_delay() {
        start_delayed(model, event.subvolume, event.reaction, event.time)
    } else {
        apply_reaction(model, event.subvolume, event.reaction, false)
    }
}

fn total_population(model: &DataModel) -> Vec<u64> {
    let mut totals = vec![0u64; model.species_count()];
    for sv in &model.subvolumes {
        for (s, total) in totals.iter_mut().enumerate() {
            *total += sv.population(s);
        }
    }
    totals
}

fn record_due_samples(
    model: &DataModel,
    time_points: &[f64],
    next_sample: &mut usize,
    t: f64,
    recorded: &mut Vec<Vec<u64>>,
) {
    while *next_sample < time_points.len() && time_points[*next_sample] <= t {
        recorded.push(total_population(model));
        *next_sample += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{NoopProgressCallback, NoopReactionCallback};
    use crate::config::{InitialPopulation, Method};
    use crate::network::SpeciesTerm;
    use crate::rng::DefaultRng;
    use rand::SeedableRng;

    #[test]
    fn pure_decay_population_never_increases() {
        let mut net = Network::new();
        let a = net.add_species("A", 100);
        net.add_reaction(0.5, &[SpeciesTerm::new(a, 1)], &[]).unwrap();
        let grid = GridConfig::single_subvolume();
        let config = SimulationConfig {
            time_start: 0.0,
            time_step: 1.0,
            time_end: 5.0,
            samples_total: 1,
            method: Method::Dm,
            initial_population: InitialPopulation::Default,
            output_flags: OutputFlags::empty(),
        };
        let sim = Simulation::new(&net, &grid, &config);
        let mut rng = DefaultRng::seed_from_u64(11);
        let trials = sim
            .run(&mut rng, NoopReactionCallback, NoopProgressCallback, None, None)
            .unwrap();
        assert_eq!(trials.len(), 1);
        let pops: Vec<u64> = trials[0].populations.iter().map(|p| p[0]).collect();
        for window in pops.windows(2) {
            assert!(window[1] <= window[0]);
        }
        assert!(pops.last().unwrap() <= &100);
    }

    #[test]
    fn runs_the_requested_number_of_independent_trials() {
        let mut net = Network::new();
        let a = net.add_species("A", 20);
        let b = net.add_species("B", 0);
        net.add_reaction(0.2, &[SpeciesTerm::new(a, 1)], &[SpeciesTerm::new(b, 1)])
            .unwrap();
        let grid = GridConfig::single_subvolume();
        let config = SimulationConfig {
            time_start: 0.0,
            time_step: 2.0,
            time_end: 4.0,
            samples_total: 3,
            method: Method::Dm,
            initial_population: InitialPopulation::Default,
            output_flags: OutputFlags::empty(),
        };
        let sim = Simulation::new(&net, &grid, &config);
        let mut rng = DefaultRng::seed_from_u64(22);
        let trials = sim
            .run(&mut rng, NoopReactionCallback, NoopProgressCallback, None, None)
            .unwrap();
        assert_eq!(trials.len(), 3);
        for trial in &trials {
            let total: u64 = trial.populations.last().unwrap().iter().sum();
            assert_eq!(total, 20);
        }
    }

    #[test]
    fn pre_cancelled_flag_stops_before_any_trial_runs() {
        let mut net = Network::new();
        let a = net.add_species("A", 20);
        net.add_reaction(0.2, &[SpeciesTerm::new(a, 1)], &[]).unwrap();
        let grid = GridConfig::single_subvolume();
        let config = SimulationConfig {
            samples_total: 5,
            method: Method::Dm,
            initial_population: InitialPopulation::Default,
            output_flags: OutputFlags::empty(),
            ..SimulationConfig::default()
        };
        let sim = Simulation::new(&net, &grid, &config);
        let mut rng = DefaultRng::seed_from_u64(33);
        let cancel = std::sync::atomic::AtomicBool::new(true);
        let trials = sim
            .run(&mut rng, NoopReactionCallback, NoopProgressCallback, None, Some(&cancel))
            .unwrap();
        assert!(trials.is_empty());
    }
}
