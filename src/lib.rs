//! An exact stochastic simulator for spatially discretised chemical
//! reaction networks.
//!
//! Given a [`Network`] of species and mass-action reactions, a
//! [`GridConfig`] describing how the reaction volume is discretised into
//! subvolumes, and a [`SimulationConfig`], [`Simulation::run`] draws exact
//! sample trajectories from the network's chemical master equation using
//! one of three methods (spec-speak aside: Gillespie's Direct Method, the
//! Partial-propensity Direct Method, or Partial-propensity SSA with
//! Composition-Rejection sampling):
//!
//! ```
//! use pssa::{Network, SpeciesTerm};
//! use pssa::config::{GridConfig, InitialPopulation, Method, SimulationConfig};
//! use pssa::callback::{NoopProgressCallback, NoopReactionCallback};
//! use pssa::kernel::Simulation;
//! use pssa::rng::DefaultRng;
//! use rand::SeedableRng;
//!
//! let mut net = Network::new();
//! let a = net.add_species("A", 100);
//! let b = net.add_species("B", 0);
//! net.add_reaction(0.1, &[SpeciesTerm::new(a, 1)], &[SpeciesTerm::new(b, 1)]).unwrap();
//!
//! let grid = GridConfig::single_subvolume();
//! let config = SimulationConfig {
//!     time_end: 10.0,
//!     method: Method::Dm,
//!     initial_population: InitialPopulation::Default,
//!     ..SimulationConfig::default()
//! };
//!
//! let sim = Simulation::new(&net, &grid, &config);
//! let mut rng = DefaultRng::seed_from_u64(0);
//! let trials = sim
//!     .run(&mut rng, NoopReactionCallback, NoopProgressCallback, None, None)
//!     .unwrap();
//! assert_eq!(trials.len(), config.samples_total);
//! ```
//!
//! PDM and PSSA-CR trade network generality (at most two distinct
//! reactant species per reaction, and at most one of them with
//! stoichiometry greater than one) for propensity updates that scale with
//! the number of species rather than the number of reactions; see
//! [`config::Method`] and the [`Error::Unsupported`] variant
//! [`grouping::preinitialize`] returns when a network doesn't fit.
//!
//! Species with a diffusion constant set via [`Network::set_diffusion`]
//! get one diffusion pseudo-reaction per subvolume automatically; model
//! authors never add these to the network directly.

pub mod callback;
pub mod combinatorics;
pub mod config;
pub mod crs;
pub mod datamodel;
pub mod error;
pub mod grouping;
pub mod jagged;
pub mod kernel;
pub mod network;
pub mod rng;
pub mod sampling;
pub mod subvolume;
pub mod update;

pub use crate::error::{Error, Result};
pub use crate::kernel::{Simulation, Trial};
pub use crate::network::{Delay, Network, Reaction, Species, SpeciesTerm};
