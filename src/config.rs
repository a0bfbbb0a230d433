//! Configuration types of spec §6: grid layout, simulation parameters,
//! sampling method selection, and the output-flags bitmask.

/// One of the three sampling methods described in spec §1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Gillespie's Direct Method.
    #[default]
    Dm,
    /// Partial-propensity Direct Method.
    Pdm,
    /// Partial-propensity SSA with Composition-Rejection sampling.
    PssaCr,
}

/// How the initial population is distributed across subvolumes (spec
/// §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialPopulation {
    /// Split each species' initial amount floor-evenly across all
    /// subvolumes.
    Distribute,
    /// Place each species' entire initial amount in the centre subvolume.
    Concentrate,
    /// Replicate each species' full initial amount into every subvolume.
    Multiply,
    /// Invoke a caller-provided population initializer.
    UserDefined,
    /// If the grid is one-dimensional, place the entire initial amount in
    /// the (only) subvolume; otherwise this is a configuration error.
    #[default]
    Default,
}

/// How diffusion handles a direction that would leave the grid (spec §4.5
/// and, for `Reflective`, the supplemented behaviour of `SPEC_FULL.md`
/// §C.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryCondition {
    /// Wrap around to the opposite face of the grid.
    #[default]
    Periodic,
    /// The molecule is consumed; no destination subvolume is chosen.
    Absorbing,
    /// The molecule stays in its source subvolume; the event still
    /// consumes simulation time but has no effect on populations.
    Reflective,
}

/// The spatial layout of the reaction volume.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Per-axis extents; `dims.len()` is the dimension count (1, 2, or 3
    /// per spec §6).
    pub dims: Vec<u32>,
    pub boundary: BoundaryCondition,
    /// Physical size of one subvolume's edge, used to turn a diffusion
    /// constant into a diffusion pseudo-reaction rate `D / h^2`.
    pub cell_size: f64,
}

impl GridConfig {
    pub fn single_subvolume() -> Self {
        GridConfig {
            dims: vec![1],
            boundary: BoundaryCondition::Periodic,
            cell_size: 1.0,
        }
    }

    pub fn dims_count(&self) -> usize {
        self.dims.len()
    }

    pub fn subvolumes_count(&self) -> usize {
        self.dims.iter().map(|&d| d as usize).product()
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig::single_subvolume()
    }
}

bitflags::bitflags! {
    /// Output-flags bitmask of spec §6. Trace/Info/Error gate the
    /// corresponding `log` facade calls so a caller who disables `Trace`
    /// does not pay for the formatting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutputFlags: u32 {
        const LOG = 1 << 0;
        const INFO = 1 << 1;
        const ERROR = 1 << 2;
        const TRACE = 1 << 3;
        const FINAL_POPS = 1 << 4;
        const TRAJECTORY = 1 << 5;
        const TIMING = 1 << 6;
        const TIME_POINTS = 1 << 7;
        const STATUS = 1 << 8;
    }
}

/// Simulation-run parameters (spec §6).
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub time_start: f64,
    pub time_step: f64,
    pub time_end: f64,
    pub samples_total: usize,
    pub method: Method,
    pub initial_population: InitialPopulation,
    pub output_flags: OutputFlags,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            time_start: 0.0,
            time_step: 1.0,
            time_end: 1.0,
            samples_total: 1,
            method: Method::default(),
            initial_population: InitialPopulation::default(),
            output_flags: OutputFlags::INFO | OutputFlags::ERROR,
        }
    }
}
