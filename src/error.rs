//! Error kinds of the simulation engine.
//!
//! These mirror the error kinds of the reference engine rather than its
//! exception hierarchy: `ModelInvalid` and `Unsupported` are raised by
//! [`crate::grouping`] while parsing and validating a network,
//! `BadConfig` by configuration mismatches, and `OutOfMemory` /
//! `InternalInvariant` are the only two kinds that can occur once the hot
//! loop is running -- both are treated as fatal for the current trial.

use thiserror::Error;

/// Everything that can go wrong building or running a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The network itself is malformed: a species reference points outside
    /// the species table, a reservoir species is also a product of a
    /// reaction that depletes it, etc.
    #[error("model invalid: {0}")]
    ModelInvalid(String),

    /// The network is well-formed but uses a feature the selected method
    /// cannot represent (PDM/PSSA-CR: more than two distinct reactant
    /// species, or two reactants both with stoichiometry greater than one).
    #[error("unsupported network for this method: {0}")]
    Unsupported(String),

    /// The simulation configuration is internally inconsistent, e.g. a
    /// `UserDefined` initial population strategy without a population
    /// initializer callback, or a grid whose dimension count disagrees
    /// with the number of extents supplied.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// An allocation failed while growing a method-specific cache.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Two caches that should agree after an update do not. This always
    /// indicates a defect in the kernel, never bad input; it aborts the
    /// trial that triggered it.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// A logging sink failed. Never fatal; callers should log a warning
    /// and continue.
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
