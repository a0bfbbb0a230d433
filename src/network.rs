//! The network-description API.
//!
//! This plays the role the teacher crate's `gillespie` module plays
//! (`Gillespie::new`, `add_reaction`, `Rate::lma`, `Jump`): a
//! run-time-constructible description of a reaction network that does not
//! require a Rust compilation step to change, generalised here with
//! diffusion, delay, reservoir and multi-subvolume concerns the teacher's
//! well-mixed, single-compartment model never needed.
//!
//! Model ingestion from a file format (SBML) is out of scope (spec §1):
//! this module is the target a parser would build into, not a parser.

use crate::error::{Error, Result};

/// One chemical species tracked by the network.
#[derive(Debug, Clone)]
pub struct Species {
    pub name: String,
    pub initial_amount: u64,
    pub diffusion_constant: Option<f64>,
}

/// A term referencing one species within a reaction, carrying signed
/// stoichiometry (negative = reactant, positive = product) and the two
/// per-reference flags of spec §3.
#[derive(Debug, Clone, Copy)]
pub struct SpeciesTerm {
    pub species: usize,
    pub stoichiometry: i64,
    pub reservoir: bool,
    pub constant: bool,
}

impl SpeciesTerm {
    pub fn new(species: usize, stoichiometry: i64) -> Self {
        SpeciesTerm {
            species,
            stoichiometry,
            reservoir: false,
            constant: false,
        }
    }

    pub fn reservoir(mut self) -> Self {
        self.reservoir = true;
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn stoichiometry_abs(&self) -> u64 {
        self.stoichiometry.unsigned_abs()
    }
}

/// An optional delay attached to a reaction (spec §3/§4.4).
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    pub tau: f64,
    pub consuming: bool,
}

/// A reaction as authored by the caller, before grouping turns it into a
/// method-specific `ReactionWrapper` (see [`crate::datamodel`]).
#[derive(Debug, Clone)]
pub struct Reaction {
    pub rate: f64,
    /// Reactant terms followed by product terms, matching
    /// `ReactionWrapper`'s layout so grouping can reuse the index split.
    pub terms: Vec<SpeciesTerm>,
    pub reactants_count: usize,
    pub delay: Option<Delay>,
}

impl Reaction {
    pub fn reactants(&self) -> &[SpeciesTerm] {
        &self.terms[..self.reactants_count]
    }

    pub fn products(&self) -> &[SpeciesTerm] {
        &self.terms[self.reactants_count..]
    }
}

/// A reaction network: species and chemical reactions, built up at run
/// time. Diffusion is not represented here as a `Reaction`; it is derived
/// automatically from each species' `diffusion_constant` during grouping
/// (spec §4.3), one pseudo-reaction per diffusive species, since its rate
/// depends on grid cell size which the network itself does not know.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub species: Vec<Species>,
    pub reactions: Vec<Reaction>,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    /// Adds a species and returns its index.
    pub fn add_species(&mut self, name: impl Into<String>, initial_amount: u64) -> usize {
        self.species.push(Species {
            name: name.into(),
            initial_amount,
            diffusion_constant: None,
        });
        self.species.len() - 1
    }

    /// Sets (or clears, with `None`) the diffusion constant of a species.
    pub fn set_diffusion(&mut self, species: usize, d: Option<f64>) {
        self.species[species].diffusion_constant = d;
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    /// Adds a mass-action reaction. `reactants`/`products` are
    /// `SpeciesTerm`s whose `stoichiometry` is taken as an absolute value
    /// (the reactant/product split already encodes sign).
    pub fn add_reaction(
        &mut self,
        rate: f64,
        reactants: &[SpeciesTerm],
        products: &[SpeciesTerm],
    ) -> Result<usize> {
        self.add_reaction_delayed(rate, reactants, products, None)
    }

    pub fn add_reaction_delayed(
        &mut self,
        rate: f64,
        reactants: &[SpeciesTerm],
        products: &[SpeciesTerm],
        delay: Option<Delay>,
    ) -> Result<usize> {
        for term in reactants.iter().chain(products.iter()) {
            if term.species >= self.species.len() {
                return Err(Error::ModelInvalid(format!(
                    "species index {} out of range (species count = {})",
                    term.species,
                    self.species.len()
                )));
            }
        }
        let mut terms = Vec::with_capacity(reactants.len() + products.len());
        for r in reactants {
            let mut t = *r;
            t.stoichiometry = -t.stoichiometry_abs() as i64;
            terms.push(t);
        }
        for p in products {
            let mut t = *p;
            t.stoichiometry = t.stoichiometry_abs() as i64;
            terms.push(t);
        }
        self.reactions.push(Reaction {
            rate,
            reactants_count: reactants.len(),
            terms,
            delay,
        });
        Ok(self.reactions.len() - 1)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} species, {} reactions",
            self.species.len(),
            self.reactions.len()
        )?;
        for rxn in &self.reactions {
            let fmt_terms = |terms: &[SpeciesTerm]| -> String {
                terms
                    .iter()
                    .map(|t| {
                        let name = &self.species[t.species].name;
                        if t.stoichiometry_abs() == 1 {
                            name.clone()
                        } else {
                            format!("{}{}", t.stoichiometry_abs(), name)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" + ")
            };
            writeln!(
                f,
                "{} --> {} @ {}",
                fmt_terms(rxn.reactants()),
                fmt_terms(rxn.products()),
                rxn.rate
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_species_returns_sequential_indices() {
        let mut net = Network::new();
        assert_eq!(net.add_species("A", 10), 0);
        assert_eq!(net.add_species("B", 0), 1);
        assert_eq!(net.species_count(), 2);
    }

    #[test]
    fn add_reaction_splits_reactants_and_products() {
        let mut net = Network::new();
        let a = net.add_species("A", 10);
        let b = net.add_species("B", 0);
        net.add_reaction(
            1.0,
            &[SpeciesTerm::new(a, 1)],
            &[SpeciesTerm::new(b, 1)],
        )
        .unwrap();
        let rxn = &net.reactions[0];
        assert_eq!(rxn.reactants().len(), 1);
        assert_eq!(rxn.products().len(), 1);
        assert_eq!(rxn.reactants()[0].stoichiometry, -1);
        assert_eq!(rxn.products()[0].stoichiometry, 1);
    }

    #[test]
    fn add_reaction_rejects_out_of_range_species() {
        let mut net = Network::new();
        net.add_species("A", 10);
        let err = net
            .add_reaction(1.0, &[SpeciesTerm::new(5, 1)], &[])
            .unwrap_err();
        assert!(matches!(err, Error::ModelInvalid(_)));
    }
}
