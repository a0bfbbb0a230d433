//! The random-number-source seam.
//!
//! spec §1 lists the random-number source as an external collaborator:
//! the kernel is specified only against its interface. We model that
//! interface as a trait, `RngSource`, rather than threading a concrete
//! generator type through every module. A blanket implementation over
//! `rand::Rng` means any of the ecosystem's generators (in particular
//! `rand::rngs::SmallRng`, the one the teacher crate uses) work out of the
//! box; the kernel itself never names a concrete generator type.

use rand::Rng;
use rand_distr::Exp1;

/// Everything the kernel needs from a source of randomness: one uniform
/// draw in `[0, 1)`, and one draw of a unit-rate exponential (scaled by
/// the caller to the desired rate, matching how `τ ~ Exponential(λ)` is
/// drawn as `Exp1/λ` throughout the sampling driver).
pub trait RngSource {
    /// A uniform sample in `[0, 1)`.
    fn uniform01(&mut self) -> f64;

    /// A sample from the unit-rate exponential distribution.
    fn unit_exponential(&mut self) -> f64;
}

impl<R: Rng + ?Sized> RngSource for R {
    fn uniform01(&mut self) -> f64 {
        self.gen::<f64>()
    }
    fn unit_exponential(&mut self) -> f64 {
        self.sample(Exp1)
    }
}

/// The default generator used when a caller does not supply their own:
/// a small, fast, non-cryptographic PRNG, seedable for reproducible runs.
/// This is exactly the generator the teacher crate uses for the same
/// reason (each trial is short-lived and wants a cheap generator, not a
/// cryptographically secure one).
pub type DefaultRng = rand::rngs::SmallRng;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uniform01_is_in_range() {
        let mut rng = DefaultRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let u = rng.uniform01();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn unit_exponential_is_nonnegative() {
        let mut rng = DefaultRng::seed_from_u64(7);
        for _ in 0..10_000 {
            assert!(rng.unit_exponential() >= 0.0);
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = DefaultRng::seed_from_u64(1234);
        let mut b = DefaultRng::seed_from_u64(1234);
        for _ in 0..100 {
            assert_eq!(a.uniform01(), b.uniform01());
        }
    }
}
