//! Integer combination counts used to evaluate mass-action rate laws (C3).
//!
//! `heteroreactions` computes `h(n, m) = C(n, m)`, the number of ways to
//! pick an ordered ignoring-order combination of `m` molecules out of a
//! population of `n`, used directly by the Direct Method and for
//! cross-species partial propensities in PDM/PSSA-CR.
//!
//! `homoreactions` computes the partial-propensity form `h'(n, m) =
//! h(n - 1, m - 1)` used when a partial propensity multiplies the
//! population of the very species that determines the column it lives in
//! (self-dependent / unimolecular reactions): the `n` factor is pulled out
//! and applied separately (see [`crate::update`]), so only the remaining
//! `m - 1` factors are counted here.

/// `C(n, m)`, returned as a real number because it feeds directly into a
/// propensity (itself real-valued).
pub fn heteroreactions(n: u64, m: u64) -> f64 {
    if n < m {
        return 0.0;
    }
    match m {
        0 => 1.0,
        1 => n as f64,
        2 => ((n * (n - 1)) as f64) / 2.0,
        _ => falling_factorial_ratio(n, m),
    }
}

/// `h'(n, m) = h(n - 1, m - 1) / m`. The `/ m` falls out of pulling one
/// factor of `n` out of the combination count: `C(n, m) = (n / m) *
/// C(n - 1, m - 1)`, so `Π[i][j] = k * h'(n, m)` satisfies
/// `n * Π[i][j] = k * C(n, m)`, the ordinary mass-action propensity,
/// exactly (matches `pSSAlib`'s `getPartialCombinationsHomoreactions`).
pub fn homoreactions(n: u64, m: u64) -> f64 {
    if m == 0 || m == 1 {
        return 1.0;
    }
    if n < m {
        return 0.0;
    }
    heteroreactions(n - 1, m - 1) / m as f64
}

fn falling_factorial_ratio(n: u64, m: u64) -> f64 {
    let mut nom = 1.0f64;
    for i in 0..m {
        nom *= (n - i) as f64;
    }
    let mut den = 1.0f64;
    for i in 1..=m {
        den *= i as f64;
    }
    nom / den
}
