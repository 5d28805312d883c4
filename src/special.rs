//! Trigamma ψ'(x), the one special function the beta likelihood needs that
//! `statrs` does not provide. Gamma, beta and digamma come from
//! `statrs::function`.

const ASYMPTOTIC_MIN: f64 = 12.0;

/// Trigamma ψ'(x) for x > 0: recurrence up to x ≥ 12, then the asymptotic series.
pub fn trigamma(mut x: f64) -> f64 {
    let mut acc = 0.0;
    while x < ASYMPTOTIC_MIN {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    acc + inv
        + 0.5 * inv2
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}
