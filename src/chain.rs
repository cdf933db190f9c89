//! Iteration kernel and walk-back resolver.
//!
//! A chain is the trajectory x, F_i(x), F_i²(x), … of the wrapped function,
//! cut at the first distinguished point. Two chains ending at the same
//! distinguished point intersected somewhere; the walk-back replays both
//! from their starts and locates the earliest common value, whose two
//! distinct pre-images form the candidate collision.

use crate::problem::MixedProblem;

/// Step budget per chain, as a multiple of the expected chain length 2^d.
/// The probability of a random chain exceeding k·2^d steps is ≈ e^-k.
pub const CHAIN_BUDGET_FACTOR: u64 = 20;

/// True iff the low-order `difficulty` bits of the mixed value are zero.
///
/// The mix takes the upper half of a Fibonacci-hash product so every input
/// bit influences the tested bits; testing raw low bits instead would make
/// functions with structured low-bit residues starve the search of
/// distinguished points entirely.
#[inline]
pub fn is_distinguished(x: u64, difficulty: u32) -> bool {
    let h = x.wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 32;
    h & ((1u64 << difficulty) - 1) == 0
}

/// Iterate `x ← F_i(x)` from `start` until a distinguished point is hit.
///
/// Returns `Some((end, length))` with `length` the number of iterations
/// performed, or `None` once the step budget `20·2^d` is exhausted (the
/// chain has most likely entered a cycle with no distinguished point on it).
pub fn generate_dist_point<W: MixedProblem>(
    w: &mut W,
    i: u64,
    start: u64,
    difficulty: u32,
) -> Option<(u64, u64)> {
    let budget = CHAIN_BUDGET_FACTOR << difficulty;
    let mut x = start;
    for len in 1..=budget {
        x = w.mixf(i, x);
        if is_distinguished(x, difficulty) {
            return Some((x, len));
        }
    }
    None
}

/// Outcome of replaying two chains that claim a common end point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Distinct inputs a ≠ b with F_i(a) = F_i(b).
    Collision(u64, u64),
    /// The chains merged at an identical input; no usable pair.
    RobinHood,
    /// The chains never met: the claimed common end was a truncated-key
    /// false positive from the dictionary.
    NoMeet,
}

/// Find the earliest colliding pair of two chains ending at the same
/// distinguished point.
///
/// The longer chain is advanced until both have the same number of steps
/// remaining, then both walk in lockstep comparing outputs after every
/// step. Deterministic: the same inputs always reproduce the same pair.
/// Costs at most max(len0, len1) iterations.
pub fn walk<W: MixedProblem>(
    w: &mut W,
    i: u64,
    chain0: (u64, u64),
    chain1: (u64, u64),
) -> WalkOutcome {
    let (mut x0, mut len0) = chain0;
    let (mut x1, mut len1) = chain1;

    while len0 > len1 {
        x0 = w.mixf(i, x0);
        len0 -= 1;
    }
    while len1 > len0 {
        x1 = w.mixf(i, x1);
        len1 -= 1;
    }

    // Aligned chains starting from the same value are one chain seen twice.
    if x0 == x1 {
        return WalkOutcome::RobinHood;
    }

    for _ in 0..len0 {
        let y0 = w.mixf(i, x0);
        let y1 = w.mixf(i, x1);
        if y0 == y1 {
            return WalkOutcome::Collision(x0, x1);
        }
        x0 = y0;
        x1 = y1;
    }
    WalkOutcome::NoMeet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{CollisionMix, CollisionProblem};
    use std::collections::HashMap;

    /// f(x) = 42·x² + 1337 mod 2^24; every x collides with -x.
    struct Square24;

    impl CollisionProblem for Square24 {
        fn n_bits(&self) -> u32 {
            24
        }
        fn m_bits(&self) -> u32 {
            24
        }
        fn f(&self, x: u64) -> u64 {
            42u64.wrapping_mul(x.wrapping_mul(x)).wrapping_add(1337) & 0xff_ffff
        }
        fn is_good_pair(&self, x0: u64, x1: u64) -> bool {
            x0 != x1
        }
    }

    #[test]
    fn test_dp_fraction_matches_difficulty() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let difficulty = 4;
        let samples = 1u64 << (difficulty + 10);
        let mut rng = StdRng::seed_from_u64(0xd15c0);
        let hits = (0..samples)
            .filter(|_| is_distinguished(rng.gen::<u64>(), difficulty))
            .count() as f64;
        let expected = samples as f64 / (1 << difficulty) as f64;
        assert!(hits > 0.5 * expected, "too few DPs: {hits} vs {expected}");
        assert!(hits < 1.5 * expected, "too many DPs: {hits} vs {expected}");
    }

    #[test]
    fn test_generate_dist_point_ends_on_a_dp() {
        let pb = Square24;
        let mut w = CollisionMix::new(&pb);
        let difficulty = 4;
        let mut found = 0;
        for start in 0..200u64 {
            if let Some((end, len)) = generate_dist_point(&mut w, 1, start, difficulty) {
                assert!(is_distinguished(end, difficulty));
                assert!(len >= 1 && len <= CHAIN_BUDGET_FACTOR << difficulty);
                found += 1;
            }
        }
        // e^-20 failure rate: essentially all chains must succeed.
        assert!(found >= 199);
    }

    /// Generate chains until two share an end, then check the walk.
    fn first_colliding_chains() -> (CollisionMix<'static, Square24>, u64, (u64, u64), (u64, u64)) {
        static PB: Square24 = Square24;
        let mut w = CollisionMix::new(&PB);
        let i = 3;
        let difficulty = 4;
        let mut seen: HashMap<u64, (u64, u64)> = HashMap::new();
        for start in 0..100_000u64 {
            if let Some((end, len)) = generate_dist_point(&mut w, i, start, difficulty) {
                if let Some(&(s0, l0)) = seen.get(&end) {
                    return (w, i, (s0, l0), (start, len));
                }
                seen.insert(end, (start, len));
            }
        }
        panic!("no chain collision in 100k chains");
    }

    #[test]
    fn test_walk_finds_a_real_collision() {
        let (mut w, i, c0, c1) = first_colliding_chains();
        match walk(&mut w, i, c0, c1) {
            WalkOutcome::Collision(a, b) => {
                assert_ne!(a, b);
                assert_eq!(w.mixf(i, a), w.mixf(i, b));
            }
            WalkOutcome::RobinHood => {} // legitimate outcome for merged chains
            WalkOutcome::NoMeet => panic!("chains with equal ends must meet"),
        }
    }

    #[test]
    fn test_walk_is_deterministic() {
        let (mut w, i, c0, c1) = first_colliding_chains();
        let first = walk(&mut w, i, c0, c1);
        let second = walk(&mut w, i, c0, c1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_walk_rejects_identical_chains() {
        let pb = Square24;
        let mut w = CollisionMix::new(&pb);
        let (_end, len) = generate_dist_point(&mut w, 1, 17, 4).unwrap();
        assert_eq!(walk(&mut w, 1, (17, len), (17, len)), WalkOutcome::RobinHood);
    }
}
