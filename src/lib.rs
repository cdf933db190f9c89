//! # claw-search: parallel golden-collision search with distinguished points
//!
//! A meet-in-the-middle engine in the van Oorschot–Wiener style. Given
//! f, g : {0,1}ⁿ → {0,1}ᵐ from a cryptographic problem (double-encryption
//! key recovery being the canonical instance), it hunts for a pair with
//! f(x0) = g(x1) that also satisfies a user predicate: the *golden* claw.
//! A collision mode searches a single f for golden pairs x ≠ y with
//! f(x) = f(y).
//!
//! ## How a search runs
//!
//! 1. The problem is wrapped into a versioned self-map F_i (see
//!    [`problem`]); each round re-randomises the function graph.
//! 2. Senders iterate chains to *distinguished points* ([`chain`]) and ship
//!    `(start, end, length)` records to the receiver owning each end point.
//! 3. Receivers keep the records in a fixed-capacity shard ([`dict`]);
//!    when two chains share an end, a walk-back replays them to the
//!    earliest common value and validates the pair.
//! 4. A controller meters the round yield, rotates versions, aggregates
//!    statistics and stops on the first golden pair ([`engine`]).
//!
//! An exhaustive all-pairs baseline ([`naive`]) provides ground truth for
//! small instances, and [`speck`] carries the double-Speck64 demo problem.

pub mod chain;
pub mod counters;
pub mod dict;
pub mod engine;
pub mod naive;
pub mod params;
pub mod problem;
pub mod speck;
pub mod transport;

pub use naive::naive_claw_search;
pub use params::{human_format, human_parse, ConfigError, Parameters};
pub use problem::{ClawProblem, CollisionProblem};

use problem::{CollisionMix, EqualClawMix, MixedProblem, WideClawMix};

/// Search a single function for a golden collision: x0 ≠ x1 with
/// f(x0) = f(x1) and `is_good_pair(x0, x1)`.
pub fn collision_search<P: CollisionProblem>(
    pb: &P,
    params: &Parameters,
) -> Result<(u64, u64), ConfigError> {
    let (n, m) = (pb.n_bits(), pb.m_bits());
    if m < n {
        return Err(ConfigError::RangeSmallerThanDomain { n, m });
    }
    let tuning = params.finalize(n, m)?;
    log::info!(
        "collision search, f : {{0,1}}^{n} --> {{0,1}}^{m}, {} senders, {} receivers, \
         {} slots/shard, difficulty {}",
        tuning.n_senders,
        tuning.n_receivers,
        tuning.slots_per_receiver,
        tuning.difficulty,
    );

    let proto = CollisionMix::new(pb);
    let (i, a, b) = engine::run(&proto, params, &tuning);
    let (x0, x1) = proto.output_pair(i, a, b);
    debug_assert_ne!(x0, x1);
    debug_assert_eq!(pb.f(x0), pb.f(x1));
    debug_assert!(pb.is_good_pair(x0, x1));
    Ok((x0, x1))
}

/// Search a function pair for a golden claw: (x0, x1) with f(x0) = g(x1)
/// and `is_good_pair(x0, x1)`. The result is (f-side, g-side).
pub fn claw_search<P: ClawProblem>(pb: &P, params: &Parameters) -> Result<(u64, u64), ConfigError> {
    let (n, m) = (pb.n_bits(), pb.m_bits());
    if m < n {
        return Err(ConfigError::DomainLargerThanRange { n, m });
    }
    let tuning = params.finalize(n, m)?;

    let (x0, x1) = if n == m {
        log::info!(
            "claw search, |domain| == |range| == 2^{n}, {} senders, {} receivers, \
             {} slots/shard, difficulty {}",
            tuning.n_senders,
            tuning.n_receivers,
            tuning.slots_per_receiver,
            tuning.difficulty,
        );
        let proto = EqualClawMix::new(pb);
        let (i, a, b) = engine::run(&proto, params, &tuning);
        proto.output_pair(i, a, b)
    } else {
        log::info!(
            "claw search, |domain| = 2^{n} << |range| = 2^{m}, {} senders, {} receivers, \
             {} slots/shard, difficulty {}",
            tuning.n_senders,
            tuning.n_receivers,
            tuning.slots_per_receiver,
            tuning.difficulty,
        );
        let proto = WideClawMix::new(pb);
        let (i, a, b) = engine::run(&proto, params, &tuning);
        proto.output_pair(i, a, b)
    };

    debug_assert_eq!(pb.f(x0), pb.g(x1));
    debug_assert!(pb.is_good_pair(x0, x1));
    Ok((x0, x1))
}
