//! End-to-end search scenarios: the toy collision, double-Speck64 key
//! recovery in both engine modes, the exhaustive baseline, and the
//! saturated-dictionary run.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use claw_search::speck::DoubleSpeck;
use claw_search::{
    claw_search, collision_search, naive_claw_search, ClawProblem, CollisionProblem, ConfigError,
    Parameters,
};

/// Responsive call-homes and a small worker pool for test machines.
fn test_params() -> Parameters {
    Parameters {
        ping_delay: Duration::ZERO,
        n_workers: 4,
        ..Parameters::default()
    }
}

// ============================================================
// E1: toy collision
// ============================================================

/// f(x) = 42·x² + 1337 mod 2³² on a 16-bit domain; every x collides with
/// its negation, so any distinct pair is golden.
struct ToyQuadratic;

impl CollisionProblem for ToyQuadratic {
    fn n_bits(&self) -> u32 {
        16
    }
    fn m_bits(&self) -> u32 {
        32
    }
    fn f(&self, x: u64) -> u64 {
        42u64.wrapping_mul(x.wrapping_mul(x)).wrapping_add(1337) & 0xffff_ffff
    }
    fn is_good_pair(&self, x0: u64, x1: u64) -> bool {
        x0 != x1
    }
}

#[test]
fn test_toy_collision_completes() {
    let params = Parameters {
        difficulty: Some(6),
        ..test_params()
    };
    let pb = ToyQuadratic;
    let (x0, x1) = collision_search(&pb, &params).unwrap();
    assert_ne!(x0, x1);
    assert_eq!(pb.f(x0), pb.f(x1));
    assert!(pb.is_good_pair(x0, x1));
}

// ============================================================
// E2/E3: double-Speck64 key recovery
// ============================================================

#[test]
fn test_double_speck_recovers_planted_keys() {
    let mut rng = StdRng::seed_from_u64(0x1337);
    let pb = DoubleSpeck::new(14, &mut rng);
    let (x0, x1) = claw_search(&pb, &test_params()).unwrap();
    assert_eq!((x0, x1), pb.planted());
    assert_eq!(pb.f(x0), pb.g(x1));
    assert!(pb.is_good_pair(x0, x1));
}

#[test]
fn test_double_speck_larger_instance() {
    let mut rng = StdRng::seed_from_u64(0x1337);
    let pb = DoubleSpeck::new(16, &mut rng);
    let params = Parameters {
        n_workers: 6,
        recv_per_node: 2,
        ..test_params()
    };
    let (x0, x1) = claw_search(&pb, &params).unwrap();
    assert_eq!((x0, x1), pb.planted());
}

/// Full-size instance of the demo. Slow in debug builds:
/// `cargo test --release -- --ignored`.
#[test]
#[ignore]
fn test_double_speck_n20() {
    let mut rng = StdRng::seed_from_u64(0x1337);
    let pb = DoubleSpeck::new(20, &mut rng);
    let (x0, x1) = claw_search(&pb, &test_params()).unwrap();
    assert_eq!((x0, x1), pb.planted());
}

// ============================================================
// E4: naive baseline ground truth
// ============================================================

#[test]
fn test_naive_baseline_matches_planted_keys() {
    let mut rng = StdRng::seed_from_u64(0x1337);
    let pb = DoubleSpeck::new(14, &mut rng);
    let pairs = naive_claw_search(&pb, &test_params()).unwrap();
    assert!(pairs.contains(&pb.planted()));
}

// ============================================================
// E5: saturated dictionary
// ============================================================

#[test]
fn test_search_survives_shard_saturation() {
    let mut rng = StdRng::seed_from_u64(0x1337);
    let pb = DoubleSpeck::new(14, &mut rng);
    // Shard holds an eighth of the domain: most inserts get dropped, the
    // search just needs more rounds.
    let params = Parameters {
        nbytes_memory: (1u64 << 14) / 8 * 20,
        ..test_params()
    };
    let (x0, x1) = claw_search(&pb, &params).unwrap();
    assert_eq!((x0, x1), pb.planted());
}

// ============================================================
// Larger-range claw mode
// ============================================================

/// Random-looking f and g on a 10-bit domain with a 16-bit range, with g
/// patched in one point so exactly one claw satisfies the predicate.
struct PlantedWideClaw {
    x0: u64,
    x1: u64,
    target: u64,
}

impl PlantedWideClaw {
    fn new(x0: u64, x1: u64) -> Self {
        let target = mix16(x0, 0x9e37_79b9_7f4a_7c15);
        PlantedWideClaw { x0, x1, target }
    }
}

fn mix16(x: u64, c: u64) -> u64 {
    (x.wrapping_mul(c) >> 32) & 0xffff
}

impl ClawProblem for PlantedWideClaw {
    fn n_bits(&self) -> u32 {
        10
    }
    fn m_bits(&self) -> u32 {
        16
    }
    fn f(&self, x: u64) -> u64 {
        mix16(x, 0x9e37_79b9_7f4a_7c15)
    }
    fn g(&self, x: u64) -> u64 {
        if x == self.x1 {
            self.target
        } else {
            mix16(x, 0xff51_afd7_ed55_8ccd)
        }
    }
    fn is_good_pair(&self, x0: u64, x1: u64) -> bool {
        (x0, x1) == (self.x0, self.x1)
    }
}

#[test]
fn test_wide_claw_mode_finds_planted_pair() {
    let pb = PlantedWideClaw::new(0x155, 0x2aa);
    let (x0, x1) = claw_search(&pb, &test_params()).unwrap();
    assert_eq!((x0, x1), (pb.x0, pb.x1));
    assert_eq!(pb.f(x0), pb.g(x1));
}

// ============================================================
// Configuration errors
// ============================================================

struct ShrinkingClaw;

impl ClawProblem for ShrinkingClaw {
    fn n_bits(&self) -> u32 {
        20
    }
    fn m_bits(&self) -> u32 {
        16
    }
    fn f(&self, x: u64) -> u64 {
        x & 0xffff
    }
    fn g(&self, x: u64) -> u64 {
        x & 0xffff
    }
    fn is_good_pair(&self, _: u64, _: u64) -> bool {
        true
    }
}

#[test]
fn test_shrinking_claw_is_rejected_at_startup() {
    assert!(matches!(
        claw_search(&ShrinkingClaw, &test_params()),
        Err(ConfigError::DomainLargerThanRange { n: 20, m: 16 })
    ));
}

#[test]
fn test_too_few_workers_is_rejected_at_startup() {
    let params = Parameters {
        n_workers: 2,
        ..test_params()
    };
    let mut rng = StdRng::seed_from_u64(1);
    let pb = DoubleSpeck::new(12, &mut rng);
    assert!(matches!(
        claw_search(&pb, &params),
        Err(ConfigError::NotEnoughWorkers { .. })
    ));
}
