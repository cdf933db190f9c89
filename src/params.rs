//! Search configuration and the derived per-run tuning.
//!
//! `Parameters` is what a caller fills in (or leaves at defaults);
//! `finalize` validates it against a concrete problem size and derives the
//! quantities the engine actually runs on: the role split, shard sizing,
//! distinguished-point difficulty, per-round yield target, and call-home
//! cadence.

use std::time::Duration;

use crate::dict::SLOT_BYTES;

/// Fatal configuration problems, detected before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("claw search needs |domain| <= |range|, got n = {n}, m = {m}")]
    DomainLargerThanRange { n: u32, m: u32 },

    #[error("collision search needs m >= n, got n = {n}, m = {m}")]
    RangeSmallerThanDomain { n: u32, m: u32 },

    #[error("problem size out of range: n = {0} bits (supported: 1..=48)")]
    BadProblemBits(u32),

    #[error("range size out of range: m = {0} bits (supported: 1..=64)")]
    BadRangeBits(u32),

    #[error("{workers} worker threads cannot hold 1 controller, {receivers} receivers and at least 1 sender")]
    NotEnoughWorkers { workers: usize, receivers: usize },

    #[error("unparsable size '{0}' (expected e.g. 4096, 64K, 256M, 2G)")]
    BadSize(String),
}

/// Caller-facing knobs. Everything else is derived by [`Parameters::finalize`].
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Dictionary RAM budget per receiver, in bytes.
    pub nbytes_memory: u64,
    /// Explicit distinguished-point difficulty; `None` derives it from the
    /// memory budget (see [`Tuning::difficulty`]).
    pub difficulty: Option<u32>,
    /// Outbound batch size per destination, in chain records.
    pub buffer_capacity: usize,
    /// Minimum delay between two call-home probes of the same sender.
    pub ping_delay: Duration,
    /// Receivers in the role split; the rest of the workers send.
    pub recv_per_node: usize,
    /// Total worker threads, controller included.
    pub n_workers: usize,
    /// Abort a round after this long even if the yield target is not met.
    pub round_timeout: Option<Duration>,
    /// Master seed for version seeds.
    pub seed: u64,
    /// Log a per-round summary at info level instead of debug.
    pub verbose: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            // No memory probe here: a fixed, explicit default instead of
            // guessing at the machine.
            nbytes_memory: 256 << 20,
            difficulty: None,
            buffer_capacity: 4096,
            ping_delay: Duration::from_millis(100),
            recv_per_node: 1,
            n_workers: 4,
            round_timeout: None,
            seed: 42,
            verbose: false,
        }
    }
}

/// Derived, per-run constants.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub n_senders: usize,
    pub n_receivers: usize,
    /// Slots per receiver shard.
    pub slots_per_receiver: u64,
    /// Total slots across all shards (w in the yield formulas).
    pub total_slots: u64,
    /// Zero bits required for a distinguished point.
    pub difficulty: u32,
    /// Distinguished points per round before the version changes.
    pub round_dp_target: u64,
    /// Chain attempts between two call-home probes of a sender.
    pub callhome_interval: u64,
}

impl Parameters {
    /// Validate against a problem of `n` domain bits and `m` range bits and
    /// derive the run constants.
    pub fn finalize(&self, n_bits: u32, m_bits: u32) -> Result<Tuning, ConfigError> {
        if n_bits == 0 || n_bits > 48 {
            return Err(ConfigError::BadProblemBits(n_bits));
        }
        if m_bits == 0 || m_bits > 64 {
            return Err(ConfigError::BadRangeBits(m_bits));
        }

        let n_receivers = self.recv_per_node.max(1);
        if self.n_workers < n_receivers + 2 {
            return Err(ConfigError::NotEnoughWorkers {
                workers: self.n_workers,
                receivers: n_receivers,
            });
        }
        let n_senders = self.n_workers - 1 - n_receivers;

        // ~1.25·N/R useful slots per receiver, capped by the memory budget.
        let n = 1u64 << n_bits;
        let useful = (5 * n).div_ceil(4 * n_receivers as u64);
        let slots_per_receiver = (self.nbytes_memory / SLOT_BYTES).min(useful).max(16) | 1;
        let total_slots = slots_per_receiver * n_receivers as u64;

        let difficulty = match self.difficulty {
            Some(d) => d.min(48),
            None => derive_difficulty(n, total_slots),
        };

        // 10·w distinguished points per version, after which further chains
        // mostly rediscover stored ones.
        let round_dp_target = 10 * total_slots;
        let callhome_interval = (round_dp_target / (8 * n_senders as u64)).clamp(64, 10_000);

        Ok(Tuning {
            n_senders,
            n_receivers,
            slots_per_receiver,
            total_slots,
            difficulty,
            round_dp_target,
            callhome_interval,
        })
    }
}

/// Difficulty policy: d ≈ log2(N·θ/w) with θ = 2.25·√(w/N), which reduces
/// to log2(2.25·√(N/w)). Chains then average 2^d steps and a round's DP
/// target covers the space a few times over.
fn derive_difficulty(n: u64, total_slots: u64) -> u32 {
    let ratio = n as f64 / total_slots as f64;
    let d = (2.25 * ratio.sqrt()).log2().round();
    if d < 0.0 {
        0
    } else {
        d as u32
    }
}

/// Parse a human-readable byte size: a plain integer with an optional
/// K/M/G/T suffix (powers of 1024).
pub fn human_parse(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim();
    let bad = || ConfigError::BadSize(s.to_string());
    if s.is_empty() {
        return Err(bad());
    }
    let (digits, shift) = match s.as_bytes()[s.len() - 1].to_ascii_uppercase() {
        b'K' => (&s[..s.len() - 1], 10),
        b'M' => (&s[..s.len() - 1], 20),
        b'G' => (&s[..s.len() - 1], 30),
        b'T' => (&s[..s.len() - 1], 40),
        _ => (s, 0),
    };
    let value: u64 = digits.trim().parse().map_err(|_| bad())?;
    value.checked_shl(shift).filter(|v| *v >> shift == value).ok_or_else(bad)
}

/// Format a byte count with a K/M/G/T suffix for logs.
pub fn human_format(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(40, "T"), (30, "G"), (20, "M"), (10, "K")];
    for (shift, suffix) in UNITS {
        if bytes >= 1u64 << shift {
            return format!("{:.1}{}", bytes as f64 / (1u64 << shift) as f64, suffix);
        }
    }
    format!("{bytes}")
}
