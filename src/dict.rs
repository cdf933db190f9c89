//! Fixed-capacity dictionary shard: an open-addressed, linearly probed
//! table mapping a distinguished point to the (start, length) of the chain
//! that produced it.
//!
//! The table is a probabilistic filter, not exact storage: keys are
//! truncated to 32 bits, saturated inserts are dropped, and false-positive
//! matches are weeded out downstream when the walk-back replays the chains.
//! Losing entries only reduces yield, never correctness.

/// Bytes accounted per slot when sizing a shard from a memory budget.
pub const SLOT_BYTES: u64 = 20;

const EMPTY_KEY: u32 = 0xffff_ffff;

/// Largest prime ≤ 2³² − 5; truncated keys are k mod this, so the EMPTY
/// marker can never be produced by a real key.
const KEY_MODULUS: u64 = 0xffff_fffb;

/// Probe runs longer than this are abandoned (insert dropped, probe ends).
const MAX_PROBE: u64 = 256;

#[derive(Clone, Copy)]
struct Slot {
    key: u32,
    start: u64,
    len: u64,
}

const EMPTY_SLOT: Slot = Slot { key: EMPTY_KEY, start: 0, len: 0 };

pub struct Shard {
    n_slots: u64,
    n_used: u64,
    slots: Vec<Slot>,
}

impl Shard {
    /// A shard with (at least) the requested number of slots. The count is
    /// forced odd so keys with a common power-of-two stride cannot alias
    /// onto a fraction of the table.
    pub fn with_slots(n_slots: u64) -> Self {
        let n_slots = n_slots.max(16) | 1;
        Shard {
            n_slots,
            n_used: 0,
            slots: vec![EMPTY_SLOT; n_slots as usize],
        }
    }

    /// Size a shard from a memory budget, capped at `max_slots`.
    pub fn for_memory(nbytes: u64, max_slots: u64) -> Self {
        Self::with_slots((nbytes / SLOT_BYTES).min(max_slots))
    }

    pub fn n_slots(&self) -> u64 {
        self.n_slots
    }

    /// Fraction of slots occupied.
    pub fn load(&self) -> f64 {
        self.n_used as f64 / self.n_slots as f64
    }

    #[inline]
    fn home(&self, key: u64) -> u64 {
        (key ^ (key >> 32)) % self.n_slots
    }

    /// Insert a chain record. Returns false if the probe run saturated and
    /// the record was dropped.
    pub fn insert(&mut self, key: u64, start: u64, len: u64) -> bool {
        let trunc = (key % KEY_MODULUS) as u32;
        let mut h = self.home(key);
        for _ in 0..MAX_PROBE.min(self.n_slots) {
            let slot = &mut self.slots[h as usize];
            if slot.key == EMPTY_KEY {
                *slot = Slot { key: trunc, start, len };
                self.n_used += 1;
                return true;
            }
            h += 1;
            if h == self.n_slots {
                h = 0;
            }
        }
        false
    }

    /// Collect every (start, len) stored under this key into `out`.
    ///
    /// Skips to the first slot holding the truncated key, then returns the
    /// contiguous run sharing it. Truncation means some results may belong
    /// to a different full key; callers must treat matches as candidates.
    pub fn probe(&self, key: u64, out: &mut Vec<(u64, u64)>) {
        let trunc = (key % KEY_MODULUS) as u32;
        let mut h = self.home(key);
        let bound = MAX_PROBE.min(self.n_slots);
        let mut scanned = 0;
        loop {
            if scanned == bound {
                return;
            }
            let slot = &self.slots[h as usize];
            if slot.key == EMPTY_KEY {
                return; // empty slot ends the cluster, fast path
            }
            if slot.key == trunc {
                break;
            }
            h += 1;
            if h == self.n_slots {
                h = 0;
            }
            scanned += 1;
        }
        while scanned < bound {
            let slot = &self.slots[h as usize];
            if slot.key != trunc {
                return;
            }
            out.push((slot.start, slot.len));
            h += 1;
            if h == self.n_slots {
                h = 0;
            }
            scanned += 1;
        }
    }

    /// Empty every slot at a round boundary.
    pub fn flush(&mut self) {
        self.slots.fill(EMPTY_SLOT);
        self.n_used = 0;
    }
}

/// Route a distinguished point to the receiver owning its shard. The
/// multiplier is unrelated to the intra-shard hash so the two stay
/// independent.
#[inline]
pub fn route(dp: u64, n_recv: usize) -> usize {
    ((dp.wrapping_mul(0xdeadbeef) % 0x7fff_ffff) % n_recv as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    #[test]
    fn test_insert_then_probe_roundtrip() {
        let mut shard = Shard::with_slots(1024);
        shard.insert(0xdead_beef_cafe, 11, 5);
        let mut out = Vec::new();
        shard.probe(0xdead_beef_cafe, &mut out);
        assert_eq!(out, vec![(11, 5)]);
    }

    #[test]
    fn test_probe_missing_key_is_empty() {
        let mut shard = Shard::with_slots(1024);
        shard.insert(1, 2, 3);
        let mut out = Vec::new();
        shard.probe(999, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_fidelity_below_seventy_percent_load() {
        // Every key inserted while the table is below 0.7 load must probe
        // back to a superset of its values.
        let mut shard = Shard::with_slots(4096);
        let mut rng = StdRng::seed_from_u64(7);
        let mut reference: HashMap<u64, Vec<(u64, u64)>> = HashMap::new();
        let n_keys = (0.7 * shard.n_slots() as f64) as usize;
        let mut accepted = 0;
        for v in 0..n_keys as u64 {
            let key = rng.gen::<u64>();
            if shard.insert(key, v, v + 1) {
                accepted += 1;
                reference.entry(key).or_default().push((v, v + 1));
            }
        }
        // Below 0.7 load essentially nothing may be dropped.
        assert!(accepted as f64 >= 0.99 * n_keys as f64);
        let mut out = Vec::new();
        for (key, values) in &reference {
            out.clear();
            shard.probe(*key, &mut out);
            for v in values {
                assert!(out.contains(v), "lost value {v:?} for key {key:#x}");
            }
        }
    }

    #[test]
    fn test_truncated_keys_can_false_positive() {
        let mut shard = Shard::with_slots(64);
        // Two distinct keys congruent mod the truncation prime and hashing
        // to the same home slot collide in the table by construction.
        let k0 = 5u64;
        let k1 = (1u64..)
            .map(|j| k0 + KEY_MODULUS * j)
            .find(|&k| shard.home(k) == shard.home(k0))
            .unwrap();
        assert_eq!(k0 % KEY_MODULUS, k1 % KEY_MODULUS);
        shard.insert(k0, 100, 1);
        let mut out = Vec::new();
        shard.probe(k1, &mut out);
        assert_eq!(out, vec![(100, 1)]);
    }

    #[test]
    fn test_saturated_insert_is_dropped() {
        let mut shard = Shard::with_slots(16);
        let n_slots = shard.n_slots();
        let mut accepted = 0;
        for k in 0..2 * n_slots {
            if shard.insert(k, k, 1) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, n_slots);
        assert!(!shard.insert(0xffff, 0, 1));
    }

    #[test]
    fn test_flush_empties_the_table() {
        let mut shard = Shard::with_slots(64);
        for k in 0..32u64 {
            shard.insert(k, k, 1);
        }
        shard.flush();
        assert_eq!(shard.load(), 0.0);
        let mut out = Vec::new();
        for k in 0..32u64 {
            shard.probe(k, &mut out);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_route_is_stable_and_in_range() {
        for dp in [0u64, 1, 0xdead_beef, u64::MAX] {
            let t = route(dp, 7);
            assert!(t < 7);
            assert_eq!(t, route(dp, 7));
        }
    }
}
