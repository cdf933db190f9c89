//! Per-worker counters and their end-of-round reduction.
//!
//! Every worker keeps its own counters on the hot path (no shared state);
//! at a round boundary each contributes one snapshot and the controller
//! folds them into min/max/sum aggregates.

use serde::Serialize;

/// One worker's tallies for a single round. Algorithmic failures are
/// counted here and nowhere else: none of them propagates as an error.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Counters {
    /// Iteration-function evaluations (chain generation + walk-backs).
    pub n_eval: u64,
    /// Distinguished points produced.
    pub n_dp: u64,
    /// Chains abandoned after exhausting the step budget.
    pub n_chain_failures: u64,
    /// Walk-backs that met (useful or not).
    pub n_collisions: u64,
    /// Truncated-key matches whose chains never met.
    pub n_false_positives: u64,
    /// Chain merges at an identical input.
    pub n_robin_hoods: u64,
    /// Claw pairs with both sides on the same underlying function.
    pub n_same_side: u64,
    /// Genuine collisions rejected by the user predicate.
    pub n_bad_pairs: u64,
    /// Golden pairs reported upward.
    pub n_golden: u64,
    /// Inserts dropped on shard saturation.
    pub n_dropped_inserts: u64,
    /// Encoded point-batch bytes shipped.
    pub bytes_sent: u64,
    /// Seconds spent blocked on full outbound channels.
    pub send_wait_s: f64,
    /// Seconds spent blocked waiting for inbound batches.
    pub recv_wait_s: f64,
}

/// Min/max/sum reduction over the workers of one round.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Summary {
    pub n_workers: usize,
    pub min: Counters,
    pub max: Counters,
    pub sum: Counters,
}

impl Summary {
    pub fn absorb(&mut self, c: &Counters) {
        if self.n_workers == 0 {
            self.min = c.clone();
            self.max = c.clone();
            self.sum = c.clone();
            self.n_workers = 1;
            return;
        }
        self.n_workers += 1;

        let (min, max, sum) = (&mut self.min, &mut self.max, &mut self.sum);
        macro_rules! reduce {
            ($($field:ident),* $(,)?) => {$(
                if c.$field < min.$field {
                    min.$field = c.$field;
                }
                if c.$field > max.$field {
                    max.$field = c.$field;
                }
                sum.$field += c.$field;
            )*};
        }
        reduce!(
            n_eval,
            n_dp,
            n_chain_failures,
            n_collisions,
            n_false_positives,
            n_robin_hoods,
            n_same_side,
            n_bad_pairs,
            n_golden,
            n_dropped_inserts,
            bytes_sent,
            send_wait_s,
            recv_wait_s,
        );
    }
}
