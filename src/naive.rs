//! All-pairs reference baseline: fill a table with every f image, then
//! probe it with every g image.
//!
//! No chains, no versions: this is the ground truth the probabilistic
//! engine is checked against, and it shares the shard so its drop-on-
//! saturation behaviour is exercised here too. The fill phase computes
//! images in parallel chunks encoded as two-word records; the probe phase
//! is read-only on the shard and data-parallel over disjoint input ranges.

use rayon::prelude::*;

use crate::dict::Shard;
use crate::params::{ConfigError, Parameters};
use crate::problem::ClawProblem;
use crate::transport::{decode_pairs, PAIR_RECORD_BYTES};

const CHUNK_BITS: u32 = 12;

/// Exhaustive claw search. Returns every golden pair, f-side first.
pub fn naive_claw_search<P: ClawProblem>(
    pb: &P,
    params: &Parameters,
) -> Result<Vec<(u64, u64)>, ConfigError> {
    let (n, m) = (pb.n_bits(), pb.m_bits());
    if n > m {
        return Err(ConfigError::DomainLargerThanRange { n, m });
    }
    if n == 0 || n > 48 {
        return Err(ConfigError::BadProblemBits(n));
    }

    let domain = 1u64 << n;
    let mut shard = Shard::for_memory(params.nbytes_memory, (5 * domain).div_ceil(4));
    log::info!(
        "naive search over 2^{} inputs, {} slots",
        n,
        shard.n_slots()
    );

    // Phase 0: fill with (f(x), x). Images are computed in parallel, chunk
    // by chunk, and inserted by the single shard owner.
    let chunk = 1u64 << CHUNK_BITS.min(n);
    let n_chunks = domain.div_ceil(chunk);
    let mut dropped: u64 = 0;
    for wave in (0..n_chunks).step_by(64) {
        let batches: Vec<Vec<u8>> = (wave..(wave + 64).min(n_chunks))
            .into_par_iter()
            .map(|c| {
                let mut buf = Vec::with_capacity(chunk as usize * PAIR_RECORD_BYTES);
                for x in c * chunk..((c + 1) * chunk).min(domain) {
                    buf.extend_from_slice(&x.to_le_bytes());
                    buf.extend_from_slice(&pb.f(x).to_le_bytes());
                }
                buf
            })
            .collect();
        for batch in &batches {
            for (x, z) in decode_pairs(batch) {
                if !shard.insert(z, x, 0) {
                    dropped += 1;
                }
            }
        }
    }
    if dropped > 0 {
        log::warn!("{dropped} images dropped on table saturation");
    }

    // Phase 1: probe with g(x); recompute f to weed out truncated-key
    // false positives, then apply the predicate.
    let shard = &shard;
    let (result, false_positives) = (0..n_chunks)
        .into_par_iter()
        .map(|c| {
            let mut pairs = Vec::new();
            let mut fp: u64 = 0;
            let mut matches = Vec::new();
            for x in c * chunk..((c + 1) * chunk).min(domain) {
                let z = pb.g(x);
                matches.clear();
                shard.probe(z, &mut matches);
                for &(y, _) in &matches {
                    if pb.f(y) != z {
                        fp += 1;
                        continue;
                    }
                    if pb.is_good_pair(y, x) {
                        pairs.push((y, x));
                    }
                }
            }
            (pairs, fp)
        })
        .reduce(
            || (Vec::new(), 0),
            |(mut acc, fp0), (mut pairs, fp1)| {
                acc.append(&mut pairs);
                (acc, fp0 + fp1)
            },
        );

    log::info!(
        "naive search done: {} golden pairs, {} false positives",
        result.len(),
        false_positives
    );
    Ok(result)
}
