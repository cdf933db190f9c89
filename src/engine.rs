//! Round-based search coordinator: one controller, S senders, R receivers.
//!
//! Each round runs one version of the mixed function. The controller
//! broadcasts `(version, seed)`, senders grow chains from disjoint starting
//! points and ship distinguished-point records to the receiver owning each
//! end, receivers probe and extend their shard and walk back any chain-end
//! collision. Senders periodically call home with their yield; once the
//! round's target is met (or a golden pair surfaced) the controller answers
//! NEW_VERSION, senders flush and fence the point channels with sentinels,
//! receivers drain, flush their shard, and everyone contributes counters.
//!
//! Workers are scoped threads; all communication is explicit message
//! passing, so no state is shared and nothing needs a lock.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chain::{generate_dist_point, walk, WalkOutcome};
use crate::counters::{Counters, Summary};
use crate::dict::{route, Shard};
use crate::params::{human_format, Parameters, Tuning};
use crate::problem::MixedProblem;
use crate::transport::{decode_triples, PointInbox, PointMsg, SendQueue, CHAIN_RECORD_BYTES};

/// Start-of-round broadcast.
#[derive(Debug, Clone, Copy)]
struct ControlMsg {
    version: u64,
    seed: u64,
    stop: bool,
}

/// Controller's reply to a call-home.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Continue,
    NewVersion,
}

/// Everything that flows towards the controller.
enum ToController {
    CallHome { sender: usize, n_dp: u64 },
    Golden { version: u64, a: u64, b: u64 },
    RoundDone { counters: Counters },
}

/// Run the search to the first golden pair. Returns the raw (version, a, b)
/// triple; callers un-mix it through the wrapper that produced it.
pub(crate) fn run<W: MixedProblem>(proto: &W, params: &Parameters, tuning: &Tuning) -> (u64, u64, u64) {
    let n_send = tuning.n_senders;
    let n_recv = tuning.n_receivers;

    let mut ctrl_txs: Vec<Sender<ControlMsg>> = Vec::with_capacity(n_send + n_recv);
    let mut ctrl_rxs: Vec<Receiver<ControlMsg>> = Vec::with_capacity(n_send + n_recv);
    for _ in 0..n_send + n_recv {
        let (tx, rx) = mpsc::channel();
        ctrl_txs.push(tx);
        ctrl_rxs.push(rx);
    }

    // One bounded point channel per receiver, shared by all senders. The
    // bound gives each sender about two batches of headroom per peer.
    let mut point_txs: Vec<SyncSender<PointMsg>> = Vec::with_capacity(n_recv);
    let mut point_rxs: Vec<Receiver<PointMsg>> = Vec::with_capacity(n_recv);
    for _ in 0..n_recv {
        let (tx, rx) = mpsc::sync_channel(2 * n_send);
        point_txs.push(tx);
        point_rxs.push(rx);
    }

    let (inbox_tx, inbox_rx) = mpsc::channel();
    let mut assign_txs: Vec<Sender<Assignment>> = Vec::with_capacity(n_send);
    let mut assign_rxs: Vec<Receiver<Assignment>> = Vec::with_capacity(n_send);
    for _ in 0..n_send {
        let (tx, rx) = mpsc::channel();
        assign_txs.push(tx);
        assign_rxs.push(rx);
    }

    std::thread::scope(|scope| {
        let mut ctrl_rxs = ctrl_rxs.drain(..);
        let mut assign_rxs = assign_rxs.drain(..);
        let mut point_rxs = point_rxs.drain(..);

        for rank in 0..n_send {
            let w = proto.clone();
            let ctrl_rx = ctrl_rxs.next().unwrap();
            let assign_rx = assign_rxs.next().unwrap();
            let point_txs = point_txs.clone();
            let inbox_tx = inbox_tx.clone();
            scope.spawn(move || {
                sender_worker(w, params, tuning, rank, ctrl_rx, point_txs, inbox_tx, assign_rx)
            });
        }
        for _ in 0..n_recv {
            let w = proto.clone();
            let ctrl_rx = ctrl_rxs.next().unwrap();
            let point_rx = point_rxs.next().unwrap();
            let inbox_tx = inbox_tx.clone();
            scope.spawn(move || receiver_worker(w, tuning, ctrl_rx, point_rx, inbox_tx));
        }
        drop(inbox_tx);
        drop(point_txs);

        controller(proto, params, tuning, ctrl_txs, inbox_rx, assign_txs)
    })
}

fn controller<W: MixedProblem>(
    proto: &W,
    params: &Parameters,
    tuning: &Tuning,
    ctrl_txs: Vec<Sender<ControlMsg>>,
    inbox_rx: Receiver<ToController>,
    assign_txs: Vec<Sender<Assignment>>,
) -> (u64, u64, u64) {
    let n_workers = tuning.n_senders + tuning.n_receivers;
    let mut prng = StdRng::seed_from_u64(params.seed);
    let mut version: u64 = 0;
    let mut golden: Option<(u64, u64, u64)> = None;

    loop {
        let seed: u64 = prng.gen();
        for tx in &ctrl_txs {
            tx.send(ControlMsg { version, seed, stop: false }).expect("worker died");
        }

        let round_start = Instant::now();
        let mut round_dp: u64 = 0;
        let mut round_over = false;
        let mut done = 0usize;
        let mut summary = Summary::default();

        while done < n_workers {
            match inbox_rx.recv().expect("all workers died") {
                ToController::CallHome { sender, n_dp } => {
                    round_dp += n_dp;
                    if round_dp >= tuning.round_dp_target
                        || golden.is_some()
                        || params
                            .round_timeout
                            .map(|t| round_start.elapsed() >= t)
                            .unwrap_or(false)
                    {
                        round_over = true;
                    }
                    let reply = if round_over { Assignment::NewVersion } else { Assignment::Continue };
                    assign_txs[sender].send(reply).expect("sender died");
                }
                ToController::Golden { version, a, b } => {
                    if golden.is_none() {
                        golden = Some((version, a, b));
                    }
                    round_over = true;
                }
                ToController::RoundDone { counters } => {
                    summary.absorb(&counters);
                    done += 1;
                }
            }
        }

        let level = if params.verbose { log::Level::Info } else { log::Level::Debug };
        log::log!(
            level,
            "version {:#x}: {} dp ({} failed chains), {} evals, {} collisions \
             ({} false positive, {} robin-hood, {} same-side, {} bad), {} golden, \
             {} dropped inserts, {}B sent, send wait {:.3}-{:.3}s, recv wait {:.3}-{:.3}s, {:.2}s",
            version,
            summary.sum.n_dp,
            summary.sum.n_chain_failures,
            human_format(summary.sum.n_eval),
            summary.sum.n_collisions,
            summary.sum.n_false_positives,
            summary.sum.n_robin_hoods,
            summary.sum.n_same_side,
            summary.sum.n_bad_pairs,
            summary.sum.n_golden,
            summary.sum.n_dropped_inserts,
            human_format(summary.sum.bytes_sent),
            summary.min.send_wait_s,
            summary.max.send_wait_s,
            summary.min.recv_wait_s,
            summary.max.recv_wait_s,
            round_start.elapsed().as_secs_f64(),
        );

        if let Some(found) = golden {
            for tx in &ctrl_txs {
                tx.send(ControlMsg { version: 0, seed: 0, stop: true }).expect("worker died");
            }
            return found;
        }

        version = version.wrapping_add(1) & proto.space_mask();
    }
}

#[allow(clippy::too_many_arguments)]
fn sender_worker<W: MixedProblem>(
    mut w: W,
    params: &Parameters,
    tuning: &Tuning,
    rank: usize,
    ctrl_rx: Receiver<ControlMsg>,
    point_txs: Vec<SyncSender<PointMsg>>,
    inbox_tx: Sender<ToController>,
    assign_rx: Receiver<Assignment>,
) {
    let mask = w.space_mask();
    // Stride 3 keeps the start sequence clear of the degenerate cycles of
    // plain increments mod 2^n at small n.
    let stride = 3 * tuning.n_senders as u64;

    loop {
        let msg = ctrl_rx.recv().expect("controller died");
        if msg.stop {
            return;
        }

        let mut ctr = Counters::default();
        let mut queue = SendQueue::new(point_txs.clone(), params.buffer_capacity, CHAIN_RECORD_BYTES);
        let mut last_ping = Instant::now();
        let mut chains_since_ping: u64 = 0;
        let mut dp_since_ping: u64 = 0;
        let mut j = msg.seed.wrapping_add(3 * rank as u64);

        loop {
            if chains_since_ping >= tuning.callhome_interval
                && last_ping.elapsed() >= params.ping_delay
            {
                last_ping = Instant::now();
                chains_since_ping = 0;
                inbox_tx
                    .send(ToController::CallHome { sender: rank, n_dp: dp_since_ping })
                    .expect("controller died");
                dp_since_ping = 0;
                if assign_rx.recv().expect("controller died") == Assignment::NewVersion {
                    break;
                }
            }

            let start = j & mask;
            j = j.wrapping_add(stride);
            chains_since_ping += 1;

            match generate_dist_point(&mut w, msg.version, start, tuning.difficulty) {
                None => ctr.n_chain_failures += 1,
                Some((end, len)) => {
                    ctr.n_dp += 1;
                    dp_since_ping += 1;
                    queue.push3(start, end, len, route(end, tuning.n_receivers));
                }
            }
        }

        // Round over: every exit path flushes the queue before the fence.
        let (bytes_sent, send_wait) = queue.finish();
        ctr.bytes_sent = bytes_sent;
        ctr.send_wait_s = send_wait.as_secs_f64();
        ctr.n_eval = w.take_evals();
        inbox_tx.send(ToController::RoundDone { counters: ctr }).expect("controller died");
    }
}

fn receiver_worker<W: MixedProblem>(
    mut w: W,
    tuning: &Tuning,
    ctrl_rx: Receiver<ControlMsg>,
    point_rx: Receiver<PointMsg>,
    inbox_tx: Sender<ToController>,
) {
    let mut shard = Shard::with_slots(tuning.slots_per_receiver);
    // Probe hits are rare; one scratch buffer serves the whole run.
    let mut matches: Vec<(u64, u64)> = Vec::new();

    loop {
        let msg = ctrl_rx.recv().expect("controller died");
        if msg.stop {
            return;
        }

        let mut ctr = Counters::default();
        let mut inbox = PointInbox::new(&point_rx, tuning.n_senders);

        while let Some(batch) = inbox.next_batch() {
            for (start, end, len) in decode_triples(&batch) {
                matches.clear();
                shard.probe(end, &mut matches);
                for &(stored_start, stored_len) in &matches {
                    match walk(&mut w, msg.version, (start, len), (stored_start, stored_len)) {
                        WalkOutcome::Collision(a, b) => {
                            ctr.n_collisions += 1;
                            if w.same_side(msg.version, a, b) {
                                ctr.n_same_side += 1;
                            } else if w.mix_good_pair(msg.version, a, b) {
                                ctr.n_golden += 1;
                                inbox_tx
                                    .send(ToController::Golden { version: msg.version, a, b })
                                    .expect("controller died");
                            } else {
                                ctr.n_bad_pairs += 1;
                            }
                        }
                        WalkOutcome::RobinHood => ctr.n_robin_hoods += 1,
                        WalkOutcome::NoMeet => ctr.n_false_positives += 1,
                    }
                }
                if !shard.insert(end, start, len) {
                    ctr.n_dropped_inserts += 1;
                }
            }
        }

        log::debug!("shard load at round end: {:.2}", shard.load());
        shard.flush();
        ctr.recv_wait_s = inbox.recv_wait.as_secs_f64();
        ctr.n_eval = w.take_evals();
        inbox_tx.send(ToController::RoundDone { counters: ctr }).expect("controller died");
    }
}
