//! Point-batch transport between senders and receivers.
//!
//! A batch is a byte vector of fixed-size little-endian records: three u64
//! words `(start, end, length)` for chain records, two words `(x, f(x))`
//! for the precomputed-image records of the all-pairs baseline. Batches
//! travel over bounded channels; a full channel blocks the sender, and the
//! time spent blocked is recorded. Channels deliver per-sender FIFO, which
//! is all the ordering the receivers rely on.

use std::sync::mpsc::{Receiver, SyncSender};
use std::time::{Duration, Instant};

/// Bytes per chain record `(start, end, length)`.
pub const CHAIN_RECORD_BYTES: usize = 24;

/// Bytes per precomputed-image record `(x, f(x))`.
pub const PAIR_RECORD_BYTES: usize = 16;

/// What flows towards a receiver.
pub enum PointMsg {
    /// Encoded records.
    Batch(Vec<u8>),
    /// One per sender per round; a receiver's round is over once it has
    /// collected one from every peer.
    EndOfRound,
}

/// Per-destination outbound buffers with asynchronous shipping.
///
/// A buffer fills up to `capacity` records and is then handed to the
/// channel whole; the channel's own bound provides the double-buffering
/// depth. Dropping the queue without [`SendQueue::finish`] loses records,
/// so every exit path of a round must call it.
pub struct SendQueue {
    txs: Vec<SyncSender<PointMsg>>,
    bufs: Vec<Vec<u8>>,
    capacity_bytes: usize,
    pub bytes_sent: u64,
    pub send_wait: Duration,
}

impl SendQueue {
    pub fn new(txs: Vec<SyncSender<PointMsg>>, capacity_records: usize, record_bytes: usize) -> Self {
        let capacity_bytes = capacity_records.max(1) * record_bytes;
        let bufs = txs.iter().map(|_| Vec::with_capacity(capacity_bytes)).collect();
        SendQueue { txs, bufs, capacity_bytes, bytes_sent: 0, send_wait: Duration::ZERO }
    }

    /// Append a three-word chain record bound for `dest`.
    pub fn push3(&mut self, a: u64, b: u64, c: u64, dest: usize) {
        let buf = &mut self.bufs[dest];
        buf.extend_from_slice(&a.to_le_bytes());
        buf.extend_from_slice(&b.to_le_bytes());
        buf.extend_from_slice(&c.to_le_bytes());
        if buf.len() >= self.capacity_bytes {
            self.ship(dest);
        }
    }

    /// Append a two-word record bound for `dest`.
    pub fn push2(&mut self, a: u64, b: u64, dest: usize) {
        let buf = &mut self.bufs[dest];
        buf.extend_from_slice(&a.to_le_bytes());
        buf.extend_from_slice(&b.to_le_bytes());
        if buf.len() >= self.capacity_bytes {
            self.ship(dest);
        }
    }

    fn ship(&mut self, dest: usize) {
        let batch = std::mem::replace(&mut self.bufs[dest], Vec::with_capacity(self.capacity_bytes));
        self.bytes_sent += batch.len() as u64;
        let blocked = Instant::now();
        self.txs[dest].send(PointMsg::Batch(batch)).expect("receiver disconnected");
        self.send_wait += blocked.elapsed();
    }

    /// Ship every non-empty buffer and the end-of-round sentinel to each
    /// destination, and surrender the transfer statistics.
    pub fn finish(mut self) -> (u64, Duration) {
        for dest in 0..self.txs.len() {
            if !self.bufs[dest].is_empty() {
                self.ship(dest);
            }
            self.txs[dest].send(PointMsg::EndOfRound).expect("receiver disconnected");
        }
        (self.bytes_sent, self.send_wait)
    }
}

/// Receive side: multiplexes batches from all senders and recognises the
/// end of a round after one sentinel per peer.
pub struct PointInbox<'a> {
    rx: &'a Receiver<PointMsg>,
    pending_senders: usize,
    pub recv_wait: Duration,
}

impl<'a> PointInbox<'a> {
    pub fn new(rx: &'a Receiver<PointMsg>, n_senders: usize) -> Self {
        PointInbox { rx, pending_senders: n_senders, recv_wait: Duration::ZERO }
    }

    /// Block for the next batch; `None` once every sender has ended the
    /// round.
    pub fn next_batch(&mut self) -> Option<Vec<u8>> {
        while self.pending_senders > 0 {
            let blocked = Instant::now();
            let msg = self.rx.recv().expect("senders disconnected");
            self.recv_wait += blocked.elapsed();
            match msg {
                PointMsg::Batch(batch) => return Some(batch),
                PointMsg::EndOfRound => self.pending_senders -= 1,
            }
        }
        None
    }
}

/// Decode a batch of three-word records.
pub fn decode_triples(batch: &[u8]) -> impl Iterator<Item = (u64, u64, u64)> + '_ {
    batch.chunks_exact(CHAIN_RECORD_BYTES).map(|rec| {
        (
            u64::from_le_bytes(rec[0..8].try_into().unwrap()),
            u64::from_le_bytes(rec[8..16].try_into().unwrap()),
            u64::from_le_bytes(rec[16..24].try_into().unwrap()),
        )
    })
}

/// Decode a batch of two-word records.
pub fn decode_pairs(batch: &[u8]) -> impl Iterator<Item = (u64, u64)> + '_ {
    batch.chunks_exact(PAIR_RECORD_BYTES).map(|rec| {
        (
            u64::from_le_bytes(rec[0..8].try_into().unwrap()),
            u64::from_le_bytes(rec[8..16].try_into().unwrap()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_record_roundtrip_is_identity() {
        let (tx, rx) = mpsc::sync_channel(8);
        let mut q = SendQueue::new(vec![tx], 1024, CHAIN_RECORD_BYTES);
        let records = [(0u64, 0u64, 0u64), (1, u64::MAX, 7), (0xdead_beef, 0xcafe, 42)];
        for &(a, b, c) in &records {
            q.push3(a, b, c, 0);
        }
        let (bytes, _) = q.finish();
        assert_eq!(bytes as usize, records.len() * CHAIN_RECORD_BYTES);

        let mut inbox = PointInbox::new(&rx, 1);
        let batch = inbox.next_batch().unwrap();
        let decoded: Vec<_> = decode_triples(&batch).collect();
        assert_eq!(decoded, records);
        assert!(inbox.next_batch().is_none());
    }

    #[test]
    fn test_full_buffers_ship_early() {
        let (tx, rx) = mpsc::sync_channel(64);
        let mut q = SendQueue::new(vec![tx], 2, CHAIN_RECORD_BYTES);
        for k in 0..5u64 {
            q.push3(k, k, k, 0);
        }
        q.finish();

        let mut inbox = PointInbox::new(&rx, 1);
        let mut sizes = Vec::new();
        while let Some(batch) = inbox.next_batch() {
            sizes.push(batch.len() / CHAIN_RECORD_BYTES);
        }
        // two full batches of 2 and a flushed tail of 1
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_inbox_counts_sentinels_per_sender() {
        let (tx, rx) = mpsc::sync_channel(8);
        let q0 = SendQueue::new(vec![tx.clone()], 16, PAIR_RECORD_BYTES);
        let mut q1 = SendQueue::new(vec![tx], 16, PAIR_RECORD_BYTES);
        q1.push2(9, 9, 0);
        q0.finish();
        q1.finish();

        let mut inbox = PointInbox::new(&rx, 2);
        let batch = inbox.next_batch().unwrap();
        assert_eq!(decode_pairs(&batch).collect::<Vec<_>>(), vec![(9, 9)]);
        assert!(inbox.next_batch().is_none());
    }
}
