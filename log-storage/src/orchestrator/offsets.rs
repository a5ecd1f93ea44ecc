//! Ordered offset commits.
//!
//! Workers finish batches out of order. A partition's offset is only
//! committed once every earlier batch touching that partition has been
//! acknowledged, so a crash never skips a batch that was not handled.

use std::collections::{BTreeMap, HashSet};

use crate::consumer::{Batch, BatchOffsets, RawMessage, TopicPartition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    InFlight,
    Done,
    /// Acknowledged but must not be committed.
    Held,
}

#[derive(Debug)]
struct PendingBatch {
    offsets: BatchOffsets,
    state: BatchState,
}

/// Tracks dispatched batches and computes which offsets can be committed.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    next_sequence: u64,
    pending: BTreeMap<u64, PendingBatch>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next sequence number to a poll result.
    pub fn register(&mut self, messages: Vec<RawMessage>) -> Batch {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let batch = Batch::new(sequence, messages);
        self.pending.insert(
            sequence,
            PendingBatch {
                offsets: batch.offsets.clone(),
                state: BatchState::InFlight,
            },
        );
        batch
    }

    /// Mark a batch as handled. `commit = false` holds its partitions back
    /// for the rest of the session.
    pub fn acknowledge(&mut self, sequence: u64, commit: bool) {
        if let Some(batch) = self.pending.get_mut(&sequence) {
            batch.state = if commit {
                BatchState::Done
            } else {
                BatchState::Held
            };
        }
    }

    /// Offsets that are safe to commit now. Returned offsets are forgotten.
    pub fn take_committable(&mut self) -> BatchOffsets {
        let mut ready = BatchOffsets::new();
        let mut waiting: HashSet<TopicPartition> = HashSet::new();
        let mut held: HashSet<TopicPartition> = HashSet::new();
        let mut finished = Vec::new();

        for (sequence, batch) in self.pending.iter_mut() {
            match batch.state {
                BatchState::InFlight => waiting.extend(batch.offsets.partitions().cloned()),
                BatchState::Held => held.extend(batch.offsets.partitions().cloned()),
                BatchState::Done => {
                    let partitions: Vec<TopicPartition> =
                        batch.offsets.partitions().cloned().collect();
                    for tp in partitions {
                        if held.contains(&tp) {
                            // Never committable in this session.
                            batch.offsets.remove(&tp);
                        } else if !waiting.contains(&tp) {
                            if let Some(offset) = batch.offsets.remove(&tp) {
                                ready.record(tp, offset);
                            }
                        }
                    }
                    if batch.offsets.is_empty() {
                        finished.push(*sequence);
                    }
                }
            }
        }

        for sequence in finished {
            self.pending.remove(&sequence);
        }
        ready
    }

    /// Batches dispatched but not acknowledged yet.
    pub fn in_flight(&self) -> usize {
        self.pending
            .values()
            .filter(|b| b.state == BatchState::InFlight)
            .count()
    }

    /// Batches acknowledged without commit.
    pub fn held(&self) -> usize {
        self.pending
            .values()
            .filter(|b| b.state == BatchState::Held)
            .count()
    }
}
