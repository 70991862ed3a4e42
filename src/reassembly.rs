//! Per-source reassembly of multi-fragment AIS sentences.
//!
//! Each source has at most one message in flight. Fragment 1 of N opens the
//! slot, fragments 2..N must follow in order with the same sequence id, and
//! fragment N hands the collected lines back for joining. Anything out of
//! order discards the slot and the offending fragment.

use crate::decode::fragment_header;
use crate::router::SourceId;
use ahash::AHashMap;
use tracing::trace;

/// AIS allows at most nine fragments per message.
const MAX_FRAGMENTS: u8 = 9;

/// Result of feeding one line into the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// Line is complete on its own (single fragment or not AIS at all).
    Complete(String),
    /// Last fragment arrived; these lines form one message, in order.
    Fragments(Vec<String>),
    /// Fragment stored, message not complete yet.
    Pending,
    /// Fragment did not fit the in-flight message and was dropped.
    Discarded,
}

#[derive(Debug)]
struct Slot {
    sequence_id: Option<u8>,
    total: u8,
    next: u8,
    lines: Vec<String>,
}

/// Reassembly state for every source.
#[derive(Debug, Default)]
pub struct Reassembler {
    slots: AHashMap<SourceId, Slot>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line from `source`.
    pub fn push(&mut self, source: &SourceId, line: &str) -> Assembled {
        let header = match fragment_header(line) {
            Some(h) if h.total > 1 => h,
            _ => return Assembled::Complete(line.to_string()),
        };

        if header.total > MAX_FRAGMENTS || header.number == 0 || header.number > header.total {
            self.slots.remove(source);
            return Assembled::Discarded;
        }

        if header.number == 1 {
            if let Some(old) = self.slots.insert(
                source.clone(),
                Slot {
                    sequence_id: header.sequence_id,
                    total: header.total,
                    next: 2,
                    lines: vec![line.to_string()],
                },
            ) {
                trace!(
                    "{}: abandoned fragment sequence {:?} after {} of {}",
                    source,
                    old.sequence_id,
                    old.lines.len(),
                    old.total
                );
            }
            return Assembled::Pending;
        }

        let Some(slot) = self.slots.get_mut(source) else {
            return Assembled::Discarded;
        };

        if slot.sequence_id != header.sequence_id
            || slot.total != header.total
            || slot.next != header.number
        {
            trace!(
                "{}: fragment {}/{} seq {:?} does not continue seq {:?}, resetting",
                source,
                header.number,
                header.total,
                header.sequence_id,
                slot.sequence_id
            );
            self.slots.remove(source);
            return Assembled::Discarded;
        }

        slot.lines.push(line.to_string());
        if header.number == header.total {
            match self.slots.remove(source) {
                Some(slot) => Assembled::Fragments(slot.lines),
                None => Assembled::Discarded,
            }
        } else {
            slot.next += 1;
            Assembled::Pending
        }
    }

    /// Returns `true` if `source` has a partially received message.
    pub fn in_flight(&self, source: &SourceId) -> bool {
        self.slots.contains_key(source)
    }
}
