//! RX/TX FIFO pair of one state machine.
//!
//! Each direction holds [`FIFO_DEPTH`] words. Joining one direction gives it
//! both halves of the storage and leaves the other with no capacity. The
//! four sticky debug flags mirror the hardware `FDEBUG` register.

use std::collections::VecDeque;

use tracing::debug;

/// Nominal depth of each queue.
pub const FIFO_DEPTH: usize = 4;

/// Depth of a joined queue.
pub const JOINED_DEPTH: usize = 2 * FIFO_DEPTH;

/// Sticky FIFO error flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FifoFlags {
    /// A blocking `PULL` or autopull found the TX FIFO empty.
    pub tx_stall: bool,
    /// The system wrote to a full TX FIFO.
    pub tx_over: bool,
    /// The system read from an empty RX FIFO.
    pub rx_under: bool,
    /// A blocking `PUSH` or autopush found the RX FIFO full.
    pub rx_stall: bool,
}

/// Result of a state-machine side FIFO access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FifoAccess<T> {
    /// The access went through.
    Done(T),
    /// The FIFO was full (push) or empty (pull) and the caller asked to stall.
    Stalled,
    /// The FIFO was full (push) or empty (pull) and the access was dropped.
    Dropped,
}

/// One state machine's FIFO pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fifo {
    rx: VecDeque<u32>,
    tx: VecDeque<u32>,
    join_rx: bool,
    join_tx: bool,
    flags: FifoFlags,
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

impl Fifo {
    /// Creates an empty, unjoined FIFO pair.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rx: VecDeque::with_capacity(JOINED_DEPTH),
            tx: VecDeque::with_capacity(JOINED_DEPTH),
            join_rx: false,
            join_tx: false,
            flags: FifoFlags::default(),
        }
    }

    /// Empties both queues, clears the joins and the sticky flags.
    pub fn reset(&mut self) {
        self.rx.clear();
        self.tx.clear();
        self.join_rx = false;
        self.join_tx = false;
        self.flags = FifoFlags::default();
    }

    /// Clears both queues without touching joins or flags.
    pub fn clear(&mut self) {
        self.rx.clear();
        self.tx.clear();
    }

    /// Capacity of the RX queue under the current joins. RX join wins when both
    /// joins are set.
    #[must_use]
    pub const fn rx_capacity(&self) -> usize {
        if self.join_rx {
            JOINED_DEPTH
        } else if self.join_tx {
            0
        } else {
            FIFO_DEPTH
        }
    }

    /// Capacity of the TX queue under the current joins.
    #[must_use]
    pub const fn tx_capacity(&self) -> usize {
        if self.join_rx {
            0
        } else if self.join_tx {
            JOINED_DEPTH
        } else {
            FIFO_DEPTH
        }
    }

    /// Whether the RX queue has taken the TX storage.
    #[must_use]
    pub const fn join_rx(&self) -> bool {
        self.join_rx
    }

    /// Whether the TX queue has taken the RX storage.
    #[must_use]
    pub const fn join_tx(&self) -> bool {
        self.join_tx
    }

    /// Sets the RX join and empties both queues.
    pub fn set_join_rx(&mut self, join: bool) {
        self.join_rx = join;
        self.clear();
        debug!(join, "rx fifo join set");
    }

    /// Sets the TX join and empties both queues.
    pub fn set_join_tx(&mut self, join: bool) {
        self.join_tx = join;
        self.clear();
        debug!(join, "tx fifo join set");
    }

    /// Number of words in the RX queue.
    #[must_use]
    pub fn rx_level(&self) -> usize {
        self.rx.len()
    }

    /// Number of words in the TX queue.
    #[must_use]
    pub fn tx_level(&self) -> usize {
        self.tx.len()
    }

    /// `true` when the RX queue holds no words.
    #[must_use]
    pub fn rx_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// `true` when the RX queue is at capacity.
    #[must_use]
    pub fn rx_full(&self) -> bool {
        self.rx.len() >= self.rx_capacity()
    }

    /// `true` when the TX queue holds no words.
    #[must_use]
    pub fn tx_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// `true` when the TX queue is at capacity.
    #[must_use]
    pub fn tx_full(&self) -> bool {
        self.tx.len() >= self.tx_capacity()
    }

    /// Current sticky flags.
    #[must_use]
    pub const fn flags(&self) -> FifoFlags {
        self.flags
    }

    /// Mutable access to the sticky flags (write-1-to-clear handling).
    pub fn flags_mut(&mut self) -> &mut FifoFlags {
        &mut self.flags
    }

    /// State machine pushes into RX.
    ///
    /// On a full queue the value is not stored; with `stall_if_full` the RX
    /// stall flag is set and [`FifoAccess::Stalled`] is returned.
    pub fn rx_push(&mut self, value: u32, stall_if_full: bool) -> FifoAccess<()> {
        if self.rx_full() {
            if stall_if_full {
                self.flags.rx_stall = true;
                return FifoAccess::Stalled;
            }
            return FifoAccess::Dropped;
        }
        self.rx.push_back(value);
        FifoAccess::Done(())
    }

    /// System reads from RX. An empty queue sets the underrun flag and yields 0.
    pub fn rx_dma_read(&mut self) -> u32 {
        self.rx.pop_front().unwrap_or_else(|| {
            self.flags.rx_under = true;
            0
        })
    }

    /// State machine pulls from TX.
    ///
    /// On an empty queue with `stall_if_empty` the TX stall flag is set.
    pub fn tx_pull(&mut self, stall_if_empty: bool) -> FifoAccess<u32> {
        match self.tx.pop_front() {
            Some(value) => FifoAccess::Done(value),
            None if stall_if_empty => {
                self.flags.tx_stall = true;
                FifoAccess::Stalled
            }
            None => FifoAccess::Dropped,
        }
    }

    /// System writes into TX. A full queue keeps its length: the front word is
    /// overwritten and the overflow flag is set.
    pub fn tx_dma_write(&mut self, value: u32) {
        if self.tx_capacity() == 0 {
            self.flags.tx_over = true;
            return;
        }
        if self.tx_full() {
            self.flags.tx_over = true;
            if let Some(front) = self.tx.front_mut() {
                *front = value;
            }
            return;
        }
        self.tx.push_back(value);
    }

    /// Reads storage slot `slot` (0..8) the way the debug view exposes it.
    ///
    /// Unjoined, slots 0..4 are TX and 4..8 are RX. A joined queue owns all
    /// eight slots. Slots past a queue's level read as 0.
    #[must_use]
    pub fn slot(&self, slot: usize) -> u32 {
        let (queue, index) = self.slot_location(slot);
        queue.and_then(|q| q.get(index).copied()).unwrap_or(0)
    }

    /// Overwrites storage slot `slot` if it currently holds a word.
    pub fn set_slot(&mut self, slot: usize, value: u32) {
        let index = self.slot_index(slot);
        let queue = match self.slot_owner(slot) {
            SlotOwner::Rx => &mut self.rx,
            SlotOwner::Tx => &mut self.tx,
            SlotOwner::None => return,
        };
        if let Some(entry) = queue.get_mut(index) {
            *entry = value;
        }
    }

    fn slot_location(&self, slot: usize) -> (Option<&VecDeque<u32>>, usize) {
        let index = self.slot_index(slot);
        match self.slot_owner(slot) {
            SlotOwner::Rx => (Some(&self.rx), index),
            SlotOwner::Tx => (Some(&self.tx), index),
            SlotOwner::None => (None, index),
        }
    }

    const fn slot_owner(&self, slot: usize) -> SlotOwner {
        if slot >= JOINED_DEPTH {
            SlotOwner::None
        } else if self.join_rx {
            SlotOwner::Rx
        } else if self.join_tx || slot < FIFO_DEPTH {
            SlotOwner::Tx
        } else {
            SlotOwner::Rx
        }
    }

    const fn slot_index(&self, slot: usize) -> usize {
        if self.join_rx || self.join_tx {
            slot
        } else {
            slot % FIFO_DEPTH
        }
    }
}

#[derive(Clone, Copy)]
enum SlotOwner {
    Rx,
    Tx,
    None,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Fifo, FifoAccess, FIFO_DEPTH, JOINED_DEPTH};

    #[test]
    fn rx_push_to_full_keeps_contents() {
        let mut fifo = Fifo::new();
        for value in 0..FIFO_DEPTH as u32 {
            assert_eq!(fifo.rx_push(value, false), FifoAccess::Done(()));
        }
        assert_eq!(fifo.rx_push(99, false), FifoAccess::Dropped);
        assert!(!fifo.flags().rx_stall);
        assert_eq!(fifo.rx_push(99, true), FifoAccess::Stalled);
        assert!(fifo.flags().rx_stall);
        let drained: Vec<u32> = (0..FIFO_DEPTH).map(|_| fifo.rx_dma_read()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tx_write_to_full_overwrites_front() {
        let mut fifo = Fifo::new();
        for value in 1..=4 {
            fifo.tx_dma_write(value);
        }
        fifo.tx_dma_write(0xAA);
        assert_eq!(fifo.tx_level(), FIFO_DEPTH);
        assert!(fifo.flags().tx_over);
        assert_eq!(fifo.tx_pull(false), FifoAccess::Done(0xAA));
        assert_eq!(fifo.tx_pull(false), FifoAccess::Done(2));
    }

    #[test]
    fn empty_reads_set_sticky_flags() {
        let mut fifo = Fifo::new();
        assert_eq!(fifo.rx_dma_read(), 0);
        assert!(fifo.flags().rx_under);
        assert_eq!(fifo.tx_pull(false), FifoAccess::Dropped);
        assert!(!fifo.flags().tx_stall);
        assert_eq!(fifo.tx_pull(true), FifoAccess::Stalled);
        assert!(fifo.flags().tx_stall);
    }

    #[test]
    fn join_clears_and_resizes() {
        let mut fifo = Fifo::new();
        fifo.tx_dma_write(1);
        assert_eq!(fifo.rx_push(2, false), FifoAccess::Done(()));
        fifo.set_join_rx(true);
        assert!(fifo.rx_empty());
        assert!(fifo.tx_empty());
        assert_eq!(fifo.tx_capacity(), 0);
        assert!(fifo.tx_full());
        for value in 0..JOINED_DEPTH as u32 {
            assert!(!fifo.rx_full());
            assert_eq!(fifo.rx_push(value, false), FifoAccess::Done(()));
        }
        assert!(fifo.rx_full());
        assert_eq!(fifo.slot(7), 7);
    }

    #[test]
    fn repeating_a_join_still_clears() {
        let mut fifo = Fifo::new();
        fifo.set_join_rx(true);
        assert_eq!(fifo.rx_push(7, false), FifoAccess::Done(()));
        fifo.set_join_rx(true);
        assert!(fifo.rx_empty());
        assert_eq!(fifo.rx_capacity(), JOINED_DEPTH);

        fifo.set_join_rx(false);
        fifo.tx_dma_write(9);
        fifo.set_join_tx(false);
        assert!(fifo.tx_empty());
    }

    #[test]
    fn unjoined_slots_split_tx_then_rx() {
        let mut fifo = Fifo::new();
        fifo.tx_dma_write(0x11);
        assert_eq!(fifo.rx_push(0x22, false), FifoAccess::Done(()));
        assert_eq!(fifo.slot(0), 0x11);
        assert_eq!(fifo.slot(4), 0x22);
        assert_eq!(fifo.slot(5), 0);
        fifo.set_slot(4, 0x33);
        assert_eq!(fifo.rx_dma_read(), 0x33);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u32, bool),
        Read,
        Pull(bool),
        Write(u32),
        JoinRx(bool),
        JoinTx(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u32>(), any::<bool>()).prop_map(|(v, s)| Op::Push(v, s)),
            Just(Op::Read),
            any::<bool>().prop_map(Op::Pull),
            any::<u32>().prop_map(Op::Write),
            any::<bool>().prop_map(Op::JoinRx),
            any::<bool>().prop_map(Op::JoinTx),
        ]
    }

    proptest! {
        #[test]
        fn levels_never_exceed_storage(ops in proptest::collection::vec(op(), 0..64)) {
            let mut fifo = Fifo::new();
            for op in ops {
                match op {
                    Op::Push(v, s) => { let _ = fifo.rx_push(v, s); }
                    Op::Read => { let _ = fifo.rx_dma_read(); }
                    Op::Pull(s) => { let _ = fifo.tx_pull(s); }
                    Op::Write(v) => fifo.tx_dma_write(v),
                    Op::JoinRx(j) => fifo.set_join_rx(j),
                    Op::JoinTx(j) => fifo.set_join_tx(j),
                }
                prop_assert!(fifo.rx_level() + fifo.tx_level() <= JOINED_DEPTH);
                prop_assert!(fifo.rx_level() <= fifo.rx_capacity());
                prop_assert!(fifo.tx_level() <= fifo.tx_capacity());
            }
        }
    }
}
