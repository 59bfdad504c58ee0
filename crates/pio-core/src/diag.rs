//! Per-state-machine execution counters.

use crate::error::{DecodeError, DecodeFailure};
use crate::sm::{ExecutionResult, SM_COUNT};

/// Counters for one state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SmCounters {
    /// Saturating count of completed (or jumping) instructions.
    pub completed: u32,
    /// Saturating count of stalled execution attempts.
    pub stalls: u32,
    /// Saturating count of decode failures.
    pub decode_failures: u32,
    /// Most recent decode failure and the PC it was fetched from.
    pub last_decode_failure: Option<(u8, DecodeFailure)>,
}

impl SmCounters {
    /// Records one execution attempt.
    pub const fn record_result(&mut self, result: ExecutionResult) {
        match result {
            ExecutionResult::Complete | ExecutionResult::Jump => {
                self.completed = self.completed.saturating_add(1);
            }
            ExecutionResult::Stall => self.stalls = self.stalls.saturating_add(1),
        }
    }

    /// Records a decode failure at `pc`.
    pub const fn record_decode_failure(&mut self, pc: u8, error: DecodeError) {
        self.decode_failures = self.decode_failures.saturating_add(1);
        self.last_decode_failure = Some((pc, error.reason));
    }
}

/// Counters for all state machines of one PIO block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PioDiagnostics {
    /// One entry per state machine.
    pub sms: [SmCounters; SM_COUNT],
}

impl PioDiagnostics {
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
