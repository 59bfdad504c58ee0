//! One PIO block: four state machines, shared instruction memory, IRQ flags
//! and the two interrupt lines.

use tracing::warn;

use crate::diag::PioDiagnostics;
use crate::error::{DecodeError, ProgramError};
use crate::gpio::Gpio;
use crate::sm::{ExecContext, StateMachine, INSTRUCTION_MEMORY_SIZE, SM_COUNT};

/// Number of PIO interrupt lines.
pub const IRQ_LINES: usize = 2;

/// Mask of the interrupt sources (`INTR` bits 11:0).
pub const INTR_MASK: u16 = 0x0FFF;

/// Value of `DBG_CFGINFO`: 32 instructions, 4 state machines, FIFO depth 4.
pub const DBG_CFGINFO: u32 = 0x0020_0404;

/// A decode failure collected during one rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectedDecodeError {
    /// State machine that fetched the word.
    pub sm: u8,
    /// PC it was fetched from.
    pub pc: u8,
    /// The failure.
    pub error: DecodeError,
}

/// Result of a rising edge across the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeSummary {
    /// Some state machine fetched from a breakpoint address.
    pub breakpoint_hit: bool,
}

/// A PIO block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pio {
    index: usize,
    memory: [u16; INSTRUCTION_MEMORY_SIZE],
    sms: [StateMachine; SM_COUNT],
    enabled: u8,
    irq: u8,
    input_sync_bypass: u32,
    inte: [u16; IRQ_LINES],
    intf: [u16; IRQ_LINES],
    decode_errors: Vec<CollectedDecodeError>,
    diagnostics: PioDiagnostics,
}

impl Pio {
    /// Creates block `index` (0 or 1) in its reset state.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            memory: [0; INSTRUCTION_MEMORY_SIZE],
            sms: [0, 1, 2, 3].map(StateMachine::new),
            enabled: 0,
            irq: 0,
            input_sync_bypass: 0,
            inte: [0; IRQ_LINES],
            intf: [0; IRQ_LINES],
            decode_errors: Vec::new(),
            diagnostics: PioDiagnostics::default(),
        }
    }

    /// Reinitializes the block in place. Breakpoints and tracepoints survive.
    pub fn reset(&mut self) {
        self.memory = [0; INSTRUCTION_MEMORY_SIZE];
        for sm in &mut self.sms {
            sm.reset();
        }
        self.enabled = 0;
        self.irq = 0;
        self.input_sync_bypass = 0;
        self.inte = [0; IRQ_LINES];
        self.intf = [0; IRQ_LINES];
        self.decode_errors.clear();
        self.diagnostics.reset();
    }

    /// Block index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// State machine `sm`. Panics unless `sm < SM_COUNT`.
    #[must_use]
    pub const fn sm(&self, sm: usize) -> &StateMachine {
        &self.sms[sm]
    }

    /// Mutable state machine `sm`. Panics unless `sm < SM_COUNT`.
    pub const fn sm_mut(&mut self, sm: usize) -> &mut StateMachine {
        &mut self.sms[sm]
    }

    /// Shared instruction memory.
    #[must_use]
    pub const fn memory(&self) -> &[u16; INSTRUCTION_MEMORY_SIZE] {
        &self.memory
    }

    /// Writes one instruction memory slot.
    pub const fn write_instruction(&mut self, address: usize, word: u16) {
        self.memory[address % INSTRUCTION_MEMORY_SIZE] = word;
    }

    /// Copies `words` into instruction memory starting at `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::DoesNotFit`] when the words would run past the
    /// last slot; memory is left untouched.
    pub fn load(&mut self, origin: u8, words: &[u16]) -> Result<(), ProgramError> {
        let start = usize::from(origin);
        let end = start + words.len();
        if end > INSTRUCTION_MEMORY_SIZE {
            return Err(ProgramError::DoesNotFit {
                origin,
                len: words.len(),
            });
        }
        self.memory[start..end].copy_from_slice(words);
        Ok(())
    }

    /// `CTRL.SM_ENABLE` mask.
    #[must_use]
    pub const fn enabled_mask(&self) -> u8 {
        self.enabled
    }

    /// Sets `CTRL.SM_ENABLE`.
    pub const fn set_enabled_mask(&mut self, mask: u8) {
        self.enabled = mask & 0xF;
    }

    /// Applies a `CTRL` write: enable mask, then the self-clearing
    /// `SM_RESTART` and `CLKDIV_RESTART` strobes.
    pub fn write_ctrl(&mut self, value: u32) {
        self.set_enabled_mask((value & 0xF) as u8);
        for (index, sm) in self.sms.iter_mut().enumerate() {
            if value & (1 << (4 + index)) != 0 {
                sm.restart();
            }
            if value & (1 << (8 + index)) != 0 {
                sm.pll_mut().restart();
            }
        }
    }

    /// IRQ flags.
    #[must_use]
    pub const fn irq_flags(&self) -> u8 {
        self.irq
    }

    /// Clears IRQ flags set in `mask`.
    pub const fn clear_irq_flags(&mut self, mask: u8) {
        self.irq &= !mask;
    }

    /// Raises IRQ flags set in `mask` (`IRQ_FORCE`).
    pub const fn force_irq_flags(&mut self, mask: u8) {
        self.irq |= mask;
    }

    /// Replaces the IRQ flags.
    pub const fn set_irq_flags(&mut self, flags: u8) {
        self.irq = flags;
    }

    /// `INPUT_SYNC_BYPASS`, stored only.
    #[must_use]
    pub const fn input_sync_bypass(&self) -> u32 {
        self.input_sync_bypass
    }

    /// Sets `INPUT_SYNC_BYPASS`.
    pub const fn set_input_sync_bypass(&mut self, value: u32) {
        self.input_sync_bypass = value;
    }

    /// `FSTAT`.
    #[must_use]
    pub fn fstat(&self) -> u32 {
        self.sms.iter().enumerate().fold(0, |value, (n, sm)| {
            let fifo = sm.fifo();
            value
                | (u32::from(fifo.tx_empty()) << (24 + n))
                | (u32::from(fifo.tx_full()) << (16 + n))
                | (u32::from(fifo.rx_empty()) << (8 + n))
                | (u32::from(fifo.rx_full()) << n)
        })
    }

    /// `FDEBUG` sticky flags.
    #[must_use]
    pub fn fdebug(&self) -> u32 {
        self.sms.iter().enumerate().fold(0, |value, (n, sm)| {
            let flags = sm.fifo().flags();
            value
                | (u32::from(flags.tx_stall) << (24 + n))
                | (u32::from(flags.tx_over) << (16 + n))
                | (u32::from(flags.rx_under) << (8 + n))
                | (u32::from(flags.rx_stall) << n)
        })
    }

    /// Clears the `FDEBUG` flags set in `mask`.
    pub fn clear_fdebug(&mut self, mask: u32) {
        for (n, sm) in self.sms.iter_mut().enumerate() {
            let flags = sm.fifo_mut().flags_mut();
            if mask & (1 << (24 + n)) != 0 {
                flags.tx_stall = false;
            }
            if mask & (1 << (16 + n)) != 0 {
                flags.tx_over = false;
            }
            if mask & (1 << (8 + n)) != 0 {
                flags.rx_under = false;
            }
            if mask & (1 << n) != 0 {
                flags.rx_stall = false;
            }
        }
    }

    /// `FLEVEL`: four bits per queue, TX at `8n`, RX at `8n + 4`.
    #[must_use]
    pub fn flevel(&self) -> u32 {
        self.sms.iter().enumerate().fold(0, |value, (n, sm)| {
            let fifo = sm.fifo();
            let tx = (fifo.tx_level() as u32) & 0xF;
            let rx = (fifo.rx_level() as u32) & 0xF;
            value | (tx << (8 * n)) | (rx << (8 * n + 4))
        })
    }

    /// Raw interrupt sources (`INTR`): RX not empty, TX not full, IRQ 0..3.
    #[must_use]
    pub fn intr(&self) -> u16 {
        let fifo_sources = self.sms.iter().enumerate().fold(0u16, |value, (n, sm)| {
            let fifo = sm.fifo();
            value | (u16::from(!fifo.rx_empty()) << n) | (u16::from(!fifo.tx_full()) << (4 + n))
        });
        fifo_sources | (u16::from(self.irq & 0xF) << 8)
    }

    /// Interrupt enable of `line`.
    #[must_use]
    pub const fn inte(&self, line: usize) -> u16 {
        self.inte[line % IRQ_LINES]
    }

    /// Sets the interrupt enable of `line`.
    pub const fn set_inte(&mut self, line: usize, value: u16) {
        self.inte[line % IRQ_LINES] = value & INTR_MASK;
    }

    /// Interrupt force of `line`.
    #[must_use]
    pub const fn intf(&self, line: usize) -> u16 {
        self.intf[line % IRQ_LINES]
    }

    /// Sets the interrupt force of `line`.
    pub const fn set_intf(&mut self, line: usize, value: u16) {
        self.intf[line % IRQ_LINES] = value & INTR_MASK;
    }

    /// Masked interrupt status of `line`.
    #[must_use]
    pub fn ints(&self, line: usize) -> u16 {
        (self.intr() | self.intf(line)) & self.inte(line)
    }

    /// Decode failures collected on the most recent rising edge.
    #[must_use]
    pub fn decode_errors(&self) -> &[CollectedDecodeError] {
        &self.decode_errors
    }

    /// Execution counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &PioDiagnostics {
        &self.diagnostics
    }

    /// Phase 0 for every state machine, in ascending order.
    pub fn raising_edge(&mut self, log_decode_failures: bool) -> EdgeSummary {
        self.decode_errors.clear();
        let mut summary = EdgeSummary::default();
        for (n, sm) in self.sms.iter_mut().enumerate() {
            let enabled = self.enabled & (1 << n) != 0;
            let report = sm.raising_edge(enabled, &self.memory);
            summary.breakpoint_hit |= report.breakpoint;
            if let Some(error) = report.decode_error {
                let pc = sm.registers().pc;
                if log_decode_failures {
                    warn!(pio = self.index, sm = n, pc, %error, "decode failure");
                }
                self.diagnostics.sms[n].record_decode_failure(pc, error);
                self.decode_errors.push(CollectedDecodeError {
                    sm: sm.index(),
                    pc,
                    error,
                });
            }
        }
        summary
    }

    /// Phase 1 for every state machine, in ascending order.
    pub fn falling_edge(&mut self, gpio: &mut Gpio) {
        let mut ctx = ExecContext {
            gpio,
            irq_flags: &mut self.irq,
            pio_index: self.index,
        };
        for (n, sm) in self.sms.iter_mut().enumerate() {
            if let Some(result) = sm.falling_edge(&mut ctx) {
                self.diagnostics.sms[n].record_result(result);
            }
        }
    }
}
