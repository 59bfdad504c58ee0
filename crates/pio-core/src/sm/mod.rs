//! One PIO state machine: registers, FIFO, clock divider and the two-phase
//! fetch/execute step.
//!
//! On the rising edge the divider decides whether this system cycle is
//! enabled, and an enabled machine with no delay pending fetches and decodes
//! the next instruction. On the falling edge it either burns one delay cycle
//! or executes the fetched instruction.

mod execute;
mod status;

pub use execute::{apply_side_set, execute_instruction, ExecContext, ExecutionResult};
pub use status::{
    threshold_bits, SmConfig, SmRegisters, EXECCTRL_EXEC_STALLED, EXECCTRL_RESET,
    PINCTRL_RESET, SHIFTCTRL_FJOIN_RX, SHIFTCTRL_FJOIN_TX, SHIFTCTRL_RESET, SHIFT_WIDTH,
};

use tracing::{debug, info};

use crate::decoder::decode;
use crate::encoding::SideSetLayout;
use crate::error::DecodeError;
use crate::fifo::Fifo;
use crate::instruction::Instruction;
use crate::pll::Pll;

/// Number of state machines per PIO block.
pub const SM_COUNT: usize = 4;

/// Number of instruction memory slots.
pub const INSTRUCTION_MEMORY_SIZE: usize = 32;

/// Who scheduled an out-of-band instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecOrigin {
    /// `OUT EXEC` or `MOV EXEC`: the PC advances when it completes.
    Instruction,
    /// A write to `SMn_INSTR`: runs even when disabled and leaves the PC alone.
    Register,
}

/// An instruction waiting to run in place of the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingExec {
    /// Instruction word.
    pub word: u16,
    /// Scheduling source.
    pub origin: ExecOrigin,
}

/// What happened during a rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchReport {
    /// The fetched word could not be decoded.
    pub decode_error: Option<DecodeError>,
    /// The machine fetched from an address marked as breakpoint.
    pub breakpoint: bool,
}

/// A PIO state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    index: u8,
    pub(crate) registers: SmRegisters,
    pub(crate) config: SmConfig,
    pub(crate) fifo: Fifo,
    pll: Pll,
    pub(crate) irq_wait_pending: bool,
    pending_exec: Option<PendingExec>,
    fetched: Option<(Instruction, bool)>,
    delay: u8,
    clock_enabled: bool,
    stalled: bool,
    breakpoints: u32,
    tracepoints: u32,
}

impl StateMachine {
    /// Creates state machine `index` (`0..4`) in its reset state.
    #[must_use]
    pub fn new(index: u8) -> Self {
        Self {
            index: index % SM_COUNT as u8,
            registers: SmRegisters::default(),
            config: SmConfig::default(),
            fifo: Fifo::new(),
            pll: Pll::new(),
            irq_wait_pending: false,
            pending_exec: None,
            fetched: None,
            delay: 0,
            clock_enabled: false,
            stalled: false,
            breakpoints: 0,
            tracepoints: 0,
        }
    }

    /// Restores every register, the FIFO and the divider to reset values.
    /// Breakpoints and tracepoints survive.
    pub fn reset(&mut self) {
        let (breakpoints, tracepoints) = (self.breakpoints, self.tracepoints);
        *self = Self::new(self.index);
        self.breakpoints = breakpoints;
        self.tracepoints = tracepoints;
    }

    /// Internal restart (`CTRL.SM_RESTART`): clears shift state, delay,
    /// pending waits and injected instructions. Configuration, scratch
    /// registers, PC and FIFO contents are kept.
    pub fn restart(&mut self) {
        self.registers.isr = 0;
        self.registers.isr_count = 0;
        self.registers.osr_count = SHIFT_WIDTH;
        self.irq_wait_pending = false;
        self.pending_exec = None;
        self.fetched = None;
        self.delay = 0;
        self.stalled = false;
        debug!(sm = self.index, "state machine restarted");
    }

    /// Index within the PIO block.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Architectural registers.
    #[must_use]
    pub const fn registers(&self) -> &SmRegisters {
        &self.registers
    }

    /// Mutable architectural registers.
    pub const fn registers_mut(&mut self) -> &mut SmRegisters {
        &mut self.registers
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &SmConfig {
        &self.config
    }

    /// Mutable configuration.
    pub const fn config_mut(&mut self) -> &mut SmConfig {
        &mut self.config
    }

    /// FIFO pair.
    #[must_use]
    pub const fn fifo(&self) -> &Fifo {
        &self.fifo
    }

    /// Mutable FIFO pair.
    pub const fn fifo_mut(&mut self) -> &mut Fifo {
        &mut self.fifo
    }

    /// Clock divider.
    #[must_use]
    pub const fn pll(&self) -> &Pll {
        &self.pll
    }

    /// Mutable clock divider.
    pub const fn pll_mut(&mut self) -> &mut Pll {
        &mut self.pll
    }

    /// Delay/side-set split for the current configuration.
    #[must_use]
    pub const fn side_set_layout(&self) -> SideSetLayout {
        self.config.side_set_layout()
    }

    /// Remaining delay cycles.
    #[must_use]
    pub const fn delay(&self) -> u8 {
        self.delay
    }

    /// Whether the current system cycle is enabled for this machine.
    #[must_use]
    pub const fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }

    /// `EXEC_STALLED`: the last executed instruction stalled.
    #[must_use]
    pub const fn exec_stalled(&self) -> bool {
        self.stalled
    }

    /// Instruction scheduled to replace the next fetch.
    #[must_use]
    pub const fn pending_exec(&self) -> Option<PendingExec> {
        self.pending_exec
    }

    /// Schedules `word` to run in place of the next fetch.
    pub fn schedule_exec(&mut self, word: u16, origin: ExecOrigin) {
        self.pending_exec = Some(PendingExec { word, origin });
    }

    /// Drops any scheduled instruction.
    pub fn cancel_exec(&mut self) {
        self.pending_exec = None;
    }

    /// Breakpoint mask, one bit per instruction address.
    #[must_use]
    pub const fn breakpoints(&self) -> u32 {
        self.breakpoints
    }

    /// Replaces the breakpoint mask.
    pub fn set_breakpoints(&mut self, mask: u32) {
        self.breakpoints = mask;
    }

    /// Tracepoint mask, one bit per instruction address.
    #[must_use]
    pub const fn tracepoints(&self) -> u32 {
        self.tracepoints
    }

    /// Replaces the tracepoint mask.
    pub fn set_tracepoints(&mut self, mask: u32) {
        self.tracepoints = mask;
    }

    /// `SHIFTCTRL` including the FIFO join bits.
    #[must_use]
    pub const fn shiftctrl(&self) -> u32 {
        let mut value = self.config.shiftctrl();
        if self.fifo.join_rx() {
            value |= SHIFTCTRL_FJOIN_RX;
        }
        if self.fifo.join_tx() {
            value |= SHIFTCTRL_FJOIN_TX;
        }
        value
    }

    /// Applies a `SHIFTCTRL` value including the FIFO join bits.
    ///
    /// The queues are only flushed when a join bit actually changes, so
    /// rewriting the shift configuration keeps queued words.
    pub fn set_shiftctrl(&mut self, value: u32) {
        self.config.set_shiftctrl(value);
        let join_rx = value & SHIFTCTRL_FJOIN_RX != 0;
        if join_rx != self.fifo.join_rx() {
            self.fifo.set_join_rx(join_rx);
        }
        let join_tx = value & SHIFTCTRL_FJOIN_TX != 0;
        if join_tx != self.fifo.join_tx() {
            self.fifo.set_join_tx(join_tx);
        }
    }

    /// `EXECCTRL` including `EXEC_STALLED`.
    #[must_use]
    pub const fn execctrl(&self) -> u32 {
        let value = self.config.execctrl();
        if self.stalled {
            value | EXECCTRL_EXEC_STALLED
        } else {
            value
        }
    }

    const fn register_injection_pending(&self) -> bool {
        matches!(
            self.pending_exec,
            Some(PendingExec {
                origin: ExecOrigin::Register,
                ..
            })
        )
    }

    /// Phase 0: divide the clock, then fetch and decode.
    ///
    /// `enabled` is this machine's bit of `CTRL.SM_ENABLE`. An instruction
    /// written to `SMn_INSTR` is fetched regardless of enable, divider and
    /// delay.
    pub fn raising_edge(
        &mut self,
        enabled: bool,
        memory: &[u16; INSTRUCTION_MEMORY_SIZE],
    ) -> FetchReport {
        let injected = self.register_injection_pending();
        let divided = enabled && self.pll.tick();
        self.clock_enabled = divided || injected;
        self.fetched = None;

        let mut report = FetchReport::default();
        if !self.clock_enabled || (self.delay > 0 && !injected) {
            return report;
        }

        let (word, from_memory) = match self.pending_exec {
            Some(pending) => (pending.word, false),
            None => (memory[usize::from(self.registers.pc)], true),
        };
        match decode(word, self.side_set_layout()) {
            Ok(instr) => {
                if from_memory && !self.stalled {
                    let address_bit = 1u32 << self.registers.pc;
                    if self.tracepoints & address_bit != 0 {
                        info!(
                            sm = self.index,
                            pc = self.registers.pc,
                            instruction = %instr,
                            "tracepoint"
                        );
                    }
                    report.breakpoint = self.breakpoints & address_bit != 0;
                }
                self.fetched = Some((instr, !from_memory));
            }
            Err(error) => report.decode_error = Some(error),
        }
        report
    }

    /// Phase 1: count down a delay, or execute the fetched instruction and
    /// advance the PC.
    pub fn falling_edge(&mut self, ctx: &mut ExecContext<'_>) -> Option<ExecutionResult> {
        if !self.clock_enabled {
            return None;
        }
        let Some((instr, out_of_band)) = self.fetched.take() else {
            self.delay = self.delay.saturating_sub(1);
            return None;
        };

        let scheduled = if out_of_band {
            self.pending_exec.take()
        } else {
            None
        };
        let result = execute_instruction(self, &instr, ctx);
        apply_side_set(self, &instr, ctx);

        match result {
            ExecutionResult::Stall => {
                if self.pending_exec.is_none() {
                    self.pending_exec = scheduled;
                }
                self.stalled = self.pending_exec.is_none();
            }
            ExecutionResult::Complete => {
                self.stalled = false;
                let advance = scheduled.map_or(true, |p| p.origin == ExecOrigin::Instruction);
                if advance {
                    self.registers.advance_pc(&self.config);
                }
                self.delay = instr.delay;
            }
            ExecutionResult::Jump => {
                self.stalled = false;
                self.delay = instr.delay;
            }
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExecContext, ExecOrigin, ExecutionResult, StateMachine, INSTRUCTION_MEMORY_SIZE,
        SHIFTCTRL_FJOIN_TX,
    };
    use crate::bit::{Bit, Direction};
    use crate::fifo::FifoAccess;
    use crate::gpio::{Function, Gpio};

    struct Bench {
        sm: StateMachine,
        gpio: Gpio,
        irq: u8,
        memory: [u16; INSTRUCTION_MEMORY_SIZE],
    }

    impl Bench {
        fn new(program: &[u16]) -> Self {
            let mut memory = [0u16; INSTRUCTION_MEMORY_SIZE];
            memory[..program.len()].copy_from_slice(program);
            let mut gpio = Gpio::new();
            for pin in 0..32 {
                gpio.set_function(pin, Function::Pio0);
            }
            Self {
                sm: StateMachine::new(0),
                gpio,
                irq: 0,
                memory,
            }
        }

        fn cycle(&mut self) -> Option<ExecutionResult> {
            let report = self.sm.raising_edge(true, &self.memory);
            assert!(report.decode_error.is_none());
            let mut ctx = ExecContext {
                gpio: &mut self.gpio,
                irq_flags: &mut self.irq,
                pio_index: 0,
            };
            self.sm.falling_edge(&mut ctx)
        }
    }

    #[test]
    fn set_with_delay_holds_pc() {
        // set pins, 1 [2] ; set pins, 0
        let mut bench = Bench::new(&[0xE201, 0xE000]);
        bench.sm.config_mut().set_count = 1;
        bench.gpio.set_pio_pin_direction(0, 0, Direction::Out);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.gpio.pad_in(0), Bit::High);
        assert_eq!(bench.sm.registers().pc, 1);
        assert_eq!(bench.cycle(), None);
        assert_eq!(bench.cycle(), None);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.gpio.pad_in(0), Bit::Low);
    }

    #[test]
    fn x_post_decrement_always_decrements() {
        // jmp x--, 0
        let mut bench = Bench::new(&[0x0040]);
        bench.sm.registers_mut().x = 1;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Jump));
        assert_eq!(bench.sm.registers().x, 0);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().x, u32::MAX);
    }

    #[test]
    fn x_not_equal_y_compares_both_registers() {
        // jmp x!=y, 7
        let mut bench = Bench::new(&[0x00A7]);
        bench.sm.registers_mut().x = 3;
        bench.sm.registers_mut().y = 3;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        bench.sm.registers_mut().pc = 0;
        bench.sm.registers_mut().y = 4;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Jump));
        assert_eq!(bench.sm.registers().pc, 7);
    }

    #[test]
    fn blocking_pull_stalls_until_data_arrives() {
        // pull block
        let mut bench = Bench::new(&[0x80A0]);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        assert!(bench.sm.exec_stalled());
        assert!(bench.sm.fifo().flags().tx_stall);
        bench.sm.fifo_mut().tx_dma_write(0xDEAD_BEEF);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().osr, 0xDEAD_BEEF);
        assert!(!bench.sm.exec_stalled());
    }

    #[test]
    fn nonblocking_pull_from_empty_copies_x() {
        // pull noblock
        let mut bench = Bench::new(&[0x8080]);
        bench.sm.registers_mut().x = 42;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().osr, 42);
    }

    #[test]
    fn autopush_stalls_when_rx_full() {
        // in x, 8
        let mut bench = Bench::new(&[0x4028]);
        bench.sm.config_mut().autopush = true;
        bench.sm.config_mut().push_threshold = 8;
        bench.sm.config_mut().in_shift_right = false;
        bench.sm.registers_mut().x = 0xAB;
        for _ in 0..4 {
            assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
            bench.sm.registers_mut().pc = 0;
        }
        assert!(bench.sm.fifo().rx_full());
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        assert_eq!(bench.sm.registers().isr_count, 0);
        assert!(bench.sm.fifo().flags().rx_stall);
        assert_eq!(bench.sm.fifo_mut().rx_dma_read(), 0xAB);
    }

    #[test]
    fn out_exec_runs_injected_instruction_next() {
        // out exec, 16 ; (unreached) ; set x, 5 lands via OSR
        let mut bench = Bench::new(&[0x60F0, 0xE03F]);
        bench.sm.registers_mut().osr = 0xE025;
        bench.sm.registers_mut().osr_count = 0;
        bench.sm.config_mut().out_shift_right = true;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        assert!(!bench.sm.exec_stalled());
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().x, 5);
        assert_eq!(bench.sm.registers().pc, 1);
    }

    #[test]
    fn register_injection_runs_while_disabled_and_keeps_pc() {
        let mut bench = Bench::new(&[]);
        bench.sm.schedule_exec(0xE03F, ExecOrigin::Register);
        let report = bench.sm.raising_edge(false, &bench.memory);
        assert!(report.decode_error.is_none());
        let mut ctx = ExecContext {
            gpio: &mut bench.gpio,
            irq_flags: &mut bench.irq,
            pio_index: 0,
        };
        assert_eq!(
            bench.sm.falling_edge(&mut ctx),
            Some(ExecutionResult::Complete)
        );
        assert_eq!(bench.sm.registers().x, 31);
        assert_eq!(bench.sm.registers().pc, 0);
        assert!(bench.sm.pending_exec().is_none());
    }

    #[test]
    fn irq_wait_stalls_until_cleared() {
        // irq wait 1
        let mut bench = Bench::new(&[0xC021]);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        assert_eq!(bench.irq, 0b10);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        bench.irq = 0;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.irq, 0);
    }

    #[test]
    fn wait_irq_high_clears_flag() {
        // wait 1 irq 2
        let mut bench = Bench::new(&[0x20C2]);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        bench.irq = 0b100;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.irq, 0);
    }

    #[test]
    fn side_set_applies_even_when_stalled() {
        // pull block side 1, with one side-set pin on GPIO 4
        let mut bench = Bench::new(&[0x90A0]);
        bench.sm.config_mut().sideset_count = 1;
        bench.sm.config_mut().sideset_base = 4;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        assert_eq!(bench.gpio.pio_pin_level(0, 4), Bit::High);
    }

    #[test]
    fn autopull_refills_osr_before_shifting() {
        // out x, 32
        let mut bench = Bench::new(&[0x6020]);
        bench.sm.config_mut().autopull = true;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Stall));
        bench.sm.fifo_mut().tx_dma_write(77);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().x, 77);
        assert_eq!(bench.sm.fifo_mut().tx_pull(false), FifoAccess::Dropped);
    }

    #[test]
    fn mov_status_reflects_tx_level() {
        // mov x, status
        let mut bench = Bench::new(&[0xA025]);
        bench.sm.config_mut().status_n = 1;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().x, u32::MAX);
        bench.sm.registers_mut().pc = 0;
        bench.sm.fifo_mut().tx_dma_write(1);
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.registers().x, 0);
    }

    #[test]
    fn restart_clears_shift_state_and_delay() {
        let mut bench = Bench::new(&[0xFF01]);
        bench.sm.config_mut().set_count = 1;
        assert_eq!(bench.cycle(), Some(ExecutionResult::Complete));
        assert_eq!(bench.sm.delay(), 31);
        bench.sm.registers_mut().isr_count = 12;
        bench.sm.restart();
        assert_eq!(bench.sm.delay(), 0);
        assert_eq!(bench.sm.registers().isr_count, 0);
        assert_eq!(bench.sm.registers().osr_count, 32);
    }

    #[test]
    fn shiftctrl_rewrite_flushes_only_on_join_change() {
        let mut sm = StateMachine::new(0);
        sm.fifo_mut().tx_dma_write(5);
        let unchanged = sm.shiftctrl();
        sm.set_shiftctrl(unchanged);
        assert_eq!(sm.fifo().tx_level(), 1);
        sm.set_shiftctrl(unchanged | SHIFTCTRL_FJOIN_TX);
        assert!(sm.fifo().tx_empty());
        assert!(sm.fifo().join_tx());
    }
}
