//! Instruction semantics.
//!
//! Each `execute_*` function applies one instruction kind to the state
//! machine and reports whether it completed, stalled or jumped. Stalling
//! instructions leave no partial effects except the sticky FIFO flags.

use crate::bit::{Bit, Direction};
use crate::fifo::FifoAccess;
use crate::gpio::{Gpio, GPIO_COUNT};
use crate::instruction::{
    irq_flag_index, InSource, Instruction, InstructionKind, JmpCondition, MovDestination,
    MovOperation, MovSource, OutDestination, SetDestination, WaitSource,
};

use super::{ExecOrigin, StateMachine};

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionResult {
    /// The instruction finished; the PC advances and the delay applies.
    Complete,
    /// The instruction must be retried next cycle; no delay applies.
    Stall,
    /// The instruction wrote the PC; the delay applies.
    Jump,
}

/// Shared state an executing state machine may touch.
#[derive(Debug)]
pub struct ExecContext<'a> {
    /// GPIO bank holding the pin latches.
    pub gpio: &'a mut Gpio,
    /// IRQ flags of the owning PIO block.
    pub irq_flags: &'a mut u8,
    /// Index of the owning PIO block.
    pub pio_index: usize,
}

impl ExecContext<'_> {
    fn inputs_from(&self, base: u8) -> u32 {
        self.gpio.peripheral_inputs().rotate_right(u32::from(base))
    }

    fn input(&self, pin: u32) -> Bit {
        self.gpio.input_to_peripheral(pin as usize % GPIO_COUNT)
    }

    fn write_pins(&mut self, base: u8, count: u8, value: u32) {
        for offset in 0..u32::from(count.min(32)) {
            let pin = (u32::from(base) + offset) as usize % GPIO_COUNT;
            self.gpio
                .set_pio_pin_level(self.pio_index, pin, Bit::from_bit(value, offset));
        }
    }

    fn write_pindirs(&mut self, base: u8, count: u8, value: u32) {
        for offset in 0..u32::from(count.min(32)) {
            let pin = (u32::from(base) + offset) as usize % GPIO_COUNT;
            self.gpio.set_pio_pin_direction(
                self.pio_index,
                pin,
                Direction::from_bit(Bit::from_bit(value, offset)),
            );
        }
    }
}

/// Executes `instr` on `sm`.
pub fn execute_instruction(
    sm: &mut StateMachine,
    instr: &Instruction,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    match instr.kind {
        InstructionKind::Jmp { condition, address } => execute_jmp(sm, condition, address, ctx),
        InstructionKind::Wait {
            polarity,
            source,
            index,
        } => execute_wait(sm, polarity, source, index, ctx),
        InstructionKind::In { source, bit_count } => execute_in(sm, source, bit_count, ctx),
        InstructionKind::Out {
            destination,
            bit_count,
        } => execute_out(sm, destination, bit_count, ctx),
        InstructionKind::Push { if_full, block } => execute_push(sm, if_full, block),
        InstructionKind::Pull { if_empty, block } => execute_pull(sm, if_empty, block),
        InstructionKind::Mov {
            destination,
            operation,
            source,
        } => execute_mov(sm, destination, operation, source, ctx),
        InstructionKind::Irq { clear, wait, index } => execute_irq(sm, clear, wait, index, ctx),
        InstructionKind::Set { destination, data } => execute_set(sm, destination, data, ctx),
    }
}

/// Drives the side-set pins (or pin directions) of `instr`, if it has any.
pub fn apply_side_set(sm: &StateMachine, instr: &Instruction, ctx: &mut ExecContext<'_>) {
    if !instr.side_set_enabled {
        return;
    }
    let config = sm.config();
    let count = config.side_set_layout().data_bits();
    let value = u32::from(instr.side_set);
    if config.side_pindir {
        ctx.write_pindirs(config.sideset_base, count, value);
    } else {
        ctx.write_pins(config.sideset_base, count, value);
    }
}

fn execute_jmp(
    sm: &mut StateMachine,
    condition: JmpCondition,
    address: u8,
    ctx: &ExecContext<'_>,
) -> ExecutionResult {
    let regs = &mut sm.registers;
    let taken = match condition {
        JmpCondition::Always => true,
        JmpCondition::XZero => regs.x == 0,
        JmpCondition::XPostDecrement => {
            let taken = regs.x != 0;
            regs.x = regs.x.wrapping_sub(1);
            taken
        }
        JmpCondition::YZero => regs.y == 0,
        JmpCondition::YPostDecrement => {
            let taken = regs.y != 0;
            regs.y = regs.y.wrapping_sub(1);
            taken
        }
        JmpCondition::XNotEqualY => regs.x != regs.y,
        JmpCondition::Pin => ctx.input(u32::from(sm.config.jmp_pin)).is_high(),
        JmpCondition::OsrNotEmpty => regs.osr_count < sm.config.pull_threshold_bits(),
    };
    if taken {
        sm.registers.set_pc(u32::from(address));
        ExecutionResult::Jump
    } else {
        ExecutionResult::Complete
    }
}

fn execute_wait(
    sm: &StateMachine,
    polarity: Bit,
    source: WaitSource,
    index: u8,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    let satisfied = match source {
        WaitSource::Gpio => ctx.input(u32::from(index)) == polarity,
        WaitSource::Pin => {
            ctx.input(u32::from(sm.config.in_base) + u32::from(index)) == polarity
        }
        WaitSource::Irq => {
            let mask = 1u8 << irq_flag_index(index, sm.index);
            let level = Bit::from(*ctx.irq_flags & mask != 0);
            if level == polarity && polarity.is_high() {
                *ctx.irq_flags &= !mask;
            }
            level == polarity
        }
    };
    if satisfied {
        ExecutionResult::Complete
    } else {
        ExecutionResult::Stall
    }
}

fn execute_in(
    sm: &mut StateMachine,
    source: InSource,
    bit_count: u8,
    ctx: &ExecContext<'_>,
) -> ExecutionResult {
    let config = sm.config;
    let threshold = config.push_threshold_bits();
    let new_count = u32::from(sm.registers.isr_count) + u32::from(bit_count);
    if config.autopush && new_count >= u32::from(threshold) && sm.fifo.rx_full() {
        sm.fifo.flags_mut().rx_stall = true;
        return ExecutionResult::Stall;
    }

    let data = match source {
        InSource::Pins => ctx.inputs_from(config.in_base),
        InSource::X => sm.registers.x,
        InSource::Y => sm.registers.y,
        InSource::Null => 0,
        InSource::Isr => sm.registers.isr,
        InSource::Osr => sm.registers.osr,
    };
    sm.registers.shift_in(data, bit_count, config.in_shift_right);

    if config.autopush && sm.registers.isr_count >= threshold {
        let _ = sm.fifo.rx_push(sm.registers.isr, false);
        sm.registers.isr = 0;
        sm.registers.isr_count = 0;
    }
    ExecutionResult::Complete
}

fn execute_out(
    sm: &mut StateMachine,
    destination: OutDestination,
    bit_count: u8,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    let config = sm.config;
    let threshold = config.pull_threshold_bits();
    if config.autopull && sm.registers.osr_count >= threshold {
        match sm.fifo.tx_pull(true) {
            FifoAccess::Done(value) => {
                sm.registers.osr = value;
                sm.registers.osr_count = 0;
            }
            FifoAccess::Stalled | FifoAccess::Dropped => return ExecutionResult::Stall,
        }
    }

    let data = sm.registers.shift_out(bit_count, config.out_shift_right);
    let result = match destination {
        OutDestination::Pins => {
            ctx.write_pins(config.out_base, config.out_count, data);
            ExecutionResult::Complete
        }
        OutDestination::X => {
            sm.registers.x = data;
            ExecutionResult::Complete
        }
        OutDestination::Y => {
            sm.registers.y = data;
            ExecutionResult::Complete
        }
        OutDestination::Null => ExecutionResult::Complete,
        OutDestination::PinDirs => {
            ctx.write_pindirs(config.out_base, config.out_count, data);
            ExecutionResult::Complete
        }
        OutDestination::Pc => {
            sm.registers.set_pc(data);
            ExecutionResult::Jump
        }
        OutDestination::Isr => {
            sm.registers.isr = data;
            sm.registers.set_isr_count(u32::from(bit_count));
            ExecutionResult::Complete
        }
        OutDestination::Exec => {
            sm.schedule_exec(data as u16, ExecOrigin::Instruction);
            ExecutionResult::Stall
        }
    };

    if config.autopull && sm.registers.osr_count >= threshold {
        if let FifoAccess::Done(value) = sm.fifo.tx_pull(false) {
            sm.registers.osr = value;
            sm.registers.osr_count = 0;
        }
    }
    result
}

fn execute_push(sm: &mut StateMachine, if_full: bool, block: bool) -> ExecutionResult {
    if if_full && sm.registers.isr_count < sm.config.push_threshold_bits() {
        return ExecutionResult::Complete;
    }
    match sm.fifo.rx_push(sm.registers.isr, block) {
        FifoAccess::Stalled => ExecutionResult::Stall,
        FifoAccess::Done(()) | FifoAccess::Dropped => {
            sm.registers.isr = 0;
            sm.registers.isr_count = 0;
            ExecutionResult::Complete
        }
    }
}

fn execute_pull(sm: &mut StateMachine, if_empty: bool, block: bool) -> ExecutionResult {
    if if_empty && sm.registers.osr_count < sm.config.pull_threshold_bits() {
        return ExecutionResult::Complete;
    }
    let value = match sm.fifo.tx_pull(block) {
        FifoAccess::Done(value) => value,
        FifoAccess::Stalled => return ExecutionResult::Stall,
        FifoAccess::Dropped => sm.registers.x,
    };
    sm.registers.osr = value;
    sm.registers.osr_count = 0;
    ExecutionResult::Complete
}

fn mov_status(sm: &StateMachine) -> u32 {
    let config = sm.config;
    let level = if config.status_sel {
        sm.fifo.rx_level()
    } else {
        sm.fifo.tx_level()
    };
    if level < usize::from(config.status_n) {
        u32::MAX
    } else {
        0
    }
}

fn execute_mov(
    sm: &mut StateMachine,
    destination: MovDestination,
    operation: MovOperation,
    source: MovSource,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    let config = sm.config;
    let value = operation.apply(match source {
        MovSource::Pins => ctx.inputs_from(config.in_base),
        MovSource::X => sm.registers.x,
        MovSource::Y => sm.registers.y,
        MovSource::Null => 0,
        MovSource::Status => mov_status(sm),
        MovSource::Isr => sm.registers.isr,
        MovSource::Osr => sm.registers.osr,
    });
    match destination {
        MovDestination::Pins => {
            ctx.write_pins(config.out_base, config.out_count, value);
        }
        MovDestination::X => sm.registers.x = value,
        MovDestination::Y => sm.registers.y = value,
        MovDestination::Exec => {
            sm.schedule_exec(value as u16, ExecOrigin::Instruction);
            return ExecutionResult::Stall;
        }
        MovDestination::Pc => {
            sm.registers.set_pc(value);
            return ExecutionResult::Jump;
        }
        MovDestination::Isr => {
            sm.registers.isr = value;
            sm.registers.isr_count = 0;
        }
        MovDestination::Osr => {
            sm.registers.osr = value;
            sm.registers.osr_count = 0;
        }
    }
    ExecutionResult::Complete
}

fn execute_irq(
    sm: &mut StateMachine,
    clear: bool,
    wait: bool,
    index: u8,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    let mask = 1u8 << irq_flag_index(index, sm.index);
    if clear {
        *ctx.irq_flags &= !mask;
        return ExecutionResult::Complete;
    }
    if sm.irq_wait_pending {
        if *ctx.irq_flags & mask == 0 {
            sm.irq_wait_pending = false;
            return ExecutionResult::Complete;
        }
        return ExecutionResult::Stall;
    }
    *ctx.irq_flags |= mask;
    if wait {
        sm.irq_wait_pending = true;
        ExecutionResult::Stall
    } else {
        ExecutionResult::Complete
    }
}

fn execute_set(
    sm: &mut StateMachine,
    destination: SetDestination,
    data: u8,
    ctx: &mut ExecContext<'_>,
) -> ExecutionResult {
    let config = sm.config;
    match destination {
        SetDestination::Pins => ctx.write_pins(config.set_base, config.set_count, u32::from(data)),
        SetDestination::X => sm.registers.x = u32::from(data),
        SetDestination::Y => sm.registers.y = u32::from(data),
        SetDestination::PinDirs => {
            ctx.write_pindirs(config.set_base, config.set_count, u32::from(data));
        }
    }
    ExecutionResult::Complete
}
