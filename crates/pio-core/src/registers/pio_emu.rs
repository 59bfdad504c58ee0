//! Emulator-only view of a PIO block: internal state machine registers,
//! FIFO storage, debug masks and readable instruction memory.

use crate::error::AccessError;
use crate::fifo::JOINED_DEPTH;
use crate::pio::Pio;
use crate::registers::{
    apply_write, info, unknown, FieldDescriptor, RegisterAccess, RegisterDescriptor,
    RegisterInfo, RegisterSet,
};
use crate::sm::{ExecOrigin, StateMachine, INSTRUCTION_MEMORY_SIZE, SM_COUNT};

/// Words per state machine block.
pub const SM_BLOCK: usize = 20;
/// Index of the first FIFO storage word inside a block.
pub const FIFO_MEM0: usize = 7;
/// Index of `INSTR_MEM0`.
pub const INSTR_MEM0: usize = SM_COUNT * SM_BLOCK;
/// Number of word slots in the set.
pub const REGISTER_COUNT: usize = INSTR_MEM0 + INSTRUCTION_MEMORY_SIZE;

/// `PENDING_EXEC` bit marking a valid pending instruction.
pub const PENDING_EXEC_VALID: u32 = 1 << 16;

const SET_LABELS: [&str; 2] = ["PIO0_EMU", "PIO1_EMU"];

const _: () = assert!(FIFO_MEM0 + JOINED_DEPTH + 5 == SM_BLOCK);

/// Register inside one state machine block.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmuRegister {
    RegX,
    RegY,
    Pc,
    Isr,
    IsrShiftCount,
    Osr,
    OsrShiftCount,
    FifoMem(usize),
    ClkEnable,
    Delay,
    PendingExec,
    Breakpoints,
    Tracepoints,
}

impl EmuRegister {
    const fn from_offset(offset: usize) -> Option<Self> {
        Some(match offset {
            0 => Self::RegX,
            1 => Self::RegY,
            2 => Self::Pc,
            3 => Self::Isr,
            4 => Self::IsrShiftCount,
            5 => Self::Osr,
            6 => Self::OsrShiftCount,
            7..15 => Self::FifoMem(offset - FIFO_MEM0),
            15 => Self::ClkEnable,
            16 => Self::Delay,
            17 => Self::PendingExec,
            18 => Self::Breakpoints,
            19 => Self::Tracepoints,
            _ => return None,
        })
    }

    const fn descriptor(self) -> &'static RegisterDescriptor {
        match self {
            Self::RegX => &REGX,
            Self::RegY => &REGY,
            Self::Pc => &PC,
            Self::Isr => &ISR,
            Self::IsrShiftCount => &ISR_SHIFT_COUNT,
            Self::Osr => &OSR,
            Self::OsrShiftCount => &OSR_SHIFT_COUNT,
            Self::FifoMem(_) => &FIFO_MEM,
            Self::ClkEnable => &CLK_ENABLE,
            Self::Delay => &DELAY,
            Self::PendingExec => &PENDING_EXEC,
            Self::Breakpoints => &BREAKPOINTS,
            Self::Tracepoints => &TRACEPOINTS,
        }
    }
}

const REGX: RegisterDescriptor = RegisterDescriptor::new("REGX", 0, RegisterAccess::ReadWrite);
const REGY: RegisterDescriptor = RegisterDescriptor::new("REGY", 0, RegisterAccess::ReadWrite);
const PC: RegisterDescriptor = RegisterDescriptor::new("PC", 0, RegisterAccess::ReadWrite);
const ISR: RegisterDescriptor = RegisterDescriptor::new("ISR", 0, RegisterAccess::ReadWrite);
const ISR_SHIFT_COUNT: RegisterDescriptor =
    RegisterDescriptor::new("ISR_SHIFT_COUNT", 0, RegisterAccess::ReadWrite);
const OSR: RegisterDescriptor = RegisterDescriptor::new("OSR", 0, RegisterAccess::ReadWrite);
const OSR_SHIFT_COUNT: RegisterDescriptor =
    RegisterDescriptor::new("OSR_SHIFT_COUNT", 32, RegisterAccess::ReadWrite);
const FIFO_MEM: RegisterDescriptor =
    RegisterDescriptor::new("FIFO_MEM", 0, RegisterAccess::ReadWrite);
const CLK_ENABLE: RegisterDescriptor =
    RegisterDescriptor::new("CLK_ENABLE", 0, RegisterAccess::ReadOnly);
const DELAY: RegisterDescriptor = RegisterDescriptor::new("DELAY", 0, RegisterAccess::ReadOnly);
const PENDING_EXEC: RegisterDescriptor =
    RegisterDescriptor::new("PENDING_EXEC", 0, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("VALID", 16, 1),
        FieldDescriptor::new("INSTR", 0, 16),
    ]);
const BREAKPOINTS: RegisterDescriptor =
    RegisterDescriptor::new("BREAKPOINTS", 0, RegisterAccess::ReadWrite);
const TRACEPOINTS: RegisterDescriptor =
    RegisterDescriptor::new("TRACEPOINTS", 0, RegisterAccess::ReadWrite);
const INSTR_MEM: RegisterDescriptor =
    RegisterDescriptor::new("INSTR_MEM", 0, RegisterAccess::ReadWrite);

/// View of a PIO block's emulator-internal registers.
#[derive(Debug)]
pub struct PioEmuRegisters<'a> {
    pio: &'a mut Pio,
}

impl<'a> PioEmuRegisters<'a> {
    /// Creates the view.
    pub const fn new(pio: &'a mut Pio) -> Self {
        Self { pio }
    }
}

fn read_sm(sm: &StateMachine, register: EmuRegister) -> u32 {
    let regs = sm.registers();
    match register {
        EmuRegister::RegX => regs.x,
        EmuRegister::RegY => regs.y,
        EmuRegister::Pc => u32::from(regs.pc),
        EmuRegister::Isr => regs.isr,
        EmuRegister::IsrShiftCount => u32::from(regs.isr_count),
        EmuRegister::Osr => regs.osr,
        EmuRegister::OsrShiftCount => u32::from(regs.osr_count),
        EmuRegister::FifoMem(slot) => sm.fifo().slot(slot),
        EmuRegister::ClkEnable => u32::from(sm.clock_enabled()),
        EmuRegister::Delay => u32::from(sm.delay()),
        EmuRegister::PendingExec => sm
            .pending_exec()
            .map_or(0, |pending| PENDING_EXEC_VALID | u32::from(pending.word)),
        EmuRegister::Breakpoints => sm.breakpoints(),
        EmuRegister::Tracepoints => sm.tracepoints(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_sm(sm: &mut StateMachine, register: EmuRegister, value: u32) {
    let regs = sm.registers_mut();
    match register {
        EmuRegister::RegX => regs.x = value,
        EmuRegister::RegY => regs.y = value,
        EmuRegister::Pc => regs.set_pc(value),
        EmuRegister::Isr => regs.isr = value,
        EmuRegister::IsrShiftCount => regs.set_isr_count(value),
        EmuRegister::Osr => regs.osr = value,
        EmuRegister::OsrShiftCount => regs.set_osr_count(value),
        EmuRegister::FifoMem(slot) => sm.fifo_mut().set_slot(slot, value),
        EmuRegister::PendingExec => {
            if value & PENDING_EXEC_VALID == 0 {
                sm.cancel_exec();
            } else {
                sm.schedule_exec(value as u16, ExecOrigin::Register);
            }
        }
        EmuRegister::Breakpoints => sm.set_breakpoints(value),
        EmuRegister::Tracepoints => sm.set_tracepoints(value),
        EmuRegister::ClkEnable | EmuRegister::Delay => {}
    }
}

enum Slot {
    Sm(usize, EmuRegister),
    InstrMem(usize),
}

const fn slot(index: usize) -> Option<Slot> {
    if index < INSTR_MEM0 {
        match EmuRegister::from_offset(index % SM_BLOCK) {
            Some(register) => Some(Slot::Sm(index / SM_BLOCK, register)),
            None => None,
        }
    } else if index < REGISTER_COUNT {
        Some(Slot::InstrMem(index - INSTR_MEM0))
    } else {
        None
    }
}

impl RegisterSet for PioEmuRegisters<'_> {
    fn set_label(&self) -> &'static str {
        SET_LABELS[self.pio.index() % SET_LABELS.len()]
    }

    fn describe(&self, index: usize) -> Option<RegisterInfo> {
        let set = self.set_label();
        Some(match slot(index)? {
            Slot::Sm(n, register @ EmuRegister::FifoMem(k)) => {
                info(set, &format!("SM{n}_"), register.descriptor(), Some(k))
            }
            Slot::Sm(n, register) => info(set, &format!("SM{n}_"), register.descriptor(), None),
            Slot::InstrMem(n) => info(set, "", &INSTR_MEM, Some(n)),
        })
    }

    fn read_register(&mut self, index: usize) -> Result<u32, AccessError> {
        match slot(index) {
            Some(Slot::Sm(n, register)) => Ok(read_sm(self.pio.sm(n), register)),
            Some(Slot::InstrMem(n)) => Ok(u32::from(self.pio.memory()[n])),
            None => Err(unknown(self.set_label(), index)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        match slot(index) {
            Some(Slot::Sm(n, register)) => {
                let value = apply_write(read_sm(self.pio.sm(n), register), bits, mask, xor);
                write_sm(self.pio.sm_mut(n), register, value);
                Ok(())
            }
            Some(Slot::InstrMem(n)) => {
                let value = apply_write(u32::from(self.pio.memory()[n]), bits, mask, xor);
                self.pio.write_instruction(n, value as u16);
                Ok(())
            }
            None => Err(unknown(self.set_label(), index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{PioEmuRegisters, INSTR_MEM0, PENDING_EXEC_VALID, REGISTER_COUNT, SM_BLOCK};
    use crate::pio::Pio;
    use crate::registers::RegisterSet;

    #[rstest]
    #[case(0, "PIO1_EMU_SM0_REGX")]
    #[case(SM_BLOCK + 2, "PIO1_EMU_SM1_PC")]
    #[case(2 * SM_BLOCK + 10, "PIO1_EMU_SM2_FIFO_MEM3")]
    #[case(3 * SM_BLOCK + 19, "PIO1_EMU_SM3_TRACEPOINTS")]
    #[case(INSTR_MEM0 + 31, "PIO1_EMU_INSTR_MEM31")]
    fn labels(#[case] index: usize, #[case] label: &str) {
        let mut pio = Pio::new(1);
        let regs = PioEmuRegisters::new(&mut pio);
        assert_eq!(regs.register_label(index).as_deref(), Some(label));
    }

    #[test]
    fn reset_values_match_descriptors() {
        let mut pio = Pio::new(0);
        let mut regs = PioEmuRegisters::new(&mut pio);
        for index in 0..REGISTER_COUNT {
            let info = regs.describe(index).expect("described");
            assert_eq!(regs.read_register(index), Ok(info.descriptor.reset), "{}", info.label);
        }
        assert!(regs.read_register(REGISTER_COUNT).is_err());
    }

    #[test]
    fn scratch_registers_and_pc_are_writable() {
        let mut pio = Pio::new(0);
        let mut regs = PioEmuRegisters::new(&mut pio);
        regs.write_register(SM_BLOCK, 0xDEAD_BEEF, u32::MAX, false)
            .expect("writable");
        regs.write_register(SM_BLOCK + 2, 33, u32::MAX, false)
            .expect("writable");
        assert_eq!(pio.sm(1).registers().x, 0xDEAD_BEEF);
        assert_eq!(pio.sm(1).registers().pc, 1);
    }

    #[test]
    fn pending_exec_schedules_and_cancels() {
        let mut pio = Pio::new(0);
        let mut regs = PioEmuRegisters::new(&mut pio);
        regs.write_register(17, PENDING_EXEC_VALID | 0xE001, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(17), Ok(PENDING_EXEC_VALID | 0xE001));
        regs.write_register(17, 0, u32::MAX, false).expect("writable");
        assert_eq!(regs.read_register(17), Ok(0));
    }

    #[test]
    fn instruction_memory_reads_back() {
        let mut pio = Pio::new(0);
        pio.write_instruction(4, 0xA042);
        let mut regs = PioEmuRegisters::new(&mut pio);
        assert_eq!(regs.read_register(INSTR_MEM0 + 4), Ok(0xA042));
        regs.write_register(INSTR_MEM0 + 4, 0x00FF, 0x00FF, true)
            .expect("writable");
        assert_eq!(regs.read_register(INSTR_MEM0 + 4), Ok(0xA0BD));
    }
}
