//! Hardware register set of one PIO block.

use crate::error::AccessError;
use crate::fifo::FIFO_DEPTH;
use crate::gpio::Gpio;
use crate::pio::{Pio, DBG_CFGINFO, IRQ_LINES};
use crate::registers::{
    apply_write, info, strobe_value, unknown, FieldDescriptor, RegisterAccess,
    RegisterDescriptor, RegisterInfo, RegisterSet,
};
use crate::sm::{
    ExecOrigin, EXECCTRL_RESET, INSTRUCTION_MEMORY_SIZE, PINCTRL_RESET, SHIFTCTRL_RESET,
    SM_COUNT,
};

/// Index of `CTRL`.
pub const CTRL: usize = 0;
/// Index of `FSTAT`.
pub const FSTAT: usize = 1;
/// Index of `FDEBUG`.
pub const FDEBUG: usize = 2;
/// Index of `FLEVEL`.
pub const FLEVEL: usize = 3;
/// Index of `TXF0`.
pub const TXF0: usize = 4;
/// Index of `RXF0`.
pub const RXF0: usize = 8;
/// Index of `IRQ`.
pub const IRQ: usize = 12;
/// Index of `IRQ_FORCE`.
pub const IRQ_FORCE: usize = 13;
/// Index of `INPUT_SYNC_BYPASS`.
pub const INPUT_SYNC_BYPASS: usize = 14;
/// Index of `DBG_PADOUT`.
pub const DBG_PADOUT: usize = 15;
/// Index of `DBG_PADOE`.
pub const DBG_PADOE: usize = 16;
/// Index of `DBG_CFGINFO`.
pub const DBG_CFGINFO_INDEX: usize = 17;
/// Index of `INSTR_MEM0`.
pub const INSTR_MEM0: usize = 18;
/// Index of `SM0_CLKDIV`.
pub const SM0_CLKDIV: usize = 50;
/// Words per state machine block (0x18 bytes).
pub const SM_STRIDE: usize = 6;
/// Index of `INTR`.
pub const INTR: usize = 74;
/// Index of `IRQ0_INTE`; `IRQ1_INTE` follows three words later.
pub const IRQ0_INTE: usize = 75;
/// Number of word slots in the set.
pub const REGISTER_COUNT: usize = 81;

const SET_LABELS: [&str; 2] = ["PIO0", "PIO1"];

/// Per-state-machine register within its block.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmRegister {
    Clkdiv,
    Execctrl,
    Shiftctrl,
    Addr,
    Instr,
    Pinctrl,
}

impl SmRegister {
    const fn from_offset(offset: usize) -> Option<Self> {
        Some(match offset {
            0 => Self::Clkdiv,
            1 => Self::Execctrl,
            2 => Self::Shiftctrl,
            3 => Self::Addr,
            4 => Self::Instr,
            5 => Self::Pinctrl,
            _ => return None,
        })
    }

    const fn descriptor(self) -> &'static RegisterDescriptor {
        match self {
            Self::Clkdiv => &SM_CLKDIV,
            Self::Execctrl => &SM_EXECCTRL,
            Self::Shiftctrl => &SM_SHIFTCTRL,
            Self::Addr => &SM_ADDR,
            Self::Instr => &SM_INSTR,
            Self::Pinctrl => &SM_PINCTRL,
        }
    }
}

/// Decoded register index.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Ctrl,
    Fstat,
    Fdebug,
    Flevel,
    Txf(usize),
    Rxf(usize),
    Irq,
    IrqForce,
    InputSyncBypass,
    DbgPadout,
    DbgPadoe,
    DbgCfginfo,
    InstrMem(usize),
    Sm(usize, SmRegister),
    Intr,
    Inte(usize),
    Intf(usize),
    Ints(usize),
}

impl Slot {
    /// Decodes a word index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        Some(match index {
            CTRL => Self::Ctrl,
            FSTAT => Self::Fstat,
            FDEBUG => Self::Fdebug,
            FLEVEL => Self::Flevel,
            TXF0..RXF0 => Self::Txf(index - TXF0),
            RXF0..IRQ => Self::Rxf(index - RXF0),
            IRQ => Self::Irq,
            IRQ_FORCE => Self::IrqForce,
            INPUT_SYNC_BYPASS => Self::InputSyncBypass,
            DBG_PADOUT => Self::DbgPadout,
            DBG_PADOE => Self::DbgPadoe,
            DBG_CFGINFO_INDEX => Self::DbgCfginfo,
            INSTR_MEM0..SM0_CLKDIV => Self::InstrMem(index - INSTR_MEM0),
            SM0_CLKDIV..INTR => {
                let offset = index - SM0_CLKDIV;
                match SmRegister::from_offset(offset % SM_STRIDE) {
                    Some(register) => Self::Sm(offset / SM_STRIDE, register),
                    None => return None,
                }
            }
            INTR => Self::Intr,
            IRQ0_INTE..REGISTER_COUNT => {
                let offset = index - IRQ0_INTE;
                let line = offset / 3;
                match offset % 3 {
                    0 => Self::Inte(line),
                    1 => Self::Intf(line),
                    _ => Self::Ints(line),
                }
            }
            _ => return None,
        })
    }

    const fn descriptor(self) -> &'static RegisterDescriptor {
        match self {
            Self::Ctrl => &CTRL_DESC,
            Self::Fstat => &FSTAT_DESC,
            Self::Fdebug => &FDEBUG_DESC,
            Self::Flevel => &FLEVEL_DESC,
            Self::Txf(_) => &TXF_DESC,
            Self::Rxf(_) => &RXF_DESC,
            Self::Irq => &IRQ_DESC,
            Self::IrqForce => &IRQ_FORCE_DESC,
            Self::InputSyncBypass => &INPUT_SYNC_BYPASS_DESC,
            Self::DbgPadout => &DBG_PADOUT_DESC,
            Self::DbgPadoe => &DBG_PADOE_DESC,
            Self::DbgCfginfo => &DBG_CFGINFO_DESC,
            Self::InstrMem(_) => &INSTR_MEM_DESC,
            Self::Sm(_, register) => register.descriptor(),
            Self::Intr => &INTR_DESC,
            Self::Inte(_) => &INTE_DESC,
            Self::Intf(_) => &INTF_DESC,
            Self::Ints(_) => &INTS_DESC,
        }
    }
}

const FLEVEL_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::new("RX3", 28, 4),
    FieldDescriptor::new("TX3", 24, 4),
    FieldDescriptor::new("RX2", 20, 4),
    FieldDescriptor::new("TX2", 16, 4),
    FieldDescriptor::new("RX1", 12, 4),
    FieldDescriptor::new("TX1", 8, 4),
    FieldDescriptor::new("RX0", 4, 4),
    FieldDescriptor::new("TX0", 0, 4),
];

const CTRL_DESC: RegisterDescriptor =
    RegisterDescriptor::new("CTRL", 0, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("CLKDIV_RESTART", 8, 4),
        FieldDescriptor::new("SM_RESTART", 4, 4),
        FieldDescriptor::new("SM_ENABLE", 0, 4),
    ]);
const FSTAT_DESC: RegisterDescriptor =
    RegisterDescriptor::new("FSTAT", 0x0F00_0F00, RegisterAccess::ReadOnly).with_fields(&[
        FieldDescriptor::new("TXEMPTY", 24, 4),
        FieldDescriptor::new("TXFULL", 16, 4),
        FieldDescriptor::new("RXEMPTY", 8, 4),
        FieldDescriptor::new("RXFULL", 0, 4),
    ]);
const FDEBUG_DESC: RegisterDescriptor =
    RegisterDescriptor::new("FDEBUG", 0, RegisterAccess::WriteClear).with_fields(&[
        FieldDescriptor::new("TXSTALL", 24, 4),
        FieldDescriptor::new("TXOVER", 16, 4),
        FieldDescriptor::new("RXUNDER", 8, 4),
        FieldDescriptor::new("RXSTALL", 0, 4),
    ]);
const FLEVEL_DESC: RegisterDescriptor =
    RegisterDescriptor::new("FLEVEL", 0, RegisterAccess::ReadOnly).with_fields(FLEVEL_FIELDS);
const TXF_DESC: RegisterDescriptor = RegisterDescriptor::new("TXF", 0, RegisterAccess::WriteOnly);
const RXF_DESC: RegisterDescriptor = RegisterDescriptor::new("RXF", 0, RegisterAccess::ReadPop);
const IRQ_DESC: RegisterDescriptor = RegisterDescriptor::new("IRQ", 0, RegisterAccess::WriteClear)
    .with_fields(&[FieldDescriptor::new("IRQ", 0, 8)]);
const IRQ_FORCE_DESC: RegisterDescriptor =
    RegisterDescriptor::new("IRQ_FORCE", 0, RegisterAccess::WriteOnly)
        .with_fields(&[FieldDescriptor::new("IRQ_FORCE", 0, 8)]);
const INPUT_SYNC_BYPASS_DESC: RegisterDescriptor =
    RegisterDescriptor::new("INPUT_SYNC_BYPASS", 0, RegisterAccess::ReadWrite);
const DBG_PADOUT_DESC: RegisterDescriptor =
    RegisterDescriptor::new("DBG_PADOUT", 0, RegisterAccess::ReadOnly);
const DBG_PADOE_DESC: RegisterDescriptor =
    RegisterDescriptor::new("DBG_PADOE", 0, RegisterAccess::ReadOnly);
const DBG_CFGINFO_DESC: RegisterDescriptor =
    RegisterDescriptor::new("DBG_CFGINFO", DBG_CFGINFO, RegisterAccess::ReadOnly).with_fields(&[
        FieldDescriptor::new("IMEM_SIZE", 16, 6),
        FieldDescriptor::new("SM_COUNT", 8, 4),
        FieldDescriptor::new("FIFO_DEPTH", 0, 6),
    ]);
const INSTR_MEM_DESC: RegisterDescriptor =
    RegisterDescriptor::new("INSTR_MEM", 0, RegisterAccess::WriteOnly)
        .with_fields(&[FieldDescriptor::new("INSTR_MEM", 0, 16)]);
const SM_CLKDIV: RegisterDescriptor =
    RegisterDescriptor::new("CLKDIV", 0x0001_0000, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("INT", 16, 16),
        FieldDescriptor::new("FRAC", 8, 8),
    ]);
const SM_EXECCTRL: RegisterDescriptor =
    RegisterDescriptor::new("EXECCTRL", EXECCTRL_RESET, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("EXEC_STALLED", 31, 1),
        FieldDescriptor::new("SIDE_EN", 30, 1),
        FieldDescriptor::new("SIDE_PINDIR", 29, 1),
        FieldDescriptor::new("JMP_PIN", 24, 5),
        FieldDescriptor::new("OUT_EN_SEL", 19, 5),
        FieldDescriptor::new("INLINE_OUT_EN", 18, 1),
        FieldDescriptor::new("OUT_STICKY", 17, 1),
        FieldDescriptor::new("WRAP_TOP", 12, 5),
        FieldDescriptor::new("WRAP_BOTTOM", 7, 5),
        FieldDescriptor::new("STATUS_SEL", 4, 1),
        FieldDescriptor::new("STATUS_N", 0, 4),
    ]);
const SM_SHIFTCTRL: RegisterDescriptor =
    RegisterDescriptor::new("SHIFTCTRL", SHIFTCTRL_RESET, RegisterAccess::ReadWrite).with_fields(
        &[
            FieldDescriptor::new("FJOIN_RX", 31, 1),
            FieldDescriptor::new("FJOIN_TX", 30, 1),
            FieldDescriptor::new("PULL_THRESH", 25, 5),
            FieldDescriptor::new("PUSH_THRESH", 20, 5),
            FieldDescriptor::new("OUT_SHIFTDIR", 19, 1),
            FieldDescriptor::new("IN_SHIFTDIR", 18, 1),
            FieldDescriptor::new("AUTOPULL", 17, 1),
            FieldDescriptor::new("AUTOPUSH", 16, 1),
        ],
    );
const SM_ADDR: RegisterDescriptor = RegisterDescriptor::new("ADDR", 0, RegisterAccess::ReadOnly);
const SM_INSTR: RegisterDescriptor = RegisterDescriptor::new("INSTR", 0, RegisterAccess::ReadWrite);
const SM_PINCTRL: RegisterDescriptor =
    RegisterDescriptor::new("PINCTRL", PINCTRL_RESET, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("SIDESET_COUNT", 29, 3),
        FieldDescriptor::new("SET_COUNT", 26, 3),
        FieldDescriptor::new("OUT_COUNT", 20, 6),
        FieldDescriptor::new("IN_BASE", 15, 5),
        FieldDescriptor::new("SIDESET_BASE", 10, 5),
        FieldDescriptor::new("SET_BASE", 5, 5),
        FieldDescriptor::new("OUT_BASE", 0, 5),
    ]);
// TX-not-full sources are set out of reset.
const INTR_DESC: RegisterDescriptor =
    RegisterDescriptor::new("INTR", 0x0000_00F0, RegisterAccess::ReadOnly).with_fields(&[
        FieldDescriptor::new("SM", 8, 4),
        FieldDescriptor::new("SM_TXNFULL", 4, 4),
        FieldDescriptor::new("SM_RXNEMPTY", 0, 4),
    ]);
const INTE_DESC: RegisterDescriptor = RegisterDescriptor::new("INTE", 0, RegisterAccess::ReadWrite);
const INTF_DESC: RegisterDescriptor = RegisterDescriptor::new("INTF", 0, RegisterAccess::ReadWrite);
const INTS_DESC: RegisterDescriptor = RegisterDescriptor::new("INTS", 0, RegisterAccess::ReadOnly);

const _: () = assert_layout();

const fn assert_layout() {
    assert!(TXF0 + SM_COUNT == RXF0, "one TXF per state machine");
    assert!(RXF0 + SM_COUNT == IRQ, "one RXF per state machine");
    assert!(
        INSTR_MEM0 + INSTRUCTION_MEMORY_SIZE == SM0_CLKDIV,
        "instruction memory precedes SM0"
    );
    assert!(SM0_CLKDIV + SM_COUNT * SM_STRIDE == INTR, "SM blocks precede INTR");
    assert!(IRQ0_INTE + 3 * IRQ_LINES == REGISTER_COUNT, "two interrupt lines");
    assert!(SM0_CLKDIV * 4 == 0x0C8, "SM0_CLKDIV lives at offset 0xC8");
    assert!(INTR * 4 == 0x128, "INTR lives at offset 0x128");
    assert!(FIFO_DEPTH == 4, "FLEVEL packs four-bit levels");
}

/// View of one PIO block's hardware registers.
#[derive(Debug)]
pub struct PioRegisters<'a> {
    pio: &'a mut Pio,
    gpio: &'a Gpio,
}

impl<'a> PioRegisters<'a> {
    /// Creates the view. `gpio` backs `DBG_PADOUT` and `DBG_PADOE`.
    pub const fn new(pio: &'a mut Pio, gpio: &'a Gpio) -> Self {
        Self { pio, gpio }
    }
}

/// `SMn_INSTR` reads back the injected word, or the word at the PC.
fn current_instr(pio: &Pio, sm: usize) -> u32 {
    let machine = pio.sm(sm);
    match machine.pending_exec() {
        Some(pending) => u32::from(pending.word),
        None => u32::from(pio.memory()[usize::from(machine.registers().pc)]),
    }
}

impl RegisterSet for PioRegisters<'_> {
    fn set_label(&self) -> &'static str {
        SET_LABELS[self.pio.index() % SET_LABELS.len()]
    }

    fn describe(&self, index: usize) -> Option<RegisterInfo> {
        let set = self.set_label();
        let slot = Slot::from_index(index)?;
        let descriptor = slot.descriptor();
        Some(match slot {
            Slot::Txf(n) | Slot::Rxf(n) | Slot::InstrMem(n) => info(set, "", descriptor, Some(n)),
            Slot::Sm(n, _) => info(set, &format!("SM{n}_"), descriptor, None),
            Slot::Inte(line) | Slot::Intf(line) | Slot::Ints(line) => {
                info(set, &format!("IRQ{line}_"), descriptor, None)
            }
            _ => info(set, "", descriptor, None),
        })
    }

    fn read_register(&mut self, index: usize) -> Result<u32, AccessError> {
        let slot = Slot::from_index(index).ok_or_else(|| unknown(self.set_label(), index))?;
        let pio = &mut *self.pio;
        Ok(match slot {
            Slot::Ctrl => u32::from(pio.enabled_mask()),
            Slot::Fstat => pio.fstat(),
            Slot::Fdebug => pio.fdebug(),
            Slot::Flevel => pio.flevel(),
            Slot::Rxf(n) => pio.sm_mut(n).fifo_mut().rx_dma_read(),
            Slot::Irq => u32::from(pio.irq_flags()),
            Slot::InputSyncBypass => pio.input_sync_bypass(),
            Slot::DbgPadout => self.gpio.pio_levels(pio.index()),
            Slot::DbgPadoe => self.gpio.pio_directions(pio.index()),
            Slot::DbgCfginfo => DBG_CFGINFO,
            Slot::Txf(_) | Slot::IrqForce | Slot::InstrMem(_) => 0,
            Slot::Sm(n, register) => {
                let sm = pio.sm(n);
                match register {
                    SmRegister::Clkdiv => {
                        (u32::from(sm.pll().int()) << 16) | (u32::from(sm.pll().frac()) << 8)
                    }
                    SmRegister::Execctrl => sm.execctrl(),
                    SmRegister::Shiftctrl => sm.shiftctrl(),
                    SmRegister::Addr => u32::from(sm.registers().pc),
                    SmRegister::Instr => current_instr(pio, n),
                    SmRegister::Pinctrl => sm.config().pinctrl(),
                }
            }
            Slot::Intr => u32::from(pio.intr()),
            Slot::Inte(line) => u32::from(pio.inte(line)),
            Slot::Intf(line) => u32::from(pio.intf(line)),
            Slot::Ints(line) => u32::from(pio.ints(line)),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        let slot = Slot::from_index(index).ok_or_else(|| unknown(self.set_label(), index))?;
        let pio = &mut *self.pio;
        match slot {
            Slot::Ctrl => {
                pio.write_ctrl(apply_write(u32::from(pio.enabled_mask()), bits, mask, xor));
            }
            Slot::Fdebug => pio.clear_fdebug(strobe_value(bits, mask)),
            Slot::Txf(n) => pio.sm_mut(n).fifo_mut().tx_dma_write(strobe_value(bits, mask)),
            Slot::Irq => pio.clear_irq_flags(strobe_value(bits, mask) as u8),
            Slot::IrqForce => pio.force_irq_flags(strobe_value(bits, mask) as u8),
            Slot::InputSyncBypass => {
                let value = apply_write(pio.input_sync_bypass(), bits, mask, xor);
                pio.set_input_sync_bypass(value);
            }
            Slot::InstrMem(n) => {
                let value = apply_write(u32::from(pio.memory()[n]), bits, mask, xor);
                pio.write_instruction(n, value as u16);
            }
            Slot::Sm(n, register) => {
                let current_instr = current_instr(pio, n);
                let sm = pio.sm_mut(n);
                match register {
                    SmRegister::Clkdiv => {
                        let current =
                            (u32::from(sm.pll().int()) << 16) | (u32::from(sm.pll().frac()) << 8);
                        let value = apply_write(current, bits, mask, xor);
                        sm.pll_mut()
                            .set_divider((value >> 16) as u16, ((value >> 8) & 0xFF) as u8);
                    }
                    SmRegister::Execctrl => {
                        let value = apply_write(sm.execctrl(), bits, mask, xor);
                        sm.config_mut().set_execctrl(value);
                    }
                    SmRegister::Shiftctrl => {
                        let value = apply_write(sm.shiftctrl(), bits, mask, xor);
                        sm.set_shiftctrl(value);
                    }
                    SmRegister::Instr => {
                        let value = apply_write(current_instr, bits, mask, xor);
                        sm.schedule_exec(value as u16, ExecOrigin::Register);
                    }
                    SmRegister::Pinctrl => {
                        let value = apply_write(sm.config().pinctrl(), bits, mask, xor);
                        sm.config_mut().set_pinctrl(value);
                    }
                    SmRegister::Addr => {}
                }
            }
            Slot::Inte(line) => {
                let value = apply_write(u32::from(pio.inte(line)), bits, mask, xor);
                pio.set_inte(line, value as u16);
            }
            Slot::Intf(line) => {
                let value = apply_write(u32::from(pio.intf(line)), bits, mask, xor);
                pio.set_intf(line, value as u16);
            }
            Slot::Fstat
            | Slot::Flevel
            | Slot::Rxf(_)
            | Slot::DbgPadout
            | Slot::DbgPadoe
            | Slot::DbgCfginfo
            | Slot::Intr
            | Slot::Ints(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{PioRegisters, Slot, SmRegister, REGISTER_COUNT, SM0_CLKDIV};
    use crate::error::AccessError;
    use crate::gpio::Gpio;
    use crate::pio::Pio;
    use crate::registers::{RegisterAccess, RegisterSet};
    use crate::sm::ExecOrigin;

    #[rstest]
    #[case(0, "PIO0_CTRL")]
    #[case(5, "PIO0_TXF1")]
    #[case(11, "PIO0_RXF3")]
    #[case(25, "PIO0_INSTR_MEM7")]
    #[case(57, "PIO0_SM1_EXECCTRL")]
    #[case(73, "PIO0_SM3_PINCTRL")]
    #[case(74, "PIO0_INTR")]
    #[case(79, "PIO0_IRQ1_INTF")]
    fn labels(#[case] index: usize, #[case] label: &str) {
        let mut pio = Pio::new(0);
        let gpio = Gpio::new();
        let regs = PioRegisters::new(&mut pio, &gpio);
        assert_eq!(regs.register_label(index).as_deref(), Some(label));
    }

    #[test]
    fn reset_values_match_descriptors() {
        let mut pio = Pio::new(1);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        for index in 0..REGISTER_COUNT {
            let info = regs.describe(index).expect("every slot is described");
            if info.descriptor.access == RegisterAccess::ReadPop {
                continue;
            }
            let value = regs.read_register(index).expect("readable");
            assert_eq!(value, info.descriptor.reset, "{}", info.label);
        }
    }

    #[test]
    fn unknown_index_is_rejected() {
        let mut pio = Pio::new(0);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        assert_eq!(
            regs.read_register(REGISTER_COUNT),
            Err(AccessError::UnknownRegister {
                set: "PIO0",
                index: REGISTER_COUNT
            })
        );
        assert!(regs.describe(REGISTER_COUNT).is_none());
    }

    #[test]
    fn clkdiv_round_trips_through_the_divider() {
        let mut pio = Pio::new(0);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        let clkdiv = SM0_CLKDIV + 6 * 2;
        assert_eq!(
            Slot::from_index(clkdiv),
            Some(Slot::Sm(2, SmRegister::Clkdiv))
        );
        regs.write_register(clkdiv, 0x0003_8000, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(clkdiv), Ok(0x0003_8000));
        assert_eq!(pio.sm(2).pll().int(), 3);
        assert_eq!(pio.sm(2).pll().frac(), 0x80);
    }

    #[test]
    fn irq_is_write_one_to_clear() {
        let mut pio = Pio::new(0);
        pio.force_irq_flags(0b1010);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        regs.write_register(super::IRQ, 0b0010, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(super::IRQ), Ok(0b1000));
        // CLEAR alias writes no ones and must leave the flags alone.
        regs.write_register(super::IRQ, 0, 0b1000, false)
            .expect("writable");
        assert_eq!(regs.read_register(super::IRQ), Ok(0b1000));
    }

    #[test]
    fn fifo_registers_push_and_pop() {
        let mut pio = Pio::new(0);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        regs.write_register(super::TXF0 + 1, 0xCAFE, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(super::FLEVEL), Ok(0x0000_0100));
        assert_eq!(regs.read_register(super::RXF0), Ok(0));
        assert_eq!(regs.read_register(super::FDEBUG), Ok(1 << 8));
        assert_eq!(pio.sm_mut(1).fifo_mut().slot(0), 0xCAFE);
    }

    #[test]
    fn instr_write_schedules_register_injection() {
        let mut pio = Pio::new(0);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        let instr = SM0_CLKDIV + 4;
        regs.write_register(instr, 0xE021, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(instr), Ok(0xE021));
        let pending = pio.sm(0).pending_exec().expect("scheduled");
        assert_eq!(pending.origin, ExecOrigin::Register);
        assert_eq!(pending.word, 0xE021);
    }

    #[test]
    fn ctrl_set_alias_keeps_enabled_machines() {
        let mut pio = Pio::new(0);
        pio.set_enabled_mask(0b0001);
        let gpio = Gpio::new();
        let mut regs = PioRegisters::new(&mut pio, &gpio);
        regs.write_register(super::CTRL, 0b0100, 0b0100, false)
            .expect("writable");
        assert_eq!(regs.read_register(super::CTRL), Ok(0b0101));
    }
}
