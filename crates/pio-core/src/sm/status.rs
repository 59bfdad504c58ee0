//! Architectural registers and configuration fields of one state machine.

use crate::encoding::SideSetLayout;

/// Reset value of `SMn_EXECCTRL`.
pub const EXECCTRL_RESET: u32 = 0x0001_F000;
/// Reset value of `SMn_SHIFTCTRL`.
pub const SHIFTCTRL_RESET: u32 = 0x000C_0000;
/// Reset value of `SMn_PINCTRL`.
pub const PINCTRL_RESET: u32 = 0x1400_0000;

/// `SMn_EXECCTRL.EXEC_STALLED`.
pub const EXECCTRL_EXEC_STALLED: u32 = 1 << 31;
/// `SMn_SHIFTCTRL.FJOIN_RX`.
pub const SHIFTCTRL_FJOIN_RX: u32 = 1 << 31;
/// `SMn_SHIFTCTRL.FJOIN_TX`.
pub const SHIFTCTRL_FJOIN_TX: u32 = 1 << 30;

/// Shift register full width.
pub const SHIFT_WIDTH: u8 = 32;

const fn field(value: u32, shift: u32, width: u32) -> u32 {
    (value >> shift) & ((1 << width) - 1)
}

const fn flag(value: u32, bit: u32) -> bool {
    value & (1 << bit) != 0
}

/// Converts a 5-bit threshold field to a bit count (`0` means 32).
#[must_use]
pub const fn threshold_bits(raw: u8) -> u8 {
    if raw & 0x1F == 0 {
        SHIFT_WIDTH
    } else {
        raw & 0x1F
    }
}

/// Scratch and shift registers plus the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SmRegisters {
    /// Scratch register X.
    pub x: u32,
    /// Scratch register Y.
    pub y: u32,
    /// Program counter (`0..32`).
    pub pc: u8,
    /// Input shift register.
    pub isr: u32,
    /// Bits shifted into the ISR since the last push (`0..=32`).
    pub isr_count: u8,
    /// Output shift register.
    pub osr: u32,
    /// Bits shifted out of the OSR since the last pull (`0..=32`).
    pub osr_count: u8,
}

impl Default for SmRegisters {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            pc: 0,
            isr: 0,
            isr_count: 0,
            osr: 0,
            osr_count: SHIFT_WIDTH,
        }
    }
}

impl SmRegisters {
    /// Sets the program counter, wrapping into instruction memory.
    pub const fn set_pc(&mut self, pc: u32) {
        self.pc = (pc % 32) as u8;
    }

    /// Increments the program counter modulo 32, ignoring the wrap window.
    pub const fn inc_pc(&mut self) {
        self.pc = (self.pc + 1) % 32;
    }

    /// Moves past a completed instruction, honouring the wrap window.
    pub const fn advance_pc(&mut self, config: &SmConfig) {
        if self.pc == config.wrap_top {
            self.pc = config.wrap_bottom;
        } else {
            self.inc_pc();
        }
    }

    /// Sets the ISR shift count, saturating at 32.
    pub const fn set_isr_count(&mut self, count: u32) {
        self.isr_count = if count > 32 { SHIFT_WIDTH } else { count as u8 };
    }

    /// Sets the OSR shift count, saturating at 32.
    pub const fn set_osr_count(&mut self, count: u32) {
        self.osr_count = if count > 32 { SHIFT_WIDTH } else { count as u8 };
    }

    /// Shifts `count` low bits of `data` into the ISR.
    pub const fn shift_in(&mut self, data: u32, count: u8, shift_right: bool) {
        let count = if count > 32 { 32 } else { count };
        if count == 0 {
            return;
        }
        let data = if count == 32 {
            data
        } else {
            data & ((1 << count) - 1)
        };
        self.isr = if count == 32 {
            data
        } else if shift_right {
            (self.isr >> count) | (data << (32 - count))
        } else {
            (self.isr << count) | data
        };
        self.set_isr_count(self.isr_count as u32 + count as u32);
    }

    /// Shifts `count` bits out of the OSR and returns them right-aligned.
    pub const fn shift_out(&mut self, count: u8, shift_right: bool) -> u32 {
        let count = if count > 32 { 32 } else { count };
        if count == 0 {
            return 0;
        }
        let data = if count == 32 {
            let data = self.osr;
            self.osr = 0;
            data
        } else if shift_right {
            let data = self.osr & ((1 << count) - 1);
            self.osr >>= count;
            data
        } else {
            let data = self.osr >> (32 - count);
            self.osr <<= count;
            data
        };
        self.set_osr_count(self.osr_count as u32 + count as u32);
        data
    }
}

/// Execution, shift and pin-mapping configuration.
///
/// FIFO joins live with the FIFO itself; `EXEC_STALLED` is runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct SmConfig {
    /// Bit 12 of the delay/side-set field enables side-set.
    pub side_en: bool,
    /// Side-set drives pin directions instead of levels.
    pub side_pindir: bool,
    /// GPIO tested by `jmp pin`.
    pub jmp_pin: u8,
    /// Data bit used as inline output enable.
    pub out_en_sel: u8,
    /// Inline output enable.
    pub inline_out_en: bool,
    /// Re-assert the most recent OUT/SET pin values.
    pub out_sticky: bool,
    /// Address after which execution wraps.
    pub wrap_top: u8,
    /// Address execution wraps to.
    pub wrap_bottom: u8,
    /// `mov ... status` compares the RX level (`true`) or the TX level.
    pub status_sel: bool,
    /// Level threshold for `mov ... status`.
    pub status_n: u8,
    /// Pull threshold (`0` means 32).
    pub pull_threshold: u8,
    /// Push threshold (`0` means 32).
    pub push_threshold: u8,
    /// OSR shifts right.
    pub out_shift_right: bool,
    /// ISR shifts right.
    pub in_shift_right: bool,
    /// Automatic pull when the OSR reaches the pull threshold.
    pub autopull: bool,
    /// Automatic push when the ISR reaches the push threshold.
    pub autopush: bool,
    /// Number of side-set data pins.
    pub sideset_count: u8,
    /// Number of pins written by `SET`.
    pub set_count: u8,
    /// Number of pins written by `OUT` and `MOV PINS`.
    pub out_count: u8,
    /// First pin read by `IN`, `MOV x, PINS` and `WAIT PIN`.
    pub in_base: u8,
    /// First side-set pin.
    pub sideset_base: u8,
    /// First pin written by `SET`.
    pub set_base: u8,
    /// First pin written by `OUT`.
    pub out_base: u8,
}

impl Default for SmConfig {
    fn default() -> Self {
        let mut config = Self {
            side_en: false,
            side_pindir: false,
            jmp_pin: 0,
            out_en_sel: 0,
            inline_out_en: false,
            out_sticky: false,
            wrap_top: 0,
            wrap_bottom: 0,
            status_sel: false,
            status_n: 0,
            pull_threshold: 0,
            push_threshold: 0,
            out_shift_right: false,
            in_shift_right: false,
            autopull: false,
            autopush: false,
            sideset_count: 0,
            set_count: 0,
            out_count: 0,
            in_base: 0,
            sideset_base: 0,
            set_base: 0,
            out_base: 0,
        };
        config.set_execctrl(EXECCTRL_RESET);
        config.set_shiftctrl(SHIFTCTRL_RESET);
        config.set_pinctrl(PINCTRL_RESET);
        config
    }
}

impl SmConfig {
    /// Delay/side-set split implied by `SIDESET_COUNT` and `SIDE_EN`.
    #[must_use]
    pub const fn side_set_layout(&self) -> SideSetLayout {
        SideSetLayout::new(self.sideset_count, self.side_en)
    }

    /// Effective pull threshold in bits.
    #[must_use]
    pub const fn pull_threshold_bits(&self) -> u8 {
        threshold_bits(self.pull_threshold)
    }

    /// Effective push threshold in bits.
    #[must_use]
    pub const fn push_threshold_bits(&self) -> u8 {
        threshold_bits(self.push_threshold)
    }

    /// `EXECCTRL` without the `EXEC_STALLED` bit.
    #[must_use]
    pub const fn execctrl(&self) -> u32 {
        ((self.side_en as u32) << 30)
            | ((self.side_pindir as u32) << 29)
            | ((self.jmp_pin as u32) << 24)
            | ((self.out_en_sel as u32) << 19)
            | ((self.inline_out_en as u32) << 18)
            | ((self.out_sticky as u32) << 17)
            | ((self.wrap_top as u32) << 12)
            | ((self.wrap_bottom as u32) << 7)
            | ((self.status_sel as u32) << 4)
            | self.status_n as u32
    }

    /// Applies an `EXECCTRL` value. `EXEC_STALLED` is ignored.
    pub const fn set_execctrl(&mut self, value: u32) {
        self.side_en = flag(value, 30);
        self.side_pindir = flag(value, 29);
        self.jmp_pin = field(value, 24, 5) as u8;
        self.out_en_sel = field(value, 19, 5) as u8;
        self.inline_out_en = flag(value, 18);
        self.out_sticky = flag(value, 17);
        self.wrap_top = field(value, 12, 5) as u8;
        self.wrap_bottom = field(value, 7, 5) as u8;
        self.status_sel = flag(value, 4);
        self.status_n = field(value, 0, 4) as u8;
    }

    /// `SHIFTCTRL` without the FIFO join bits.
    #[must_use]
    pub const fn shiftctrl(&self) -> u32 {
        ((self.pull_threshold as u32) << 25)
            | ((self.push_threshold as u32) << 20)
            | ((self.out_shift_right as u32) << 19)
            | ((self.in_shift_right as u32) << 18)
            | ((self.autopull as u32) << 17)
            | ((self.autopush as u32) << 16)
    }

    /// Applies a `SHIFTCTRL` value. FIFO join bits are ignored here.
    pub const fn set_shiftctrl(&mut self, value: u32) {
        self.pull_threshold = field(value, 25, 5) as u8;
        self.push_threshold = field(value, 20, 5) as u8;
        self.out_shift_right = flag(value, 19);
        self.in_shift_right = flag(value, 18);
        self.autopull = flag(value, 17);
        self.autopush = flag(value, 16);
    }

    /// `PINCTRL` value.
    #[must_use]
    pub const fn pinctrl(&self) -> u32 {
        ((self.sideset_count as u32) << 29)
            | ((self.set_count as u32) << 26)
            | ((self.out_count as u32) << 20)
            | ((self.in_base as u32) << 15)
            | ((self.sideset_base as u32) << 10)
            | ((self.set_base as u32) << 5)
            | self.out_base as u32
    }

    /// Applies a `PINCTRL` value.
    pub const fn set_pinctrl(&mut self, value: u32) {
        self.sideset_count = field(value, 29, 3) as u8;
        self.set_count = field(value, 26, 3) as u8;
        self.out_count = field(value, 20, 6) as u8;
        self.in_base = field(value, 15, 5) as u8;
        self.sideset_base = field(value, 10, 5) as u8;
        self.set_base = field(value, 5, 5) as u8;
        self.out_base = field(value, 0, 5) as u8;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{
        SmConfig, SmRegisters, EXECCTRL_RESET, PINCTRL_RESET, SHIFTCTRL_RESET, SHIFT_WIDTH,
    };

    #[test]
    fn reset_values_decode_to_hardware_defaults() {
        let config = SmConfig::default();
        assert_eq!(config.wrap_top, 31);
        assert_eq!(config.wrap_bottom, 0);
        assert!(config.out_shift_right);
        assert!(config.in_shift_right);
        assert_eq!(config.set_count, 5);
        assert_eq!(config.pull_threshold_bits(), 32);
        assert_eq!(config.execctrl(), EXECCTRL_RESET);
        assert_eq!(config.shiftctrl(), SHIFTCTRL_RESET);
        assert_eq!(config.pinctrl(), PINCTRL_RESET);
    }

    #[test]
    fn pc_wraps_to_zero_after_last_slot() {
        let mut regs = SmRegisters {
            pc: 31,
            ..SmRegisters::default()
        };
        regs.inc_pc();
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn wrap_window_redirects_advance() {
        let mut config = SmConfig::default();
        config.wrap_top = 4;
        config.wrap_bottom = 2;
        let mut regs = SmRegisters {
            pc: 3,
            ..SmRegisters::default()
        };
        regs.advance_pc(&config);
        assert_eq!(regs.pc, 4);
        regs.advance_pc(&config);
        assert_eq!(regs.pc, 2);
        regs.pc = 31;
        regs.advance_pc(&config);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn shift_in_respects_direction() {
        let mut regs = SmRegisters::default();
        regs.shift_in(0b101, 3, false);
        assert_eq!(regs.isr, 0b101);
        regs.shift_in(0b1, 1, false);
        assert_eq!(regs.isr, 0b1011);
        assert_eq!(regs.isr_count, 4);

        let mut regs = SmRegisters::default();
        regs.shift_in(0b11, 2, true);
        assert_eq!(regs.isr, 0xC000_0000);
    }

    #[test]
    fn shift_out_respects_direction() {
        let mut regs = SmRegisters {
            osr: 0x8000_0001,
            osr_count: 0,
            ..SmRegisters::default()
        };
        assert_eq!(regs.shift_out(1, true), 1);
        assert_eq!(regs.osr, 0x4000_0000);
        assert_eq!(regs.shift_out(2, false), 0b01);
        assert_eq!(regs.osr_count, 3);
    }

    proptest! {
        #[test]
        fn shift_counts_saturate(counts in proptest::collection::vec(1u8..=32, 0..16)) {
            let mut regs = SmRegisters { osr_count: 0, ..SmRegisters::default() };
            for count in counts {
                regs.shift_in(u32::MAX, count, false);
                let _ = regs.shift_out(count, true);
                prop_assert!(regs.isr_count <= SHIFT_WIDTH);
                prop_assert!(regs.osr_count <= SHIFT_WIDTH);
            }
        }

        #[test]
        fn control_registers_roundtrip(exec in any::<u32>(), shift in any::<u32>(), pins in any::<u32>()) {
            let mut config = SmConfig::default();
            config.set_execctrl(exec);
            config.set_shiftctrl(shift);
            config.set_pinctrl(pins);
            prop_assert_eq!(config.execctrl(), exec & 0x7FFF_FF9F);
            prop_assert_eq!(config.shiftctrl(), shift & 0x3FFF_0000);
            prop_assert_eq!(config.pinctrl(), pins);
        }
    }
}
