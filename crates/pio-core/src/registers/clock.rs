//! `MASTERCLK` emulator registers.

use crate::clock::{ClockMode, MasterClock, Phase};
use crate::error::AccessError;
use crate::registers::{
    apply_write, info, strobe_value, unknown, RegisterAccess, RegisterDescriptor, RegisterInfo,
    RegisterSet,
};

/// Index of `MODE`.
pub const MODE: usize = 0;
/// Index of `FREQ`.
pub const FREQ: usize = 1;
/// Index of `TRIGGER_PHASE0`.
pub const TRIGGER_PHASE0: usize = 2;
/// Index of `TRIGGER_PHASE1`.
pub const TRIGGER_PHASE1: usize = 3;
/// Index of `PHASE`.
pub const PHASE: usize = 4;
/// Index of `WALLCLOCK_LSB`.
pub const WALLCLOCK_LSB: usize = 5;
/// Index of `WALLCLOCK_MSB`.
pub const WALLCLOCK_MSB: usize = 6;

static REGISTERS: [RegisterDescriptor; 7] = [
    RegisterDescriptor::new("MODE", 0, RegisterAccess::ReadWrite),
    RegisterDescriptor::new("FREQ", crate::clock::DEFAULT_FREQUENCY, RegisterAccess::ReadWrite),
    RegisterDescriptor::new("TRIGGER_PHASE0", 0, RegisterAccess::WriteOnly),
    RegisterDescriptor::new("TRIGGER_PHASE1", 0, RegisterAccess::WriteOnly),
    RegisterDescriptor::new("PHASE", Phase::Phase1Stable as u32, RegisterAccess::ReadOnly),
    RegisterDescriptor::new("WALLCLOCK_LSB", 0, RegisterAccess::ReadOnly),
    RegisterDescriptor::new("WALLCLOCK_MSB", 0, RegisterAccess::ReadOnly),
];

/// View of the master clock's registers.
#[derive(Debug)]
pub struct ClockRegisters<'a> {
    clock: &'a MasterClock,
}

impl<'a> ClockRegisters<'a> {
    /// Creates the view.
    pub const fn new(clock: &'a MasterClock) -> Self {
        Self { clock }
    }
}

impl RegisterSet for ClockRegisters<'_> {
    fn set_label(&self) -> &'static str {
        "MASTERCLK"
    }

    fn describe(&self, index: usize) -> Option<RegisterInfo> {
        let descriptor = REGISTERS.get(index)?;
        Some(info(self.set_label(), "", descriptor, None))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_register(&mut self, index: usize) -> Result<u32, AccessError> {
        Ok(match index {
            MODE => self.clock.mode().as_u32(),
            FREQ => self.clock.frequency(),
            TRIGGER_PHASE0 | TRIGGER_PHASE1 => 0,
            PHASE => self.clock.phase().as_u32(),
            WALLCLOCK_LSB => self.clock.wall_clock() as u32,
            WALLCLOCK_MSB => (self.clock.wall_clock() >> 32) as u32,
            _ => return Err(unknown(self.set_label(), index)),
        })
    }

    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        match index {
            MODE => {
                let value = apply_write(self.clock.mode().as_u32(), bits, mask, xor);
                self.clock.set_mode(ClockMode::from_u32(value & 1));
            }
            FREQ => {
                let value = apply_write(self.clock.frequency(), bits, mask, xor);
                self.clock.set_frequency(value);
            }
            TRIGGER_PHASE0 => {
                if strobe_value(bits, mask) & 1 != 0 {
                    let _ = self.clock.trigger(Phase::Phase0InProgress);
                }
            }
            TRIGGER_PHASE1 => {
                if strobe_value(bits, mask) & 1 != 0 {
                    let _ = self.clock.trigger(Phase::Phase1InProgress);
                }
            }
            PHASE | WALLCLOCK_LSB | WALLCLOCK_MSB => {}
            _ => return Err(unknown(self.set_label(), index)),
        }
        Ok(())
    }
}
