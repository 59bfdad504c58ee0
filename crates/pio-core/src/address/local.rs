//! In-process address space.
//!
//! Reads and writes go straight to the register sets under the chip lock.
//! `wait_address` polls between clock phase changes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::address::map::{decode_address, DecodedAddress, Region};
use crate::address::AddressSpace;
use crate::clock::MasterClock;
use crate::emulator::{Chip, Peripherals};
use crate::error::AccessError;
use crate::registers::{
    ClockRegisters, GpioEmuRegisters, IoBank0Registers, PioEmuRegisters, PioRegisters,
    RegisterSet,
};

/// Upper bound on one sleep between `wait_address` polls.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Address space backed by an in-process emulator.
///
/// Every access builds a register-set view over the locked chip state, so
/// accesses are serialized with clock edges.
#[derive(Debug, Clone)]
pub struct LocalAddressSpace {
    clock: Arc<MasterClock>,
    peripherals: Arc<Peripherals>,
}

impl LocalAddressSpace {
    /// Creates an address space over `peripherals` driven by `clock`.
    #[must_use]
    pub const fn new(clock: Arc<MasterClock>, peripherals: Arc<Peripherals>) -> Self {
        Self { clock, peripherals }
    }

    fn with_set<R>(&self, region: Region, f: impl FnOnce(&mut dyn RegisterSet) -> R) -> R {
        if region == Region::MasterClock {
            return f(&mut ClockRegisters::new(&self.clock));
        }
        let mut chip = self.peripherals.lock();
        let Chip { gpio, pio } = &mut *chip;
        match region {
            Region::IoBank0 => f(&mut IoBank0Registers::new(gpio)),
            Region::GpioEmu => f(&mut GpioEmuRegisters::new(gpio)),
            Region::Pio(n) => f(&mut PioRegisters::new(&mut pio[n], gpio)),
            Region::PioEmu(n) => f(&mut PioEmuRegisters::new(&mut pio[n])),
            Region::MasterClock => f(&mut ClockRegisters::new(&self.clock)),
        }
    }

    /// Unknown indices inside a mapped region are reported by address.
    fn resolve<T>(address: u32, result: Result<T, AccessError>) -> Result<T, AccessError> {
        result.map_err(|error| match error {
            AccessError::UnknownRegister { .. } => AccessError::UnsupportedAddress(address),
            other => other,
        })
    }

    fn describe(&self, address: u32) -> Result<(DecodedAddress, String), AccessError> {
        let decoded = decode_address(address)?;
        let label = self
            .with_set(decoded.region, |set| set.register_label(decoded.index))
            .ok_or(AccessError::UnsupportedAddress(address))?;
        Ok((decoded, label))
    }
}

impl AddressSpace for LocalAddressSpace {
    fn provides_address(&self, address: u32) -> bool {
        self.describe(address).is_ok()
    }

    fn register_set_label(&self, address: u32) -> Result<String, AccessError> {
        let (decoded, _) = self.describe(address)?;
        let set = self.with_set(decoded.region, |set| set.set_label());
        Ok(format!("{set}{}", decoded.alias.suffix()))
    }

    fn address_label(&self, address: u32) -> Result<String, AccessError> {
        let (decoded, label) = self.describe(address)?;
        Ok(format!("{label}{}", decoded.alias.suffix()))
    }

    fn read_address(&self, address: u32) -> Result<u32, AccessError> {
        let decoded = decode_address(address)?;
        Self::resolve(
            address,
            self.with_set(decoded.region, |set| set.read_register(decoded.index)),
        )
    }

    fn write_address_masked(
        &self,
        address: u32,
        value: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        let decoded = decode_address(address)?;
        let (bits, mask, alias_xor) = decoded.alias.write_operands(value, mask);
        Self::resolve(
            address,
            self.with_set(decoded.region, |set| {
                set.write_register(decoded.index, bits, mask, xor || alias_xor)
            }),
        )
    }

    fn wait_address(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        cycles_timeout: u64,
        millis_timeout: u64,
    ) -> Result<bool, AccessError> {
        let start = self.clock.wall_clock();
        let deadline = (millis_timeout > 0)
            .then(|| Instant::now() + Duration::from_millis(millis_timeout));
        loop {
            if self.read_address(address)? & mask == expected & mask {
                return Ok(true);
            }
            if cycles_timeout > 0 && self.clock.wall_clock().saturating_sub(start) >= cycles_timeout
            {
                return Ok(false);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            self.clock.wait_phase_change(slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::address::map::{encode_address, Alias, Region};
    use crate::address::AddressSpace;
    use crate::emulator::Emulator;
    use crate::error::AccessError;
    use crate::registers::pio::{CTRL, INSTR_MEM0, SM0_CLKDIV};

    #[test]
    fn labels_carry_alias_suffix() {
        let emulator = Emulator::default();
        let space = emulator.address_space();
        let execctrl = encode_address(Region::Pio(0), Alias::Xor, SM0_CLKDIV + 6 + 1);
        assert_eq!(space.address_label(execctrl), Ok("PIO0_SM1_EXECCTRL_XOR".into()));
        assert_eq!(space.register_set_label(execctrl), Ok("PIO0_XOR".into()));
        assert_eq!(
            space.address_label(0x5800_0000),
            Ok("MASTERCLK_MODE".into())
        );
    }

    #[test]
    fn unmapped_indices_are_unsupported() {
        let emulator = Emulator::default();
        let space = emulator.address_space();
        let beyond = encode_address(Region::Pio(1), Alias::Normal, 200);
        assert!(!space.provides_address(beyond));
        assert_eq!(
            space.read_address(beyond),
            Err(AccessError::UnsupportedAddress(beyond))
        );
        assert!(space.provides_address(encode_address(Region::IoBank0, Alias::Set, 63)));
        assert!(!space.provides_address(0x5020_0001));
    }

    #[test]
    fn alias_writes_reach_registers() {
        let emulator = Emulator::default();
        let space = emulator.address_space();
        let slot = encode_address(Region::Pio(0), Alias::Normal, INSTR_MEM0);
        space.write_address(slot, 0x0F0F).expect("writable");
        let set = encode_address(Region::Pio(0), Alias::Set, CTRL);
        space.write_address(set, 0b0010).expect("writable");
        space.write_address(set, 0b0100).expect("writable");
        assert_eq!(space.read_address(encode_address(Region::Pio(0), Alias::Normal, CTRL)), Ok(0b0110));
        let clear = encode_address(Region::Pio(0), Alias::Clear, CTRL);
        space.write_address(clear, 0b0010).expect("writable");
        assert_eq!(space.read_address(set), Ok(0b0100));
        assert_eq!(emulator.peripherals().lock().pio[0].memory()[0], 0x0F0F);
    }

    #[test]
    fn wait_times_out_on_cycles_and_millis() {
        let emulator = Emulator::default();
        let space = emulator.address_space();
        let wall = encode_address(Region::MasterClock, Alias::Normal, 5);
        assert_eq!(space.wait_address(wall, 0, u32::MAX, 0, 0), Ok(true));
        assert_eq!(space.wait_address(wall, 7, u32::MAX, 0, 20), Ok(false));
    }

    #[test]
    fn wait_observes_wall_clock_progress() {
        let emulator = Emulator::default();
        let space = emulator.address_space();
        let clock = std::sync::Arc::clone(emulator.clock());
        let stepper = thread::spawn(move || clock.step_cycles(10));
        let wall = encode_address(Region::MasterClock, Alias::Normal, 5);
        assert_eq!(space.wait_address(wall, 10, u32::MAX, 0, 5_000), Ok(true));
        stepper.join().expect("stepper finished");
    }
}
