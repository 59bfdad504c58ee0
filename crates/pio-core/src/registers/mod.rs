//! Memory-mapped register sets.
//!
//! Each register set is a short-lived view over locked emulator state and
//! implements [`RegisterSet`]. Static descriptor tables carry labels, reset
//! values and field layouts; dispatch never consults them.

pub mod clock;
pub mod gpio;
pub mod pio;
pub mod pio_emu;

pub use clock::ClockRegisters;
pub use gpio::{GpioEmuRegisters, IoBank0Registers};
pub use pio::PioRegisters;
pub use pio_emu::PioEmuRegisters;

use crate::error::AccessError;

/// How software may access a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterAccess {
    /// Plain read/write.
    ReadWrite,
    /// Writes are ignored.
    ReadOnly,
    /// Reads return 0.
    WriteOnly,
    /// Writing 1 clears the bit.
    WriteClear,
    /// Reading pops a FIFO.
    ReadPop,
}

/// One bit field of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: &'static str,
    /// Least significant bit.
    pub lsb: u8,
    /// Width in bits.
    pub width: u8,
}

impl FieldDescriptor {
    /// Creates a field descriptor.
    #[must_use]
    pub const fn new(name: &'static str, lsb: u8, width: u8) -> Self {
        Self { name, lsb, width }
    }

    /// Unshifted mask of the field.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.width) - 1) << self.lsb
        }
    }

    /// Extracts the field from a register value.
    #[must_use]
    pub const fn extract(&self, value: u32) -> u32 {
        (value & self.mask()) >> self.lsb
    }
}

/// Static description of one register (or one family of indexed registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    /// Name without set prefix or index, e.g. `EXECCTRL`.
    pub name: &'static str,
    /// Value after reset.
    pub reset: u32,
    /// Software access policy.
    pub access: RegisterAccess,
    /// Bit layout, most significant field first.
    pub fields: &'static [FieldDescriptor],
}

impl RegisterDescriptor {
    /// Creates a descriptor without field layout.
    #[must_use]
    pub const fn new(name: &'static str, reset: u32, access: RegisterAccess) -> Self {
        Self {
            name,
            reset,
            access,
            fields: &[],
        }
    }

    /// Attaches a field layout.
    #[must_use]
    pub const fn with_fields(mut self, fields: &'static [FieldDescriptor]) -> Self {
        self.fields = fields;
        self
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A register resolved from an index: full label plus descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Full label, e.g. `PIO0_SM1_EXECCTRL`.
    pub label: String,
    /// Static descriptor.
    pub descriptor: &'static RegisterDescriptor,
}

/// Word-indexed register file.
pub trait RegisterSet {
    /// Set label, e.g. `PIO0`.
    fn set_label(&self) -> &'static str;

    /// Resolves `index` to its label and descriptor.
    fn describe(&self, index: usize) -> Option<RegisterInfo>;

    /// Reads register `index`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnknownRegister`] when no register lives at
    /// `index`.
    fn read_register(&mut self, index: usize) -> Result<u32, AccessError>;

    /// Writes `bits` under `mask` into register `index`, toggling instead of
    /// assigning when `xor` is set.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnknownRegister`] when no register lives at
    /// `index`.
    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError>;

    /// Label of register `index`.
    fn register_label(&self, index: usize) -> Option<String> {
        self.describe(index).map(|info| info.label)
    }
}

/// Applies a masked (optionally toggling) write to a stored value.
#[must_use]
pub const fn apply_write(current: u32, bits: u32, mask: u32, xor: bool) -> u32 {
    if xor {
        current ^ (bits & mask)
    } else {
        (current & !mask) | (bits & mask)
    }
}

/// Value seen by a strobe, write-one-to-clear or FIFO-push register.
///
/// Such registers have no stored value to merge with: only the written ones
/// take effect.
#[must_use]
pub const fn strobe_value(bits: u32, mask: u32) -> u32 {
    bits & mask
}

pub(crate) const fn unknown(set: &'static str, index: usize) -> AccessError {
    AccessError::UnknownRegister { set, index }
}

pub(crate) fn info(
    set: &'static str,
    middle: &str,
    descriptor: &'static RegisterDescriptor,
    suffix: Option<usize>,
) -> RegisterInfo {
    let label = match suffix {
        Some(n) => format!("{set}_{middle}{}{n}", descriptor.name),
        None => format!("{set}_{middle}{}", descriptor.name),
    };
    RegisterInfo { label, descriptor }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{apply_write, strobe_value, FieldDescriptor};

    #[rstest]
    #[case(0x0F0F_0F0F, 0xFFFF_FFFF, 0xFFFF_FFFF, false, 0xFFFF_FFFF)]
    #[case(0x0F0F_0F0F, 0x0000_0000, 0xFFFF_FFFF, false, 0x0000_0000)]
    #[case(0x0F0F_0F0F, 0xFFFF_FFFF, 0x0000_FFFF, false, 0x0F0F_FFFF)]
    #[case(0x0F0F_0F0F, 0xFFFF_FFFF, 0xFFFF_FFFF, true, 0xF0F0_F0F0)]
    #[case(0x0F0F_0F0F, 0x0000_00FF, 0x0000_000F, true, 0x0F0F_0F00)]
    fn masked_writes(
        #[case] current: u32,
        #[case] bits: u32,
        #[case] mask: u32,
        #[case] xor: bool,
        #[case] expected: u32,
    ) {
        assert_eq!(apply_write(current, bits, mask, xor), expected);
    }

    #[test]
    fn strobes_only_see_written_ones() {
        assert_eq!(strobe_value(0xFF, 0x0F), 0x0F);
        assert_eq!(strobe_value(0, u32::MAX), 0);
    }

    #[test]
    fn field_masks() {
        let int = FieldDescriptor::new("INT", 16, 16);
        assert_eq!(int.mask(), 0xFFFF_0000);
        assert_eq!(int.extract(0x0003_8000), 3);
        assert_eq!(FieldDescriptor::new("ALL", 0, 32).mask(), u32::MAX);
    }
}
