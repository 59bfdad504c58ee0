//! Flat 32-bit register address space with atomic XOR/SET/CLEAR aliases.

/// In-process address space over an emulator.
pub mod local;
/// Fixed region map and address decoder.
pub mod map;

pub use local::LocalAddressSpace;
pub use map::{
    decode_address, encode_address, Alias, DecodedAddress, Region, ALIAS_WINDOW, GPIO_EMU_BASE,
    IO_BANK0_BASE, MASTERCLK_BASE, PIO0_BASE, PIO0_EMU_BASE, PIO1_BASE, PIO1_EMU_BASE, REGIONS,
    REGION_SIZE,
};

use crate::error::AccessError;

/// Word-addressed access to emulator registers, local or remote.
pub trait AddressSpace {
    /// `true` when a register lives at `address`.
    fn provides_address(&self, address: u32) -> bool;

    /// Label of the register set owning `address`, e.g. `PIO0_SET`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] for misaligned or unmapped addresses.
    fn register_set_label(&self, address: u32) -> Result<String, AccessError>;

    /// Label of the register at `address`, e.g. `PIO0_SM1_EXECCTRL_XOR`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] for misaligned or unmapped addresses.
    fn address_label(&self, address: u32) -> Result<String, AccessError>;

    /// Reads the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] for misaligned or unmapped addresses and for
    /// transport failures.
    fn read_address(&self, address: u32) -> Result<u32, AccessError>;

    /// Writes `value` under `mask` at `address`, toggling when `xor` is set.
    /// Alias windows apply on top.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] for misaligned or unmapped addresses and for
    /// transport failures.
    fn write_address_masked(
        &self,
        address: u32,
        value: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError>;

    /// Writes all 32 bits of `value` at `address`.
    ///
    /// # Errors
    ///
    /// See [`AddressSpace::write_address_masked`].
    fn write_address(&self, address: u32, value: u32) -> Result<(), AccessError> {
        self.write_address_masked(address, value, u32::MAX, false)
    }

    /// Polls `address` until `value & mask == expected & mask`.
    ///
    /// Gives up after `cycles_timeout` clock cycles or `millis_timeout`
    /// milliseconds, whichever comes first; `0` disables a limit. Returns
    /// whether the value matched.
    ///
    /// With both limits at `0` the call only returns on a match or an error,
    /// so it blocks forever on a value that never comes.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when a poll fails.
    fn wait_address(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        cycles_timeout: u64,
        millis_timeout: u64,
    ) -> Result<bool, AccessError>;
}
