//! Fixed register-set region map and address decoding.

use crate::error::AccessError;

/// Size of one register-set region in bytes (all four alias windows).
pub const REGION_SIZE: u32 = 0x4000;
/// Size of one alias window in bytes.
pub const ALIAS_WINDOW: u32 = 0x1000;

/// Base address of `IO_BANK0`.
pub const IO_BANK0_BASE: u32 = 0x4001_4000;
/// Base address of `PIO0`.
pub const PIO0_BASE: u32 = 0x5020_0000;
/// Base address of `PIO1`.
pub const PIO1_BASE: u32 = 0x5030_0000;
/// Base address of the emulator's `MASTERCLK`.
pub const MASTERCLK_BASE: u32 = 0x5800_0000;
/// Base address of the emulator's `GPIO_EMU`.
pub const GPIO_EMU_BASE: u32 = 0x5800_4000;
/// Base address of the emulator's `PIO0_EMU`.
pub const PIO0_EMU_BASE: u32 = 0x5800_8000;
/// Base address of the emulator's `PIO1_EMU`.
pub const PIO1_EMU_BASE: u32 = 0x5800_C000;

/// Register-set region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// GPIO function select and status.
    IoBank0,
    /// Hardware registers of PIO block `n`.
    Pio(usize),
    /// Master clock control.
    MasterClock,
    /// External pin inputs and pad views.
    GpioEmu,
    /// Emulator-internal view of PIO block `n`.
    PioEmu(usize),
}

impl Region {
    /// Base address of the region.
    #[must_use]
    pub const fn base(self) -> u32 {
        match self {
            Self::IoBank0 => IO_BANK0_BASE,
            Self::Pio(0) => PIO0_BASE,
            Self::Pio(_) => PIO1_BASE,
            Self::MasterClock => MASTERCLK_BASE,
            Self::GpioEmu => GPIO_EMU_BASE,
            Self::PioEmu(0) => PIO0_EMU_BASE,
            Self::PioEmu(_) => PIO1_EMU_BASE,
        }
    }

    /// Region whose plain alias starts at `base`.
    #[must_use]
    pub const fn from_base(base: u32) -> Option<Self> {
        Some(match base {
            IO_BANK0_BASE => Self::IoBank0,
            PIO0_BASE => Self::Pio(0),
            PIO1_BASE => Self::Pio(1),
            MASTERCLK_BASE => Self::MasterClock,
            GPIO_EMU_BASE => Self::GpioEmu,
            PIO0_EMU_BASE => Self::PioEmu(0),
            PIO1_EMU_BASE => Self::PioEmu(1),
            _ => return None,
        })
    }
}

/// Every region in ascending address order.
pub const REGIONS: [Region; 7] = [
    Region::IoBank0,
    Region::Pio(0),
    Region::Pio(1),
    Region::MasterClock,
    Region::GpioEmu,
    Region::PioEmu(0),
    Region::PioEmu(1),
];

const _: () = assert_region_layout();

const fn assert_region_layout() {
    let mut index = 0;
    while index < REGIONS.len() {
        let base = REGIONS[index].base();
        assert!(base % REGION_SIZE == 0, "regions must be region-aligned");
        if index > 0 {
            assert!(
                REGIONS[index - 1].base() + REGION_SIZE <= base,
                "regions must not overlap"
            );
        }
        index += 1;
    }
}

/// Atomic access alias selected by address bits 13:12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alias {
    /// Plain read/write.
    Normal,
    /// Atomic XOR on write.
    Xor,
    /// Atomic bitmask set on write.
    Set,
    /// Atomic bitmask clear on write.
    Clear,
}

impl Alias {
    /// Decodes address bits 13:12.
    #[must_use]
    pub const fn from_address(address: u32) -> Self {
        match (address >> 12) & 0b11 {
            0 => Self::Normal,
            1 => Self::Xor,
            2 => Self::Set,
            _ => Self::Clear,
        }
    }

    /// Offset of the alias window from the region base.
    #[must_use]
    pub const fn offset(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Xor => ALIAS_WINDOW,
            Self::Set => 2 * ALIAS_WINDOW,
            Self::Clear => 3 * ALIAS_WINDOW,
        }
    }

    /// Label suffix, empty for the plain alias.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Xor => "_XOR",
            Self::Set => "_SET",
            Self::Clear => "_CLR",
        }
    }

    /// `(bits, mask, xor)` for writing `value` under `mask` through this
    /// alias.
    #[must_use]
    pub const fn write_operands(self, value: u32, mask: u32) -> (u32, u32, bool) {
        match self {
            Self::Normal => (value, mask, false),
            Self::Xor => (value, value & mask, true),
            Self::Set => (value, value & mask, false),
            Self::Clear => (0, value & mask, false),
        }
    }
}

/// A decoded word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedAddress {
    /// Owning region.
    pub region: Region,
    /// Alias window.
    pub alias: Alias,
    /// Word index inside the region.
    pub index: usize,
}

/// Splits `address` into region, alias and register index.
///
/// # Errors
///
/// Returns [`AccessError::MisalignedAddress`] for addresses that are not
/// 4-byte aligned and [`AccessError::UnsupportedAddress`] when no region
/// covers the address.
pub fn decode_address(address: u32) -> Result<DecodedAddress, AccessError> {
    if address % 4 != 0 {
        return Err(AccessError::MisalignedAddress(address));
    }
    let region = Region::from_base(address & !(REGION_SIZE - 1))
        .ok_or(AccessError::UnsupportedAddress(address))?;
    Ok(DecodedAddress {
        region,
        alias: Alias::from_address(address),
        index: ((address & (ALIAS_WINDOW - 1)) >> 2) as usize,
    })
}

/// Address of register `index` of `region` through `alias`.
#[must_use]
pub const fn encode_address(region: Region, alias: Alias, index: usize) -> u32 {
    region.base() + alias.offset() + 4 * index as u32
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{decode_address, encode_address, Alias, Region, REGIONS};
    use crate::error::AccessError;
    use crate::registers::apply_write;

    #[rstest]
    #[case(0x5020_0000, Region::Pio(0), Alias::Normal, 0)]
    #[case(0x5020_00CC, Region::Pio(0), Alias::Normal, 51)]
    #[case(0x5030_1004, Region::Pio(1), Alias::Xor, 1)]
    #[case(0x5800_2014, Region::MasterClock, Alias::Set, 5)]
    #[case(0x4001_7004, Region::IoBank0, Alias::Clear, 1)]
    #[case(0x5800_C140, Region::PioEmu(1), Alias::Normal, 80)]
    fn decodes_region_alias_and_index(
        #[case] address: u32,
        #[case] region: Region,
        #[case] alias: Alias,
        #[case] index: usize,
    ) {
        let decoded = decode_address(address).expect("supported");
        assert_eq!(decoded.region, region);
        assert_eq!(decoded.alias, alias);
        assert_eq!(decoded.index, index);
        assert_eq!(encode_address(region, alias, index), address);
    }

    #[test]
    fn rejects_misaligned_and_unmapped_addresses() {
        assert_eq!(
            decode_address(0x5020_0002),
            Err(AccessError::MisalignedAddress(0x5020_0002))
        );
        assert_eq!(
            decode_address(0x1000_0000),
            Err(AccessError::UnsupportedAddress(0x1000_0000))
        );
    }

    #[test]
    fn every_region_base_round_trips() {
        for region in REGIONS {
            assert_eq!(Region::from_base(region.base()), Some(region));
        }
    }

    #[rstest]
    #[case(Alias::Normal, 0x1234_5678, 0x1234_5678)]
    #[case(Alias::Xor, 0xFFFF_0000, 0xF0F0_0F0F)]
    #[case(Alias::Set, 0xFFFF_0000, 0xFFFF_0F0F)]
    #[case(Alias::Clear, 0xFFFF_FFFF, 0x0000_0000)]
    #[case(Alias::Clear, 0x0000_000F, 0x0F0F_0F00)]
    fn alias_writes_on_0f0f0f0f(#[case] alias: Alias, #[case] value: u32, #[case] expected: u32) {
        let (bits, mask, xor) = alias.write_operands(value, u32::MAX);
        assert_eq!(apply_write(0x0F0F_0F0F, bits, mask, xor), expected);
    }
}
