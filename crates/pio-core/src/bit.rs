//! One-bit signal values, pin directions and their conversion rules.

use std::fmt;
use std::ops::Not;

/// Logic level of a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Bit {
    /// Logic 0.
    #[default]
    Low = 0,
    /// Logic 1.
    High = 1,
}

impl Bit {
    /// Takes the least significant bit of `value`.
    #[must_use]
    pub const fn from_lsb(value: u32) -> Self {
        if value & 1 == 0 {
            Self::Low
        } else {
            Self::High
        }
    }

    /// Extracts bit `index` of `value`.
    #[must_use]
    pub const fn from_bit(value: u32, index: u32) -> Self {
        Self::from_lsb(value >> (index & 0x1F))
    }

    /// Numeric value (0 or 1).
    #[must_use]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Returns `true` for [`Bit::High`].
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    /// Returns the opposite level.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<Bit> for bool {
    fn from(value: Bit) -> Self {
        value.is_high()
    }
}

impl Not for Bit {
    type Output = Self;

    fn not(self) -> Self {
        self.inverted()
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Direction of a pin as seen by the driving peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Direction {
    /// Output disabled; the pad is an input.
    #[default]
    In = 0,
    /// Output enabled.
    Out = 1,
}

impl Direction {
    /// Takes the least significant bit of `value` (1 = output).
    #[must_use]
    pub const fn from_lsb(value: u32) -> Self {
        Self::from_bit(Bit::from_lsb(value))
    }

    /// Output-enable bit to direction: `High` means output.
    #[must_use]
    pub const fn from_bit(bit: Bit) -> Self {
        match bit {
            Bit::Low => Self::In,
            Bit::High => Self::Out,
        }
    }

    /// Direction to output-enable bit.
    #[must_use]
    pub const fn to_bit(self) -> Bit {
        match self {
            Self::In => Bit::Low,
            Self::Out => Bit::High,
        }
    }

    /// Numeric value (0 = in, 1 = out).
    #[must_use]
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Returns the opposite direction.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("in"),
            Self::Out => f.write_str("out"),
        }
    }
}

/// Combined direction and level of one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PinState {
    /// Output-enable state.
    pub direction: Direction,
    /// Driven (or sampled) level.
    pub level: Bit,
}

impl PinState {
    /// Creates a pin state.
    #[must_use]
    pub const fn new(direction: Direction, level: Bit) -> Self {
        Self { direction, level }
    }

    /// Single-character rendering used by pin dumps: `0`/`1` for driven
    /// outputs, `.`/`'` for inputs.
    #[must_use]
    pub const fn as_char(self) -> char {
        match (self.direction, self.level) {
            (Direction::Out, Bit::Low) => '0',
            (Direction::Out, Bit::High) => '1',
            (Direction::In, Bit::Low) => '.',
            (Direction::In, Bit::High) => '\'',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Bit, Direction, PinState};

    #[test]
    fn bit_conversions_follow_least_significant_bit() {
        assert_eq!(Bit::from_lsb(0), Bit::Low);
        assert_eq!(Bit::from_lsb(3), Bit::High);
        assert_eq!(Bit::from_bit(0x8000_0000, 31), Bit::High);
        assert_eq!(Bit::from_bit(0x8000_0000, 30), Bit::Low);
        assert_eq!(Bit::from(true), Bit::High);
        assert!(bool::from(Bit::High));
        assert_eq!(!Bit::Low, Bit::High);
    }

    #[test]
    fn direction_maps_to_output_enable_bit() {
        assert_eq!(Direction::from_bit(Bit::High), Direction::Out);
        assert_eq!(Direction::from_lsb(0), Direction::In);
        assert_eq!(Direction::Out.to_bit(), Bit::High);
        assert_eq!(Direction::In.inverted(), Direction::Out);
    }

    #[test]
    fn pin_state_renders_compactly() {
        assert_eq!(PinState::new(Direction::Out, Bit::High).as_char(), '1');
        assert_eq!(PinState::new(Direction::In, Bit::Low).as_char(), '.');
    }
}
