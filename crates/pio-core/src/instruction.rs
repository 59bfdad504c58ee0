//! Decoded PIO instruction model and its encoding back to a 16-bit word.

#![allow(missing_docs)]

use std::fmt;

use crate::bit::Bit;
use crate::encoding::SideSetLayout;

/// `JMP` condition (bits 7:5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum JmpCondition {
    Always,
    XZero,
    XPostDecrement,
    YZero,
    YPostDecrement,
    XNotEqualY,
    Pin,
    OsrNotEmpty,
}

impl JmpCondition {
    /// Every 3-bit value names a condition.
    #[must_use]
    pub const fn from_u3(value: u8) -> Self {
        match value & 0x7 {
            0 => Self::Always,
            1 => Self::XZero,
            2 => Self::XPostDecrement,
            3 => Self::YZero,
            4 => Self::YPostDecrement,
            5 => Self::XNotEqualY,
            6 => Self::Pin,
            _ => Self::OsrNotEmpty,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        self as u8
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Always => "",
            Self::XZero => "!x",
            Self::XPostDecrement => "x--",
            Self::YZero => "!y",
            Self::YPostDecrement => "y--",
            Self::XNotEqualY => "x!=y",
            Self::Pin => "pin",
            Self::OsrNotEmpty => "!osre",
        }
    }
}

/// `WAIT` source (bits 6:5). `0b11` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WaitSource {
    Gpio,
    Pin,
    Irq,
}

impl WaitSource {
    #[must_use]
    pub const fn from_u2(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Gpio),
            1 => Some(Self::Pin),
            2 => Some(Self::Irq),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u2(self) -> u8 {
        self as u8
    }
}

/// `IN` source (bits 7:5). `0b100` and `0b101` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InSource {
    Pins,
    X,
    Y,
    Null,
    Isr,
    Osr,
}

impl InSource {
    #[must_use]
    pub const fn from_u3(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pins),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            3 => Some(Self::Null),
            6 => Some(Self::Isr),
            7 => Some(Self::Osr),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        match self {
            Self::Pins => 0,
            Self::X => 1,
            Self::Y => 2,
            Self::Null => 3,
            Self::Isr => 6,
            Self::Osr => 7,
        }
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Pins => "pins",
            Self::X => "x",
            Self::Y => "y",
            Self::Null => "null",
            Self::Isr => "isr",
            Self::Osr => "osr",
        }
    }
}

/// `OUT` destination (bits 7:5). All eight encodings are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OutDestination {
    Pins,
    X,
    Y,
    Null,
    PinDirs,
    Pc,
    Isr,
    Exec,
}

impl OutDestination {
    #[must_use]
    pub const fn from_u3(value: u8) -> Self {
        match value & 0x7 {
            0 => Self::Pins,
            1 => Self::X,
            2 => Self::Y,
            3 => Self::Null,
            4 => Self::PinDirs,
            5 => Self::Pc,
            6 => Self::Isr,
            _ => Self::Exec,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        self as u8
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Pins => "pins",
            Self::X => "x",
            Self::Y => "y",
            Self::Null => "null",
            Self::PinDirs => "pindirs",
            Self::Pc => "pc",
            Self::Isr => "isr",
            Self::Exec => "exec",
        }
    }
}

/// `MOV` source (bits 2:0). `0b100` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MovSource {
    Pins,
    X,
    Y,
    Null,
    Status,
    Isr,
    Osr,
}

impl MovSource {
    #[must_use]
    pub const fn from_u3(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pins),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            3 => Some(Self::Null),
            5 => Some(Self::Status),
            6 => Some(Self::Isr),
            7 => Some(Self::Osr),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        match self {
            Self::Pins => 0,
            Self::X => 1,
            Self::Y => 2,
            Self::Null => 3,
            Self::Status => 5,
            Self::Isr => 6,
            Self::Osr => 7,
        }
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Pins => "pins",
            Self::X => "x",
            Self::Y => "y",
            Self::Null => "null",
            Self::Status => "status",
            Self::Isr => "isr",
            Self::Osr => "osr",
        }
    }
}

/// `MOV` operation (bits 4:3). `0b11` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MovOperation {
    None,
    Invert,
    BitReverse,
}

impl MovOperation {
    #[must_use]
    pub const fn from_u2(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Invert),
            2 => Some(Self::BitReverse),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u2(self) -> u8 {
        self as u8
    }

    /// Applies the operation to a source value.
    #[must_use]
    pub const fn apply(self, value: u32) -> u32 {
        match self {
            Self::None => value,
            Self::Invert => !value,
            Self::BitReverse => value.reverse_bits(),
        }
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Invert => "!",
            Self::BitReverse => "::",
        }
    }
}

/// `MOV` destination (bits 7:5). `0b011` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MovDestination {
    Pins,
    X,
    Y,
    Exec,
    Pc,
    Isr,
    Osr,
}

impl MovDestination {
    #[must_use]
    pub const fn from_u3(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pins),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            4 => Some(Self::Exec),
            5 => Some(Self::Pc),
            6 => Some(Self::Isr),
            7 => Some(Self::Osr),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        match self {
            Self::Pins => 0,
            Self::X => 1,
            Self::Y => 2,
            Self::Exec => 4,
            Self::Pc => 5,
            Self::Isr => 6,
            Self::Osr => 7,
        }
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Pins => "pins",
            Self::X => "x",
            Self::Y => "y",
            Self::Exec => "exec",
            Self::Pc => "pc",
            Self::Isr => "isr",
            Self::Osr => "osr",
        }
    }
}

/// `SET` destination (bits 7:5). `0b011` and `0b101..=0b111` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SetDestination {
    Pins,
    X,
    Y,
    PinDirs,
}

impl SetDestination {
    #[must_use]
    pub const fn from_u3(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pins),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            4 => Some(Self::PinDirs),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_u3(self) -> u8 {
        match self {
            Self::Pins => 0,
            Self::X => 1,
            Self::Y => 2,
            Self::PinDirs => 4,
        }
    }

    const fn syntax(self) -> &'static str {
        match self {
            Self::Pins => "pins",
            Self::X => "x",
            Self::Y => "y",
            Self::PinDirs => "pindirs",
        }
    }
}

/// Kind-specific operands of a decoded instruction.
///
/// Shift counts are stored as `1..=32`; the encoded value `0` means 32.
/// IRQ indices keep the raw 5-bit field including the relative flag (bit 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionKind {
    Jmp {
        condition: JmpCondition,
        address: u8,
    },
    Wait {
        polarity: Bit,
        source: WaitSource,
        index: u8,
    },
    In {
        source: InSource,
        bit_count: u8,
    },
    Out {
        destination: OutDestination,
        bit_count: u8,
    },
    Push {
        if_full: bool,
        block: bool,
    },
    Pull {
        if_empty: bool,
        block: bool,
    },
    Mov {
        destination: MovDestination,
        operation: MovOperation,
        source: MovSource,
    },
    Irq {
        clear: bool,
        wait: bool,
        index: u8,
    },
    Set {
        destination: SetDestination,
        data: u8,
    },
}

const fn encode_bit_count(count: u8) -> u16 {
    (count & 0x1F) as u16
}

const fn flag(value: bool, shift: u16) -> u16 {
    (value as u16) << shift
}

impl InstructionKind {
    /// Encodes opcode and operand bits, leaving the delay/side-set field zero.
    #[must_use]
    pub const fn encode(self) -> u16 {
        match self {
            Self::Jmp { condition, address } => {
                ((condition.to_u3() as u16) << 5) | (address & 0x1F) as u16
            }
            Self::Wait {
                polarity,
                source,
                index,
            } => {
                0x2000
                    | ((polarity as u16) << 7)
                    | ((source.to_u2() as u16) << 5)
                    | (index & 0x1F) as u16
            }
            Self::In { source, bit_count } => {
                0x4000 | ((source.to_u3() as u16) << 5) | encode_bit_count(bit_count)
            }
            Self::Out {
                destination,
                bit_count,
            } => 0x6000 | ((destination.to_u3() as u16) << 5) | encode_bit_count(bit_count),
            Self::Push { if_full, block } => 0x8000 | flag(if_full, 6) | flag(block, 5),
            Self::Pull { if_empty, block } => 0x8080 | flag(if_empty, 6) | flag(block, 5),
            Self::Mov {
                destination,
                operation,
                source,
            } => {
                0xA000
                    | ((destination.to_u3() as u16) << 5)
                    | ((operation.to_u2() as u16) << 3)
                    | source.to_u3() as u16
            }
            Self::Irq { clear, wait, index } => {
                0xC000 | flag(clear, 6) | flag(wait, 5) | (index & 0x1F) as u16
            }
            Self::Set { destination, data } => {
                0xE000 | ((destination.to_u3() as u16) << 5) | (data & 0x1F) as u16
            }
        }
    }

    /// Canonical no-op: `mov y, y`.
    pub const NOP: Self = Self::Mov {
        destination: MovDestination::Y,
        operation: MovOperation::None,
        source: MovSource::Y,
    };
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    /// Kind and operands.
    pub kind: InstructionKind,
    /// Delay cycles applied after completion.
    pub delay: u8,
    /// Side-set value (0 when disabled).
    pub side_set: u8,
    /// Whether a side-set is performed.
    pub side_set_enabled: bool,
    /// Raw instruction word this was decoded from.
    pub op_code: u16,
}

impl Instruction {
    /// Builds an instruction and computes its word under `layout`.
    ///
    /// Delay and side-set values wider than the layout allows are truncated.
    #[must_use]
    pub const fn assemble(
        kind: InstructionKind,
        delay: u8,
        side_set: u8,
        side_set_enabled: bool,
        layout: SideSetLayout,
    ) -> Self {
        let side_set_enabled = side_set_enabled && layout.data_bits() > 0;
        let field = layout.join(delay, side_set, side_set_enabled);
        let (delay, side_set, side_set_enabled) = layout.split(field);
        Self {
            kind,
            delay,
            side_set,
            side_set_enabled,
            op_code: kind.encode() | ((field as u16) << 8),
        }
    }

    /// Re-encodes the instruction under `layout`.
    #[must_use]
    pub const fn encode(&self, layout: SideSetLayout) -> u16 {
        let field = layout.join(self.delay, self.side_set, self.side_set_enabled);
        self.kind.encode() | ((field as u16) << 8)
    }

    /// Returns `true` for `mov y, y`.
    #[must_use]
    pub fn is_nop(&self) -> bool {
        self.kind == InstructionKind::NOP
    }
}

/// Resolves an IRQ index field to a flag number.
///
/// Relative indices (bit 4 set) add the state machine number modulo 4.
#[must_use]
pub const fn irq_flag_index(index: u8, sm: u8) -> u8 {
    if index & 0x10 != 0 {
        sm.wrapping_add(index) & 0x3
    } else {
        index & 0x7
    }
}

fn write_irq_index(f: &mut fmt::Formatter<'_>, index: u8) -> fmt::Result {
    if index & 0x10 != 0 {
        write!(f, "{} rel", index & 0x7)
    } else {
        write!(f, "{}", index & 0x7)
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Jmp {
                condition: JmpCondition::Always,
                address,
            } => write!(f, "jmp {address}"),
            Self::Jmp { condition, address } => write!(f, "jmp {}, {address}", condition.syntax()),
            Self::Wait {
                polarity,
                source: WaitSource::Irq,
                index,
            } => {
                write!(f, "wait {polarity} irq ")?;
                write_irq_index(f, index)
            }
            Self::Wait {
                polarity,
                source,
                index,
            } => {
                let name = if source == WaitSource::Gpio { "gpio" } else { "pin" };
                write!(f, "wait {polarity} {name} {index}")
            }
            Self::In { source, bit_count } => write!(f, "in {}, {bit_count}", source.syntax()),
            Self::Out {
                destination,
                bit_count,
            } => write!(f, "out {}, {bit_count}", destination.syntax()),
            Self::Push { if_full, block } => {
                f.write_str("push")?;
                if if_full {
                    f.write_str(" iffull")?;
                }
                f.write_str(if block { " block" } else { " noblock" })
            }
            Self::Pull { if_empty, block } => {
                f.write_str("pull")?;
                if if_empty {
                    f.write_str(" ifempty")?;
                }
                f.write_str(if block { " block" } else { " noblock" })
            }
            Self::Mov {
                destination: MovDestination::Y,
                operation: MovOperation::None,
                source: MovSource::Y,
            } => f.write_str("nop"),
            Self::Mov {
                destination,
                operation,
                source,
            } => write!(
                f,
                "mov {}, {}{}",
                destination.syntax(),
                operation.syntax(),
                source.syntax()
            ),
            Self::Irq { clear, wait, index } => {
                let verb = if clear {
                    "clear"
                } else if wait {
                    "wait"
                } else {
                    "set"
                };
                write!(f, "irq {verb} ")?;
                write_irq_index(f, index)
            }
            Self::Set { destination, data } => write!(f, "set {}, {data}", destination.syntax()),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.side_set_enabled {
            write!(f, " side {}", self.side_set)?;
        }
        if self.delay > 0 {
            write!(f, " [{}]", self.delay)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        irq_flag_index, InSource, Instruction, InstructionKind, JmpCondition, MovDestination,
        MovOperation, MovSource, OutDestination, SetDestination,
    };
    use crate::bit::Bit;
    use crate::encoding::SideSetLayout;

    #[test]
    fn known_words_encode_like_the_assembler() {
        let set_pins = InstructionKind::Set {
            destination: SetDestination::Pins,
            data: 1,
        };
        assert_eq!(set_pins.encode(), 0xE001);
        assert_eq!(
            Instruction::assemble(set_pins, 31, 0, false, SideSetLayout::NONE).op_code,
            0xFF01
        );
        assert_eq!(InstructionKind::NOP.encode(), 0xA042);
        assert_eq!(
            InstructionKind::Pull {
                if_empty: false,
                block: true
            }
            .encode(),
            0x80A0
        );
        assert_eq!(
            InstructionKind::Push {
                if_full: false,
                block: true
            }
            .encode(),
            0x8020
        );
        assert_eq!(
            InstructionKind::Out {
                destination: OutDestination::Pins,
                bit_count: 32
            }
            .encode(),
            0x6000
        );
    }

    #[test]
    fn relative_irq_index_wraps_within_four_flags() {
        assert_eq!(irq_flag_index(0x10, 2), 2);
        assert_eq!(irq_flag_index(0x13, 2), 1);
        assert_eq!(irq_flag_index(0x05, 3), 5);
    }

    #[test]
    fn display_uses_assembler_syntax() {
        let layout = SideSetLayout::new(1, false);
        let jmp = Instruction::assemble(
            InstructionKind::Jmp {
                condition: JmpCondition::XPostDecrement,
                address: 3,
            },
            2,
            1,
            true,
            layout,
        );
        assert_eq!(jmp.to_string(), "jmp x--, 3 side 1 [2]");

        let nop = Instruction::assemble(InstructionKind::NOP, 0, 0, false, SideSetLayout::NONE);
        assert_eq!(nop.to_string(), "nop");
        assert!(nop.is_nop());

        let mov = InstructionKind::Mov {
            destination: MovDestination::Isr,
            operation: MovOperation::BitReverse,
            source: MovSource::Osr,
        };
        assert_eq!(mov.to_string(), "mov isr, ::osr");

        let input = InstructionKind::In {
            source: InSource::Pins,
            bit_count: 32,
        };
        assert_eq!(input.to_string(), "in pins, 32");

        let wait = InstructionKind::Wait {
            polarity: Bit::High,
            source: super::WaitSource::Irq,
            index: 0x12,
        };
        assert_eq!(wait.to_string(), "wait 1 irq 2 rel");
    }

    #[test]
    fn mov_operations_transform_values() {
        assert_eq!(MovOperation::Invert.apply(0x0F), 0xFFFF_FFF0);
        assert_eq!(MovOperation::BitReverse.apply(1), 0x8000_0000);
        assert_eq!(MovOperation::None.apply(7), 7);
    }
}
