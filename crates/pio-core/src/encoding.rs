//! Primary opcode classification and delay/side-set bit packing.

/// Instruction kinds selected by the primary opcode (bits 15:13, plus bit 7
/// for `PUSH`/`PULL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeKind {
    Jmp,
    Wait,
    In,
    Out,
    Push,
    Pull,
    Mov,
    Irq,
    Set,
}

impl OpcodeKind {
    /// Lower-case mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Jmp => "jmp",
            Self::Wait => "wait",
            Self::In => "in",
            Self::Out => "out",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Mov => "mov",
            Self::Irq => "irq",
            Self::Set => "set",
        }
    }
}

/// Extracts the 3-bit primary opcode.
#[must_use]
pub const fn primary_opcode(word: u16) -> u8 {
    ((word >> 13) & 0x7) as u8
}

/// Extracts the 5-bit delay/side-set field (bits 12:8).
#[must_use]
pub const fn delay_side_set_field(word: u16) -> u8 {
    ((word >> 8) & 0x1F) as u8
}

/// Extracts the kind-specific operand byte (bits 7:0).
#[must_use]
pub const fn operand_byte(word: u16) -> u8 {
    (word & 0xFF) as u8
}

/// Classifies an instruction word. Every word has a kind; operand validity is
/// checked by the decoder.
#[must_use]
pub const fn classify_opcode(word: u16) -> OpcodeKind {
    match primary_opcode(word) {
        0b000 => OpcodeKind::Jmp,
        0b001 => OpcodeKind::Wait,
        0b010 => OpcodeKind::In,
        0b011 => OpcodeKind::Out,
        0b100 => {
            if word & 0x80 == 0 {
                OpcodeKind::Push
            } else {
                OpcodeKind::Pull
            }
        }
        0b101 => OpcodeKind::Mov,
        0b110 => OpcodeKind::Irq,
        _ => OpcodeKind::Set,
    }
}

/// How the 5-bit delay/side-set field is split for one state machine
/// configuration.
///
/// `count` side-set data bits occupy the top of the field. With `optional`
/// set (and `count > 0`), one more bit above them (instruction bit 12) flags
/// whether the instruction carries a side-set at all. The remaining low bits
/// hold the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SideSetLayout {
    data_bits: u8,
    optional: bool,
}

impl SideSetLayout {
    /// Layout without any side-set bits: all five bits are delay.
    pub const NONE: Self = Self {
        data_bits: 0,
        optional: false,
    };

    /// Builds the layout for `count` side-set pins (`SIDESET_COUNT`) and the
    /// `SIDE_EN` flag. Counts that would overflow the field are clamped.
    #[must_use]
    pub const fn new(count: u8, optional: bool) -> Self {
        let optional = optional && count > 0;
        let limit = if optional { 4 } else { 5 };
        let data_bits = if count > limit { limit } else { count };
        Self {
            data_bits,
            optional,
        }
    }

    /// Number of side-set data bits.
    #[must_use]
    pub const fn data_bits(self) -> u8 {
        self.data_bits
    }

    /// Whether bit 12 is an enable flag.
    #[must_use]
    pub const fn optional(self) -> bool {
        self.optional
    }

    /// Number of delay bits (`5 - count`, minus one more for the enable bit).
    #[must_use]
    pub const fn delay_bits(self) -> u8 {
        5 - self.data_bits - self.optional as u8
    }

    /// Largest encodable delay.
    #[must_use]
    pub const fn max_delay(self) -> u8 {
        (1 << self.delay_bits()) - 1
    }

    /// Largest encodable side-set value.
    #[must_use]
    pub const fn max_side_set(self) -> u8 {
        ((1u16 << self.data_bits) - 1) as u8
    }

    /// Splits a raw field into `(delay, side_set, side_set_enabled)`.
    #[must_use]
    pub const fn split(self, field: u8) -> (u8, u8, bool) {
        let field = field & 0x1F;
        let delay = field & self.max_delay();
        let side_set = (field >> self.delay_bits()) & self.max_side_set();
        let enabled = if self.optional {
            field & 0x10 != 0
        } else {
            self.data_bits > 0
        };
        if enabled {
            (delay, side_set, true)
        } else {
            (delay, 0, false)
        }
    }

    /// Packs `(delay, side_set, side_set_enabled)` back into a raw field.
    #[must_use]
    pub const fn join(self, delay: u8, side_set: u8, enabled: bool) -> u8 {
        let mut field = delay & self.max_delay();
        if enabled && self.data_bits > 0 {
            field |= (side_set & self.max_side_set()) << self.delay_bits();
        }
        if self.optional && enabled {
            field |= 0x10;
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        classify_opcode, delay_side_set_field, operand_byte, primary_opcode, OpcodeKind,
        SideSetLayout,
    };

    /// `(primary opcode, bit 7, kind)`. `None` means bit 7 belongs to the operand.
    const OPCODE_KIND_TABLE: &[(u8, Option<bool>, OpcodeKind)] = &[
        (0b000, None, OpcodeKind::Jmp),
        (0b001, None, OpcodeKind::Wait),
        (0b010, None, OpcodeKind::In),
        (0b011, None, OpcodeKind::Out),
        (0b100, Some(false), OpcodeKind::Push),
        (0b100, Some(true), OpcodeKind::Pull),
        (0b101, None, OpcodeKind::Mov),
        (0b110, None, OpcodeKind::Irq),
        (0b111, None, OpcodeKind::Set),
    ];

    #[test]
    fn table_contains_unique_opcode_pairs() {
        let pairs: HashSet<_> = OPCODE_KIND_TABLE
            .iter()
            .map(|(op, bit7, _)| (*op, *bit7))
            .collect();
        assert_eq!(pairs.len(), OPCODE_KIND_TABLE.len());
    }

    #[test]
    fn every_table_entry_resolves_via_classification() {
        for (op, bit7, kind) in OPCODE_KIND_TABLE {
            let word = (u16::from(*op) << 13) | if *bit7 == Some(true) { 0x80 } else { 0 };
            assert_eq!(classify_opcode(word), *kind);
        }
    }

    #[test]
    fn field_extraction_splits_word() {
        let word = 0b101_10110_1100_0011_u16;
        assert_eq!(primary_opcode(word), 0b101);
        assert_eq!(delay_side_set_field(word), 0b10110);
        assert_eq!(operand_byte(word), 0b1100_0011);
        assert_eq!(classify_opcode(word), OpcodeKind::Mov);
    }

    #[test]
    fn layout_without_side_set_is_all_delay() {
        let layout = SideSetLayout::NONE;
        assert_eq!(layout.delay_bits(), 5);
        assert_eq!(layout.max_delay(), 31);
        assert_eq!(layout.split(0x1F), (31, 0, false));
    }

    #[test]
    fn mandatory_side_set_uses_top_bits() {
        let layout = SideSetLayout::new(2, false);
        assert_eq!(layout.delay_bits(), 3);
        assert_eq!(layout.split(0b10_101), (0b101, 0b10, true));
        assert_eq!(layout.join(0b101, 0b10, true), 0b10_101);
    }

    #[test]
    fn optional_side_set_reserves_enable_bit() {
        let layout = SideSetLayout::new(1, true);
        assert_eq!(layout.delay_bits(), 3);
        assert_eq!(layout.max_delay(), 7);
        assert_eq!(layout.split(0b1_1_011), (3, 1, true));
        assert_eq!(layout.split(0b0_1_011), (3, 0, false));
        assert_eq!(layout.join(3, 1, true), 0b1_1_011);
    }

    #[test]
    fn oversized_counts_are_clamped() {
        assert_eq!(SideSetLayout::new(7, false).data_bits(), 5);
        assert_eq!(SideSetLayout::new(7, true).data_bits(), 4);
        assert_eq!(SideSetLayout::new(7, true).delay_bits(), 0);
    }

    #[test]
    fn optional_flag_without_count_is_ignored() {
        let layout = SideSetLayout::new(0, true);
        assert!(!layout.optional());
        assert_eq!(layout.delay_bits(), 5);
    }

    #[test]
    fn delay_never_exceeds_budget_with_enable_bit() {
        for count in 1u8..=4 {
            let layout = SideSetLayout::new(count, true);
            let budget = (1u8 << (5 - count - 1)) - 1;
            for field in 0u8..32 {
                let (delay, _, _) = layout.split(field);
                assert!(delay <= budget, "count {count} field {field:#07b}");
            }
        }
    }
}
