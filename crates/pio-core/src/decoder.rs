//! Instruction decoder.
//!
//! Decoding is a pure function of the instruction word and the state
//! machine's side-set layout. Reserved encodings are rejected with a
//! [`DecodeError`] that carries the raw word.

use crate::bit::Bit;
use crate::encoding::{classify_opcode, delay_side_set_field, operand_byte, OpcodeKind, SideSetLayout};
use crate::error::{DecodeError, DecodeFailure};
use crate::instruction::{
    InSource, Instruction, InstructionKind, JmpCondition, MovDestination, MovOperation, MovSource,
    OutDestination, SetDestination, WaitSource,
};

const fn bit_count(operand: u8) -> u8 {
    match operand & 0x1F {
        0 => 32,
        count => count,
    }
}

const fn has_reserved_irq_index_bit(index: u8) -> bool {
    index & 0x08 != 0
}

/// Decodes the kind-specific low byte of `word`.
///
/// # Errors
///
/// Returns the matching [`DecodeFailure`] for reserved operand encodings.
pub const fn decode_kind(word: u16) -> Result<InstructionKind, DecodeFailure> {
    let operand = operand_byte(word);
    let upper = (operand >> 5) & 0x7;
    let kind = match classify_opcode(word) {
        OpcodeKind::Jmp => InstructionKind::Jmp {
            condition: JmpCondition::from_u3(upper),
            address: operand & 0x1F,
        },
        OpcodeKind::Wait => {
            let Some(source) = WaitSource::from_u2(upper & 0x3) else {
                return Err(DecodeFailure::ReservedWaitSource);
            };
            let index = operand & 0x1F;
            if matches!(source, WaitSource::Irq) && has_reserved_irq_index_bit(index) {
                return Err(DecodeFailure::InvalidIrqIndex);
            }
            InstructionKind::Wait {
                polarity: Bit::from_lsb((operand >> 7) as u32),
                source,
                index,
            }
        }
        OpcodeKind::In => {
            let Some(source) = InSource::from_u3(upper) else {
                return Err(DecodeFailure::ReservedInSource);
            };
            InstructionKind::In {
                source,
                bit_count: bit_count(operand),
            }
        }
        OpcodeKind::Out => InstructionKind::Out {
            destination: OutDestination::from_u3(upper),
            bit_count: bit_count(operand),
        },
        OpcodeKind::Push | OpcodeKind::Pull => {
            if operand & 0x1F != 0 {
                return Err(DecodeFailure::NonZeroPushPullBits);
            }
            let conditional = operand & 0x40 != 0;
            let block = operand & 0x20 != 0;
            if operand & 0x80 == 0 {
                InstructionKind::Push {
                    if_full: conditional,
                    block,
                }
            } else {
                InstructionKind::Pull {
                    if_empty: conditional,
                    block,
                }
            }
        }
        OpcodeKind::Mov => {
            let Some(destination) = MovDestination::from_u3(upper) else {
                return Err(DecodeFailure::ReservedMovDestination);
            };
            let Some(operation) = MovOperation::from_u2((operand >> 3) & 0x3) else {
                return Err(DecodeFailure::ReservedMovOperation);
            };
            let Some(source) = MovSource::from_u3(operand & 0x7) else {
                return Err(DecodeFailure::ReservedMovSource);
            };
            InstructionKind::Mov {
                destination,
                operation,
                source,
            }
        }
        OpcodeKind::Irq => {
            if operand & 0x80 != 0 {
                return Err(DecodeFailure::ReservedIrqBit);
            }
            let index = operand & 0x1F;
            if has_reserved_irq_index_bit(index) {
                return Err(DecodeFailure::InvalidIrqIndex);
            }
            InstructionKind::Irq {
                clear: operand & 0x40 != 0,
                wait: operand & 0x20 != 0,
                index,
            }
        }
        OpcodeKind::Set => {
            let Some(destination) = SetDestination::from_u3(upper) else {
                return Err(DecodeFailure::ReservedSetDestination);
            };
            InstructionKind::Set {
                destination,
                data: operand & 0x1F,
            }
        }
    };
    Ok(kind)
}

/// Decodes a full instruction word under the given side-set layout.
///
/// # Errors
///
/// Returns [`DecodeError`] carrying `word` when any operand field uses a
/// reserved encoding.
pub const fn decode(word: u16, layout: SideSetLayout) -> Result<Instruction, DecodeError> {
    let kind = match decode_kind(word) {
        Ok(kind) => kind,
        Err(reason) => return Err(DecodeError::new(word, reason)),
    };
    let (delay, side_set, side_set_enabled) = layout.split(delay_side_set_field(word));
    Ok(Instruction {
        kind,
        delay,
        side_set,
        side_set_enabled,
        op_code: word,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{decode, decode_kind};
    use crate::encoding::SideSetLayout;
    use crate::error::DecodeFailure;
    use crate::instruction::{InstructionKind, JmpCondition, OutDestination, SetDestination};

    #[rstest]
    #[case(0x2060, DecodeFailure::ReservedWaitSource)]
    #[case(0x4080, DecodeFailure::ReservedInSource)]
    #[case(0x40A0, DecodeFailure::ReservedInSource)]
    #[case(0x8001, DecodeFailure::NonZeroPushPullBits)]
    #[case(0x809F, DecodeFailure::NonZeroPushPullBits)]
    #[case(0xA004, DecodeFailure::ReservedMovSource)]
    #[case(0xA018, DecodeFailure::ReservedMovOperation)]
    #[case(0xA060, DecodeFailure::ReservedMovDestination)]
    #[case(0xC080, DecodeFailure::ReservedIrqBit)]
    #[case(0xC008, DecodeFailure::InvalidIrqIndex)]
    #[case(0x20C8, DecodeFailure::InvalidIrqIndex)]
    #[case(0xE060, DecodeFailure::ReservedSetDestination)]
    #[case(0xE0A0, DecodeFailure::ReservedSetDestination)]
    fn reserved_encodings_are_rejected(#[case] word: u16, #[case] reason: DecodeFailure) {
        let error = decode(word, SideSetLayout::NONE).expect_err("reserved encoding");
        assert_eq!(error.op_code, word);
        assert_eq!(error.reason, reason);
    }

    #[rstest]
    #[case(0x0000, InstructionKind::Jmp { condition: JmpCondition::Always, address: 0 })]
    #[case(0x0045, InstructionKind::Jmp { condition: JmpCondition::XPostDecrement, address: 5 })]
    #[case(0x6020, InstructionKind::Out { destination: OutDestination::X, bit_count: 32 })]
    #[case(0xE081, InstructionKind::Set { destination: SetDestination::PinDirs, data: 1 })]
    #[case(0x80A0, InstructionKind::Pull { if_empty: false, block: true })]
    #[case(0x8000, InstructionKind::Push { if_full: false, block: false })]
    #[case(0xC030, InstructionKind::Irq { clear: false, wait: true, index: 0x10 })]
    fn valid_words_decode(#[case] word: u16, #[case] kind: InstructionKind) {
        assert_eq!(decode_kind(word), Ok(kind));
    }

    #[test]
    fn delay_and_side_set_follow_layout() {
        let instr = decode(0xFF01, SideSetLayout::NONE).expect("set pins, 1 [31]");
        assert_eq!(instr.delay, 31);
        assert!(!instr.side_set_enabled);

        let instr = decode(0xF501, SideSetLayout::new(1, true)).expect("side-set word");
        assert!(instr.side_set_enabled);
        assert_eq!(instr.side_set, 0);
        assert_eq!(instr.delay, 5);
        assert_eq!(instr.op_code, 0xF501);
    }
}
