//! Decoder properties over arbitrary instruction words.

use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use pio_core::{decode, Instruction, Program, SideSetLayout};

fn layouts() -> impl Strategy<Value = SideSetLayout> {
    (0u8..=5, any::<bool>()).prop_map(|(count, optional)| SideSetLayout::new(count, optional))
}

proptest! {
    #[test]
    fn decoding_never_panics_and_reports_the_word(word in any::<u16>(), layout in layouts()) {
        match decode(word, layout) {
            Ok(instruction) => prop_assert_eq!(instruction.op_code, word),
            Err(error) => prop_assert_eq!(error.op_code, word),
        }
    }

    #[test]
    fn decoded_words_encode_back(word in any::<u16>(), layout in layouts()) {
        // Without the enable bit an optional layout drops the side-set data.
        prop_assume!(!layout.optional() || word & 0x1000 != 0);
        if let Ok(instruction) = decode(word, layout) {
            prop_assert_eq!(instruction.encode(layout), word);
        }
    }

    #[test]
    fn assembled_instructions_decode_to_themselves(
        word in any::<u16>(),
        delay in 0u8..32,
        side_set in 0u8..32,
        side_set_enabled in any::<bool>(),
        layout in layouts(),
    ) {
        if let Ok(template) = decode(word, SideSetLayout::NONE) {
            let assembled =
                Instruction::assemble(template.kind, delay, side_set, side_set_enabled, layout);
            prop_assert_eq!(decode(assembled.op_code, layout), Ok(assembled));
            prop_assert!(assembled.delay <= layout.max_delay());
        }
    }
}

#[rstest]
#[case(SideSetLayout::NONE, 0xFF01, "set pins, 1 [31]")]
#[case(SideSetLayout::new(1, false), 0xF501, "set pins, 1 side 1 [5]")]
#[case(SideSetLayout::NONE, 0x80A0, "pull block")]
#[case(SideSetLayout::NONE, 0x6020, "out x, 32")]
fn listing_shows_side_set_and_delay(
    #[case] layout: SideSetLayout,
    #[case] word: u16,
    #[case] text: &str,
) {
    let program = Program::new(vec![word]).expect("fits");
    assert_eq!(program.listing(layout), format!(" 0: {word:04x}  {text}\n"));
}
