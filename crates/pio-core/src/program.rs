//! PIO program images.
//!
//! The text format holds one hexadecimal instruction word per line. Lines
//! starting with `#` are comments, except `# .origin N` (or `#.origin N`)
//! which fixes the load offset. The binary format is a sequence of
//! big-endian 16-bit words.

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::decoder::decode;
use crate::encoding::SideSetLayout;
use crate::error::ProgramError;
use crate::sm::INSTRUCTION_MEMORY_SIZE;

/// A program image ready to be copied into instruction memory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    /// Fixed load offset, if the image names one.
    pub origin: Option<u8>,
    /// Instruction words in load order.
    pub instructions: Vec<u16>,
}

impl Program {
    /// Creates a relocatable program.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::TooLong`] when more than 32 words are given.
    pub fn new(instructions: Vec<u16>) -> Result<Self, ProgramError> {
        check_length(instructions.len())?;
        Ok(Self {
            origin: None,
            instructions,
        })
    }

    /// Parses the hexadecimal text format.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError`] for unparsable words, a malformed or repeated
    /// `.origin`, or more than 32 words.
    pub fn parse_hex(text: &str) -> Result<Self, ProgramError> {
        let mut program = Self::default();
        for (number, raw) in text.lines().enumerate() {
            let line = number + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                if let Some(argument) = comment.trim_start().strip_prefix(".origin") {
                    if program.origin.is_some() {
                        return Err(ProgramError::DuplicateOrigin { line });
                    }
                    program.origin = Some(parse_origin(argument.trim(), line)?);
                }
                continue;
            }
            let digits = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
                .unwrap_or(trimmed);
            let word = u16::from_str_radix(digits, 16).map_err(|_| ProgramError::InvalidWord {
                line,
                text: trimmed.to_owned(),
            })?;
            program.instructions.push(word);
        }
        check_length(program.instructions.len())?;
        Ok(program)
    }

    /// Parses the big-endian binary format.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::OddLength`] or [`ProgramError::TooLong`].
    pub fn from_binary(bytes: &[u8]) -> Result<Self, ProgramError> {
        if bytes.len() % 2 != 0 {
            return Err(ProgramError::OddLength(bytes.len()));
        }
        let instructions: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(instructions)
    }

    /// Loads an image from disk: `.bin` files are binary, anything else is
    /// text.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Io`] when the file cannot be read, otherwise
    /// whatever the selected parser reports.
    pub fn load_file(path: &Path) -> Result<Self, ProgramError> {
        let bytes = std::fs::read(path).map_err(|e| ProgramError::Io(e.to_string()))?;
        let binary = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("bin"));
        let program = if binary {
            Self::from_binary(&bytes)?
        } else {
            let text = String::from_utf8(bytes).map_err(|e| ProgramError::Io(e.to_string()))?;
            Self::parse_hex(&text)?
        };
        debug!(
            path = %path.display(),
            words = program.len(),
            origin = ?program.origin,
            "program image loaded"
        );
        Ok(program)
    }

    /// Number of instruction words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// `true` when the image holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Load offset; relocatable programs load at 0.
    #[must_use]
    pub fn load_offset(&self) -> u8 {
        self.origin.unwrap_or(0)
    }

    /// `(wrap_bottom, wrap_top)` covering the whole program at its load
    /// offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn wrap(&self) -> (u8, u8) {
        let bottom = self.load_offset();
        let top = (usize::from(bottom) + self.len().max(1) - 1) % INSTRUCTION_MEMORY_SIZE;
        (bottom, top as u8)
    }

    /// Renders the text format.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut text = String::new();
        if let Some(origin) = self.origin {
            let _ = writeln!(text, "# .origin {origin}");
        }
        for word in &self.instructions {
            let _ = writeln!(text, "{word:04x}");
        }
        text
    }

    /// Renders the big-endian binary format.
    #[must_use]
    pub fn to_binary(&self) -> Vec<u8> {
        self.instructions
            .iter()
            .flat_map(|word| word.to_be_bytes())
            .collect()
    }

    /// Disassembly listing, one line per word, with load addresses.
    #[must_use]
    pub fn listing(&self, layout: SideSetLayout) -> String {
        let mut text = String::new();
        for (offset, &word) in self.instructions.iter().enumerate() {
            let address = (usize::from(self.load_offset()) + offset) % INSTRUCTION_MEMORY_SIZE;
            let _ = match decode(word, layout) {
                Ok(instruction) => writeln!(text, "{address:2}: {word:04x}  {instruction}"),
                Err(error) => writeln!(text, "{address:2}: {word:04x}  ; {}", error.reason),
            };
        }
        text
    }
}

fn parse_origin(argument: &str, line: usize) -> Result<u8, ProgramError> {
    argument
        .parse::<u8>()
        .ok()
        .filter(|&origin| usize::from(origin) < INSTRUCTION_MEMORY_SIZE)
        .ok_or_else(|| ProgramError::InvalidOrigin {
            line,
            text: argument.to_owned(),
        })
}

fn check_length(len: usize) -> Result<(), ProgramError> {
    if len > INSTRUCTION_MEMORY_SIZE {
        Err(ProgramError::TooLong(len))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Program;
    use crate::encoding::SideSetLayout;
    use crate::error::ProgramError;

    #[test]
    fn parses_words_comments_and_origin() {
        let text = "# blink\n#.origin 4\ne081\n\n  0xFF01 \n# trailing\n";
        let program = Program::parse_hex(text).expect("valid image");
        assert_eq!(program.origin, Some(4));
        assert_eq!(program.instructions, vec![0xE081, 0xFF01]);
        assert_eq!(program.wrap(), (4, 5));
    }

    #[rstest]
    #[case("e081\nzz\n", ProgramError::InvalidWord { line: 2, text: "zz".into() })]
    #[case("# .origin 1\n# .origin 2\n", ProgramError::DuplicateOrigin { line: 2 })]
    #[case("# .origin 32\n", ProgramError::InvalidOrigin { line: 1, text: "32".into() })]
    #[case("# .origin -1\n", ProgramError::InvalidOrigin { line: 1, text: "-1".into() })]
    fn rejects_malformed_text(#[case] text: &str, #[case] expected: ProgramError) {
        assert_eq!(Program::parse_hex(text), Err(expected));
    }

    #[test]
    fn rejects_more_than_32_words() {
        let text = "a042\n".repeat(33);
        assert_eq!(Program::parse_hex(&text), Err(ProgramError::TooLong(33)));
        assert!(Program::parse_hex(&"a042\n".repeat(32)).is_ok());
    }

    #[test]
    fn binary_is_big_endian() {
        let program = Program::from_binary(&[0xE0, 0x81, 0xA0, 0x42]).expect("valid image");
        assert_eq!(program.instructions, vec![0xE081, 0xA042]);
        assert_eq!(program.to_binary(), vec![0xE0, 0x81, 0xA0, 0x42]);
        assert_eq!(
            Program::from_binary(&[0xE0]),
            Err(ProgramError::OddLength(1))
        );
    }

    #[test]
    fn text_rendering_parses_back() {
        let program = Program {
            origin: Some(9),
            instructions: vec![0x0001, 0xA042],
        };
        assert_eq!(Program::parse_hex(&program.to_hex()), Ok(program));
    }

    #[test]
    fn listing_disassembles_each_word() {
        let program = Program::new(vec![0xE081, 0xA042, 0xA004]).expect("fits");
        let listing = program.listing(SideSetLayout::NONE);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], " 0: e081  set pindirs, 1");
        assert_eq!(lines[1], " 1: a042  nop");
        assert!(lines[2].starts_with(" 2: a004  ; "));
    }
}
