//! Error taxonomy for decoding, register access and program images.

use thiserror::Error;

/// Reason a 16-bit instruction word could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum DecodeFailure {
    /// `WAIT` with source encoding `0b11`.
    #[error("reserved wait source")]
    ReservedWaitSource = 0x01,
    /// `IN` with source encoding `0b100` or `0b101`.
    #[error("reserved in source")]
    ReservedInSource = 0x02,
    /// `PUSH`/`PULL` with any of bits 4:0 set.
    #[error("push/pull operand bits must be zero")]
    NonZeroPushPullBits = 0x03,
    /// `MOV` with source encoding `0b100`.
    #[error("reserved mov source")]
    ReservedMovSource = 0x04,
    /// `MOV` with operation encoding `0b11`.
    #[error("reserved mov operation")]
    ReservedMovOperation = 0x05,
    /// `MOV` with destination encoding `0b011`.
    #[error("reserved mov destination")]
    ReservedMovDestination = 0x06,
    /// `IRQ` with bit 7 set.
    #[error("reserved irq bit 7 set")]
    ReservedIrqBit = 0x07,
    /// IRQ index (in `IRQ` or `WAIT IRQ`) with bit 3 set.
    #[error("invalid irq index bits")]
    InvalidIrqIndex = 0x08,
    /// `SET` with destination encoding `0b011` or `0b101..=0b111`.
    #[error("reserved set destination")]
    ReservedSetDestination = 0x09,
}

impl DecodeFailure {
    /// Stable numeric code for diagnostics.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable numeric code back into a failure reason.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::ReservedWaitSource),
            0x02 => Some(Self::ReservedInSource),
            0x03 => Some(Self::NonZeroPushPullBits),
            0x04 => Some(Self::ReservedMovSource),
            0x05 => Some(Self::ReservedMovOperation),
            0x06 => Some(Self::ReservedMovDestination),
            0x07 => Some(Self::ReservedIrqBit),
            0x08 => Some(Self::InvalidIrqIndex),
            0x09 => Some(Self::ReservedSetDestination),
            _ => None,
        }
    }
}

/// A rejected instruction word together with the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("cannot decode instruction {op_code:#06x}: {reason}")]
pub struct DecodeError {
    /// Raw instruction word.
    pub op_code: u16,
    /// Why decoding failed.
    pub reason: DecodeFailure,
}

impl DecodeError {
    /// Creates a decode error for `op_code`.
    #[must_use]
    pub const fn new(op_code: u16, reason: DecodeFailure) -> Self {
        Self { op_code, reason }
    }
}

/// Failure of an address-space or register operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum AccessError {
    /// No register set (or no register) lives at this address.
    #[error("unsupported address {0:#010x}")]
    UnsupportedAddress(u32),
    /// Address is not 32-bit aligned.
    #[error("misaligned address {0:#010x}")]
    MisalignedAddress(u32),
    /// The register set has no register at this index.
    #[error("{set} has no register {index}")]
    UnknownRegister {
        /// Register set label.
        set: &'static str,
        /// Word index inside the set.
        index: usize,
    },
    /// An argument is outside the range of the addressed field.
    #[error("value {value} out of range for {field}")]
    ValueOutOfRange {
        /// Name of the offending argument.
        field: &'static str,
        /// Rejected value.
        value: u32,
    },
    /// Transport failure on a remote address space.
    #[error("i/o error: {0}")]
    Io(String),
    /// Remote peer answered with an error or an unparsable response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AccessError {
    /// Stable wire-protocol status code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Io(_) | Self::Protocol(_) => 405,
            Self::UnsupportedAddress(_) | Self::UnknownRegister { .. } => 406,
            Self::MisalignedAddress(_) => 407,
            Self::ValueOutOfRange { .. } => 408,
        }
    }
}

impl From<std::io::Error> for AccessError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Malformed or oversized program image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ProgramError {
    /// A text line is neither a comment, a directive nor a hex word.
    #[error("line {line}: invalid instruction word `{text}`")]
    InvalidWord {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },
    /// `.origin` appears more than once.
    #[error("line {line}: duplicate .origin directive")]
    DuplicateOrigin {
        /// 1-based line number of the second directive.
        line: usize,
    },
    /// `.origin` argument is not a decimal in `0..=31`.
    #[error("line {line}: invalid .origin `{text}`, expected 0..=31")]
    InvalidOrigin {
        /// 1-based line number.
        line: usize,
        /// Offending argument.
        text: String,
    },
    /// More words than instruction memory holds.
    #[error("program has {0} instructions, at most 32 fit")]
    TooLong(usize),
    /// Binary image length is not a multiple of two.
    #[error("binary image has odd length {0}")]
    OddLength(usize),
    /// The target block or state machine does not exist.
    #[error(transparent)]
    Target(#[from] AccessError),
    /// Program extends past the end of instruction memory at its load offset.
    #[error("{len} instructions at origin {origin} exceed instruction memory")]
    DoesNotFit {
        /// Load offset.
        origin: u8,
        /// Number of instructions.
        len: usize,
    },
    /// The image file could not be read.
    #[error("cannot read program image: {0}")]
    Io(String),
}
