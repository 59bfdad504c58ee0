//! Line protocol for remote register access.
//!
//! Each request is one line: a single-letter command followed by
//! whitespace-separated operands. Each response is one line of the form
//! `<code> <ID>[: <result>]`.

use std::fmt;

use crate::address::AddressSpace;
use crate::error::AccessError;

/// Version banner returned by `v`.
pub const VERSION: &str = concat!("pio-emu ", env!("CARGO_PKG_VERSION"));

/// Command summary returned by `h` and `?`.
pub const HELP: &str = "v | h | q | r <addr> | w <addr> <value> <mask> <xor:t|f> | \
     i <addr> <expected> [<mask> [<cycles> [<millis>]]] | p <addr> | s <addr> | l <addr>";

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// Connection closes.
    Bye = 100,
    /// Command succeeded.
    Ok = 101,
    /// First token is not a command.
    UnknownCommand = 400,
    /// A required operand is missing.
    MissingOperand = 401,
    /// Trailing tokens after the last operand.
    UnparsedOperand = 402,
    /// Operand is not a number.
    NumberExpected = 403,
    /// Operand is not a boolean.
    BooleanExpected = 404,
    /// Access failed.
    IoError = 405,
    /// No register at the address.
    UnsupportedAddress = 406,
    /// Address is not word aligned.
    MisalignedAddress = 407,
    /// Operand outside the accepted range.
    ValueOutOfRange = 408,
}

impl Status {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Symbolic identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Bye => "BYE",
            Self::Ok => "OK",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::MissingOperand => "MISSING_OPERAND",
            Self::UnparsedOperand => "UNPARSED_OPERAND",
            Self::NumberExpected => "NUMBER_EXPECTED",
            Self::BooleanExpected => "BOOLEAN_EXPECTED",
            Self::IoError => "IO_ERROR",
            Self::UnsupportedAddress => "UNSUPPORTED_ADDRESS",
            Self::MisalignedAddress => "MISALIGNED_ADDRESS",
            Self::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
        }
    }

    /// Decodes a numeric code.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            100 => Self::Bye,
            101 => Self::Ok,
            400 => Self::UnknownCommand,
            401 => Self::MissingOperand,
            402 => Self::UnparsedOperand,
            403 => Self::NumberExpected,
            404 => Self::BooleanExpected,
            405 => Self::IoError,
            406 => Self::UnsupportedAddress,
            407 => Self::MisalignedAddress,
            408 => Self::ValueOutOfRange,
            _ => return None,
        })
    }

    /// `true` for the 1xx codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.code() < 400
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status.
    pub status: Status,
    /// Optional result or error detail.
    pub result: Option<String>,
}

impl Response {
    /// `101 OK` without a result.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: Status::Ok,
            result: None,
        }
    }

    /// `101 OK: <result>`.
    #[must_use]
    pub fn ok_with(result: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            result: Some(result.into()),
        }
    }

    /// Error response with detail.
    #[must_use]
    pub fn error(status: Status, detail: impl Into<String>) -> Self {
        Self {
            status,
            result: Some(detail.into()),
        }
    }

    /// Parses a response line.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Protocol`] when the line is not a response.
    pub fn parse(line: &str) -> Result<Self, AccessError> {
        let malformed = || AccessError::Protocol(format!("malformed response `{line}`"));
        let line = line.trim_end_matches(['\r', '\n']);
        let (head, result) = match line.split_once(": ") {
            Some((head, result)) => (head, Some(result.to_owned())),
            None => (line, None),
        };
        let (code, id) = head.split_once(' ').ok_or_else(malformed)?;
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(Status::from_code)
            .ok_or_else(malformed)?;
        if status.id() != id {
            return Err(malformed());
        }
        Ok(Self { status, result })
    }

    /// Converts an error response into an [`AccessError`].
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Protocol`] carrying the whole line for any
    /// non-success status.
    pub fn into_result(self) -> Result<Option<String>, AccessError> {
        if self.status.is_success() {
            Ok(self.result)
        } else {
            Err(AccessError::Protocol(self.to_string()))
        }
    }
}

impl From<&AccessError> for Response {
    fn from(error: &AccessError) -> Self {
        let status = Status::from_code(error.code()).unwrap_or(Status::IoError);
        Self::error(status, error.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.code(), self.status.id())?;
        if let Some(result) = &self.result {
            write!(f, ": {result}")?;
        }
        Ok(())
    }
}

/// A parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `v`: version banner.
    Version,
    /// `h` or `?`: command summary.
    Help,
    /// `q`: close the connection.
    Quit,
    /// `r <addr>`.
    Read {
        /// Register address.
        address: u32,
    },
    /// `w <addr> <value> <mask> <xor>`.
    Write {
        /// Register address.
        address: u32,
        /// Value to write.
        value: u32,
        /// Bits to affect.
        mask: u32,
        /// Toggle instead of assign.
        xor: bool,
    },
    /// `i <addr> <expected> [<mask> [<cycles> [<millis>]]]`.
    Wait {
        /// Register address.
        address: u32,
        /// Expected value.
        expected: u32,
        /// Bits to compare.
        mask: u32,
        /// Cycle limit, `0` for none.
        cycles_timeout: u32,
        /// Millisecond limit, `0` for none.
        millis_timeout: u32,
    },
    /// `p <addr>`: does a register live here.
    Provides {
        /// Register address.
        address: u32,
    },
    /// `s <addr>`: register set label.
    SetLabel {
        /// Register address.
        address: u32,
    },
    /// `l <addr>`: register label.
    Label {
        /// Register address.
        address: u32,
    },
}

/// Parses a number: `0x` hex, decimal, or a negative 32-bit decimal.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn parse_number(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if text.starts_with('-') {
        return text.parse::<i32>().ok().map(|value| value as u32);
    }
    text.parse::<u32>().ok()
}

/// Parses `t`, `f`, `true` or `false` (any case).
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "t" | "true" => Some(true),
        "f" | "false" => Some(false),
        _ => None,
    }
}

struct Operands<'a> {
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Operands<'a> {
    fn next_token(&mut self, name: &str) -> Result<&'a str, Response> {
        self.tokens
            .next()
            .ok_or_else(|| Response::error(Status::MissingOperand, name))
    }

    fn number(&mut self, name: &str) -> Result<u32, Response> {
        let token = self.next_token(name)?;
        parse_number(token).ok_or_else(|| Response::error(Status::NumberExpected, token))
    }

    fn optional_number(&mut self, default: u32) -> Result<u32, Response> {
        match self.tokens.next() {
            Some(token) => {
                parse_number(token).ok_or_else(|| Response::error(Status::NumberExpected, token))
            }
            None => Ok(default),
        }
    }

    fn boolean(&mut self, name: &str) -> Result<bool, Response> {
        let token = self.next_token(name)?;
        parse_bool(token).ok_or_else(|| Response::error(Status::BooleanExpected, token))
    }

    fn finish(mut self) -> Result<(), Response> {
        match self.tokens.next() {
            Some(token) => Err(Response::error(Status::UnparsedOperand, token)),
            None => Ok(()),
        }
    }
}

impl Command {
    /// Parses a request line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the error [`Response`] to send back.
    pub fn parse(line: &str) -> Result<Option<Self>, Response> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let mut operands = Operands { tokens };
        let command = match verb {
            "v" => Self::Version,
            "h" | "?" => Self::Help,
            "q" => Self::Quit,
            "r" => Self::Read {
                address: operands.number("address")?,
            },
            "w" => Self::Write {
                address: operands.number("address")?,
                value: operands.number("value")?,
                mask: operands.number("mask")?,
                xor: operands.boolean("xor")?,
            },
            "i" => Self::Wait {
                address: operands.number("address")?,
                expected: operands.number("expected")?,
                mask: operands.optional_number(u32::MAX)?,
                cycles_timeout: operands.optional_number(0)?,
                millis_timeout: operands.optional_number(0)?,
            },
            "p" => Self::Provides {
                address: operands.number("address")?,
            },
            "s" => Self::SetLabel {
                address: operands.number("address")?,
            },
            "l" => Self::Label {
                address: operands.number("address")?,
            },
            other => return Err(Response::error(Status::UnknownCommand, other)),
        };
        operands.finish()?;
        Ok(Some(command))
    }

    /// Runs the command against `space`.
    #[must_use]
    pub fn execute(self, space: &dyn AddressSpace) -> Response {
        let result = match self {
            Self::Version => Ok(Response::ok_with(VERSION)),
            Self::Help => Ok(Response::ok_with(HELP)),
            Self::Quit => Ok(Response {
                status: Status::Bye,
                result: None,
            }),
            Self::Read { address } => space
                .read_address(address)
                .map(|value| Response::ok_with(format!("{value:#010x}"))),
            Self::Write {
                address,
                value,
                mask,
                xor,
            } => space
                .write_address_masked(address, value, mask, xor)
                .map(|()| Response::ok()),
            Self::Wait {
                address,
                expected,
                mask,
                cycles_timeout,
                millis_timeout,
            } => space
                .wait_address(
                    address,
                    expected,
                    mask,
                    u64::from(cycles_timeout),
                    u64::from(millis_timeout),
                )
                .map(|matched| Response::ok_with(matched.to_string())),
            Self::Provides { address } => {
                Ok(Response::ok_with(space.provides_address(address).to_string()))
            }
            Self::SetLabel { address } => space.register_set_label(address).map(Response::ok_with),
            Self::Label { address } => space.address_label(address).map(Response::ok_with),
        };
        result.unwrap_or_else(|error| Response::from(&error))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Version => f.write_str("v"),
            Self::Help => f.write_str("h"),
            Self::Quit => f.write_str("q"),
            Self::Read { address } => write!(f, "r {address:#010x}"),
            Self::Write {
                address,
                value,
                mask,
                xor,
            } => write!(
                f,
                "w {address:#010x} {value:#010x} {mask:#010x} {}",
                if xor { "t" } else { "f" }
            ),
            Self::Wait {
                address,
                expected,
                mask,
                cycles_timeout,
                millis_timeout,
            } => write!(
                f,
                "i {address:#010x} {expected:#010x} {mask:#010x} {cycles_timeout} {millis_timeout}"
            ),
            Self::Provides { address } => write!(f, "p {address:#010x}"),
            Self::SetLabel { address } => write!(f, "s {address:#010x}"),
            Self::Label { address } => write!(f, "l {address:#010x}"),
        }
    }
}

/// Parses and runs one request line. Blank lines produce no response.
#[must_use]
pub fn handle_line(line: &str, space: &dyn AddressSpace) -> Option<Response> {
    match Command::parse(line) {
        Ok(Some(command)) => Some(command.execute(space)),
        Ok(None) => None,
        Err(response) => Some(response),
    }
}
