//! Cycle-accurate emulation core for the RP2040 programmable I/O block.

/// Logic levels, pin directions and tri-state pin values.
pub mod bit;
pub use bit::{Bit, Direction, PinState};

/// Primary opcode classification and side-set field layout.
pub mod encoding;
pub use encoding::{classify_opcode, OpcodeKind, SideSetLayout};

/// Typed PIO instruction model.
pub mod instruction;
pub use instruction::{
    irq_flag_index, InSource, Instruction, InstructionKind, JmpCondition, MovDestination,
    MovOperation, MovSource, OutDestination, SetDestination, WaitSource,
};

/// Instruction word decoder.
pub mod decoder;
pub use decoder::{decode, decode_kind};

/// Error taxonomy.
pub mod error;
pub use error::{AccessError, DecodeError, DecodeFailure, ProgramError};

/// TX/RX FIFO pair with join support.
pub mod fifo;
pub use fifo::{Fifo, FifoAccess, FifoFlags, FIFO_DEPTH, JOINED_DEPTH};

/// Fractional clock divider.
pub mod pll;
pub use pll::Pll;

/// GPIO bank: function select, overrides and pad resolution.
pub mod gpio;
pub use gpio::{Function, Gpio, Override, Terminal, GPIO_COUNT, PIO_BLOCKS};

/// State machine registers, configuration and execution.
pub mod sm;
pub use sm::{
    ExecContext, ExecOrigin, ExecutionResult, FetchReport, PendingExec, SmConfig, SmRegisters,
    StateMachine, INSTRUCTION_MEMORY_SIZE, SM_COUNT,
};

/// Per-block execution counters.
pub mod diag;
pub use diag::{PioDiagnostics, SmCounters};

/// One PIO block: instruction memory, four state machines and IRQ flags.
pub mod pio;
pub use pio::{CollectedDecodeError, EdgeSummary, Pio, IRQ_LINES};

/// Two-phase master clock and the free-running driving gear.
pub mod clock;
pub use clock::{ClockListener, ClockMode, DrivingGear, MasterClock, Phase, DEFAULT_FREQUENCY};

/// Register sets exposing chip state as 32-bit words.
pub mod registers;
pub use registers::{
    FieldDescriptor, RegisterAccess, RegisterDescriptor, RegisterInfo, RegisterSet,
};

/// Flat address space over the register sets.
pub mod address;
pub use address::{decode_address, encode_address, AddressSpace, Alias, LocalAddressSpace, Region};

/// Program images in text and binary form.
pub mod program;
pub use program::Program;

/// Line protocol for remote register access.
pub mod protocol;
pub use protocol::{handle_line, Command, Response, Status};

/// Emulator assembly.
pub mod emulator;
pub use emulator::{Chip, Emulator, EmulatorConfig, Peripherals};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
