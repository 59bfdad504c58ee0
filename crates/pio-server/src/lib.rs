//! TCP register server and client for the PIO emulator.

/// Thread-per-connection line protocol server.
pub mod server;
pub use server::{handle_connection, Server, DEFAULT_PORT};

/// Address space backed by a remote server.
pub mod remote;
pub use remote::RemoteAddressSpace;

#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;
