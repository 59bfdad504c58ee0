use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};

use pio_core::protocol::{parse_bool, parse_number, Command, Response, Status};
use pio_core::{AccessError, AddressSpace};
use tracing::debug;

#[derive(Debug)]
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Client side of the line protocol.
///
/// Requests are serialized over one connection.
#[derive(Debug)]
pub struct RemoteAddressSpace {
    peer: SocketAddr,
    connection: Mutex<Connection>,
}

impl RemoteAddressSpace {
    /// Connects to a register server.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Io`] when the connection cannot be opened.
    pub fn connect(address: impl ToSocketAddrs) -> Result<Self, AccessError> {
        let writer = TcpStream::connect(address)?;
        let peer = writer.peer_addr()?;
        let reader = BufReader::new(writer.try_clone()?);
        debug!(%peer, "connected to register server");
        Ok(Self {
            peer,
            connection: Mutex::new(Connection { reader, writer }),
        })
    }

    /// Server address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Server version banner.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] on transport or protocol failure.
    pub fn version(&self) -> Result<String, AccessError> {
        self.request(Command::Version)?
            .result
            .ok_or_else(|| AccessError::Protocol("version response without result".into()))
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when the server does not answer `BYE`.
    pub fn close(&self) -> Result<(), AccessError> {
        let response = self.request(Command::Quit)?;
        if response.status == Status::Bye {
            Ok(())
        } else {
            Err(AccessError::Protocol(response.to_string()))
        }
    }

    fn request(&self, command: Command) -> Result<Response, AccessError> {
        let mut connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writeln!(connection.writer, "{command}")?;
        connection.writer.flush()?;
        let mut line = String::new();
        if connection.reader.read_line(&mut line)? == 0 {
            return Err(AccessError::Io("connection closed by server".into()));
        }
        Response::parse(&line)
    }

    /// Sends an addressed request and returns its result text.
    fn addressed(&self, command: Command, address: u32) -> Result<String, AccessError> {
        let response = self.request(command)?;
        match response.status {
            Status::Ok => Ok(response.result.unwrap_or_default()),
            Status::UnsupportedAddress => Err(AccessError::UnsupportedAddress(address)),
            Status::MisalignedAddress => Err(AccessError::MisalignedAddress(address)),
            _ => Err(AccessError::Protocol(response.to_string())),
        }
    }
}

fn malformed(result: &str) -> AccessError {
    AccessError::Protocol(format!("unexpected result `{result}`"))
}

impl AddressSpace for RemoteAddressSpace {
    fn provides_address(&self, address: u32) -> bool {
        self.addressed(Command::Provides { address }, address)
            .ok()
            .and_then(|result| parse_bool(&result))
            .unwrap_or(false)
    }

    fn register_set_label(&self, address: u32) -> Result<String, AccessError> {
        self.addressed(Command::SetLabel { address }, address)
    }

    fn address_label(&self, address: u32) -> Result<String, AccessError> {
        self.addressed(Command::Label { address }, address)
    }

    fn read_address(&self, address: u32) -> Result<u32, AccessError> {
        let result = self.addressed(Command::Read { address }, address)?;
        parse_number(&result).ok_or_else(|| malformed(&result))
    }

    fn write_address_masked(
        &self,
        address: u32,
        value: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        let command = Command::Write {
            address,
            value,
            mask,
            xor,
        };
        self.addressed(command, address).map(drop)
    }

    fn wait_address(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        cycles_timeout: u64,
        millis_timeout: u64,
    ) -> Result<bool, AccessError> {
        let command = Command::Wait {
            address,
            expected,
            mask,
            cycles_timeout: u32::try_from(cycles_timeout).unwrap_or(u32::MAX),
            millis_timeout: u32::try_from(millis_timeout).unwrap_or(u32::MAX),
        };
        let result = self.addressed(command, address)?;
        parse_bool(&result).ok_or_else(|| malformed(&result))
    }
}
