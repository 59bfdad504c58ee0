use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use pio_core::protocol::{handle_line, Status};
use pio_core::AddressSpace;
use tracing::{debug, info, warn};

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 2040;

/// Register server accepting line-protocol clients.
///
/// Each connection gets its own thread and a clone of the address space.
#[derive(Debug)]
pub struct Server<S> {
    listener: TcpListener,
    space: S,
}

impl<S> Server<S>
where
    S: AddressSpace + Clone + Send + 'static,
{
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the address cannot be bound.
    pub fn bind(address: impl ToSocketAddrs, space: S) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        Ok(Self { listener, space })
    }

    /// Address actually bound, useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the socket has no local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts clients until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns the OS error that stopped the accept loop.
    pub fn run(self) -> io::Result<()> {
        info!(address = %self.local_addr()?, "register server listening");
        for stream in self.listener.incoming() {
            let stream = stream?;
            let space = self.space.clone();
            thread::Builder::new()
                .name("pio-client".into())
                .spawn(move || {
                    if let Err(error) = handle_connection(stream, &space) {
                        warn!(%error, "client connection failed");
                    }
                })?;
        }
        Ok(())
    }
}

/// Serves one client until it sends `q` or disconnects.
///
/// # Errors
///
/// Returns the OS error from reading or writing the socket.
pub fn handle_connection(stream: TcpStream, space: &dyn AddressSpace) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    info!(%peer, "client connected");
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = line?;
        let Some(response) = handle_line(&line, space) else {
            continue;
        };
        debug!(%peer, request = %line.trim(), %response, "request served");
        writeln!(writer, "{response}")?;
        writer.flush()?;
        if response.status == Status::Bye {
            break;
        }
    }
    info!(%peer, "client disconnected");
    Ok(())
}
