//! Byte-stream seams under [`Connection`](crate::connection::Connection) and
//! the server registry, with TCP implementations and in-memory doubles.

use crate::error::NetError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::Duration;

/// A full-duplex stream whose reads never block: "no data yet" is reported
/// as [`io::ErrorKind::WouldBlock`], a closed peer as `Ok(0)`.
pub trait Transport: Read + Write {
    /// Switches writes to blocking mode bounded by `timeout`. Called right
    /// before the final HANG so it has a chance to be flushed.
    fn widen_write_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    fn shutdown(&mut self) -> io::Result<()>;

    /// Human readable peer description for log lines.
    fn peer(&self) -> String;
}

/// Source of new streams for the server registry.
pub trait Acceptor {
    type Stream: Transport;

    /// Returns the next pending stream, or `None` if nobody is waiting.
    fn try_accept(&mut self) -> io::Result<Option<Self::Stream>>;
}

impl Transport for TcpStream {
    fn widen_write_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_nonblocking(false)?;
        self.set_write_timeout(Some(timeout))
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string())
    }
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn try_accept(&mut self) -> io::Result<Option<TcpStream>> {
        match self.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Binds a non-blocking listener.
pub fn bind_listener(addr: &str) -> Result<TcpListener, NetError> {
    let listener = TcpListener::bind(addr).map_err(|e| NetError::connectivity(addr, e))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| NetError::connectivity(addr, e))?;
    Ok(listener)
}

/// Opens a non-blocking stream to `addr`.
pub fn connect_stream<A: ToSocketAddrs + ToString>(addr: A) -> Result<TcpStream, NetError> {
    let stream = TcpStream::connect(&addr).map_err(|e| NetError::connectivity(addr.to_string(), e))?;
    stream
        .set_nonblocking(true)
        .and_then(|_| stream.set_nodelay(true))
        .map_err(|e| NetError::connectivity(addr.to_string(), e))?;
    Ok(stream)
}

#[derive(Debug, Default)]
struct Pipe {
    data: VecDeque<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct EndpointState {
    fail_writes: bool,
    shut_down: bool,
    write_timeout: Option<Duration>,
}

/// One end of an in-memory stream pair. Clones share the same endpoint, so a
/// test can keep a handle on a stream it has handed to a connection.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    incoming: Rc<RefCell<Pipe>>,
    outgoing: Rc<RefCell<Pipe>>,
    state: Rc<RefCell<EndpointState>>,
    label: String,
}

/// Creates two connected in-memory endpoints.
pub fn memory_pair() -> (MemoryStream, MemoryStream) {
    let a_to_b = Rc::new(RefCell::new(Pipe::default()));
    let b_to_a = Rc::new(RefCell::new(Pipe::default()));

    let a = MemoryStream {
        incoming: Rc::clone(&b_to_a),
        outgoing: Rc::clone(&a_to_b),
        state: Rc::default(),
        label: "memory:a".to_string(),
    };
    let b = MemoryStream {
        incoming: a_to_b,
        outgoing: b_to_a,
        state: Rc::default(),
        label: "memory:b".to_string(),
    };
    (a, b)
}

impl MemoryStream {
    /// Makes every following write fail with `BrokenPipe`.
    pub fn fail_writes(&self) {
        self.state.borrow_mut().fail_writes = true;
    }

    /// Closes this end without a HANG, as a crashed peer would.
    pub fn close(&self) {
        self.state.borrow_mut().shut_down = true;
        self.outgoing.borrow_mut().closed = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.borrow().shut_down
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.state.borrow().write_timeout
    }

    /// Drains everything the peer has written so far.
    pub fn take_received(&self) -> Vec<u8> {
        self.incoming.borrow_mut().data.drain(..).collect()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.incoming.borrow_mut();
        if pipe.data.is_empty() {
            if pipe.closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = buf.len().min(pipe.data.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let state = self.state.borrow();
        if state.fail_writes || state.shut_down || self.incoming.borrow().closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.outgoing.borrow_mut().data.extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryStream {
    fn widen_write_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.state.borrow_mut().write_timeout = Some(timeout);
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.close();
        Ok(())
    }

    fn peer(&self) -> String {
        self.label.clone()
    }
}

/// In-memory listener. Clones share the same accept queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryAcceptor {
    pending: Rc<RefCell<VecDeque<MemoryStream>>>,
}

impl MemoryAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new stream for acceptance and returns the remote end.
    pub fn connect(&self) -> MemoryStream {
        let (server_end, client_end) = memory_pair();
        self.pending.borrow_mut().push_back(server_end);
        client_end
    }
}

impl Acceptor for MemoryAcceptor {
    type Stream = MemoryStream;

    fn try_accept(&mut self) -> io::Result<Option<MemoryStream>> {
        Ok(self.pending.borrow_mut().pop_front())
    }
}
