use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use crate::drivers::SweepError;
/// Which bench instrument a connection talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Function generator driving the device under test.
    Source,
    /// Oscilloscope probing the input and output of the device.
    Analyzer,
}
impl Role {
    /// Tag used in lab host names (`nano-slab-3-mfg`, `nano-slab-3-mdo`).
    pub fn host_tag(self) -> &'static str {
        match self {
            Role::Source => "mfg",
            Role::Analyzer => "mdo",
        }
    }
}
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => write!(f, "source ({})", self.host_tag()),
            Role::Analyzer => write!(f, "analyzer ({})", self.host_tag()),
        }
    }
}
/// Line-oriented link to one instrument.
///
/// Lines are passed without their terminator; implementations add and strip
/// the trailing newline.
pub trait Transport {
    fn role(&self) -> Role;
    fn send_line(&mut self, line: &str) -> Result<(), SweepError>;
    fn recv_line(&mut self) -> Result<String, SweepError>;
}
#[derive(Clone, Copy, Debug)]
pub struct LinkTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}
impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(10),
            write: Duration::from_secs(5),
        }
    }
}
/// Raw socket service on a networked instrument.
pub struct TcpTransport {
    role: Role,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}
impl TcpTransport {
    pub fn connect(
        role: Role,
        host: &str,
        port: u16,
        timeouts: &LinkTimeouts,
    ) -> Result<Self, SweepError> {
        let address = format!("{host}:{port}");
        let connect_error = |source: io::Error| SweepError::Connect {
            role,
            address: address.clone(),
            source,
        };
        let mut last_error = None;
        for addr in address.to_socket_addrs().map_err(connect_error)? {
            match TcpStream::connect_timeout(&addr, timeouts.connect) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeouts.read))
                        .map_err(connect_error)?;
                    stream
                        .set_write_timeout(Some(timeouts.write))
                        .map_err(connect_error)?;
                    let writer = stream.try_clone().map_err(connect_error)?;
                    log::info!("connected to {role} at {addr}");
                    return Ok(Self {
                        role,
                        reader: BufReader::new(stream),
                        writer,
                    });
                }
                Err(err) => last_error = Some(err),
            }
        }
        Err(connect_error(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        })))
    }
}
impl Transport for TcpTransport {
    fn role(&self) -> Role {
        self.role
    }
    fn send_line(&mut self, line: &str) -> Result<(), SweepError> {
        let role = self.role;
        let framed = format!("{line}\n");
        self.writer
            .write_all(framed.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|source| SweepError::Io { role, source })
    }
    fn recv_line(&mut self) -> Result<String, SweepError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|source| SweepError::Io {
                role: self.role,
                source,
            })?;
        if read == 0 {
            return Err(SweepError::Disconnected { role: self.role });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
#[cfg(test)]
pub use scripted::ScriptedTransport;
#[cfg(test)]
mod scripted {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use super::{Role, Transport};
    use crate::drivers::SweepError;
    type Responder = Box<dyn FnMut(&str) -> Option<String>>;
    /// Canned instrument: every line sent is recorded, and the responder decides
    /// which reply (if any) is queued for it.
    pub struct ScriptedTransport {
        role: Role,
        responder: Responder,
        pending: VecDeque<String>,
        sent: Rc<RefCell<Vec<String>>>,
    }
    impl ScriptedTransport {
        pub fn new(role: Role, responder: impl FnMut(&str) -> Option<String> + 'static) -> Self {
            Self {
                role,
                responder: Box::new(responder),
                pending: VecDeque::new(),
                sent: Rc::new(RefCell::new(Vec::new())),
            }
        }
        /// Replies `reply` to every query and stays silent on commands.
        pub fn constant(role: Role, reply: &str) -> Self {
            let reply = reply.to_string();
            Self::new(role, move |line| line.ends_with('?').then(|| reply.clone()))
        }
        pub fn sent_log(&self) -> Rc<RefCell<Vec<String>>> {
            Rc::clone(&self.sent)
        }
    }
    impl Transport for ScriptedTransport {
        fn role(&self) -> Role {
            self.role
        }
        fn send_line(&mut self, line: &str) -> Result<(), SweepError> {
            self.sent.borrow_mut().push(line.to_string());
            if let Some(reply) = (self.responder)(line) {
                self.pending.push_back(reply);
            }
            Ok(())
        }
        fn recv_line(&mut self) -> Result<String, SweepError> {
            self.pending
                .pop_front()
                .ok_or(SweepError::Disconnected { role: self.role })
        }
    }
}
