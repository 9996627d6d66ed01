use super::{read_frame, BackendConfig, WriteBackend, WriteRequest, WriteResponse, WriteStatus};
use crate::error::BackendError;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use tracing::debug;

/// Blocking TCP client for the length-prefixed write protocol.
///
/// One request is in flight at a time: `write` sends the insert and blocks
/// until the target answers, which is what the closed-loop worker measures.
pub struct TcpBackend {
    stream: TcpStream,
    peer: SocketAddr,
    // Request frames are encoded in place, so steady-state writes reuse it
    frame: Vec<u8>,
}

impl TcpBackend {
    /// Resolve `config.target` and connect to the first address that answers.
    pub fn connect(config: &BackendConfig) -> Result<Self> {
        let addrs: Vec<SocketAddr> = config
            .target
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve target address {}", config.target))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    debug!("Connection to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e).with_context(|| format!("Failed to connect to {}", config.target)),
            None => Err(anyhow!("Target address {} resolved to nothing", config.target)),
        }
    }

    fn from_stream(stream: TcpStream, config: &BackendConfig) -> Result<Self> {
        stream
            .set_nodelay(true)
            .context("Failed to set TCP_NODELAY")?;
        stream
            .set_read_timeout(config.io_timeout)
            .context("Failed to set read timeout")?;
        stream
            .set_write_timeout(config.io_timeout)
            .context("Failed to set write timeout")?;
        let peer = stream.peer_addr()?;
        debug!("Connected to write target at {}", peer);

        Ok(Self {
            stream,
            peer,
            frame: Vec::new(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl WriteBackend for TcpBackend {
    fn write(&mut self, record_id: u64, payload: &[u8]) -> Result<(), BackendError> {
        WriteRequest::borrowed(record_id, payload).encode_into(&mut self.frame)?;
        self.stream.write_all(&self.frame)?;

        let response = WriteResponse::from_bytes(&read_frame(&mut self.stream)?)?;
        if response.record_id != record_id {
            return Err(BackendError::ResponseMismatch {
                expected: record_id,
                received: response.record_id,
            });
        }

        match response.status {
            WriteStatus::Applied => Ok(()),
            WriteStatus::Rejected(reason) => Err(BackendError::Rejected { record_id, reason }),
        }
    }

    fn name(&self) -> &str {
        "tcp"
    }
}
