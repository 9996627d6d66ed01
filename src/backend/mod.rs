//! # Backend Abstraction
//!
//! The benchmark core only needs one capability from the system under test:
//! "perform one write of a record id and payload, and report success or
//! failure". That capability is the [`WriteBackend`] trait.
//!
//! Two implementations ship with the crate:
//!
//! - [`TcpBackend`]: a blocking client speaking the length-prefixed bincode
//!   protocol defined here.
//! - Any `FnMut(u64, &[u8]) -> Result<(), BackendError> + Send` closure, which
//!   is how tests and embedders plug in their own targets.
//!
//! The [`server`] module provides a reference target that speaks the same
//! protocol, so the harness can be exercised without an external database.
//!
//! ## Wire Format
//!
//! Every frame is a little-endian `u32` length followed by that many bytes of
//! bincode. The client sends [`WriteRequest`] frames and waits for the
//! matching [`WriteResponse`] before issuing the next write.

use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

pub mod server;
pub mod tcp;

pub use server::{ReferenceServer, ServerConfig};
pub use tcp::TcpBackend;

/// Largest frame either side will accept.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A single timed write against the system under test.
pub trait WriteBackend: Send {
    /// Write one record. Any error is treated as fatal by the worker.
    fn write(&mut self, record_id: u64, payload: &[u8]) -> Result<(), BackendError>;

    /// Short name used in logs and report metadata.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> WriteBackend for F
where
    F: FnMut(u64, &[u8]) -> Result<(), BackendError> + Send,
{
    fn write(&mut self, record_id: u64, payload: &[u8]) -> Result<(), BackendError> {
        self(record_id, payload)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Connection settings for network backends.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// `host:port` of the target system
    pub target: String,
    pub connect_timeout: Option<Duration>,
    /// Read/write timeout applied to every request; `None` blocks forever
    pub io_timeout: Option<Duration>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            target: crate::defaults::TARGET.to_string(),
            connect_timeout: None,
            io_timeout: None,
        }
    }
}

/// Insert request for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest<'a> {
    pub record_id: u64,
    pub payload: Cow<'a, [u8]>,
}

impl<'a> WriteRequest<'a> {
    pub fn borrowed(record_id: u64, payload: &'a [u8]) -> Self {
        Self {
            record_id,
            payload: Cow::Borrowed(payload),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        Ok(bincode::serialize(self)?)
    }

    /// Encode a complete length-prefixed frame into `frame`, replacing its
    /// contents but keeping its allocation.
    pub fn encode_into(&self, frame: &mut Vec<u8>) -> Result<(), BackendError> {
        frame.clear();
        frame.extend_from_slice(&[0u8; 4]);
        bincode::serialize_into(&mut *frame, self)?;

        let len = frame.len() - 4;
        if len > MAX_FRAME_SIZE {
            return Err(BackendError::FrameTooLarge(len));
        }
        frame[..4].copy_from_slice(&(len as u32).to_le_bytes());
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<WriteRequest<'static>, BackendError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Outcome of an insert as reported by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStatus {
    Applied,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub record_id: u64,
    pub status: WriteStatus,
}

impl WriteResponse {
    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Prefix `body` with its length, producing a single buffer so the frame
/// goes out in one write.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, BackendError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(BackendError::FrameTooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Write a complete frame to a blocking stream.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), BackendError> {
    let frame = encode_frame(body)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame body from a blocking stream.
///
/// A clean end-of-stream before the length prefix is reported as
/// [`BackendError::Disconnected`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, BackendError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => BackendError::Disconnected,
        _ => BackendError::Io(e),
    })?;

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(BackendError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_layout_is_length_prefixed() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(&frame[..4], &3u32.to_le_bytes());
        assert_eq!(&frame[4..], b"abc");
    }

    #[test]
    fn test_request_survives_the_wire() {
        let payload = vec![b'0'; 2048];
        let request = WriteRequest::borrowed(17, &payload);

        let mut wire = Vec::new();
        write_frame(&mut wire, &request.to_bytes().unwrap()).unwrap();

        let body = read_frame(&mut Cursor::new(wire)).unwrap();
        let decoded = WriteRequest::from_bytes(&body).unwrap();
        assert_eq!(decoded.record_id, 17);
        assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn test_encode_into_matches_frame_and_reuses_buffer() {
        let payload = vec![b'0'; 512];
        let request = WriteRequest::borrowed(3, &payload);

        let mut frame = Vec::new();
        request.encode_into(&mut frame).unwrap();
        assert_eq!(frame, encode_frame(&request.to_bytes().unwrap()).unwrap());

        let first_alloc = frame.as_ptr();
        let capacity = frame.capacity();
        WriteRequest::borrowed(4, &payload)
            .encode_into(&mut frame)
            .unwrap();
        assert_eq!(frame.as_ptr(), first_alloc);
        assert_eq!(frame.capacity(), capacity);

        let body = read_frame(&mut Cursor::new(frame)).unwrap();
        assert_eq!(WriteRequest::from_bytes(&body).unwrap().record_id, 4);
    }

    #[test]
    fn test_read_frame_reports_disconnect_on_empty_stream() {
        let err = read_frame(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
        assert!(matches!(err, BackendError::Disconnected));
    }

    #[test]
    fn test_read_frame_rejects_oversized_length() {
        let wire = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert!(matches!(err, BackendError::FrameTooLarge(_)));
    }

    #[test]
    fn test_closure_backend() {
        let mut written = Vec::new();
        {
            let mut backend = |id: u64, payload: &[u8]| -> Result<(), BackendError> {
                written.push((id, payload.len()));
                Ok(())
            };
            assert_eq!(WriteBackend::name(&backend), "closure");
            backend.write(1, b"xy").unwrap();
            backend.write(2, b"xyz").unwrap();
        }
        assert_eq!(written, vec![(1, 2), (2, 3)]);
    }
}
