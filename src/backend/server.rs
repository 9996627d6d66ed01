//! Reference write target.
//!
//! A small tokio server that speaks the same framing as [`super::TcpBackend`]
//! and applies each request as a single-row insert. It exists so the harness
//! can be pointed at something real without an external database, and so the
//! integration tests have a target.
//!
//! Inserts are rejected when the payload exceeds `max_payload` or when the
//! record id was already inserted on the same connection.

use super::{WriteRequest, WriteResponse, WriteStatus, MAX_FRAME_SIZE};
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest accepted payload in bytes
    pub max_payload: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_payload: crate::defaults::SERVER_MAX_PAYLOAD,
        }
    }
}

/// Counters shared by every connection handler.
#[derive(Debug, Default)]
pub struct ServerStats {
    rows: AtomicU64,
    bytes: AtomicU64,
    rejected: AtomicU64,
    connections: AtomicU64,
}

impl ServerStats {
    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

pub struct ReferenceServer {
    listener: TcpListener,
    config: ServerConfig,
    stats: Arc<ServerStats>,
}

impl ReferenceServer {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind reference server on {}", addr))?;

        Ok(Self {
            listener,
            config,
            stats: Arc::new(ServerStats::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = self.local_addr()?;
        info!("Reference server listening on {}", local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.context("Failed to accept connection")?;
                    self.stats.connections.fetch_add(1, Ordering::Relaxed);
                    let config = self.config.clone();
                    let stats = Arc::clone(&self.stats);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, config, stats).await {
                            warn!("Connection {} ended with error: {}", peer, e);
                        }
                    });
                }
            }
        }

        info!(
            "Reference server stopped: {} rows applied ({} bytes), {} rejected",
            self.stats.rows(),
            self.stats.bytes(),
            self.stats.rejected()
        );
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: ServerConfig,
    stats: Arc<ServerStats>,
) -> Result<()> {
    debug!("Handling connection from {}", peer);
    stream.set_nodelay(true)?;
    let mut inserted = HashSet::new();

    while let Some(body) = read_frame(&mut stream).await? {
        let request = WriteRequest::from_bytes(&body)?;
        let status = apply(&request, &config, &mut inserted);

        match &status {
            WriteStatus::Applied => {
                stats.rows.fetch_add(1, Ordering::Relaxed);
                stats
                    .bytes
                    .fetch_add(request.payload.len() as u64, Ordering::Relaxed);
            }
            WriteStatus::Rejected(reason) => {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!("Rejected record {} from {}: {}", request.record_id, peer, reason);
            }
        }

        let response = WriteResponse {
            record_id: request.record_id,
            status,
        };
        write_frame(&mut stream, &response.to_bytes()?).await?;
    }

    debug!("Connection from {} closed", peer);
    Ok(())
}

fn apply(request: &WriteRequest<'_>, config: &ServerConfig, inserted: &mut HashSet<u64>) -> WriteStatus {
    if request.payload.len() > config.max_payload {
        return WriteStatus::Rejected(format!(
            "payload of {} bytes exceeds the {} byte column limit",
            request.payload.len(),
            config.max_payload
        ));
    }
    if !inserted.insert(request.record_id) {
        return WriteStatus::Rejected(format!(
            "duplicate record id {}",
            request.record_id
        ));
    }
    WriteStatus::Applied
}

/// Read one frame; `Ok(None)` on a clean close between frames.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match stream.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(anyhow!("Frame too large: {} bytes", len));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some(body))
}

async fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let frame = super::encode_frame(body)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}
