use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use write_latency_bench::backend::server::ServerStats;
use write_latency_bench::{ReferenceServer, ServerConfig};

/// Reference server running on its own runtime thread.
///
/// The benchmark itself is blocking, so the server must not share a runtime
/// with the test body.
pub struct TestServer {
    pub addr: SocketAddr,
    pub stats: Arc<ServerStats>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    pub fn start(config: ServerConfig) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("test-server".to_string())
            .spawn(move || -> anyhow::Result<()> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(async move {
                    let server = ReferenceServer::bind("127.0.0.1:0", config).await?;
                    let _ = ready_tx.send((server.local_addr()?, server.stats()));
                    server
                        .run(async {
                            let _ = shutdown_rx.await;
                        })
                        .await
                })
            })
            .expect("spawn server thread");

        let (addr, stats) = ready_rx.recv().expect("reference server failed to start");
        Self {
            addr,
            stats,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn target(&self) -> String {
        self.addr.to_string()
    }

    pub fn stop(mut self) -> Arc<ServerStats> {
        self.shutdown_and_join();
        Arc::clone(&self.stats)
    }

    fn shutdown_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .expect("server thread panicked")
                .expect("server returned an error");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
