use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use avrpc_frame::FrameConfig;

use crate::connection::Connection;
use crate::dispatch::Dispatcher;

/// Accepts TCP connections and runs one [`Connection`] task per peer.
///
/// Per-connection failures never reach the accept loop; the loop itself
/// runs until the hosting runtime shuts down or the listener fails.
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    config: FrameConfig,
}

impl Server {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            config: FrameConfig::default(),
        }
    }

    /// Override framing limits applied to every connection.
    pub fn with_config(mut self, config: FrameConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a listener on `addr`.
    pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
        TcpListener::bind(addr).await
    }

    /// Run the accept loop on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening");
        }

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) if accept_error_is_transient(&err) => {
                    // The peer gave up before we picked the connection up.
                    warn!(error = %err, "accept failed");
                    continue;
                }
                Err(err) => {
                    // Listener-level failure (fd exhaustion, listener gone).
                    warn!(error = %err, "accept failed, stopping");
                    return Err(err);
                }
            };

            if let Err(err) = stream.set_nodelay(true) {
                debug!(%peer, error = %err, "set_nodelay failed");
            }

            debug!(%peer, "connection accepted");
            let conn = Connection::with_config(
                stream,
                Arc::clone(&self.dispatcher),
                peer.to_string(),
                &self.config,
            );
            tokio::spawn(conn.run());
        }
    }
}

/// Whether an `accept` error concerns only the connection being accepted,
/// as opposed to the listener itself.
fn accept_error_is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Interrupted
    )
}
