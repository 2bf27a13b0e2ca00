use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shoal_db::Database;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::Envelope;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Requests that may wait for dispatch before senders block.
    pub queue_depth: usize,
    /// Records buffered per find stream ahead of the consumer.
    pub find_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_depth: 1024,
            find_buffer: 64,
        }
    }
}

pub struct Server {
    db: Arc<Database>,
    config: ServerConfig,
}

impl Server {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(db),
            config,
        }
    }

    /// Start the dispatch loop on the current runtime. Every request runs on
    /// its own task, so requests from different callers proceed concurrently.
    pub fn spawn(self) -> ServerHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(self.config.queue_depth.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let session = Session::new(Arc::clone(&self.db), self.config.find_buffer);
        info!(
            queue_depth = self.config.queue_depth,
            find_buffer = self.config.find_buffer,
            "shoal server started"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    envelope = rx.recv() => {
                        let Some(envelope) = envelope else {
                            debug!("all clients gone");
                            break;
                        };
                        let session = session.clone();
                        tokio::spawn(async move {
                            let op = envelope.request.op();
                            let response = session.handle(envelope.request);
                            if envelope.reply.send(response).is_err() {
                                warn!(op, "caller dropped before reply");
                            }
                        });
                    }
                    _ = &mut shutdown_rx => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
            info!("shoal server stopped");
        });

        ServerHandle {
            sender: tx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

pub struct ServerHandle {
    sender: mpsc::Sender<Envelope>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// A channel into the server. Each client holds a clone.
    pub fn sender(&self) -> mpsc::Sender<Envelope> {
        self.sender.clone()
    }

    /// Stop accepting requests and wait for the dispatch loop to exit.
    /// Requests already dispatched finish on their own tasks.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("server task failed: {e}");
        }
    }
}
