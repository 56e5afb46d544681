//! Node wiring
//!
//! Opens the database, builds the testnet store and the state machine, and
//! runs the RPC server next to them.

use crate::config::DirectorConfig;
use crate::rpc::DirectorRpc;
use crate::state::StateMachine;
use crate::store::{KvBackend, SledBackend, TestnetStore};
use crate::version;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Node {
    config: DirectorConfig,
    machine: Arc<StateMachine>,
    rpc_addr: Option<SocketAddr>,
    rpc_shutdown: Option<oneshot::Sender<()>>,
    rpc_task: Option<JoinHandle<()>>,
}

impl Node {
    /// Build a node backed by the sled database under the configured home
    pub fn new(config: DirectorConfig) -> Result<Self> {
        let db_path = config.db_path();
        let backend = SledBackend::open(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: DirectorConfig, backend: Arc<dyn KvBackend>) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let store = TestnetStore::open(backend, config.testnets.clone())
            .context("Failed to load testnets")?;
        let machine = Arc::new(StateMachine::new(Arc::new(store), config.heartbeat()));

        info!(software = %version::version(), "Version info");

        Ok(Self {
            config,
            machine,
            rpc_addr: None,
            rpc_shutdown: None,
            rpc_task: None,
        })
    }

    /// Start the state machine, then the RPC server if a listen address is set
    pub async fn start(&mut self) -> Result<()> {
        self.machine
            .start()
            .context("Failed to start state machine")?;

        let listen_addr = self.config.rpc.listen_addr().to_string();
        if listen_addr.is_empty() {
            return Ok(());
        }

        let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.machine.stop();
                self.machine.join().await;
                return Err(e)
                    .with_context(|| format!("Failed to bind RPC listener on {}", listen_addr));
            }
        };
        self.rpc_addr = Some(listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let rpc = DirectorRpc::new(self.machine.clone());
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = rpc.serve(listener, shutdown).await {
                error!("RPC server error: {}", e);
            }
        });

        self.rpc_shutdown = Some(shutdown_tx);
        self.rpc_task = Some(task);
        Ok(())
    }

    /// Stop the state machine and close the RPC listener
    pub async fn stop(&mut self) {
        info!("Stopping Node");
        self.machine.stop();

        if let Some(shutdown) = self.rpc_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.rpc_task.take() {
            if let Err(e) = task.await {
                error!("RPC server task failed: {}", e);
            }
        }
        self.machine.join().await;
    }

    /// Address the RPC server is bound to, once started
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    pub fn machine(&self) -> &Arc<StateMachine> {
        &self.machine
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }
}
