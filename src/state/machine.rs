//! Testnet state machine
//!
//! State changes come from two places:
//! - callers registering validators or fetching artifacts, served directly by the store
//! - the heartbeat ticker, whose tocks queue a global sweep for the worker loop
//!
//! The worker loop is the only consumer of the message queue and the ticker.

use crate::error::{DirectorError, DirectorResult};
use crate::state::messages::MachineMessage;
use crate::state::ticker::{TimeoutInfo, TimeoutTicker};
use crate::store::{AddrBook, ResultGenesis, TestnetStore, ValidatorInfo};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the internal message queue
pub const MSG_QUEUE_SIZE: usize = 1000;

pub struct StateMachine {
    store: Arc<TestnetStore>,
    msg_tx: mpsc::Sender<MachineMessage>,
    msg_rx: Mutex<Option<mpsc::Receiver<MachineMessage>>>,
    ticker: Arc<TimeoutTicker>,
    heartbeat: Duration,
    shutdown_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StateMachine {
    pub fn new(store: Arc<TestnetStore>, heartbeat: Duration) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(MSG_QUEUE_SIZE);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            msg_tx,
            msg_rx: Mutex::new(Some(msg_rx)),
            ticker: Arc::new(TimeoutTicker::new()),
            heartbeat,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Arm the ticker and spawn the worker loop. Must run inside a Tokio runtime.
    pub fn start(&self) -> DirectorResult<()> {
        let msg_rx = self
            .msg_rx
            .lock()
            .take()
            .ok_or_else(|| DirectorError::Internal("state machine already started".to_string()))?;
        let tock_rx = self
            .ticker
            .take_tock_receiver()
            .ok_or_else(|| DirectorError::Internal("timeout ticker already taken".to_string()))?;

        let worker = Worker {
            store: self.store.clone(),
            msg_tx: self.msg_tx.clone(),
            ticker: self.ticker.clone(),
            heartbeat: self.heartbeat,
        };
        let shutdown_rx = self.shutdown_tx.subscribe();
        let running = self.running.clone();

        self.ticker.schedule_timeout(TimeoutInfo::new(Duration::ZERO));
        self.running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let routine = worker.receive_routine(msg_rx, tock_rx, shutdown_rx);
            if let Err(panic) = AssertUnwindSafe(routine).catch_unwind().await {
                error!(
                    error = %panic_message(panic.as_ref()),
                    stack = %Backtrace::force_capture(),
                    "StateMachine failure"
                );
            }
            running.store(false, Ordering::SeqCst);
        });
        *self.worker.lock() = Some(handle);

        info!(heartbeat = ?self.heartbeat, "State machine started");
        Ok(())
    }

    /// Stop the ticker and signal the worker loop to exit.
    ///
    /// Does not wait for the loop or for direct calls in flight.
    pub fn stop(&self) {
        self.ticker.stop();
        self.shutdown_tx.send_replace(true);
        info!("State machine stopped");
    }

    /// Wait for the worker loop to exit
    pub async fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "State machine worker did not exit cleanly");
            }
        }
    }

    /// Whether the worker loop is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue a message for the worker loop without waiting for it to be handled
    pub fn send_message(&self, msg: MachineMessage) -> DirectorResult<()> {
        msg.validate_basic()?;
        self.msg_tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(msg) => {
                warn!(msg = msg.name(), "Message queue full, dropping message");
                DirectorError::Internal(format!("message queue full, dropped {}", msg.name()))
            }
            mpsc::error::TrySendError::Closed(msg) => {
                DirectorError::Internal(format!("state machine closed, dropped {}", msg.name()))
            }
        })
    }

    /// Register a validator synchronously, bypassing the message queue
    pub fn register_validator(&self, chain_id: &str, validator: ValidatorInfo) -> DirectorResult<()> {
        self.store.register_validator(chain_id, validator)
    }

    pub fn get_genesis(&self, chain_id: &str) -> DirectorResult<ResultGenesis> {
        self.store.get_genesis(chain_id)
    }

    pub fn get_address_book(&self, chain_id: &str) -> DirectorResult<AddrBook> {
        self.store.get_address_book(chain_id)
    }

    pub fn store(&self) -> &Arc<TestnetStore> {
        &self.store
    }
}

/// The single consumer of the message queue and the ticker
struct Worker {
    store: Arc<TestnetStore>,
    msg_tx: mpsc::Sender<MachineMessage>,
    ticker: Arc<TimeoutTicker>,
    heartbeat: Duration,
}

impl Worker {
    async fn receive_routine(
        self,
        mut msg_rx: mpsc::Receiver<MachineMessage>,
        mut tock_rx: mpsc::Receiver<TimeoutInfo>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => return,
                Some(msg) = msg_rx.recv() => self.handle_msg(msg).await,
                Some(ti) = tock_rx.recv() => self.handle_timeout(ti),
            }
        }
    }

    async fn handle_msg(&self, msg: MachineMessage) {
        let kind = msg.name();
        debug!(msg = kind, "Received message");

        // Store calls block on disk I/O
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || match msg {
            MachineMessage::RegisterValidator {
                chain_id,
                validator,
            } => store.register_validator(&chain_id, validator),
            MachineMessage::GlobalSweep => store.global_sweep(),
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(msg = kind, error = %e, "Error with msg"),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => error!(msg = kind, error = %e, "Message handler cancelled"),
        }
    }

    fn handle_timeout(&self, ti: TimeoutInfo) {
        debug!(timeout = ?ti.duration, "Received tock");
        match self.msg_tx.try_send(MachineMessage::GlobalSweep) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Message queue full, dropping GlobalSweep");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Message queue closed, dropping GlobalSweep");
            }
        }
        self.ticker
            .schedule_timeout(TimeoutInfo::new(self.heartbeat));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
