//! Chain synchronizer: a single consumer task applying block events in order.
//!
//! Producers push [`ChainEvent`]s onto an unbounded queue through a
//! [`SyncHandle`] and never touch the wallet state lock. The task applies
//! connects and disconnects one at a time under the exclusive lock, answers
//! flush barriers once everything queued before them is applied, and exits
//! on the shutdown sentinel or the first integrity violation.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::WalletError;
use crate::state::{ChainUpdate, WalletState};

/// Events consumed by the synchronizer task, in queue order.
#[derive(Debug)]
pub enum ChainEvent {
    /// A block was connected.
    Connected(ChainUpdate),
    /// The block at this height was disconnected.
    Disconnected { height: u64 },
    /// Barrier answered once every earlier event is applied.
    Flush(oneshot::Sender<()>),
    /// Sentinel: exit after every earlier event is applied.
    Shutdown,
}

/// State shared between the handle and the task.
#[derive(Debug, Default)]
struct SyncShared {
    /// The task is running.
    running: AtomicBool,
    /// No further events are accepted.
    closed: AtomicBool,
    /// Held across the closed check and the send, so nothing lands behind
    /// the shutdown sentinel.
    gate: Mutex<()>,
    /// First integrity violation observed.
    fault: Mutex<Option<WalletError>>,
}

impl SyncShared {
    fn record_fault(&self, err: WalletError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(err);
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Producer side of the chain event queue.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    event_tx: mpsc::UnboundedSender<ChainEvent>,
    shared: Arc<SyncShared>,
}

impl SyncHandle {
    /// Create a handle and the receiver the task will drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChainEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = Self {
            event_tx,
            shared: Arc::new(SyncShared::default()),
        };
        (handle, event_rx)
    }

    /// Append an event at the queue tail.
    pub fn enqueue(&self, event: ChainEvent) -> Result<(), WalletError> {
        let _gate = self.shared.gate.lock();
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(self.stopped_error());
        }
        self.event_tx
            .send(event)
            .map_err(|_| self.stopped_error())
    }

    /// Record a fault raised outside the task and stop accepting events.
    /// The task exits after draining what was queued before.
    pub fn fail(&self, err: WalletError) {
        let _gate = self.shared.gate.lock();
        let was_closed = self.shared.closed.load(Ordering::SeqCst);
        self.shared.record_fault(err);
        if !was_closed {
            let _ = self.event_tx.send(ChainEvent::Shutdown);
        }
    }

    /// Stop accepting events and queue the shutdown sentinel.
    pub fn stop(&self) {
        let _gate = self.shared.gate.lock();
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            let _ = self.event_tx.send(ChainEvent::Shutdown);
        }
    }

    /// Wait until every event queued before this call is applied.
    pub async fn flush(&self) -> Result<(), WalletError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(ChainEvent::Flush(done_tx))?;
        done_rx.await.map_err(|_| self.stopped_error())?;
        self.check()
    }

    /// The recorded fault, if any.
    pub fn fault(&self) -> Option<WalletError> {
        self.shared.fault.lock().clone()
    }

    /// `Err` with the recorded fault, if any.
    pub fn check(&self) -> Result<(), WalletError> {
        match self.fault() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn stopped_error(&self) -> WalletError {
        self.fault().unwrap_or(WalletError::Stopped)
    }

    /// Spawn the synchronizer task on the current Tokio runtime.
    pub fn spawn(
        &self,
        events: mpsc::UnboundedReceiver<ChainEvent>,
        state: Arc<RwLock<WalletState>>,
    ) -> tokio::task::JoinHandle<()> {
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            chain_syncer(events, state, shared).await;
        })
    }
}

/// Background task draining the event queue.
async fn chain_syncer(
    mut events: mpsc::UnboundedReceiver<ChainEvent>,
    state: Arc<RwLock<WalletState>>,
    shared: Arc<SyncShared>,
) {
    info!("chain synchronizer started");
    while let Some(event) = events.recv().await {
        match event {
            ChainEvent::Connected(update) => {
                let result = state.write().apply_update(&update);
                match result {
                    Ok(r) => info!(
                        height = update.height,
                        created = r.utxos_created,
                        spent = r.utxos_spent,
                        "connected block"
                    ),
                    Err(e) => {
                        error!(height = update.height, "connect failed: {e}");
                        shared.record_fault(e);
                        break;
                    }
                }
            }
            ChainEvent::Disconnected { height } => {
                let result = state.write().unwind(height);
                match result {
                    Ok(r) => info!(
                        height,
                        restored = r.utxos_restored,
                        removed = r.utxos_removed,
                        "disconnected block"
                    ),
                    Err(e) => {
                        error!(height, "disconnect failed: {e}");
                        shared.record_fault(e);
                        break;
                    }
                }
            }
            ChainEvent::Flush(done) => {
                debug!("flush barrier reached");
                let _ = done.send(());
            }
            ChainEvent::Shutdown => break,
        }
    }
    shared.closed.store(true, Ordering::SeqCst);
    shared.running.store(false, Ordering::SeqCst);
    info!("chain synchronizer stopped");
}
