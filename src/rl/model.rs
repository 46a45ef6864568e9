//! Model Handle
//!
//! Explicit owner of the live network. Burn modules are `Send` but not `Sync`,
//! so the current network sits behind a mutex and readers work on a cheap
//! clone; an update publishes a whole new network in one swap.

use std::sync::atomic::{AtomicU64, Ordering};

use burn::prelude::*;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;
use crate::frame::Frame;
use crate::rl::networks::ActorCriticNetwork;

/// Live network for one model id, shared by reference between predictors and
/// trainers
pub struct ModelHandle<B: Backend> {
    id: String,
    current: Mutex<ActorCriticNetwork<B>>,
    writer: Mutex<()>,
    version: AtomicU64,
}

impl<B: Backend> ModelHandle<B> {
    pub fn new(id: impl Into<String>, network: ActorCriticNetwork<B>) -> Self {
        Self {
            id: id.into(),
            current: Mutex::new(network),
            writer: Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of updates published since the handle was opened
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Consistent copy of the current network
    pub async fn snapshot(&self) -> ActorCriticNetwork<B> {
        self.current.lock().await.clone()
    }

    pub async fn input_size(&self) -> usize {
        self.current.lock().await.input_size()
    }

    /// Inference against the parameters current at call time
    pub async fn infer(&self, frame: &Frame) -> Result<(Vec<f32>, f32)> {
        let network = self.snapshot().await;
        network.infer(frame)
    }

    /// Start an update. Updates are serialised; readers are never blocked
    /// while the new parameters are computed.
    pub async fn begin_update(&self) -> ModelUpdate<'_, B> {
        let guard = self.writer.lock().await;
        let base = self.snapshot().await;
        ModelUpdate {
            handle: self,
            base,
            _guard: guard,
        }
    }
}

/// Exclusive update in progress; dropping it without [`ModelUpdate::commit`]
/// publishes nothing
pub struct ModelUpdate<'a, B: Backend> {
    handle: &'a ModelHandle<B>,
    base: ActorCriticNetwork<B>,
    _guard: MutexGuard<'a, ()>,
}

impl<'a, B: Backend> ModelUpdate<'a, B> {
    /// Network the update started from
    pub fn base(&self) -> &ActorCriticNetwork<B> {
        &self.base
    }

    /// Owned copy of the base network to mutate
    pub fn working_copy(&self) -> ActorCriticNetwork<B> {
        self.base.clone()
    }

    /// Swap `network` in and return the new version
    pub async fn commit(self, network: ActorCriticNetwork<B>) -> u64 {
        let mut current = self.handle.current.lock().await;
        *current = network;
        let version = self.handle.version.fetch_add(1, Ordering::SeqCst) + 1;
        drop(current);
        debug!(model_id = %self.handle.id, version, "published model update");
        version
    }
}
