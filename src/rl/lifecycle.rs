//! Model Lifecycle
//!
//! Load-or-create, save, and open for networks keyed by model id. A snapshot
//! is a fixed little-endian header followed by the named MessagePack record.

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{A3cError, Result};
use crate::rl::model::ModelHandle;
use crate::rl::networks::{ActorCriticConfig, ActorCriticNetwork};
use crate::rl::training::checkpointing::{FileModelStore, ModelStore};

const SNAPSHOT_MAGIC: [u8; 4] = *b"A3CM";
const SNAPSHOT_FORMAT: u16 = 2;

/// magic | format: u16 | input_size: u64 | payload_len: u64
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SnapshotHeader {
    magic: [u8; 4],
    format: u16,
    input_size: u64,
    payload_len: u64,
}

impl SnapshotHeader {
    const LEN: usize = 4 + 2 + 8 + 8;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.format.to_le_bytes());
        out.extend_from_slice(&self.input_size.to_le_bytes());
        out.extend_from_slice(&self.payload_len.to_le_bytes());
    }

    /// Header and the payload that follows it
    fn split(bytes: &[u8]) -> Result<(Self, &[u8])> {
        if bytes.len() < Self::LEN {
            return Err(A3cError::MalformedSnapshot(format!(
                "{} bytes is shorter than the header",
                bytes.len()
            )));
        }
        let (head, payload) = bytes.split_at(Self::LEN);
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        let mut format = [0u8; 2];
        format.copy_from_slice(&head[4..6]);
        let mut input_size = [0u8; 8];
        input_size.copy_from_slice(&head[6..14]);
        let mut payload_len = [0u8; 8];
        payload_len.copy_from_slice(&head[14..22]);

        let header = Self {
            magic,
            format: u16::from_le_bytes(format),
            input_size: u64::from_le_bytes(input_size),
            payload_len: u64::from_le_bytes(payload_len),
        };
        Ok((header, payload))
    }
}

type NetworkRecord<B> = <ActorCriticNetwork<B> as Module<B>>::Record;

fn recorder() -> NamedMpkBytesRecorder<FullPrecisionSettings> {
    NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
}

/// Creates, restores and persists networks through a [`ModelStore`]
pub struct ModelLifecycle<S> {
    store: S,
    network: ActorCriticConfig,
}

impl ModelLifecycle<FileModelStore> {
    /// File-backed lifecycle under `model_folder`
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            FileModelStore::new(&config.model_folder),
            config.a3c.input_size,
        )
    }
}

impl<S: ModelStore> ModelLifecycle<S> {
    pub fn new(store: S, input_size: usize) -> Self {
        Self {
            store,
            network: ActorCriticConfig::new(input_size),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn input_size(&self) -> usize {
        self.network.input_size
    }

    /// Fresh network from the configured topology
    pub fn create<B: Backend>(&self, id: &str, device: &B::Device) -> Result<ActorCriticNetwork<B>> {
        info!(model_id = id, input_size = self.input_size(), "Creating new model");
        self.network.init(device)
    }

    /// Persisted network for `id`, or a fresh one when there is no usable
    /// snapshot. Read errors other than "not found" are returned.
    pub async fn load<B: Backend>(
        &self,
        id: &str,
        device: &B::Device,
    ) -> Result<ActorCriticNetwork<B>> {
        let Some(bytes) = self.store.restore(id).await? else {
            info!(model_id = id, "No snapshot found");
            return self.create(id, device);
        };

        match self.decode(&bytes, device) {
            Ok(network) => {
                info!(model_id = id, bytes = bytes.len(), "Loaded model snapshot");
                Ok(network)
            }
            Err(e @ (A3cError::MalformedSnapshot(_) | A3cError::Recorder(_))) => {
                warn!(model_id = id, "Discarding unusable snapshot: {}", e);
                self.create(id, device)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist `network` under `id`, replacing any earlier snapshot
    pub async fn save<B: Backend>(&self, network: ActorCriticNetwork<B>, id: &str) -> Result<()> {
        let bytes = self.encode(network)?;
        self.store.write(id, bytes, true).await
    }

    /// Load-or-create wrapped in a live handle
    pub async fn open<B: Backend>(&self, id: &str, device: &B::Device) -> Result<ModelHandle<B>> {
        let network = self.load(id, device).await?;
        Ok(ModelHandle::new(id, network))
    }

    fn encode<B: Backend>(&self, network: ActorCriticNetwork<B>) -> Result<Vec<u8>> {
        let input_size = network.input_size() as u64;
        let record = Recorder::<B>::record(&recorder(), network.into_record(), ())?;
        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format: SNAPSHOT_FORMAT,
            input_size,
            payload_len: record.len() as u64,
        };

        let mut bytes = Vec::with_capacity(SnapshotHeader::LEN + record.len());
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&record);
        Ok(bytes)
    }

    fn decode<B: Backend>(&self, bytes: &[u8], device: &B::Device) -> Result<ActorCriticNetwork<B>> {
        let (header, payload) = SnapshotHeader::split(bytes)?;

        if header.magic != SNAPSHOT_MAGIC || header.format != SNAPSHOT_FORMAT {
            return Err(A3cError::MalformedSnapshot(format!(
                "unknown snapshot format {:?}/{}",
                header.magic, header.format
            )));
        }
        if header.payload_len != payload.len() as u64 {
            return Err(A3cError::MalformedSnapshot(format!(
                "expected {} payload bytes, found {}",
                header.payload_len,
                payload.len()
            )));
        }
        if header.input_size != self.input_size() as u64 {
            return Err(A3cError::MalformedSnapshot(format!(
                "snapshot input size {} does not match configured {}",
                header.input_size,
                self.input_size()
            )));
        }

        let fresh: ActorCriticNetwork<B> = self.network.init(device)?;
        let expected = fresh.parameter_shapes();
        let record: NetworkRecord<B> =
            Recorder::<B>::load(&recorder(), payload.to_vec(), device)?;
        let network = fresh.load_record(record);

        if network.parameter_shapes() != expected {
            return Err(A3cError::MalformedSnapshot(
                "parameter shapes do not match the topology".into(),
            ));
        }
        Ok(network)
    }
}
