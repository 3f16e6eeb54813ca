//! In-memory broker provider.
//!
//! A complete broker living on the process heap: topics are created
//! lazily, each owning an ordered log, a pending-delivery queue and a
//! delivered-but-unacked set, all behind a single mutex and condition
//! variable. Suited to tests and single-process deployments; nothing is
//! persisted.

mod client;
mod metadata;
mod producer;
mod queuing;
mod shard;
mod streaming;
mod topic;

pub use client::MemoryClient;
pub use metadata::MemoryMetadataClient;
pub use producer::MemoryProducer;
pub use queuing::MemoryQueuingConsumer;
pub use shard::MemoryShard;
pub use streaming::MemoryStreamingConsumer;
pub use topic::MemoryTopic;
