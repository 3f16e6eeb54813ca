mod api;
mod config;
mod cursor;
mod discard;
mod error;
mod id;
mod memory;
mod message;
mod provider;

pub use api::{
    Client, MetadataClient, Producer, PublishAsync, QueuingConsumer, QueuingHandle, ReceiveAsync,
    ReceiveHandleAsync, Shard, StreamingConsumer, Topic, ASYNC_RECEIVE_TIMEOUT,
};
pub use config::BrokerConfig;
pub use cursor::{Cursor, CursorBuilder, CursorPosition};
pub use discard::{DiscardClient, DiscardTopic};
pub use error::BrokerError;
pub use id::{beginning_of, beginning_of_time, UlidGenerator};
pub use memory::{
    MemoryClient, MemoryMetadataClient, MemoryProducer, MemoryQueuingConsumer, MemoryShard,
    MemoryStreamingConsumer, MemoryTopic,
};
pub use message::{Message, MessageBuilder, ProviderMetadata};
pub use provider::{ClientConstructor, ProviderRegistry};

// Re-export the identifier type from the ulid crate
pub use ulid::Ulid;
