//! Provider seam - the traits application code programs against.
//!
//! A provider supplies a [`Client`]; everything else is reached from it.
//! The crate ships two providers: the in-memory broker (`memory`) and a
//! no-op sink (`discard`). Consumer factories default to
//! [`BrokerError::Unsupported`] so a provider only implements the
//! consumption models it actually supports.

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::cursor::{Cursor, CursorBuilder, CursorPosition};
use crate::error::BrokerError;
use crate::message::Message;

/// Timeout used by the thread-backed async receive variants.
pub const ASYNC_RECEIVE_TIMEOUT: Duration = Duration::from_secs(300);

/// Entry point to a provider: a registry of topics by name.
pub trait Client: Send + Sync {
    /// Return the topic with the given name, creating it on first
    /// reference. Idempotent by name.
    fn topic_of(&self, name: &str) -> Result<Arc<dyn Topic>, BrokerError>;

    /// The current last message of the given shard, or `None` on an empty
    /// topic.
    fn last_message(&self, topic: &str, shard_id: &str) -> Result<Option<Message>, BrokerError>;

    fn is_closed(&self) -> bool;

    /// Cascade close to all owned topics, producers and consumers,
    /// clearing all stored data. A full teardown, not a flush.
    fn close(&self);
}

/// A named, independently ordered message log.
pub trait Topic: Send + Sync {
    fn name(&self) -> &str;

    fn producer(&self) -> Result<Arc<dyn Producer>, BrokerError>;

    /// Shard names, or `None` if the provider does not expose shard
    /// control. This implementation is single-shard by default.
    fn shards(&self) -> Option<Vec<String>> {
        None
    }

    /// The shard to use when the caller does not care about sharding.
    fn first_shard(&self) -> String;

    fn shard_of(&self, shard_id: &str) -> Result<Arc<dyn Shard>, BrokerError>;

    /// The per-topic key-to-bytes metadata store.
    fn metadata(&self) -> Arc<dyn MetadataClient>;

    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// Appends messages to a topic's log.
pub trait Producer: Send + Sync {
    fn topic(&self) -> &str;

    /// Append the batch under a single lock acquisition. Messages without
    /// an identifier get one assigned.
    fn publish(&self, messages: Vec<Message>) -> Result<(), BrokerError>;

    fn is_closed(&self) -> bool;

    fn close(&self);
}

fn cursor_from_message(message: &Message, inclusive: bool) -> Result<Cursor, BrokerError> {
    match message.ulid() {
        Some(ulid) => Ok(Cursor::at_ulid(ulid, inclusive)),
        None => Err(BrokerError::NotCompatibleCursor(
            "message carries no identifier; it did not come from a stream".to_string(),
        )),
    }
}

/// A partition view of a topic: cursor construction plus the consumer
/// factories.
pub trait Shard: Send + Sync {
    fn shard_id(&self) -> &str;

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_queuing(&self) -> bool {
        false
    }

    /// Create a streaming consumer starting at the given cursor. The
    /// cursor is resolved once, here; resolution by external id may fail
    /// with [`BrokerError::NoSuchExternalId`].
    fn streaming_consumer(
        &self,
        initial_position: Cursor,
    ) -> Result<Arc<dyn StreamingConsumer>, BrokerError> {
        let _ = initial_position;
        Err(BrokerError::Unsupported("streaming consumer"))
    }

    fn queuing_consumer(&self) -> Result<Arc<dyn QueuingConsumer>, BrokerError> {
        Err(BrokerError::Unsupported("queuing consumer"))
    }

    fn cursor_of(&self) -> CursorBuilder {
        Cursor::builder()
    }

    fn cursor_of_checkpoint(&self, checkpoint: &str) -> Result<Cursor, BrokerError> {
        Cursor::from_checkpoint(checkpoint)
    }

    /// A cursor pointing right at the given message.
    fn cursor_at(&self, message: &Message) -> Result<Cursor, BrokerError> {
        cursor_from_message(message, true)
    }

    /// A cursor pointing right after the given message.
    fn cursor_after(&self, message: &Message) -> Result<Cursor, BrokerError> {
        cursor_from_message(message, false)
    }

    /// A cursor at the last message as of this call, or `None` on an empty
    /// topic. Does not track future writes.
    fn cursor_at_last_message(&self) -> Result<Option<Cursor>, BrokerError>;

    /// A cursor after the last message as of this call. On an empty topic
    /// this is the beginning of the current millisecond.
    fn cursor_after_last_message(&self) -> Result<Cursor, BrokerError>;

    /// A symbolic cursor that resolves to "whatever is last" at the time
    /// it is used, not at the time it is created.
    fn cursor_head(&self) -> Cursor {
        Cursor::new(CursorPosition::Now, true)
    }

    /// A cursor at the oldest retained message.
    fn cursor_at_trim_horizon(&self) -> Cursor {
        Cursor::new(CursorPosition::Oldest, true)
    }

    fn close(&self);
}

/// Client-tracked-position consumption: ordered, replayable via
/// checkpoint.
pub trait StreamingConsumer: Send + Sync {
    fn topic(&self) -> &str;

    /// Block until the next message after the current position is
    /// available, the timeout expires (`Ok(None)`), or the consumer or its
    /// topic is closed (`Err(Closed)`). The timeout is a wall-clock
    /// deadline.
    fn receive(&self, timeout: Duration) -> Result<Option<Message>, BrokerError>;

    /// Reposition to the first message at or after the given epoch
    /// millisecond.
    fn seek(&self, timestamp_ms: u64);

    /// The current resolved position, suitable for checkpointing.
    fn current_position(&self) -> Cursor;

    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// Server-tracked-delivery consumption: at-least-once via ack handles and
/// visibility-timeout redelivery.
pub trait QueuingConsumer: Send + Sync {
    fn topic(&self) -> &str;

    /// Block until a message is available for delivery, the timeout
    /// expires (`Ok(None)`), or the consumer or its topic is closed
    /// (`Err(Closed)`).
    fn receive(&self, timeout: Duration) -> Result<Option<Box<dyn QueuingHandle>>, BrokerError>;

    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// A delivered message plus the means to acknowledge it.
pub trait QueuingHandle: Send {
    fn message(&self) -> &Message;

    /// Mark this delivery done. Idempotent: acking a delivery that already
    /// timed out and was requeued is a no-op, not an error.
    fn ack(&self) -> Result<(), BrokerError>;
}

/// Per-topic key-to-bytes metadata store.
pub trait MetadataClient: Send + Sync {
    fn topic(&self) -> &str;

    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn put(&self, key: &str, value: Vec<u8>);

    fn remove(&self, key: &str);
}

/// Thread-backed async publish, the scheduling convenience counterpart of
/// [`Producer::publish`]. Two concurrent async publishes are unordered
/// relative to each other unless externally synchronized.
pub trait PublishAsync {
    fn publish_async(&self, messages: Vec<Message>) -> JoinHandle<Result<(), BrokerError>>;
}

impl<P: Producer + ?Sized + 'static> PublishAsync for Arc<P> {
    fn publish_async(&self, messages: Vec<Message>) -> JoinHandle<Result<(), BrokerError>> {
        let producer = Arc::clone(self);
        thread::spawn(move || producer.publish(messages))
    }
}

/// Thread-backed async receive for streaming consumers, bounded by
/// [`ASYNC_RECEIVE_TIMEOUT`].
pub trait ReceiveAsync {
    fn receive_async(&self) -> JoinHandle<Result<Option<Message>, BrokerError>>;
}

impl<C: StreamingConsumer + ?Sized + 'static> ReceiveAsync for Arc<C> {
    fn receive_async(&self) -> JoinHandle<Result<Option<Message>, BrokerError>> {
        let consumer = Arc::clone(self);
        thread::spawn(move || consumer.receive(ASYNC_RECEIVE_TIMEOUT))
    }
}

/// Thread-backed async receive for queuing consumers.
pub trait ReceiveHandleAsync {
    fn receive_async(&self) -> JoinHandle<Result<Option<Box<dyn QueuingHandle>>, BrokerError>>;
}

impl<C: QueuingConsumer + ?Sized + 'static> ReceiveHandleAsync for Arc<C> {
    fn receive_async(&self) -> JoinHandle<Result<Option<Box<dyn QueuingHandle>>, BrokerError>> {
        let consumer = Arc::clone(self);
        thread::spawn(move || consumer.receive(ASYNC_RECEIVE_TIMEOUT))
    }
}
