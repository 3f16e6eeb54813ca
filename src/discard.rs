//! Discard provider: accepts everything, stores nothing.
//!
//! Every publish is dropped, every receive returns immediately with no
//! message, and close is a no-op. Useful for wiring tests and for
//! switching a deployment's output off by configuration alone.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{
    Client, MetadataClient, Producer, QueuingConsumer, QueuingHandle, Shard, StreamingConsumer,
    Topic,
};
use crate::cursor::Cursor;
use crate::error::BrokerError;
use crate::id;
use crate::message::Message;

pub struct DiscardClient;

impl DiscardClient {
    pub fn new() -> Self {
        DiscardClient
    }
}

impl Default for DiscardClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Client for DiscardClient {
    fn topic_of(&self, name: &str) -> Result<Arc<dyn Topic>, BrokerError> {
        Ok(Arc::new(DiscardTopic {
            name: name.to_string(),
        }))
    }

    fn last_message(&self, _topic: &str, _shard_id: &str) -> Result<Option<Message>, BrokerError> {
        Ok(None)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

pub struct DiscardTopic {
    name: String,
}

impl Topic for DiscardTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn producer(&self) -> Result<Arc<dyn Producer>, BrokerError> {
        Ok(Arc::new(DiscardProducer {
            topic: self.name.clone(),
        }))
    }

    fn first_shard(&self) -> String {
        "the-only-shard".to_string()
    }

    fn shard_of(&self, _shard_id: &str) -> Result<Arc<dyn Shard>, BrokerError> {
        Ok(Arc::new(DiscardShard {
            topic: self.name.clone(),
        }))
    }

    fn metadata(&self) -> Arc<dyn MetadataClient> {
        Arc::new(DiscardMetadataClient {
            topic: self.name.clone(),
        })
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

struct DiscardProducer {
    topic: String,
}

impl Producer for DiscardProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, _messages: Vec<Message>) -> Result<(), BrokerError> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

struct DiscardShard {
    topic: String,
}

impl Shard for DiscardShard {
    fn shard_id(&self) -> &str {
        "the-only-shard"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_queuing(&self) -> bool {
        true
    }

    fn streaming_consumer(
        &self,
        _initial_position: Cursor,
    ) -> Result<Arc<dyn StreamingConsumer>, BrokerError> {
        Ok(Arc::new(DiscardStreamingConsumer {
            topic: self.topic.clone(),
        }))
    }

    fn queuing_consumer(&self) -> Result<Arc<dyn QueuingConsumer>, BrokerError> {
        Ok(Arc::new(DiscardQueuingConsumer {
            topic: self.topic.clone(),
        }))
    }

    fn cursor_at_last_message(&self) -> Result<Option<Cursor>, BrokerError> {
        Ok(None)
    }

    fn cursor_after_last_message(&self) -> Result<Cursor, BrokerError> {
        Ok(Cursor::at_ulid(id::beginning_of(id::current_millis()), true))
    }

    fn close(&self) {}
}

struct DiscardStreamingConsumer {
    topic: String,
}

impl StreamingConsumer for DiscardStreamingConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn receive(&self, _timeout: Duration) -> Result<Option<Message>, BrokerError> {
        Ok(None)
    }

    fn seek(&self, _timestamp_ms: u64) {}

    fn current_position(&self) -> Cursor {
        Cursor::at_ulid(id::beginning_of_time(), true)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

struct DiscardQueuingConsumer {
    topic: String,
}

impl QueuingConsumer for DiscardQueuingConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn receive(&self, _timeout: Duration) -> Result<Option<Box<dyn QueuingHandle>>, BrokerError> {
        Ok(None)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

struct DiscardMetadataClient {
    topic: String,
}

impl MetadataClient for DiscardMetadataClient {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn put(&self, _key: &str, _value: Vec<u8>) {}

    fn remove(&self, _key: &str) {}
}
