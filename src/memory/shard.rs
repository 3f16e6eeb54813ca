use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::api::{QueuingConsumer, Shard, StreamingConsumer};
use crate::cursor::Cursor;
use crate::error::BrokerError;
use crate::id;
use crate::memory::queuing::MemoryQueuingConsumer;
use crate::memory::streaming::MemoryStreamingConsumer;
use crate::memory::topic::TopicCore;

/// The single shard of an in-memory topic. Tracks the consumers it
/// created so closing the shard closes them too. The registries hold weak
/// references and are pruned of dropped and closed consumers on every
/// factory call, so a consumer's lifetime stays with its callers.
pub struct MemoryShard {
    shard_id: String,
    core: Arc<TopicCore>,
    streaming: Mutex<Vec<Weak<MemoryStreamingConsumer>>>,
    queuing: Mutex<Vec<Weak<MemoryQueuingConsumer>>>,
}

impl MemoryShard {
    pub(crate) fn new(shard_id: impl Into<String>, core: Arc<TopicCore>) -> Self {
        MemoryShard {
            shard_id: shard_id.into(),
            core,
            streaming: Mutex::new(Vec::new()),
            queuing: Mutex::new(Vec::new()),
        }
    }
}

fn register<C>(registry: &Mutex<Vec<Weak<C>>>, consumer: &Arc<C>, is_closed: fn(&C) -> bool) {
    let mut registry = registry.lock();
    registry.retain(|weak| weak.upgrade().is_some_and(|live| !is_closed(&live)));
    registry.push(Arc::downgrade(consumer));
}

impl Shard for MemoryShard {
    fn shard_id(&self) -> &str {
        &self.shard_id
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_queuing(&self) -> bool {
        true
    }

    fn streaming_consumer(
        &self,
        initial_position: Cursor,
    ) -> Result<Arc<dyn StreamingConsumer>, BrokerError> {
        let consumer = Arc::new(MemoryStreamingConsumer::new(
            Arc::clone(&self.core),
            initial_position,
        )?);
        register(&self.streaming, &consumer, |c| {
            StreamingConsumer::is_closed(c)
        });
        Ok(consumer)
    }

    fn queuing_consumer(&self) -> Result<Arc<dyn QueuingConsumer>, BrokerError> {
        if self.core.is_closed() {
            return Err(BrokerError::Closed);
        }
        let consumer = Arc::new(MemoryQueuingConsumer::new(Arc::clone(&self.core)));
        register(&self.queuing, &consumer, |c| QueuingConsumer::is_closed(c));
        Ok(consumer)
    }

    fn cursor_at_last_message(&self) -> Result<Option<Cursor>, BrokerError> {
        if self.core.is_closed() {
            return Err(BrokerError::Closed);
        }
        let state = self.core.lock_state("cursor at last message")?;
        Ok(state
            .last_message()
            .and_then(|message| message.ulid())
            .map(|ulid| Cursor::at_ulid(ulid, true)))
    }

    fn cursor_after_last_message(&self) -> Result<Cursor, BrokerError> {
        if self.core.is_closed() {
            return Err(BrokerError::Closed);
        }
        let now = id::current_millis();
        let state = self.core.lock_state("cursor after last message")?;
        Ok(match state.last_message().and_then(|message| message.ulid()) {
            Some(ulid) => Cursor::at_ulid(ulid, false),
            None => Cursor::at_ulid(id::beginning_of(now), true),
        })
    }

    fn close(&self) {
        let streaming: Vec<_> = std::mem::take(&mut *self.streaming.lock());
        for consumer in streaming.iter().filter_map(Weak::upgrade) {
            consumer.close();
        }
        let queuing: Vec<_> = std::mem::take(&mut *self.queuing.lock());
        for consumer in queuing.iter().filter_map(Weak::upgrade) {
            consumer.close();
        }
    }
}
