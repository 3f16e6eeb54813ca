use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{Client, Topic};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::memory::topic::MemoryTopic;
use crate::message::Message;

/// In-memory broker client: a registry of topics created lazily on first
/// reference by name. All data lives on the heap of the current process
/// and is dropped on close.
pub struct MemoryClient {
    config: BrokerConfig,
    topics: Mutex<HashMap<String, Arc<MemoryTopic>>>,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    pub fn with_config(config: BrokerConfig) -> Self {
        MemoryClient {
            config,
            topics: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn memory_topic(&self, name: &str) -> Arc<MemoryTopic> {
        let mut topics = self.topics.lock();
        Arc::clone(
            topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryTopic::new(name, self.config))),
        )
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Client for MemoryClient {
    fn topic_of(&self, name: &str) -> Result<Arc<dyn Topic>, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(self.memory_topic(name) as Arc<dyn Topic>)
    }

    fn last_message(&self, topic: &str, _shard_id: &str) -> Result<Option<Message>, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        let topic = self.memory_topic(topic);
        let state = topic.core().lock_state("last message")?;
        Ok(state.last_message().cloned())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let topics: Vec<_> = self.topics.lock().drain().collect();
        for (_, topic) in topics {
            topic.close();
        }
    }
}
