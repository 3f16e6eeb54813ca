use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::Producer;
use crate::error::BrokerError;
use crate::memory::topic::TopicCore;
use crate::message::Message;

/// Producer for the in-memory broker. Appends whole batches under a
/// single lock acquisition and signals waiting consumers once per batch.
pub struct MemoryProducer {
    core: Arc<TopicCore>,
    closed: AtomicBool,
}

impl MemoryProducer {
    pub(crate) fn new(core: Arc<TopicCore>) -> Self {
        MemoryProducer {
            core,
            closed: AtomicBool::new(false),
        }
    }
}

impl Producer for MemoryProducer {
    fn topic(&self) -> &str {
        self.core.name()
    }

    fn publish(&self, messages: Vec<Message>) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        let mut state = self.core.lock_state("publish")?;
        if self.core.is_closed() {
            return Err(BrokerError::Closed);
        }
        let count = messages.len();
        for message in messages {
            state.write(message)?;
        }
        log::trace!("published {} message(s) to topic {}", count, self.core.name());
        self.core.notify_production();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.core.is_closed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
