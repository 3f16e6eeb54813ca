use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{QueuingConsumer, QueuingHandle};
use crate::error::BrokerError;
use crate::memory::topic::TopicCore;
use crate::message::Message;

/// Queuing consumer over the in-memory broker.
///
/// Delivery state lives in the topic, shared by all queuing consumers of
/// the shard: each message is delivered to exactly one of them at a time,
/// and an unacknowledged delivery is requeued once the visibility timeout
/// elapses. Expired deliveries are reclaimed lazily on the next receive,
/// so no background timer is needed.
pub struct MemoryQueuingConsumer {
    core: Arc<TopicCore>,
    closed: AtomicBool,
}

impl MemoryQueuingConsumer {
    pub(crate) fn new(core: Arc<TopicCore>) -> Self {
        MemoryQueuingConsumer {
            core,
            closed: AtomicBool::new(false),
        }
    }
}

impl QueuingConsumer for MemoryQueuingConsumer {
    fn topic(&self) -> &str {
        self.core.name()
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Box<dyn QueuingHandle>>, BrokerError> {
        let deadline = Instant::now() + timeout;
        let visibility_timeout = self.core.config().visibility_timeout;
        let mut state = self.core.lock_state("queuing receive")?;
        loop {
            let now = Instant::now();
            state.reclaim_expired(visibility_timeout, now);
            if let Some((token, message)) = state.take_for_delivery(now) {
                return Ok(Some(Box::new(MemoryQueuingHandle {
                    core: Arc::clone(&self.core),
                    token,
                    message,
                })));
            }
            if self.closed.load(Ordering::SeqCst) || self.core.is_closed() {
                return Err(BrokerError::Closed);
            }
            if now >= deadline {
                return Ok(None);
            }
            // Wake early if an outstanding delivery comes due before the
            // caller's deadline.
            let mut wait = deadline - now;
            if let Some(due) = state.next_redelivery_due(visibility_timeout) {
                if due <= now {
                    continue;
                }
                wait = wait.min(due - now);
            }
            self.core.wait_production(&mut state, wait);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.core.is_closed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.core.wake_all();
    }
}

struct MemoryQueuingHandle {
    core: Arc<TopicCore>,
    token: u64,
    message: Message,
}

impl QueuingHandle for MemoryQueuingHandle {
    fn message(&self) -> &Message {
        &self.message
    }

    fn ack(&self) -> Result<(), BrokerError> {
        let mut state = self.core.lock_state("ack")?;
        if !state.ack(self.token) {
            log::debug!(
                "ack on topic {} arrived after the delivery was requeued",
                self.core.name()
            );
        }
        Ok(())
    }
}
