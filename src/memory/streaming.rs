use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::api::StreamingConsumer;
use crate::cursor::Cursor;
use crate::error::BrokerError;
use crate::id;
use crate::memory::topic::TopicCore;
use crate::message::Message;

/// Streaming consumer over the in-memory log.
///
/// The resolved position is the only state; the topic itself tracks
/// nothing about this consumer, so any number of them can read the same
/// log independently.
pub struct MemoryStreamingConsumer {
    core: Arc<TopicCore>,
    position: Mutex<Cursor>,
    closed: AtomicBool,
}

impl MemoryStreamingConsumer {
    /// Resolve the initial cursor against the topic and create the
    /// consumer positioned there.
    pub(crate) fn new(core: Arc<TopicCore>, initial_position: Cursor) -> Result<Self, BrokerError> {
        let resolved = {
            let state = core.lock_state("streaming consumer")?;
            if core.is_closed() {
                return Err(BrokerError::Closed);
            }
            core.resolve(&state, &initial_position)?
        };
        Ok(MemoryStreamingConsumer {
            core,
            position: Mutex::new(resolved),
            closed: AtomicBool::new(false),
        })
    }
}

impl StreamingConsumer for MemoryStreamingConsumer {
    fn topic(&self) -> &str {
        self.core.name()
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.core.lock_state("streaming receive")?;
        loop {
            // The position lock is never held across the wait, so seek,
            // current_position and other receive calls stay prompt while
            // this one blocks. Concurrent receives on the same consumer
            // may observe the same position.
            let position = self.position.lock().clone();
            if let Some((ulid, message)) = state.next_after(&position) {
                let message = message.clone();
                *self.position.lock() = Cursor::at_ulid(ulid, false);
                return Ok(Some(message));
            }
            if self.closed.load(Ordering::SeqCst) || self.core.is_closed() {
                return Err(BrokerError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.core.wait_production(&mut state, deadline - now);
        }
    }

    fn seek(&self, timestamp_ms: u64) {
        *self.position.lock() = Cursor::at_ulid(id::beginning_of(timestamp_ms), true);
    }

    fn current_position(&self) -> Cursor {
        self.position.lock().clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.core.is_closed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.core.wake_all();
    }
}
