//! Topic storage and the lock discipline around it.
//!
//! All mutable state of a topic lives in [`TopicState`] behind one mutex,
//! paired with one condition variable for production signalling. Holding
//! the lock is enforced by the type system: state methods take
//! `&mut TopicState`, reachable only through the guard returned by
//! [`TopicCore::lock_state`].

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use ulid::Ulid;

use crate::api::{MetadataClient, Producer, Shard, Topic};
use crate::config::BrokerConfig;
use crate::cursor::{Cursor, CursorPosition};
use crate::error::BrokerError;
use crate::id::{self, UlidGenerator};
use crate::memory::metadata::MemoryMetadataClient;
use crate::memory::producer::MemoryProducer;
use crate::memory::shard::MemoryShard;
use crate::message::Message;

pub(crate) const SHARD_ID: &str = "the-only-shard";
pub(crate) const TECHNOLOGY: &str = "streambus-memory";

/// An outstanding queuing delivery awaiting acknowledgement.
pub(crate) struct Delivery {
    pub ulid: Ulid,
    pub token: u64,
    pub delivered_at: Instant,
}

/// Everything mutable about a topic. Only reachable under the topic lock.
pub(crate) struct TopicState {
    log: BTreeMap<Ulid, Message>,
    primary: VecDeque<Ulid>,
    delivered: VecDeque<Delivery>,
    generator: UlidGenerator,
    next_token: u64,
}

impl TopicState {
    /// Assign an identifier and provider metadata, then append to the log
    /// and the pending-delivery queue. An explicit identifier reseeds the
    /// generator so later assignments stay above it.
    pub fn write(&mut self, mut message: Message) -> Result<Ulid, BrokerError> {
        let ulid = match message.ulid() {
            Some(explicit) => {
                self.generator.observe(explicit);
                explicit
            }
            None => self.generator.next()?,
        };
        message.set_ulid(ulid);
        message.set_provider(crate::message::ProviderMetadata {
            shard_id: SHARD_ID.to_string(),
            published_timestamp: id::current_millis(),
            sequence_number: ulid.to_string(),
            technology: TECHNOLOGY.to_string(),
        });
        self.log.insert(ulid, message);
        self.primary.push_back(ulid);
        Ok(ulid)
    }

    /// The first log entry at or after the given resolved cursor.
    pub fn next_after(&self, position: &Cursor) -> Option<(Ulid, &Message)> {
        let ulid = position.ulid()?;
        let lower = if position.inclusive() {
            Bound::Included(ulid)
        } else {
            Bound::Excluded(ulid)
        };
        self.log
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (*k, v))
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.log.last_key_value().map(|(_, v)| v)
    }

    /// Scan `[lower, upper)` for the first message with the given external
    /// id.
    pub fn ulid_of_external_id(&self, external_id: &str, lower: Ulid, upper: Ulid) -> Option<Ulid> {
        self.log
            .range((Bound::Included(lower), Bound::Excluded(upper)))
            .find(|(_, message)| message.external_id() == external_id)
            .map(|(ulid, _)| *ulid)
    }

    /// Requeue deliveries whose visibility timeout has expired, preserving
    /// their original delivery order at the front of the pending queue.
    pub fn reclaim_expired(&mut self, visibility_timeout: Duration, now: Instant) {
        let mut reclaimed = 0usize;
        while let Some(delivery) = self.delivered.front() {
            if now.duration_since(delivery.delivered_at) < visibility_timeout {
                break;
            }
            let delivery = match self.delivered.pop_front() {
                Some(d) => d,
                None => break,
            };
            self.primary.insert(reclaimed, delivery.ulid);
            reclaimed += 1;
        }
    }

    /// Take the next pending message for queuing delivery and record it as
    /// outstanding. Returns the delivery token alongside the message.
    pub fn take_for_delivery(&mut self, now: Instant) -> Option<(u64, Message)> {
        while let Some(ulid) = self.primary.pop_front() {
            if let Some(message) = self.log.get(&ulid) {
                let token = self.next_token;
                self.next_token += 1;
                self.delivered.push_back(Delivery {
                    ulid,
                    token,
                    delivered_at: now,
                });
                return Some((token, message.clone()));
            }
        }
        None
    }

    /// Remove the outstanding delivery with the given token. Returns false
    /// when the delivery already expired and was requeued.
    pub fn ack(&mut self, token: u64) -> bool {
        let before = self.delivered.len();
        self.delivered.retain(|delivery| delivery.token != token);
        self.delivered.len() < before
    }

    /// The instant at which the oldest outstanding delivery becomes
    /// eligible for requeueing.
    pub fn next_redelivery_due(&self, visibility_timeout: Duration) -> Option<Instant> {
        self.delivered
            .front()
            .map(|delivery| delivery.delivered_at + visibility_timeout)
    }

    pub fn has_pending(&self) -> bool {
        !self.primary.is_empty()
    }

    fn clear(&mut self) {
        self.log.clear();
        self.primary.clear();
        self.delivered.clear();
    }
}

/// The shared heart of a topic: its state, lock, condition variable and
/// closed flag. Producers, shards and consumers each hold an `Arc` to it.
pub(crate) struct TopicCore {
    name: String,
    config: BrokerConfig,
    state: Mutex<TopicState>,
    available: Condvar,
    closed: AtomicBool,
}

impl TopicCore {
    pub fn new(name: impl Into<String>, config: BrokerConfig) -> Self {
        TopicCore {
            name: name.into(),
            config,
            state: Mutex::new(TopicState {
                log: BTreeMap::new(),
                primary: VecDeque::new(),
                delivered: VecDeque::new(),
                generator: UlidGenerator::new(config.max_clock_skew),
                next_token: 0,
            }),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Acquire the topic lock within the configured budget. Exceeding the
    /// budget is fatal for the calling operation.
    pub fn lock_state(&self, operation: &'static str) -> Result<MutexGuard<'_, TopicState>, BrokerError> {
        self.state
            .try_lock_for(self.config.lock_timeout)
            .ok_or(BrokerError::LockTimeout(operation))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wake every blocked receiver. Takes the lock so a receiver between
    /// its predicate check and its wait cannot miss the signal.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }

    pub fn notify_production(&self) {
        self.available.notify_all();
    }

    /// Block on the condition variable for at most `timeout`. The caller
    /// re-checks its predicate afterwards; spurious wakeups are fine.
    pub fn wait_production(&self, state: &mut MutexGuard<'_, TopicState>, timeout: Duration) {
        self.available.wait_for(state, timeout);
    }

    /// Mark closed and drop all stored data, waking every blocked
    /// receiver so it observes the closed state.
    pub fn close(&self) {
        let mut state = self.state.lock();
        self.closed.store(true, Ordering::SeqCst);
        state.clear();
        self.available.notify_all();
    }

    /// Resolve a cursor to its canonical `AtUlid` form against this topic.
    pub fn resolve(&self, state: &TopicState, cursor: &Cursor) -> Result<Cursor, BrokerError> {
        match cursor.position() {
            CursorPosition::AtUlid(ulid) => Ok(Cursor::at_ulid(*ulid, cursor.inclusive())),
            CursorPosition::Oldest => Ok(Cursor::at_ulid(id::beginning_of_time(), true)),
            CursorPosition::Now => Ok(Cursor::at_ulid(id::beginning_of(id::current_millis()), true)),
            CursorPosition::AtProviderSequence(sequence) => {
                let ulid = Ulid::from_string(sequence).map_err(|_| {
                    BrokerError::NotCompatibleCursor(format!(
                        "sequence number is not a valid identifier: {}",
                        sequence
                    ))
                })?;
                Ok(Cursor::at_ulid(ulid, true))
            }
            CursorPosition::AtProviderTime(timestamp_ms) => {
                let effective = if cursor.inclusive() {
                    *timestamp_ms
                } else {
                    timestamp_ms + 1
                };
                Ok(Cursor::at_ulid(id::beginning_of(effective), true))
            }
            CursorPosition::AtExternalId {
                external_id,
                approx_timestamp,
                tolerance,
            } => {
                let tolerance_ms = tolerance.as_millis() as u64;
                let lower = id::beginning_of(approx_timestamp.saturating_sub(tolerance_ms));
                let upper = id::beginning_of(approx_timestamp.saturating_add(tolerance_ms));
                let ulid = state
                    .ulid_of_external_id(external_id, lower, upper)
                    .ok_or_else(|| BrokerError::NoSuchExternalId(external_id.clone()))?;
                Ok(Cursor::at_ulid(ulid, cursor.inclusive()))
            }
        }
    }
}

/// An in-memory topic: the shared core plus its managed shard and
/// metadata store.
pub struct MemoryTopic {
    core: Arc<TopicCore>,
    shard: Arc<MemoryShard>,
    metadata: Arc<MemoryMetadataClient>,
}

impl MemoryTopic {
    pub(crate) fn new(name: impl Into<String>, config: BrokerConfig) -> Self {
        let name = name.into();
        let core = Arc::new(TopicCore::new(name.clone(), config));
        MemoryTopic {
            shard: Arc::new(MemoryShard::new(SHARD_ID, Arc::clone(&core))),
            metadata: Arc::new(MemoryMetadataClient::new(name)),
            core,
        }
    }

    pub(crate) fn core(&self) -> &Arc<TopicCore> {
        &self.core
    }
}

impl Topic for MemoryTopic {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn producer(&self) -> Result<Arc<dyn Producer>, BrokerError> {
        if self.core.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(Arc::new(MemoryProducer::new(Arc::clone(&self.core))))
    }

    fn shards(&self) -> Option<Vec<String>> {
        Some(vec![SHARD_ID.to_string()])
    }

    fn first_shard(&self) -> String {
        SHARD_ID.to_string()
    }

    // Single-shard topic: every shard id maps to the managed shard.
    fn shard_of(&self, _shard_id: &str) -> Result<Arc<dyn Shard>, BrokerError> {
        Ok(Arc::clone(&self.shard) as Arc<dyn Shard>)
    }

    fn metadata(&self) -> Arc<dyn MetadataClient> {
        Arc::clone(&self.metadata) as Arc<dyn MetadataClient>
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    fn close(&self) {
        self.shard.close();
        self.core.close();
    }
}
