use std::cmp::Ordering;
use std::time::Duration;

use ulid::Ulid;

use crate::error::BrokerError;

/// Where in a topic's log a cursor points.
///
/// Only [`AtUlid`](CursorPosition::AtUlid) is *resolved*: a concrete
/// position that can be checkpointed and compared. The other variants are
/// symbolic and are resolved against a topic when a streaming consumer is
/// constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CursorPosition {
    /// The oldest retained message.
    Oldest,
    /// The current wall-clock instant; resolution fixes it at use time.
    Now,
    /// The beginning of the given provider timestamp (epoch milliseconds).
    AtProviderTime(u64),
    /// A provider sequence number, the canonical text form of an
    /// identifier for the in-memory provider.
    AtProviderSequence(String),
    /// A caller-supplied external id, searched within
    /// `[approx_timestamp - tolerance, approx_timestamp + tolerance)`.
    AtExternalId {
        external_id: String,
        approx_timestamp: u64,
        tolerance: Duration,
    },
    /// A concrete identifier.
    AtUlid(Ulid),
}

/// A position descriptor in a topic's log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    position: CursorPosition,
    inclusive: bool,
}

impl Cursor {
    pub fn builder() -> CursorBuilder {
        CursorBuilder::new()
    }

    pub(crate) fn new(position: CursorPosition, inclusive: bool) -> Self {
        Cursor { position, inclusive }
    }

    /// A resolved cursor at the given identifier.
    pub fn at_ulid(ulid: Ulid, inclusive: bool) -> Self {
        Cursor {
            position: CursorPosition::AtUlid(ulid),
            inclusive,
        }
    }

    pub fn position(&self) -> &CursorPosition {
        &self.position
    }

    /// Whether the message at the cursor's own position is included when
    /// reading forward.
    pub fn inclusive(&self) -> bool {
        self.inclusive
    }

    /// Whether this cursor is a concrete position rather than a symbolic
    /// one.
    pub fn is_resolved(&self) -> bool {
        matches!(self.position, CursorPosition::AtUlid(_))
    }

    /// The concrete identifier, if resolved.
    pub fn ulid(&self) -> Option<Ulid> {
        match self.position {
            CursorPosition::AtUlid(ulid) => Some(ulid),
            _ => None,
        }
    }

    /// Serialize this cursor as a checkpoint string, `"<id>:<inclusive>"`.
    ///
    /// Only resolved cursors can be checkpointed.
    pub fn checkpoint(&self) -> Result<String, BrokerError> {
        match self.position {
            CursorPosition::AtUlid(ulid) => Ok(format!("{}:{}", ulid, self.inclusive)),
            _ => Err(BrokerError::NotCompatibleCursor(
                "only a resolved cursor can be checkpointed".to_string(),
            )),
        }
    }

    /// Parse a checkpoint string produced by [`checkpoint`](Cursor::checkpoint).
    pub fn from_checkpoint(checkpoint: &str) -> Result<Cursor, BrokerError> {
        let invalid = || BrokerError::InvalidCheckpoint(checkpoint.to_string());
        let (id, inclusive) = checkpoint.split_once(':').ok_or_else(invalid)?;
        let ulid = Ulid::from_string(id).map_err(|_| invalid())?;
        let inclusive = match inclusive {
            "true" => true,
            "false" => false,
            _ => return Err(invalid()),
        };
        Ok(Cursor::at_ulid(ulid, inclusive))
    }

    /// Compare two resolved cursors by stream position.
    ///
    /// At the same identifier an inclusive cursor points earlier than an
    /// exclusive one, since the exclusive cursor has already consumed the
    /// message at that position.
    pub fn compare(&self, other: &Cursor) -> Result<Ordering, BrokerError> {
        match (&self.position, &other.position) {
            (CursorPosition::AtUlid(a), CursorPosition::AtUlid(b)) => Ok(a
                .cmp(b)
                .then_with(|| other.inclusive.cmp(&self.inclusive))),
            _ => Err(BrokerError::NotCompatibleCursor(format!(
                "cannot compare {:?} with {:?}; both cursors must be resolved",
                self.position, other.position
            ))),
        }
    }

    pub fn is_before(&self, other: &Cursor) -> Result<bool, BrokerError> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    pub fn is_after(&self, other: &Cursor) -> Result<bool, BrokerError> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    pub fn is_same(&self, other: &Cursor) -> Result<bool, BrokerError> {
        Ok(self.compare(other)? == Ordering::Equal)
    }
}

/// Builder for [`Cursor`]. Exactly one position must be chosen;
/// inclusivity defaults to exclusive.
#[derive(Debug, Default)]
pub struct CursorBuilder {
    position: Option<CursorPosition>,
    inclusive: bool,
}

impl CursorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at the current wall-clock instant, fixed when the cursor is
    /// resolved.
    pub fn now(mut self) -> Self {
        self.position = Some(CursorPosition::Now);
        self
    }

    /// Start at the oldest retained message.
    pub fn oldest(mut self) -> Self {
        self.position = Some(CursorPosition::Oldest);
        self
    }

    pub fn ulid(mut self, ulid: Ulid) -> Self {
        self.position = Some(CursorPosition::AtUlid(ulid));
        self
    }

    /// Start at the beginning of the given provider timestamp (epoch
    /// milliseconds).
    pub fn provider_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.position = Some(CursorPosition::AtProviderTime(timestamp_ms));
        self
    }

    pub fn provider_sequence_number(mut self, sequence_number: impl Into<String>) -> Self {
        self.position = Some(CursorPosition::AtProviderSequence(sequence_number.into()));
        self
    }

    /// Start at the message with the given external id, searched within
    /// `approx_timestamp ± tolerance`.
    pub fn external_id(
        mut self,
        external_id: impl Into<String>,
        approx_timestamp: u64,
        tolerance: Duration,
    ) -> Self {
        self.position = Some(CursorPosition::AtExternalId {
            external_id: external_id.into(),
            approx_timestamp,
            tolerance,
        });
        self
    }

    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    /// Restore position and inclusivity from a checkpoint string.
    pub fn checkpoint(mut self, checkpoint: &str) -> Result<Self, BrokerError> {
        let cursor = Cursor::from_checkpoint(checkpoint)?;
        self.position = Some(cursor.position);
        self.inclusive = cursor.inclusive;
        Ok(self)
    }

    pub fn build(self) -> Result<Cursor, BrokerError> {
        let position = self.position.ok_or_else(|| {
            BrokerError::NotCompatibleCursor("cursor builder: no position specified".to_string())
        })?;
        Ok(Cursor {
            position,
            inclusive: self.inclusive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ulid() -> Ulid {
        Ulid::from_parts(1_700_000_000_000, 42)
    }

    #[test]
    fn checkpoint_round_trip() {
        for inclusive in [true, false] {
            let cursor = Cursor::at_ulid(sample_ulid(), inclusive);
            let checkpoint = cursor.checkpoint().unwrap();
            let restored = Cursor::from_checkpoint(&checkpoint).unwrap();
            assert_eq!(restored, cursor);
        }
    }

    #[test]
    fn checkpoint_requires_resolved_cursor() {
        let cursor = Cursor::builder().oldest().build().unwrap();
        assert!(matches!(
            cursor.checkpoint(),
            Err(BrokerError::NotCompatibleCursor(_))
        ));
    }

    #[test]
    fn invalid_checkpoints_rejected() {
        for bad in ["", "no-separator", "not-a-ulid:true", "xyz"] {
            assert!(matches!(
                Cursor::from_checkpoint(bad),
                Err(BrokerError::InvalidCheckpoint(_))
            ));
        }
        let with_bad_flag = format!("{}:maybe", sample_ulid());
        assert!(matches!(
            Cursor::from_checkpoint(&with_bad_flag),
            Err(BrokerError::InvalidCheckpoint(_))
        ));
    }

    #[test]
    fn compare_orders_by_ulid_then_inclusivity() {
        let earlier = Cursor::at_ulid(Ulid::from_parts(1_700_000_000_000, 1), false);
        let later = Cursor::at_ulid(Ulid::from_parts(1_700_000_000_001, 1), false);
        assert!(earlier.is_before(&later).unwrap());
        assert!(later.is_after(&earlier).unwrap());

        let at = Cursor::at_ulid(sample_ulid(), true);
        let after = Cursor::at_ulid(sample_ulid(), false);
        assert!(at.is_before(&after).unwrap());
        assert!(at.is_same(&at.clone()).unwrap());
    }

    #[test]
    fn compare_rejects_unresolved() {
        let resolved = Cursor::at_ulid(sample_ulid(), true);
        let symbolic = Cursor::builder().now().build().unwrap();
        assert!(matches!(
            resolved.compare(&symbolic),
            Err(BrokerError::NotCompatibleCursor(_))
        ));
        assert!(matches!(
            symbolic.compare(&resolved),
            Err(BrokerError::NotCompatibleCursor(_))
        ));
    }

    #[test]
    fn builder_requires_position() {
        assert!(matches!(
            Cursor::builder().inclusive(true).build(),
            Err(BrokerError::NotCompatibleCursor(_))
        ));
    }

    #[test]
    fn builder_checkpoint_restores_position() {
        let original = Cursor::at_ulid(sample_ulid(), true);
        let checkpoint = original.checkpoint().unwrap();
        let restored = Cursor::builder()
            .checkpoint(&checkpoint)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(restored, original);
    }
}
