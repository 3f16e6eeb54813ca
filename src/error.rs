use std::fmt;
use std::time::Duration;

/// Error type shared by all broker operations.
///
/// Receive timeouts are not errors: a `receive` call that exceeds its
/// deadline without a message returns `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The client, topic, producer or consumer has been closed.
    Closed,
    /// Cursor resolution by external id found no match within the
    /// time-tolerance window. The tolerance is caller-controlled; widening
    /// it is the intended retry.
    NoSuchExternalId(String),
    /// A cursor was compared, checkpointed or otherwise used in a way that
    /// requires a resolved cursor, or against an incompatible cursor.
    NotCompatibleCursor(String),
    /// The operation is not supported by the chosen consumption model.
    Unsupported(&'static str),
    /// The topic lock could not be acquired within the configured budget.
    /// This indicates a stuck peer and is fatal, unlike receive timeouts.
    LockTimeout(&'static str),
    /// The previous identifier's timestamp is further in the future than
    /// the configured maximum clock skew.
    ClockSkew(Duration),
    /// A checkpoint string could not be parsed.
    InvalidCheckpoint(String),
    /// A message failed builder validation.
    InvalidMessage(String),
    /// No provider is registered under the given alias.
    UnknownProvider(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Closed => {
                write!(f, "operation on a closed client, topic, producer or consumer")
            }
            BrokerError::NoSuchExternalId(id) => {
                write!(f, "external id not found within tolerance window: {}", id)
            }
            BrokerError::NotCompatibleCursor(msg) => write!(f, "cursor not compatible: {}", msg),
            BrokerError::Unsupported(op) => write!(f, "operation not supported: {}", op),
            BrokerError::LockTimeout(what) => {
                write!(f, "timeout while waiting for lock: {}", what)
            }
            BrokerError::ClockSkew(ahead) => write!(
                f,
                "previous identifier timestamp is {} ms in the future",
                ahead.as_millis()
            ),
            BrokerError::InvalidCheckpoint(s) => write!(f, "invalid checkpoint: {}", s),
            BrokerError::InvalidMessage(msg) => write!(f, "invalid message: {}", msg),
            BrokerError::UnknownProvider(alias) => {
                write!(f, "no provider registered under alias: {}", alias)
            }
        }
    }
}

impl std::error::Error for BrokerError {}
