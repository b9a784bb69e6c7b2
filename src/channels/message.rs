//! # Timestamped message envelope.

use std::time::SystemTime;

/// Immutable envelope around one decoded record.
///
/// Created by a pump the instant a record arrives, never mutated, consumed
/// once read from a channel. The timestamp is ingestion time (UTC), not the
/// time the child produced the record.
#[derive(Clone, Debug)]
pub struct ShardMessage<T> {
    at: SystemTime,
    value: T,
}

impl<T> ShardMessage<T> {
    /// Wraps `value` with the current wall-clock time.
    pub fn now(value: T) -> Self {
        Self {
            at: SystemTime::now(),
            value,
        }
    }

    /// Ingestion timestamp.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// Borrows the wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Unwraps into the value, dropping the timestamp.
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_preserves_value() {
        let msg = ShardMessage::now("payload");
        assert_eq!(*msg.value(), "payload");
        assert!(msg.at() <= SystemTime::now());
        assert_eq!(msg.into_value(), "payload");
    }
}
