use thiserror::Error;

/// Caller input rejected before it ever touches the ingestion buffer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Enqueue into the ingestion buffer failed. All variants surface to the
/// producer as `reason = "backpressure"`; none of them is retried here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("ingestion buffer is full")]
    Full,

    #[error("timed out waiting for buffer capacity")]
    TimedOut,

    #[error("ingestion pipeline is shutting down")]
    Closed,
}

/// A store round trip failed.
///
/// The transient/permanent split drives the writer's retry decision:
/// `Unavailable` is retried with backoff, `Rejected` never is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Timeout, connection refused, overloaded (429/503), 5xx. Worth retrying.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store understood the request and refused it (malformed statement,
    /// schema mismatch, auth). Retrying cannot help.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Schema bootstrap failed after its retry budget. Fatal at startup: the
/// process must not begin serving traffic.
#[derive(Debug, Error)]
#[error("schema bootstrap failed: {0}")]
pub struct SchemaError(#[from] pub StoreError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(!StoreError::Rejected("bad statement".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let e = BufferError::TimedOut;
        assert_eq!(e.to_string(), "timed out waiting for buffer capacity");

        let e = SchemaError(StoreError::Unavailable("connection refused".into()));
        assert_eq!(
            e.to_string(),
            "schema bootstrap failed: store unavailable: connection refused"
        );
    }
}
