use thiserror::Error;

/// Failure classes for a fusion session.
///
/// Only `Transport` is fatal to the session; the other classes abort the
/// current round and hand control back to the round loop, which decides
/// between retrying and quitting. Expected negotiation outcomes (an
/// infeasible tier set, a server-skipped round) are not errors at all;
/// they are values of [`crate::session::FusionOutcome`].
#[derive(Debug, Error)]
pub enum FusionError {
    /// Connect/read/write failure on the coordinator channel.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    /// Unexpected message shape, count, or ordering.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Clock skew or a phase deadline missed.
    #[error("timing violation: {0}")]
    Timing(String),

    /// A commitment, signature, or transcript hash failed to verify.
    #[error("crypto mismatch: {0}")]
    Crypto(String),
}

impl FusionError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        FusionError::Protocol(msg.into())
    }

    pub fn timing(msg: impl Into<String>) -> Self {
        FusionError::Timing(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        FusionError::Crypto(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;
