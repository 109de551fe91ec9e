//! Failure taxonomy for deployment runs.
//!
//! Every fallible operation in this crate reports one of these variants so
//! that callers can tell configuration mistakes apart from transient
//! infrastructure failures and from contract logic rejecting a call.

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for deployment and node interaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested network name is not present in the profile configuration.
    /// Fatal, surfaced immediately, no network I/O is performed.
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    /// Profile configuration or ledger file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The deployment plan is invalid (duplicate step ids, forward
    /// references, argument mismatches, stale ledger entries). Detected
    /// before any step executes.
    #[error("invalid deployment plan: {0}")]
    Plan(String),

    /// A contract artifact file could not be read or does not have the
    /// expected shape.
    #[error("invalid contract artifact: {0}")]
    Artifact(String),

    /// The node rejected the unlock secret or refused to sign for the
    /// sending account. Fatal for the run; retrying with the same secret
    /// cannot succeed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Transport failure, RPC timeout, or receipt-wait timeout. Transient;
    /// the caller may retry the specific failed step. A timeout means the
    /// outcome is unknown, not that the transaction failed.
    #[error("network error: {0}")]
    Network(String),

    /// The contract logic rejected the call. Permanent for the given
    /// inputs; a business-logic failure, not an infrastructure one.
    #[error("execution reverted: {0}")]
    Reverted(String),
}

impl Error {
    /// Whether retrying the same operation can possibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}
