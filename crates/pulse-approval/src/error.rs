/// Errors that can occur while issuing or tracking approvals.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A required field of the approval request was empty.
    #[error("invalid approval request: {0}")]
    InvalidRequest(String),

    /// Storage backend error (lock poisoned).
    #[error("storage error: {0}")]
    Storage(String),

    /// The record's expiry could not be represented.
    #[error("invalid approval ttl: {0}s")]
    InvalidTtl(u64),
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
