use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoupError {
    /// Malformed or out of range input. Nothing was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The submission does not fit the current status, or came from the wrong player.
    #[error("illegal move: {0}")]
    IllegalTransition(String),

    #[error("session not available: {0}")]
    NotFound(String),

    /// The game reached a state the protocol should never produce.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

impl CoupError {
    /// Recoverable errors leave the session untouched and the caller is shown the current state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoupError::Validation(_) | CoupError::IllegalTransition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::CoupError;

    #[test]
    fn recoverable() {
        assert!(CoupError::Validation("x".into()).is_recoverable());
        assert!(CoupError::IllegalTransition("x".into()).is_recoverable());
        assert!(!CoupError::NotFound("x".into()).is_recoverable());
        assert!(!CoupError::Invariant("x".into()).is_recoverable());
        assert!(!CoupError::Storage("x".into()).is_recoverable());
    }
}
