//! Error taxonomy for teller
//!
//! Every worker-side failure is recovered at the handler boundary and turned
//! into a user-visible follow-up message; the variants here decide the wording
//! and whether anything was written before the failure.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum TellerError {
    /// Bad or missing request signature. Rejected with 401, no side effects.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Role or channel mismatch. Rejected before queueing, no side effects.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Malformed input (bad amount, unknown company code). Rejected before any write.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Business-state violation (reverse transaction with no forward master).
    #[error("invalid state: {0}")]
    State(String),

    /// Downstream HTTP failure (platform webhook, game API). Logged, not retried.
    #[error("transport error: {0}")]
    Transport(String),

    /// Queue publish/consume failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// Ledger store failure.
    #[error("database error: {0}")]
    Database(String),

    /// Startup configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, TellerError>;

impl TellerError {
    /// Message shown to the invoking user when this error surfaces from a handler.
    ///
    /// Transport and database failures are collapsed to a generic line so
    /// internals never leak into chat.
    pub fn user_message(&self) -> String {
        match self {
            TellerError::Authorization(reason) => format!("🚫 {reason}"),
            TellerError::Validation(reason) => format!("🚫 {reason}"),
            TellerError::State(reason) => format!("🚫 {reason}"),
            TellerError::Transport(_)
            | TellerError::Queue(_)
            | TellerError::Database(_)
            | TellerError::Io(_)
            | TellerError::Json(_) => "⚠️ Something went wrong processing the command. Please retry.".to_string(),
            TellerError::Authentication(_) | TellerError::Config(_) => {
                "⚠️ The command could not be processed.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_internals() {
        let err = TellerError::Database("UNIQUE constraint failed: secret_table".to_string());
        assert!(!err.user_message().contains("secret_table"));
    }

    #[test]
    fn user_message_surfaces_validation_reason() {
        let err = TellerError::Validation("Invalid amount: `abc`. Must be a number.".to_string());
        assert!(err.user_message().contains("abc"));
    }
}
