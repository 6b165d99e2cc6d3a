use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed [{code}]: {message}")]
    Validation { code: &'static str, message: String },

    #[error("Collaborator '{name}' failed: {reason}")]
    Collaborator { name: &'static str, reason: String },

    #[error("Audit write failed for check {check_id}: {reason}")]
    AuditWriteFailed { check_id: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RiskError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { code, message: message.into() }
    }

    pub fn collaborator(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Collaborator { name, reason: reason.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type RiskResult<T> = Result<T, RiskError>;
