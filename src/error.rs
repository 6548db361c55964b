use std::fmt::Display;
use thiserror::Error;

/// Errors returned by workflow operations.
///
/// Every variant is recoverable: the rejected operation leaves packet,
/// article and queue state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Invalid transition: cannot {action} while {from} ({reason})")]
    InvalidTransition {
        from: String,
        action: String,
        reason: String,
    },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown packet: {0}")]
    UnknownPacket(String),

    #[error("Unknown article: {0}")]
    UnknownArticle(String),

    #[error("Unknown issue {issue_id} on article {article_id}")]
    UnknownIssue { article_id: String, issue_id: String },

    #[error("Unknown queue item: {0}")]
    UnknownQueueItem(String),

    #[error("Article {article_id} is not approved (packet is {status})")]
    NotApproved { article_id: String, status: String },

    #[error("Delivery of queue item {queue_item_id} failed: {message}")]
    Delivery {
        queue_item_id: String,
        message: String,
    },

    #[error("Stale write on packet {packet_id}: expected version {expected}, found {actual}")]
    StaleWrite {
        packet_id: String,
        expected: u64,
        actual: u64,
    },
}

impl WorkflowError {
    pub fn validation(reason: impl Into<String>) -> Self {
        WorkflowError::Validation {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        from: impl Display,
        action: impl Display,
        reason: impl Into<String>,
    ) -> Self {
        WorkflowError::InvalidTransition {
            from: from.to_string(),
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::UnknownCategory(_) => "unknown_category",
            WorkflowError::UnknownField(_) => "unknown_field",
            WorkflowError::UnknownPacket(_)
            | WorkflowError::UnknownArticle(_)
            | WorkflowError::UnknownIssue { .. }
            | WorkflowError::UnknownQueueItem(_) => "not_found",
            WorkflowError::NotApproved { .. } => "not_approved",
            WorkflowError::StaleWrite { .. } => "stale_write",
            WorkflowError::Delivery { .. } => "delivery",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
