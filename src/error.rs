//! Error types for the precinct workflow engine.
//!
//! All errors are explicitly typed using thiserror. No panics in production code.

use thiserror::Error;

/// Central error type for all precinct operations.
#[derive(Debug, Error)]
pub enum PrecinctError {
    /// Malformed input (missing rejection message, score out of range,
    /// verdict/sentence mismatch). Recoverable by caller resubmission.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not legal from the entity's current status.
    #[error("Invalid transition: cannot {attempted} while {current}")]
    InvalidTransition {
        /// Status the entity was in when the operation was attempted.
        current: String,
        /// Operation that was attempted.
        attempted: String,
    },

    /// Actor's role does not permit the operation.
    #[error("Unauthorized: role {role} may not perform {action}")]
    Unauthorized {
        /// Role resolved for the acting principal.
        role: String,
        /// Action that was attempted.
        action: String,
    },

    /// Business-rule precondition unmet.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The interrogation already carries a court verdict.
    #[error("Verdict already issued for interrogation {interrogation_id}")]
    AlreadyDecided {
        /// Interrogation whose verdict already exists.
        interrogation_id: i64,
    },

    /// Lost a per-entity race against a concurrent transition.
    /// Safe to retry the whole operation once.
    #[error("Concurrent update on {entity} {id}, retry the operation")]
    ConcurrencyConflict {
        /// Entity kind that was contended.
        entity: &'static str,
        /// Row id of the contended entity.
        id: i64,
    },

    /// Referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind that was looked up.
        entity: &'static str,
        /// Key that was looked up, rendered for display.
        id: String,
    },

    /// Configuration error (invalid env values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Regex pattern compilation error.
    #[error("Regex pattern error: {0}")]
    RegexPattern(#[from] regex::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl PrecinctError {
    /// Log error with full context using tracing
    ///
    /// Workflow rejections are expected outcomes and log as warnings;
    /// infrastructure failures log as errors.
    pub fn log_with_context(&self, context: &ErrorContext) {
        match self {
            // Critical errors that require immediate attention
            Self::Database(_) | Self::Io(_) => {
                tracing::error!(
                    error = %self,
                    request_id = %context.request_id,
                    actor_id = ?context.actor_id,
                    case_id = ?context.case_id,
                    operation = %context.operation,
                    "Critical error occurred"
                );
            }
            // Lost races are retried by the caller, log as warning
            Self::ConcurrencyConflict { entity, id } => {
                tracing::warn!(
                    error = %self,
                    request_id = %context.request_id,
                    actor_id = ?context.actor_id,
                    operation = %context.operation,
                    entity = entity,
                    entity_id = id,
                    "Concurrent transition lost"
                );
            }
            // Workflow rejections surfaced to the caller
            Self::Validation(_)
            | Self::InvalidTransition { .. }
            | Self::Unauthorized { .. }
            | Self::PreconditionFailed(_)
            | Self::AlreadyDecided { .. }
            | Self::NotFound { .. } => {
                tracing::warn!(
                    error = %self,
                    request_id = %context.request_id,
                    actor_id = ?context.actor_id,
                    case_id = ?context.case_id,
                    operation = %context.operation,
                    "Operation rejected"
                );
            }
            // Configuration and data errors
            Self::Config(_) | Self::RegexPattern(_) | Self::Json(_) => {
                tracing::error!(
                    error = %self,
                    request_id = %context.request_id,
                    operation = %context.operation,
                    "Configuration or data error"
                );
            }
        }
    }

    /// Check if this error is critical and requires alerting
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }

    /// Check if the caller may safely retry the operation once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Get user-friendly error message (hides internal details)
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid input, check the submitted fields",
            Self::InvalidTransition { .. } => "Operation not allowed in the current state",
            Self::Unauthorized { .. } => "Your role does not permit this action",
            Self::PreconditionFailed(_) => "A case rule prevents this operation",
            Self::AlreadyDecided { .. } => "A verdict has already been issued",
            Self::ConcurrencyConflict { .. } => "Conflicting update, please retry",
            Self::NotFound { .. } => "Record not found",
            Self::Config(_) => "Service configuration error",
            Self::RegexPattern(_) => "Invalid pattern configuration",
            Self::Json(_) => "Data format error",
            Self::Database(_) => "Database service temporarily unavailable",
            Self::Io(_) => "File system error",
        }
    }
}

/// Context information for error logging
///
/// Provides structured context for debugging and monitoring.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Unique request identifier for correlation
    pub request_id: String,
    /// Acting principal if available
    pub actor_id: Option<i64>,
    /// Case ID if available
    pub case_id: Option<i64>,
    /// Operation being performed
    pub operation: String,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            actor_id: None,
            case_id: None,
            operation: operation.into(),
        }
    }

    /// Set acting principal
    pub fn with_actor_id(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set case ID
    pub fn with_case_id(mut self, case_id: i64) -> Self {
        self.case_id = Some(case_id);
        self
    }

    /// Set request ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Result type alias for precinct operations.
pub type Result<T> = std::result::Result<T, PrecinctError>;
