//! Error types shared across the workspace
//!
//! Structured variants carry an [`ErrorContext`]; [`ContechError::log`] records
//! its `error_id`, component and operation alongside the message.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub type ContechResult<T> = Result<T, ContechError>;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Where and while doing what an error happened
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub error_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub component: String,
    pub operation: Option<String>,
    pub details: BTreeMap<String, String>,
    /// Things the user can try
    pub hints: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            component: component.to_string(),
            operation: None,
            details: BTreeMap::new(),
            hints: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_detail<V: ToString>(mut self, key: &str, value: V) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }
}

#[derive(Error, Debug)]
pub enum ContechError {
    /// Token persistence failed
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Source>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Source>,
        context: ErrorContext,
    },

    #[error("Invalid {}: {message}", .field.as_deref().unwrap_or("value"))]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    /// The identity service could not be reached
    #[error("Identity service unavailable: {message}")]
    Unavailable { message: String, context: ErrorContext },

    /// The identity service answered and refused
    #[error("{message}")]
    Rejected {
        message: String,
        status: Option<u16>,
        context: ErrorContext,
    },

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Source>,
        context: ErrorContext,
    },
}

impl ContechError {
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ContechError::Storage { context, .. }
            | ContechError::Config { context, .. }
            | ContechError::Validation { context, .. }
            | ContechError::Unavailable { context, .. }
            | ContechError::Rejected { context, .. }
            | ContechError::Timeout { context, .. }
            | ContechError::Internal { context, .. } => Some(context),
            ContechError::Io(_) | ContechError::Serialization(_) => None,
        }
    }

    /// Whether the same request may succeed if simply tried again later
    pub fn is_retryable(&self) -> bool {
        match self {
            ContechError::Unavailable { .. } | ContechError::Timeout { .. } => true,
            ContechError::Rejected { status, .. } => {
                matches!(status, Some(s) if *s >= 500 || *s == 429)
            }
            _ => false,
        }
    }

    /// Record the error at a level matching its kind
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id);
        let component = self.context().map(|c| c.component.as_str());
        let operation = self.context().and_then(|c| c.operation.as_deref());

        match self {
            ContechError::Rejected { status, .. } => {
                info!(?error_id, ?component, ?operation, ?status, error = %self, "Request refused");
            }
            _ if self.is_retryable() => {
                warn!(?error_id, ?component, ?operation, error = %self, "Transient failure");
            }
            _ => {
                error!(?error_id, ?component, ?operation, error = %self, "Operation failed");
            }
        }
    }
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::ContechError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::ContechError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_hint("Make sure the data directory is writable"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::ContechError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_hint("Run `contech config --validate` to check the file")
                .with_hint("Run `contech config --init` to write a default one"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::ContechError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component),
        }
    };
}
