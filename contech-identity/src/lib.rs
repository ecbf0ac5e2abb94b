//! Contech Identity - credential persistence and identity service transport
//!
//! - [`token_store`]: durable storage of the single opaque credential token
//! - [`client`]: request/response transport to the remote identity service,
//!   normalizing every outcome into `Ok(payload)` or [`IdentityError`]

pub mod client;
pub mod token_store;

pub use client::{
    ApiEnvelope, Credentials, HttpIdentityClient, IdentityClient, IdentityClientConfig,
    LoginResponse, RegisterRequest, RegisterResponse,
};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Failure of an identity service call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The service answered with a non-success envelope
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },

    /// The request never produced a usable response
    #[error("{message}")]
    Transport { message: String },

    /// The response could not be decoded into the expected payload
    #[error("{message}")]
    InvalidPayload { message: String },

    /// An unexpected fault inside the client
    #[error("{message}")]
    Internal { message: String },
}

pub type IdentityResult<T> = Result<T, IdentityError>;

impl IdentityError {
    pub fn rejected<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_payload<S: Into<String>>(message: S) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Human-readable message suitable for showing next to a form
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. }
            | Self::Transport { message }
            | Self::InvalidPayload { message }
            | Self::Internal { message } => message,
        }
    }

    /// Whether the failure says nothing about the credential itself
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rejected {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<IdentityError> for contech_core::ContechError {
    fn from(err: IdentityError) -> Self {
        use contech_core::{ContechError, ErrorContext};

        let context = ErrorContext::new("identity_client");
        match err {
            IdentityError::Transport { message } => ContechError::Unavailable { message, context },
            IdentityError::Rejected { status, message } => ContechError::Rejected {
                message,
                status,
                context,
            },
            IdentityError::InvalidPayload { message } | IdentityError::Internal { message } => {
                ContechError::Internal {
                    message,
                    source: None,
                    context,
                }
            }
        }
    }
}
