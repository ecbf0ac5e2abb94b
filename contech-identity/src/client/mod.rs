//! Identity service client
//!
//! A thin request/response transport. Every operation returns `Ok(payload)` or
//! an [`IdentityError`]; nothing panics across this boundary and nothing is
//! retried here.

use contech_core::{
    async_trait, IdentityServiceConfig, ProfileUpdate, Role, SignUpMetadata, UserRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{IdentityError, IdentityResult};

pub mod envelope;
pub mod http;

pub use envelope::ApiEnvelope;
pub use http::HttpIdentityClient;

/// Email/password pair sent to `POST /auth/login/`
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register/`; unset profile fields are omitted
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl RegisterRequest {
    pub fn new(credentials: Credentials, metadata: SignUpMetadata) -> Self {
        Self {
            email: credentials.email,
            password: credentials.password,
            first_name: metadata.first_name,
            last_name: metadata.last_name,
            role: metadata.role,
            phone_number: metadata.phone_number,
        }
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Payload of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterResponse {
    pub token: String,
    pub user_id: u64,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Payload of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Configuration for the HTTP identity client
#[derive(Debug, Clone)]
pub struct IdentityClientConfig {
    /// Base URL including the API prefix
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl Default for IdentityClientConfig {
    fn default() -> Self {
        Self {
            base_url: contech_core::DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            user_agent: format!("contech/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        }
    }
}

impl IdentityClientConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Join an endpoint onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl From<&IdentityServiceConfig> for IdentityClientConfig {
    fn from(config: &IdentityServiceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
            headers: HashMap::new(),
        }
    }
}

/// Remote identity service operations
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Create an account; the service answers with a fresh token
    async fn register(&self, request: &RegisterRequest) -> IdentityResult<RegisterResponse>;

    /// Exchange credentials for a token
    async fn login(&self, credentials: &Credentials) -> IdentityResult<LoginResponse>;

    /// Resolve a token to the user it belongs to
    async fn fetch_current_user(&self, token: &str) -> IdentityResult<UserRecord>;

    /// Apply a partial profile update for the token's user
    async fn update_current_user(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> IdentityResult<UserRecord>;
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &IdentityClientConfig) -> IdentityResult<reqwest::Client> {
    url::Url::parse(&config.base_url).map_err(|e| {
        IdentityError::internal(format!("Invalid base URL '{}': {}", config.base_url, e))
    })?;

    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| IdentityError::internal(format!("Invalid user agent: {}", e)))?,
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| IdentityError::internal(format!("Invalid header name '{}': {}", key, e)))?;
        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            IdentityError::internal(format!("Invalid header value for '{}': {}", key, e))
        })?;
        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| IdentityError::internal(format!("Failed to create HTTP client: {}", e)))
}
