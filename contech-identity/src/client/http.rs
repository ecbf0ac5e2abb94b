//! HTTP implementation of the identity client

use contech_core::{async_trait, ProfileUpdate, UserRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    create_http_client, ApiEnvelope, Credentials, IdentityClient, IdentityClientConfig,
    LoginResponse, RegisterRequest, RegisterResponse,
};
use crate::{IdentityError, IdentityResult};

const REGISTER_PATH: &str = "auth/register/";
const LOGIN_PATH: &str = "auth/login/";
const ME_PATH: &str = "auth/me/";

/// Identity service client speaking JSON over HTTP
pub struct HttpIdentityClient {
    client: reqwest::Client,
    config: IdentityClientConfig,
}

impl HttpIdentityClient {
    /// Create a new identity client
    pub fn new(config: IdentityClientConfig) -> IdentityResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created identity client for {}", config.base_url);

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &IdentityClientConfig {
        &self.config
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> IdentityResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.config.endpoint(path)).json(body);
        self.execute(request, path, fallback).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
        fallback: &str,
    ) -> IdentityResult<T> {
        debug!("Making identity request to: {}", path);

        let response = request.send().await.map_err(|e| {
            warn!(path = path, error = %e, "Identity request failed");
            IdentityError::transport(describe_transport_error(&e))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            IdentityError::transport(format!("Failed to read identity response: {}", e))
        })?;

        let envelope = ApiEnvelope::from_http(status, &body);
        if !envelope.success {
            debug!(path = path, status = status, "Identity service rejected request");
        }
        envelope.into_result(fallback)
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Identity service did not respond in time".to_string()
    } else if error.is_connect() {
        "Could not connect to the identity service".to_string()
    } else {
        format!("Identity request failed: {}", error)
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn register(&self, request: &RegisterRequest) -> IdentityResult<RegisterResponse> {
        debug!(email = %request.email, "Registering account");
        self.post_json(REGISTER_PATH, request, "Registration failed")
            .await
    }

    async fn login(&self, credentials: &Credentials) -> IdentityResult<LoginResponse> {
        debug!(email = %credentials.email, "Logging in");
        self.post_json(LOGIN_PATH, credentials, "Login failed").await
    }

    async fn fetch_current_user(&self, token: &str) -> IdentityResult<UserRecord> {
        let request = self
            .client
            .get(self.config.endpoint(ME_PATH))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(token));
        self.execute(request, ME_PATH, "Failed to load user").await
    }

    async fn update_current_user(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> IdentityResult<UserRecord> {
        let request = self
            .client
            .patch(self.config.endpoint(ME_PATH))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(token))
            .json(update);
        self.execute(request, ME_PATH, "Failed to update profile")
            .await
    }
}
