//! `reqwest` implementation of [`RemoteApi`].

use std::time::Duration;

use async_trait::async_trait;
use aura_core::{
    ClientConfig,
    traits::{ApiError, RemoteApi},
    types::{
        AuthMode, AuthReply, ChatReply, Credentials, GuardianFields, GuardianId, GuardianRecord,
    },
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::protocol::{ChatRequest, ClearHistoryRequest, ErrorBody, guardian_path};

/// Error building an [`HttpApi`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid API base URL: {0}")]
    InvalidBase(#[from] url::ParseError),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP client for the support service.
///
/// Requests are issued once. There is no retry, and no timeout unless one
/// is configured.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpApi {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: impl AsRef<str>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(base_url, builder.build()?)
    }

    /// Create a client with a custom `reqwest` client.
    ///
    /// # Errors
    /// Returns error if the URL is invalid.
    pub fn with_client(
        base_url: impl AsRef<str>,
        http: reqwest::Client,
    ) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // `join` replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http })
    }

    /// Create a client from the loaded configuration.
    ///
    /// # Errors
    /// Returns error if `api_base` is invalid or the client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.api_base,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Request(format!("cannot join {path:?} to base URL: {e}")))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.url(path)?;
        tracing::debug!(%method, path, authenticated = token.is_some(), "api request");
        let builder = self.http.request(method, url);
        Ok(match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = ErrorBody::message_from(&raw).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
        tracing::debug!(status = status.as_u16(), %message, "api error response");
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = Self::send(builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, ApiError> {
        let path = format!("api/{}", mode.endpoint());
        Self::send_json(self.request(Method::POST, &path, None)?.json(credentials)).await
    }

    async fn chat(&self, token: Option<&str>, message: &str) -> Result<ChatReply, ApiError> {
        let body = ChatRequest { message };
        Self::send_json(self.request(Method::POST, "api/chat", token)?.json(&body)).await
    }

    async fn clear_history(&self, token: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "api/clear_history", Some(token))?
            .json(&ClearHistoryRequest::default());
        Self::send(builder).await.map(drop)
    }

    async fn list_guardians(&self, token: &str) -> Result<Vec<GuardianRecord>, ApiError> {
        Self::send_json(self.request(Method::GET, "api/guardians", Some(token))?).await
    }

    async fn create_guardian(
        &self,
        token: &str,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError> {
        Self::send_json(
            self.request(Method::POST, "api/guardians", Some(token))?
                .json(fields),
        )
        .await
    }

    async fn update_guardian(
        &self,
        token: &str,
        id: GuardianId,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError> {
        Self::send_json(
            self.request(Method::PUT, &guardian_path(id), Some(token))?
                .json(fields),
        )
        .await
    }

    async fn delete_guardian(&self, token: &str, id: GuardianId) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &guardian_path(id), Some(token))?;
        Self::send(builder).await.map(drop)
    }

    fn origin(&self) -> &Url {
        &self.base_url
    }
}
