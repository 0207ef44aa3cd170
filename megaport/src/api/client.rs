use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::common::{ApiErrorResponse, ApiResponse};
use super::error::ApiError;

/// Tokens are refreshed this long before the server says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Megaport environments and their endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.megaport.com",
            Environment::Staging => "https://api-staging.megaport.com",
            Environment::Development => "https://api-mpone-dev.megaport.com",
        }
    }

    pub fn auth_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://auth-m2m.megaport.com",
            Environment::Staging => "https://auth-m2m-staging.megaport.com",
            Environment::Development => "https://auth-m2m-mpone-dev.megaport.com",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            other => Err(format!(
                "unknown environment \"{}\", expected production, staging or development",
                other
            )),
        }
    }
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 60,
        }
    }
}

/// Connection settings for a [`Client`]
#[derive(Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub api_endpoint: String,
    pub auth_endpoint: String,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(environment: Environment, access_key: &str, secret_key: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            api_endpoint: environment.api_url().to_string(),
            auth_endpoint: environment.auth_url().to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_endpoint(mut self, endpoint: &str) -> Self {
        self.api_endpoint = endpoint.to_string();
        self
    }

    pub fn with_auth_endpoint(mut self, endpoint: &str) -> Self {
        self.auth_endpoint = endpoint.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Megaport API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    token_url: String,
    access_key: String,
    secret_key: String,
    retry_config: RetryConfig,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        // both endpoints must at least parse as URLs
        url::Url::parse(&config.api_endpoint)?;
        url::Url::parse(&config.auth_endpoint)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.retry.timeout_seconds))
            .user_agent(concat!("terraform-provider-megaport/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: config.api_endpoint.trim_end_matches('/').to_string(),
                token_url: format!("{}/oauth2/token", config.auth_endpoint.trim_end_matches('/')),
                access_key: config.access_key,
                secret_key: config.secret_key,
                retry_config: config.retry,
                token: Mutex::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Returns a bearer header, fetching a new token when the cached one is
    /// missing or close to expiry
    async fn bearer(&self) -> Result<String, ApiError> {
        let mut cached = self.inner.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(format!("Bearer {}", token.access_token));
            }
        }

        tracing::debug!("Requesting access token from {}", self.inner.token_url);
        let response = self
            .inner
            .http_client
            .post(&self.inner.token_url)
            .basic_auth(&self.inner.access_key, Some(&self.inner.secret_key))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Token request failed with {}: {}", status, text);
            return Err(ApiError::Auth(format!(
                "token request returned {}: {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("invalid token response: {}", e)))?;

        let header = format!("Bearer {}", token.access_token);
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(header)
    }

    async fn clear_token(&self) {
        *self.inner.token.lock().await = None;
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            |auth| {
                tracing::debug!("GET request to: {}", url);
                self.inner
                    .http_client
                    .get(&url)
                    .header(AUTHORIZATION, auth)
                    .send()
            },
            path,
        )
        .await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            |auth| {
                tracing::debug!("POST request to: {}", url);
                self.inner
                    .http_client
                    .post(&url)
                    .header(AUTHORIZATION, auth)
                    .json(body)
                    .send()
            },
            path,
        )
        .await
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            |auth| {
                tracing::debug!("PUT request to: {}", url);
                self.inner
                    .http_client
                    .put(&url)
                    .header(AUTHORIZATION, auth)
                    .json(body)
                    .send()
            },
            path,
        )
        .await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        self.execute_with_retry(
            |auth| {
                tracing::debug!("DELETE request to: {}", url);
                self.inner
                    .http_client
                    .delete(&url)
                    .header(AUTHORIZATION, auth)
                    .send()
            },
            path,
        )
        .await
    }

    /// Location lookups
    pub fn locations(&self) -> super::locations::LocationsApi<'_> {
        super::locations::LocationsApi::new(self)
    }

    /// Partner port listings and secure key lookups
    pub fn partners(&self) -> super::partners::PartnersApi<'_> {
        super::partners::PartnersApi::new(self)
    }

    /// Product reads, modification, cancellation and provisioning waits
    pub fn products(&self) -> super::products::ProductsApi<'_> {
        super::products::ProductsApi::new(self)
    }

    /// Resource tags on products
    pub fn tags(&self) -> super::tags::TagsApi<'_> {
        super::tags::TagsApi::new(self)
    }

    /// Network design validation and purchase
    pub fn orders(&self) -> super::orders::OrdersApi<'_> {
        super::orders::OrdersApi::new(self)
    }

    /// VXC reads and updates
    pub fn vxcs(&self) -> super::vxcs::VxcsApi<'_> {
        super::vxcs::VxcsApi::new(self)
    }

    /// Company users
    pub fn users(&self) -> super::users::UsersApi<'_> {
        super::users::UsersApi::new(self)
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let retry = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= retry.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    retry.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    retry.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let auth = self.bearer().await?;
            match request_fn(auth).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        self.clear_token().await;
                        return Err(ApiError::Auth(format!("{} was rejected", path)));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        tracing::warn!("{} returned {}", path, status);
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response, path).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(ApiError::Timeout(retry.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::Request(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Unwraps the `{"message", "data"}` envelope
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let text = if text.trim().is_empty() { "null" } else { &text };

        match serde_json::from_str::<ApiResponse<T>>(text) {
            Ok(wrapper) => Ok(wrapper.data),
            Err(_) => match serde_json::from_str::<T>(text) {
                Ok(data) => Ok(data),
                Err(e) => {
                    tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                    Err(ApiError::Parse(e.to_string()))
                }
            },
        }
    }

    async fn handle_error_response<T>(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .and_then(|e| e.describe())
            .unwrap_or(text);

        if status == 404 {
            return Err(ApiError::NotFound(path.to_string()));
        }

        Err(ApiError::Api { status, message })
    }
}
