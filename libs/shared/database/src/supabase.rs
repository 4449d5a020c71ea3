use std::time::Duration;

use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Non-success response from the PostgREST API.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    fn from_response(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            // PostgREST answers unique violations (SQLSTATE 23505) with 409
            409 => SupabaseError::Constraint(body),
            code => SupabaseError::Api { status: code, message: body },
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            SupabaseError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Whether a failed request is worth retrying by the caller: timeouts,
/// connection failures, rate limiting and server-side errors.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(api_error) = err.downcast_ref::<SupabaseError>() {
        return api_error.is_transient();
    }
    if let Some(http_error) = err.downcast_ref::<reqwest::Error>() {
        return http_error.is_timeout() || http_error.is_connect() || http_error.is_request();
    }
    false
}

/// Whether a failed request was rejected by a database constraint.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Constraint(_)))
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Issue a request whose response body is ignored (e.g. DELETE without
    /// `Prefer: return=representation`).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<()> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_response(status, error_text).into());
        }

        Ok(response)
    }
}

/// Header asking PostgREST to echo the written rows back.
pub fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
