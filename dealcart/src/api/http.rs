//! HTTP/JSON transport for the shopping service.

use super::{
    AddItemRequest, AddItemResponse, CART_ADD_PATH, CART_REMOVE_PATH, CART_VIEW_PATH, CartView,
    QueryRequest, QueryResponse, RemoveItemRequest, ShopApi, USER_QUERY_PATH, ensure_success,
    error_message,
};
use crate::config::{ApiConfig, DEFAULT_BASE_URL};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Supplies the bearer credential attached to assistant queries.
///
/// The engine does not manage authentication; it only asks for the current
/// token right before each query.
pub trait CredentialSource: Send + Sync {
    /// Current bearer token, if the user is signed in.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed bearer token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// [`ShopApi`] over HTTP with JSON bodies.
///
/// # Example
///
/// ```rust,ignore
/// let api = HttpShopApi::builder()
///     .base_url("https://shop.example.com/api/")
///     .timeout(Duration::from_secs(10))
///     .credentials(StaticToken::new(token))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HttpShopApi {
    http_client: reqwest::Client,
    base_url: Url,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl std::fmt::Debug for HttpShopApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpShopApi")
            .field("base_url", &self.base_url.as_str())
            .field("has_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpShopApi {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> HttpShopApiBuilder {
        HttpShopApiBuilder::default()
    }

    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        let mut builder = Self::builder().base_url(&config.base_url);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = &config.token {
            builder = builder.credentials(StaticToken::new(token.clone()));
        }
        builder.build()
    }

    /// Base URL endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Request(format!("invalid endpoint {path}: {e}")))
    }

    fn with_credentials(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        let Some(token) = self.credentials.as_ref().and_then(|c| c.bearer_token()) else {
            return Ok(request);
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::Request(format!("invalid credential: {e}")))?;
        value.set_sensitive(true);
        Ok(request.header(AUTHORIZATION, value))
    }

    async fn post_json<B>(&self, path: &str, body: &B, authorized: bool) -> ApiResult<Value>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut request = self.http_client.post(url).json(body);
        if authorized {
            request = self.with_credentials(request)?;
        }
        Self::execute(request, path).await
    }

    async fn execute(request: RequestBuilder, path: &str) -> ApiResult<Value> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(path, status = status.as_u16(), ?message, "request failed");
            return Err(ApiError::status(status.as_u16(), message));
        }

        debug!(path, status = status.as_u16(), bytes = body.len(), "request succeeded");
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::malformed(e.to_string()))
    }
}

#[async_trait]
impl ShopApi for HttpShopApi {
    async fn view_cart(&self, session_id: Option<&str>) -> ApiResult<CartView> {
        let mut url = self.endpoint(CART_VIEW_PATH)?;
        if let Some(id) = session_id {
            url.query_pairs_mut().append_pair("session_id", id);
        }
        let value = Self::execute(self.http_client.get(url), CART_VIEW_PATH).await?;
        CartView::from_value(&value)
    }

    async fn add_item(&self, request: &AddItemRequest) -> ApiResult<AddItemResponse> {
        let value = self.post_json(CART_ADD_PATH, request, false).await?;
        AddItemResponse::from_value(&value)
    }

    async fn remove_item(&self, request: &RemoveItemRequest) -> ApiResult<()> {
        let value = self.post_json(CART_REMOVE_PATH, request, false).await?;
        ensure_success(&value, "remove item")
    }

    async fn user_query(&self, request: &QueryRequest) -> ApiResult<QueryResponse> {
        let value = self.post_json(USER_QUERY_PATH, request, true).await?;
        QueryResponse::from_value(&value)
    }
}

/// Builder for [`HttpShopApi`].
#[derive(Default)]
pub struct HttpShopApiBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl std::fmt::Debug for HttpShopApiBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpShopApiBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpShopApiBuilder {
    /// Set the service base URL. A trailing `/` is added if missing.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the credential source used for assistant queries.
    #[must_use]
    pub fn credentials(mut self, source: impl CredentialSource + 'static) -> Self {
        self.credentials = Some(Arc::new(source));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if the base URL does not parse or the
    /// HTTP client cannot be built.
    pub fn build(self) -> ApiResult<HttpShopApi> {
        let mut base = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| ApiError::Request(format!("invalid base url: {e}")))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(HttpShopApi {
            http_client,
            base_url,
            credentials: self.credentials,
        })
    }
}
