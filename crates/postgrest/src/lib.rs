//! PostgREST client for the BucketNest gateway
//!
//! A thin request builder over the `/rest/v1` surface of a Supabase project:
//! table selects with filters, ordering and limits, inserts, sparse updates,
//! deletes and RPC calls. Failures keep the structured error body PostgREST
//! returns so callers can branch on the SQLSTATE / `PGRST` code instead of
//! matching on message text.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Unique constraint violation (SQLSTATE 23505).
pub const UNIQUE_VIOLATION: &str = "23505";
/// Row level security / privilege failure (SQLSTATE 42501).
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
/// `Accept: application/vnd.pgrst.object` matched zero or many rows.
pub const NO_SINGLE_ROW: &str = "PGRST116";

/// Error body returned by PostgREST
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// SQLSTATE or `PGRST` code of an API error, if the body carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PostgrestError::ApiError { status, .. }
            | PostgrestError::UnparsedApiError { status, .. } => Some(*status),
            PostgrestError::NetworkError(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Request builder for one table or one RPC function
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// Builds a client for `table` under `{base_url}/rest/v1`.
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        http_client: Client,
    ) -> Result<Self, PostgrestError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|_| {
            PostgrestError::InvalidParameters("API key is not a valid header value".to_string())
        })?;
        headers.insert("apikey", key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: Vec::new(),
            rpc_params: None,
        })
    }

    /// Builds a client that POSTs `params` to `/rest/v1/rpc/{function_name}`.
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Result<Self, PostgrestError> {
        let mut client = Self::new(base_url, api_key, function_name, http_client)?;
        client.rpc_params = Some(params);
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sends requests as the principal owning `token` so row security applies.
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    fn push_param(mut self, key: &str, value: String) -> Self {
        self.query_params.push((key.to_string(), value));
        self
    }

    pub fn select(self, columns: &str) -> Self {
        self.push_param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("eq.{}", value))
    }

    pub fn in_list(self, column: &str, values: &[&str]) -> Self {
        self.push_param(column, format!("in.({})", values.join(",")))
    }

    /// Disjunction of raw filter expressions, e.g. `["username.ilike.*ab*", "name.ilike.*ab*"]`.
    pub fn or(self, filters: &[&str]) -> Self {
        self.push_param("or", format!("({})", filters.join(",")))
    }

    pub fn order(self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.push_param("order", format!("{}.{}", column, order_str))
    }

    pub fn limit(self, count: usize) -> Self {
        self.push_param("limit", count.to_string())
    }

    fn build_url(&self) -> Result<String, PostgrestError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, self.table))?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
        representation: bool,
    ) -> Result<String, PostgrestError> {
        let mut headers = self.headers.clone();
        if representation {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static("return=representation"),
            );
        }

        log::debug!("{} {}", method, url);
        let mut request = self.http_client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            return Err(api_error(status, text));
        }
        Ok(text)
    }

    /// GET the filtered rows.
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let url = self.build_url()?;
        let text = self.send(Method::GET, url, None, false).await?;
        serde_json::from_str::<Vec<T>>(&text)
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// POST rows and return the inserted representation.
    pub async fn insert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        let url = self.build_url()?;
        let text = self.send(Method::POST, url, Some(&body), true).await?;
        parse_optional_body(&text)
    }

    /// PATCH the filtered rows with exactly the keys present in `values`.
    pub async fn update<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        if self.query_params.iter().all(|(key, _)| key == "select") {
            // PostgREST would patch every visible row.
            return Err(PostgrestError::InvalidParameters(
                "Refusing to update without a filter".to_string(),
            ));
        }
        let body = serde_json::to_value(values)?;
        let url = self.build_url()?;
        let text = self.send(Method::PATCH, url, Some(&body), true).await?;
        parse_optional_body(&text)
    }

    /// DELETE the filtered rows.
    pub async fn delete(&self) -> Result<Value, PostgrestError> {
        if self.query_params.is_empty() {
            return Err(PostgrestError::InvalidParameters(
                "Refusing to delete without a filter".to_string(),
            ));
        }
        let url = self.build_url()?;
        let text = self.send(Method::DELETE, url, None, true).await?;
        parse_optional_body(&text)
    }

    /// POST to an RPC function created with [`PostgrestClient::rpc`].
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        let params = self.rpc_params.as_ref().ok_or_else(|| {
            PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            )
        })?;
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, self.table);
        let text = self.send(Method::POST, url, Some(params), false).await?;
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str::<T>(body).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }
}

fn api_error(status: StatusCode, text: String) -> PostgrestError {
    match serde_json::from_str::<PostgrestApiErrorDetails>(&text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: text,
            status,
        },
    }
}

// 204 No Content and `return=minimal` both come back empty.
fn parse_optional_body(text: &str) -> Result<Value, PostgrestError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(text)
        .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
}
