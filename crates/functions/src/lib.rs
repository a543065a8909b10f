//! Edge function client for BucketNest
//!
//! Invokes functions under `/functions/v1`. A 404 is surfaced as its own
//! variant because public lookups treat "absent" differently from "failed".

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Function {function} not found or returned 404: {message}")]
    NotFound { function: String, message: String },

    #[error("Function error ({status}): {message}")]
    FunctionError { status: StatusCode, message: String },
}

pub type Result<T> = std::result::Result<T, FunctionsError>;

#[derive(Debug, Default, Clone)]
pub struct FunctionOptions {
    pub headers: Option<HashMap<String, String>>,
    /// Bearer token; the anon key is used when absent.
    pub authorization: Option<String>,
}

/// Edge function client
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl FunctionsClient {
    pub fn new(supabase_url: &str, supabase_key: &str, http_client: Client) -> Self {
        Self {
            base_url: supabase_url.to_string(),
            api_key: supabase_key.to_string(),
            http_client,
        }
    }

    fn function_url(&self, function_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| FunctionsError::UrlError(url::ParseError::EmptyHost))?
            .pop_if_empty()
            .push("functions")
            .push("v1")
            .push(function_name);
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        options: FunctionOptions,
    ) -> reqwest::RequestBuilder {
        let token = options
            .authorization
            .unwrap_or_else(|| self.api_key.clone());
        let mut request = self
            .http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(token);
        if let Some(headers) = options.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }
        request
    }

    /// POSTs an optional JSON body to the function.
    pub async fn invoke<T: Serialize, R: DeserializeOwned>(
        &self,
        function_name: &str,
        body: Option<T>,
        options: Option<FunctionOptions>,
    ) -> Result<R> {
        let url = self.function_url(function_name)?;
        let mut request = self.request(reqwest::Method::POST, url, options.unwrap_or_default());
        if let Some(body_data) = body {
            request = request.json(&body_data);
        }
        self.finish(function_name, request).await
    }

    /// GETs the function with query parameters, e.g. `?slug=abc`.
    pub async fn get<R: DeserializeOwned>(
        &self,
        function_name: &str,
        query: &[(&str, &str)],
        options: Option<FunctionOptions>,
    ) -> Result<R> {
        let mut url = self.function_url(function_name)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        let request = self.request(reqwest::Method::GET, url, options.unwrap_or_default());
        self.finish(function_name, request).await
    }

    async fn finish<R: DeserializeOwned>(
        &self,
        function_name: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<R> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::debug!("function {} returned {}: {}", function_name, status, message);
            if status == StatusCode::NOT_FOUND {
                return Err(FunctionsError::NotFound {
                    function: function_name.to_string(),
                    message,
                });
            }
            return Err(FunctionsError::FunctionError { status, message });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
