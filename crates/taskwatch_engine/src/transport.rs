use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskwatch_core::{ApiCall, ApiReply, HttpMethod, RequestError};
use url::Url;
use watch_logging::{watch_debug, watch_warn};

use crate::EngineSettings;

/// Shown when the server gives no usable error detail.
pub const GENERIC_ERROR_MESSAGE: &str = "Request failed";
/// Joins the messages of a validation error list.
pub const DETAIL_SEPARATOR: &str = "；";

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issues `call`, attaching `credential` as a bearer header when present.
    async fn call(&self, call: &ApiCall, credential: Option<&str>) -> Result<ApiReply, RequestError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(settings: &EngineSettings) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RequestError::new(None, err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path)
            .map_err(|err| RequestError::new(None, format!("invalid endpoint {path}: {err}")))
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        credential: Option<&str>,
    ) -> Result<T, RequestError> {
        let url = self.endpoint(path)?;
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let message = extract_error_message(&bytes);
            watch_debug!("{} {} failed with {}: {}", method_label(method), path, status, message);
            return Err(RequestError::new(Some(status.as_u16()), message));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            watch_warn!("Undecodable response from {}: {}", path, err);
            RequestError::new(Some(status.as_u16()), format!("invalid response: {err}"))
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn call(&self, call: &ApiCall, credential: Option<&str>) -> Result<ApiReply, RequestError> {
        let method = call.method();
        let path = call.path();
        let body = call
            .body()
            .map_err(|err| RequestError::new(None, format!("invalid request body: {err}")))?;

        match call {
            ApiCall::Login(_) => self
                .request_json(method, &path, body, credential)
                .await
                .map(ApiReply::Login),
            ApiCall::History => self
                .request_json(method, &path, body, credential)
                .await
                .map(ApiReply::History),
            ApiCall::Tasks => self
                .request_json(method, &path, body, credential)
                .await
                .map(ApiReply::Tasks),
            ApiCall::Precheck(_) => self
                .request_json(method, &path, body, credential)
                .await
                .map(ApiReply::Precheck),
            ApiCall::Download(_) => self
                .request_json(method, &path, body, credential)
                .await
                .map(ApiReply::Download),
            ApiCall::GenerateArticle { .. } => self
                .request_json::<Value>(method, &path, body, credential)
                .await
                .map(|_| ApiReply::ArticleQueued),
        }
    }
}

/// Reduces an error body to one message.
///
/// `detail` may be a list of validation errors, a single error object or a
/// plain string; anything else falls back to [`GENERIC_ERROR_MESSAGE`].
pub fn extract_error_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return GENERIC_ERROR_MESSAGE.to_string();
    };
    let message = match value.get("detail") {
        Some(Value::Array(items)) => items
            .iter()
            .map(message_of)
            .collect::<Vec<_>>()
            .join(DETAIL_SEPARATOR),
        Some(detail @ Value::Object(_)) => message_of(detail),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };
    if message.is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

fn message_of(item: &Value) -> String {
    match item.get("msg") {
        Some(Value::String(msg)) if !msg.is_empty() => msg.clone(),
        _ => item.to_string(),
    }
}

fn method_label(method: HttpMethod) -> &'static str {
    match method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(None, "request timed out");
    }
    RequestError::new(None, format!("network error: {err}"))
}
