use std::sync::{Mutex, PoisonError};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, trace};

use crate::logger::MessageLogger;
use crate::protocol::ApiRequest;
use crate::{Error, Result};

#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// The server refused the session or credentials at the HTTP level.
    pub fn is_auth_rejection(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }
}

/// JSON-over-HTTP adapter for one vendor host.
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
    logger: Option<Mutex<MessageLogger>>,
}

impl Transport {
    pub fn new(http: reqwest::Client, base_url: String, logger: Option<MessageLogger>) -> Self {
        Self {
            http,
            base_url,
            logger: logger.map(Mutex::new),
        }
    }

    /// Sends one request. 401/403 come back as a response so the caller can
    /// re-authenticate; every other failure status is an error.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, request.path);
        debug!(method = %request.method, path = request.path, "sending request");
        self.capture(|l| l.log_request(request.method.as_str(), request.path, request.body.as_ref()));

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(ACCEPT, "application/json")
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), path = request.path, "request not authorized");
            self.capture(|l| l.log_response(status.as_u16(), &Value::Null));
            return Ok(ApiResponse {
                status,
                body: Value::Null,
            });
        }

        let failure = resp.error_for_status_ref().err();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let text = resp.text().await;

        if let Some(e) = failure {
            debug!(status = status.as_u16(), path = request.path, "request failed");
            let text = text.unwrap_or_default();
            self.capture(|l| l.log_response(status.as_u16(), &Value::String(text)));
            return Err(e.into());
        }
        let text = text?;

        if !is_json {
            self.capture(|l| l.log_response(status.as_u16(), &Value::String(text.clone())));
            return Err(Error::Protocol(format!(
                "unexpected response from {}: {text}",
                request.path
            )));
        }

        let body: Value = serde_json::from_str(&text)?;
        trace!(status = status.as_u16(), path = request.path, "response received");
        self.capture(|l| l.log_response(status.as_u16(), &body));

        Ok(ApiResponse { status, body })
    }

    fn capture(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger {
            let mut guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
        }
    }
}
