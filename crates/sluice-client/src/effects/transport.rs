//! Network execution of a [`Request`] against a reqwest client.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart;
use thiserror::Error;
use tracing::debug;

use crate::data::{Encoding, Method, RawResponse, Request};

const USER_AGENT: &str = concat!("sluice/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Executes one request and yields the raw result, whatever the status.
///
/// Connection pooling, TLS and timeout configuration belong to the
/// implementation; the pipeline only sees this seam.
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + 'static;

    fn execute(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<RawResponse, Self::Error>> + Send;
}

/// Default [`Transport`] backed by a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build with 60 s connect and total timeouts.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an externally configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Standard path: parameters travel per the request's encoding.
    pub async fn execute_standard(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let builder = self.builder(request)?;
        let builder = match request.encoding() {
            Encoding::Query => builder.query(&query_pairs(request)),
            Encoding::Json => builder.json(request.parameters()),
        };
        self.send(builder).await
    }

    /// Upload path: parameters become text fields, upload parts become file
    /// parts, in their declared order.
    pub async fn execute_upload(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let mut form = multipart::Form::new();
        for (name, value) in request.parameters() {
            form = form.text(name.clone(), crate::core::query_value(value));
        }
        for part in request.upload_parts() {
            let piece = multipart::Part::bytes(part.data.to_vec())
                .file_name(part.file_name.clone())
                .mime_str(&part.mime_type)?;
            form = form.part(part.field_name.clone(), piece);
        }
        let builder = self.builder(request)?.multipart(form);
        self.send(builder).await
    }

    fn builder(&self, request: &Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = reqwest::Url::parse(request.url())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url())))?;
        let mut builder = self
            .client
            .request(request.method().into(), url)
            .headers(header_map(request.headers())?);
        if let Some(auth) = request.basic_auth() {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        Ok(builder)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;
        debug!(target: "sluice", status, bytes = body.len(), "response received");
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    type Error = TransportError;

    async fn execute(&self, request: &Request) -> Result<RawResponse, TransportError> {
        if request.upload_parts().is_empty() {
            self.execute_standard(request).await
        } else {
            self.execute_upload(request).await
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

fn query_pairs(request: &Request) -> Vec<(String, String)> {
    request
        .parameters()
        .iter()
        .map(|(name, value)| (name.clone(), crate::core::query_value(value)))
        .collect()
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_str(name).map_err(|e| TransportError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_map_rejects_invalid_value() {
        let err = header_map(&[("X-Token".to_string(), "bad\nvalue".to_string())]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[test]
    fn header_map_keeps_valid_entries() {
        let map = header_map(&[("accept".to_string(), "application/json".to_string())]).unwrap();
        assert_eq!(map.get("accept").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_io() {
        let transport = ReqwestTransport::new().unwrap();
        let request = Request::new(Method::Get, "not a url");
        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
