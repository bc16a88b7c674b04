//! Outbound transports.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{Error, Result};

/// Content type of packed agent messages on the wire.
pub const WIRE_CONTENT_TYPE: &str = "application/ssi-agent-wire";

/// Delivers packed messages to an endpoint.
///
/// A transport may hand back response bytes when the far side uses the
/// delivering channel for its reply; the connection decides whether a
/// response was expected.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `packed` to `endpoint`, returning any response bytes.
    async fn send(&self, packed: &[u8], endpoint: &str) -> Result<Option<Vec<u8>>>;
}

/// HTTP POST transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, packed: &[u8], endpoint: &str) -> Result<Option<Vec<u8>>> {
        debug!(endpoint, bytes = packed.len(), "posting message");
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, WIRE_CONTENT_TYPE)
            .body(packed.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Delivery(format!("endpoint returned {status}")));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_with_wire_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/msg"))
            .and(header("content-type", WIRE_CONTENT_TYPE))
            .and(body_bytes(b"packed".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let response = transport
            .send(b"packed", &format!("{}/msg", server.uri()))
            .await
            .unwrap();
        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn returns_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"reply".to_vec()))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let response = transport.send(b"packed", &server.uri()).await.unwrap();
        assert_eq!(response, Some(b"reply".to_vec()));
    }

    #[tokio::test]
    async fn error_status_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let err = transport.send(b"packed", &server.uri()).await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
    }
}
