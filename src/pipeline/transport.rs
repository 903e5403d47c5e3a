//! Network seam: one request for one page, nothing more.
//!
//! Retry, timeout, and politeness live in [`crate::pipeline::fetch`]; a
//! transport only performs a single GET and reports what happened. Keeping
//! the seam this thin lets tests drive the whole pipeline with a scripted
//! transport and no sockets.

use crate::config::AcquisitionConfig;
use crate::error::{PageGrabError, TransientFetchError};
use crate::pipeline::acquire::PageIndex;
use crate::pipeline::input::{DocumentIdentity, ViewerEndpoint};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use tracing::debug;

const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/png,image/jpeg,image/*;q=0.8,*/*;q=0.5";

/// What came back from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one page request. Implementations must not retry.
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get_page(&self, page: PageIndex) -> Result<PageResponse, TransientFetchError>;
}

/// `reqwest`-backed transport bound to one document.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: ViewerEndpoint,
    document: DocumentIdentity,
}

impl HttpTransport {
    /// Build a client carrying the viewer's expected browser headers.
    pub fn new(
        endpoint: ViewerEndpoint,
        document: DocumentIdentity,
        config: &AcquisitionConfig,
    ) -> Result<Self, PageGrabError> {
        let referer = endpoint.referer(&document)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer.as_str())
                .map_err(|e| PageGrabError::HttpClient(format!("referer header: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_IMAGES));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PageGrabError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            document,
        })
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn get_page(&self, page: PageIndex) -> Result<PageResponse, TransientFetchError> {
        let url = self.endpoint.page_url(&self.document, page);
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(PageResponse {
                status,
                body: Vec::new(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransientFetchError::Body(e.to_string()))?;

        Ok(PageResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify(e: reqwest::Error) -> TransientFetchError {
    if e.is_timeout() {
        TransientFetchError::Timeout { elapsed_ms: 0 }
    } else if e.is_connect() {
        TransientFetchError::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        TransientFetchError::Status {
            status: status.as_u16(),
        }
    } else {
        TransientFetchError::Unknown(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(PageResponse::ok(vec![1]).is_success());
        assert!(PageResponse { status: 204, body: vec![] }.is_success());
        assert!(!PageResponse { status: 404, body: vec![] }.is_success());
        assert!(!PageResponse { status: 503, body: vec![] }.is_success());
    }

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `status_line` and `body`, and
    /// return the raw request head.
    async fn serve_once(
        status_line: &'static str,
        body: &'static [u8],
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).into_owned()
        });

        (base, handle)
    }

    fn transport_for(base: &str) -> HttpTransport {
        let config = AcquisitionConfig::builder().base_url(base).build().unwrap();
        let endpoint = ViewerEndpoint::from_config(&config).unwrap();
        HttpTransport::new(endpoint, DocumentIdentity::new("42", "the-doc"), &config).unwrap()
    }

    #[tokio::test]
    async fn get_page_sends_query_and_browser_headers() {
        let (base, server) = serve_once("200 OK", b"\x89PNG-bytes").await;
        let response = transport_for(&base).get_page(PageIndex::new(3)).await.unwrap();

        assert_eq!(response, PageResponse::ok(b"\x89PNG-bytes".to_vec()));

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /page?id=42&name=the-doc&page=3&mode=image HTTP/1.1"
        );

        let headers = request.to_ascii_lowercase();
        assert!(
            headers.contains(&format!("referer: {base}/view/42/the-doc")),
            "{request}"
        );
        assert!(headers.contains("accept: image/"), "{request}");
        assert!(headers.contains("user-agent: mozilla/5.0"), "{request}");
    }

    #[tokio::test]
    async fn empty_success_body_is_returned_as_is() {
        let (base, server) = serve_once("200 OK", b"").await;
        let response = transport_for(&base).get_page(PageIndex::new(1)).await.unwrap();
        server.await.unwrap();

        assert_eq!(response, PageResponse::ok(Vec::new()));
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn error_status_keeps_status_and_drops_body() {
        let (base, server) = serve_once("503 Service Unavailable", b"busy").await;
        let response = transport_for(&base).get_page(PageIndex::new(1)).await.unwrap();
        server.await.unwrap();

        assert_eq!(
            response,
            PageResponse {
                status: 503,
                body: Vec::new()
            }
        );
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn refused_connection_is_classified_as_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = transport_for(&base)
            .get_page(PageIndex::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransientFetchError::Connect(_)), "{err:?}");
    }

    #[test]
    fn http_transport_builds_with_valid_identity() {
        let config = AcquisitionConfig::builder()
            .base_url("https://viewer.example.org")
            .build()
            .unwrap();
        let endpoint = ViewerEndpoint::from_config(&config).unwrap();
        let doc = DocumentIdentity::new("42", "the-doc");
        assert!(HttpTransport::new(endpoint, doc, &config).is_ok());
    }
}
