//! HTTP token sink: POST the registration as JSON to the configured endpoint.

use async_trait::async_trait;
use pushlife_core::{SinkError, TokenRegistration, TokenSink};

pub struct HttpTokenSink {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenSink for HttpTokenSink {
    async fn register(&self, registration: &TokenRegistration) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(&self.url)
            .json(registration)
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn registration() -> TokenRegistration {
        TokenRegistration {
            token: "abc123".into(),
            platform: "android".into(),
            user_id: "user123".into(),
        }
    }

    /// Accept one request, answer with `status`, yield the JSON body.
    async fn serve_once(status: &'static str) -> (String, JoinHandle<serde_json::Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/tokens", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let body = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed mid-request");
                buf.extend_from_slice(&chunk[..n]);
                let mut headers = [httparse::EMPTY_HEADER; 32];
                let mut req = httparse::Request::new(&mut headers);
                if let httparse::Status::Complete(head) = req.parse(&buf).unwrap() {
                    assert_eq!(req.method, Some("POST"));
                    assert_eq!(req.path, Some("/tokens"));
                    let len = req
                        .headers
                        .iter()
                        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                        .and_then(|h| std::str::from_utf8(h.value).ok()?.parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= head + len {
                        break buf[head..head + len].to_vec();
                    }
                }
            };
            let reply = format!(
                "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            serde_json::from_slice(&body).unwrap()
        });
        (url, server)
    }

    #[tokio::test]
    async fn posts_registration_as_json() {
        let (url, server) = serve_once("201 Created").await;
        HttpTokenSink::new(url).register(&registration()).await.unwrap();
        assert_eq!(
            server.await.unwrap(),
            serde_json::json!({"token": "abc123", "platform": "android", "userId": "user123"})
        );
    }

    #[tokio::test]
    async fn error_status_is_rejected() {
        let (url, server) = serve_once("503 Service Unavailable").await;
        let err = HttpTokenSink::new(url)
            .register(&registration())
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Rejected(503)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = HttpTokenSink::new(format!("http://{}/tokens", addr))
            .register(&registration())
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Unreachable(_)));
    }
}
