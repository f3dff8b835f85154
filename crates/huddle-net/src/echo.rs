//! External IP lookup through a public IP-echo endpoint.

use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{Error, Result};
use serde::Deserialize;
use tokio::time;

pub const DEFAULT_ECHO_URL: &str = "https://api.ipify.org?format=json";

/// Resolves the address the public internet sees for this host.
#[async_trait]
pub trait IpEcho: Send + Sync {
    async fn lookup(&self, timeout: Duration) -> Result<String>;
}

/// Body returned by ipify-compatible endpoints.
#[derive(Debug, Deserialize)]
pub struct EchoResponse {
    pub ip: String,
}

#[derive(Debug, Clone)]
pub struct HttpIpEcho {
    client: reqwest::Client,
    url: String,
}

impl HttpIpEcho {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("GET {}: {}", self.url, e)))?
            .error_for_status()
            .map_err(|e| Error::network(format!("GET {}: {}", self.url, e)))?;

        let body: EchoResponse = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("invalid echo body: {}", e)))?;

        let ip = body.ip.trim();
        if ip.is_empty() {
            return Err(Error::protocol("echo endpoint returned an empty ip"));
        }
        Ok(ip.to_string())
    }
}

impl Default for HttpIpEcho {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_URL)
    }
}

#[async_trait]
impl IpEcho for HttpIpEcho {
    async fn lookup(&self, timeout: Duration) -> Result<String> {
        time::timeout(timeout, self.fetch())
            .await
            .map_err(|_| Error::timeout(format!("IP echo after {:?}", timeout)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_echo(url: String) -> HttpIpEcho {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpIpEcho::with_client(client, url)
    }

    /// Local endpoint that accepts connections and never answers.
    async fn silent_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{}/", addr)
    }

    async fn answering_endpoint(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_echo_body_shape() {
        let body: EchoResponse = serde_json::from_str(r#"{"ip":"203.0.113.7"}"#).unwrap();
        assert_eq!(body.ip, "203.0.113.7");
        assert!(serde_json::from_str::<EchoResponse>(r#"{"addr":"1.2.3.4"}"#).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let echo = HttpIpEcho::new("http://127.0.0.1:9/");
        let result = echo.lookup(Duration::from_secs(2)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_url() {
        assert_eq!(HttpIpEcho::default().url(), DEFAULT_ECHO_URL);
    }

    #[tokio::test]
    async fn test_hanging_endpoint_hits_timeout() {
        let echo = local_echo(silent_endpoint().await);
        let started = std::time::Instant::now();

        let err = echo.lookup(Duration::from_millis(200)).await.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {}", err);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_lookup_reads_ip_field() {
        let echo = local_echo(answering_endpoint(r#"{"ip":" 203.0.113.7 "}"#).await);
        assert_eq!(
            echo.lookup(Duration::from_secs(2)).await.unwrap(),
            "203.0.113.7"
        );
    }
}
