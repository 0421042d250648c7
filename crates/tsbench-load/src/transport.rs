//! HTTP transport with the configured failure policy.

use crate::config::RetryPolicy;
use crate::error::{LoadError, Result};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a delivered request
#[derive(Debug, Clone, Copy)]
pub struct Delivery {
    /// Attempts made, including the successful one
    pub attempts: u64,
    /// Latency of the successful attempt
    pub latency: Duration,
}

impl Delivery {
    pub fn retries(&self) -> u64 {
        self.attempts.saturating_sub(1)
    }
}

/// Posts request bodies to a single endpoint.
#[derive(Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpSender {
    pub fn new(
        url: impl Into<String>,
        headers: HeaderMap,
        timeout: Duration,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            headers,
            retry,
            cancel,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body`, resending the identical bytes on failure while the
    /// policy allows it.
    pub async fn post(&self, body: Bytes) -> Result<Delivery> {
        let mut attempts = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }
            attempts += 1;

            let start = Instant::now();
            let err = match self.send_once(body.clone()).await {
                Ok(()) => {
                    return Ok(Delivery {
                        attempts,
                        latency: start.elapsed(),
                    })
                }
                Err(e) => e,
            };

            let Some(delay) = self.retry.retry_delay() else {
                return Err(err);
            };

            warn!(
                "Request to {} failed (attempt {}): {}; retrying in {:?}",
                self.url, attempts, err, delay
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(LoadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn send_once(&self, body: Bytes) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            // Drain so the connection can be reused
            if let Err(e) = response.bytes().await {
                debug!("Failed to drain response from {}: {}", self.url, e);
            }
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(LoadError::Backend {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts 2xx headers, then closes before the promised body is sent
    async fn truncating_backend(expect_body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(expect_body) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/api/v1/write", addr)
    }

    #[tokio::test]
    async fn test_undrained_success_body_still_delivers() {
        let url = truncating_backend(b"payload").await;
        let sender = HttpSender::new(
            url,
            HeaderMap::new(),
            Duration::from_secs(5),
            RetryPolicy::FailFast,
            CancellationToken::new(),
        )
        .unwrap();

        let delivery = sender.post(Bytes::from_static(b"payload")).await.unwrap();
        assert_eq!(delivery.attempts, 1);
        assert_eq!(delivery.retries(), 0);
    }
}
