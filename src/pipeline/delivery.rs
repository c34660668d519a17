//! Forwarding analysis records to the backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::info;

use crate::config::http_client;
use crate::error::PipelineError;
use crate::pipeline::record::AnalysisRecord;

/// Destination for analysis records. One call per record; no retries.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, record: &AnalysisRecord) -> Result<(), PipelineError>;
}

/// POSTs each record as JSON. The backend answers 201 Created on success;
/// anything else is reported as a delivery error.
pub struct HttpSink {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(Duration::from_secs(15), None)?,
            endpoint: endpoint.into(),
            auth_token: None,
        })
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeliverySink for HttpSink {
    async fn deliver(&self, record: &AnalysisRecord) -> Result<(), PipelineError> {
        let mut request = self.client.post(&self.endpoint).json(record);
        if let Some(token) = &self.auth_token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request.send().await.map_err(|e| PipelineError::Delivery {
            symbol: record.symbol.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            info!(symbol = %record.symbol, "Sent to backend: OK");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PipelineError::Delivery {
            symbol: record.symbol.clone(),
            reason: format!("backend answered {} - {}", status, body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn record() -> AnalysisRecord {
        AnalysisRecord {
            symbol: "AAPL".to_string(),
            current_price: 1.0,
            volume: 1,
            sma_20: None,
            rsi: None,
            change_percent: 0.0,
            anomaly: 1,
            anomaly_score: 0.0,
            insight: String::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    // Local backend that answers a single request with `status_line` and
    // hands back the raw request it received.
    async fn one_shot_backend(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let body_len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            let response = format!("HTTP/1.1 {}\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}", status_line);
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{}/api/stocks/update", addr), handle)
    }

    #[test]
    fn empty_token_is_not_sent() {
        let sink = HttpSink::new("http://localhost:5000/api/stocks/update")
            .unwrap()
            .with_auth_token(Some(String::new()));
        assert!(sink.auth_token.is_none());
        assert_eq!(sink.endpoint(), "http://localhost:5000/api/stocks/update");
    }

    #[tokio::test]
    async fn created_response_is_success() {
        let (endpoint, backend) = one_shot_backend("201 Created").await;
        let sink = HttpSink::new(endpoint).unwrap().with_auth_token(Some("secret".to_string()));

        sink.deliver(&record()).await.unwrap();

        let request = backend.await.unwrap();
        assert!(request.starts_with("POST /api/stocks/update"));
        assert!(request.to_ascii_lowercase().contains("authorization: secret"));
        assert!(request.contains("\"symbol\":\"AAPL\""));
    }

    #[tokio::test]
    async fn non_created_response_is_a_delivery_error() {
        let (endpoint, backend) = one_shot_backend("200 OK").await;
        let sink = HttpSink::new(endpoint).unwrap();

        let err = sink.deliver(&record()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Delivery { ref symbol, ref reason } if symbol == "AAPL" && reason.contains("200")));
        backend.await.unwrap();
    }
}
