//! Short natural-language insight for a symbol's recent window.
//!
//! A configured language model is asked for the text; without one, or when
//! the call fails, a deterministic local heuristic is used instead. The
//! [`Insight`] variant records which path produced the text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::http_client;
use crate::data::{FeatureWindow, CLOSE, VOLUME};
use crate::error::PipelineError;
use crate::utils::fill::fill_missing;
use crate::utils::stats;

/// Insight text together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insight {
    Generated(String),
    Fallback(String),
}

impl Insight {
    pub fn into_text(self) -> String {
        match self {
            Insight::Generated(s) | Insight::Fallback(s) => s,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Insight::Generated(_))
    }
}

/// Text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Recent-price context handed to the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSummary {
    pub recent_price: f64,
    pub change_pct: f64,
    pub bullish: bool,
    pub high_volume: bool,
}

impl MarketSummary {
    pub fn from_window(window: &FeatureWindow) -> Self {
        let closes = fill_missing(&window.column(CLOSE));
        let volumes = fill_missing(&window.column(VOLUME));

        let recent_price = closes.last().copied().unwrap_or(0.0);
        let change_pct = percent_change(&closes);

        let tail = &volumes[volumes.len().saturating_sub(5)..];
        let volume_avg = stats::mean(tail).unwrap_or(0.0);
        let latest_volume = volumes.last().copied().unwrap_or(0.0);

        MarketSummary {
            recent_price,
            change_pct,
            bullish: change_pct > 0.0,
            high_volume: latest_volume > volume_avg * 1.5,
        }
    }

    pub fn trend(&self) -> &'static str {
        if self.bullish {
            "bullish"
        } else {
            "bearish"
        }
    }

    pub fn volume_signal(&self) -> &'static str {
        if self.high_volume {
            "high volume"
        } else {
            "normal volume"
        }
    }
}

/// Percentage change between the last two values, 0 with fewer than two
/// values or a zero base.
pub fn percent_change(values: &[f64]) -> f64 {
    match values {
        [.., prev, last] if *prev != 0.0 => (last - prev) / prev * 100.0,
        _ => 0.0,
    }
}

pub fn build_prompt(summary: &MarketSummary, symbol: &str) -> String {
    format!(
        "You are a financial analyst. Provide a short, insightful analysis for {symbol}.\n\
         Recent price: ${:.2}, 24h change: {:.1}%, trend: {}.\n\
         Volume: {}.\n\
         Keep it under 50 words, focus on buy/sell signals or risks.",
        summary.recent_price,
        summary.change_pct,
        summary.trend(),
        summary.volume_signal(),
    )
}

/// Local trend heuristic used when no language model is available.
pub fn fallback_insight(window: &FeatureWindow, symbol: &str) -> String {
    let closes = fill_missing(&window.column(CLOSE));
    let recent_close = closes.last().copied().unwrap_or(0.0);
    let last_five = &closes[closes.len().saturating_sub(5)..];
    let bullish = closes.len() > 5 && stats::mean(last_five).map_or(false, |m| m < recent_close);
    let trend = if bullish { "Bullish" } else { "Bearish" };
    format!("{symbol}: {trend} trend detected based on recent prices.")
}

pub fn failure_insight(symbol: &str) -> String {
    format!("Analysis for {symbol}: Unable to generate insight (check API key).")
}

pub struct InsightGenerator {
    model: Option<Arc<dyn LanguageModel>>,
}

impl InsightGenerator {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        InsightGenerator { model }
    }

    /// Generator that never leaves the process.
    pub fn offline() -> Self {
        InsightGenerator { model: None }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn generate(&self, window: &FeatureWindow, symbol: &str) -> Insight {
        let Some(model) = self.model.as_ref().filter(|_| !window.is_empty()) else {
            return Insight::Fallback(fallback_insight(window, symbol));
        };

        let prompt = build_prompt(&MarketSummary::from_window(window), symbol);
        match model.complete(&prompt).await {
            Ok(text) => Insight::Generated(text.trim().to_string()),
            Err(e) => {
                warn!(symbol = %symbol, "insight generation failed: {}", e);
                Insight::Fallback(failure_insight(symbol))
            }
        }
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: http_client(Duration::from_secs(60), None)?,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::InsightGeneration(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::InsightGeneration(format!(
                "language model API error ({}): {}",
                status, error_text
            )));
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::InsightGeneration(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::InsightGeneration("empty completion".to_string()))
    }
}
