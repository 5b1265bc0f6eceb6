//! Gemini API連携
//!
//! ポスター画像とプロンプトを送り、JSONで票根情報を受け取る。

use super::PosterAnalyzer;
use crate::config::Config;
use crate::error::{CineStubError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cinestub_common::{
    build_poster_prompt, extraction_response_schema, parse_extraction_response, ExtractionResult,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini APIリクエスト
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

/// Gemini APIレスポンス
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiResponse {
    /// candidates[0].content.parts[0].text
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Gemini によるポスター解析
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::build(api_key.into(), DEFAULT_MODEL.into(), GEMINI_API_BASE.into(), None)
    }

    /// 設定から生成（APIキー必須）
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(
            config.get_api_key()?,
            config.model.clone(),
            config.api_endpoint.clone(),
            config.timeout_seconds.map(Duration::from_secs),
        )
    }

    fn build(
        api_key: String,
        model: String,
        endpoint: String,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!("cinestub/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CineStubError::ApiCall(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, api_key, model, endpoint })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    pub(crate) fn build_request(image: &[u8], media_type: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: media_type.to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                    Part::Text { text: build_poster_prompt() },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: extraction_response_schema(),
            },
        }
    }

    /// 解析を実行（失敗はエラーとして返す）
    pub async fn try_analyze(&self, image: &[u8], media_type: &str) -> Result<ExtractionResult> {
        let request = Self::build_request(image, media_type);
        tracing::debug!(model = %self.model, bytes = image.len(), "Gemini 解析リクエスト送信");

        let response = self
            .client
            .post(self.request_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| CineStubError::ApiCall(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(CineStubError::ApiCall(format!("API error: {} {}", status, snippet)));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| CineStubError::ApiParse(e.without_url().to_string()))?;

        let text = body
            .first_text()
            .ok_or_else(|| CineStubError::ApiParse("Empty response".into()))?;

        let result = parse_extraction_response(text)
            .map_err(|e| CineStubError::ApiParse(e.to_string()))?;
        tracing::info!(title = ?result.title, "ポスター解析完了");
        Ok(result)
    }
}

#[async_trait]
impl PosterAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, image: &[u8], media_type: &str) -> ExtractionResult {
        match self.try_analyze(image, media_type).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "ポスター解析に失敗、フォールバック結果を使用");
                ExtractionResult::fallback()
            }
        }
    }
}
