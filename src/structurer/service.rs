use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::StructuringSettings;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("structuring request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("structuring service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("structuring service returned no completion")]
    EmptyCompletion,

    #[error("no JSON object in generated text")]
    NoJson,

    #[error("generated tree does not match the content schema: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("generated tree is nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("structuring service unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },
}

/// Turns cleaned legal text into a JSON content tree.
///
/// Implementations return the raw generated text; the structurer extracts and
/// validates the JSON object inside it.
#[async_trait]
pub trait StructuringService: Send + Sync {
    async fn generate(&self, text: &str, document_title: &str) -> Result<String, StructureError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatStructuringService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_input_chars: usize,
    max_output_tokens: u32,
    temperature: f64,
    top_p: f64,
}

impl ChatStructuringService {
    /// Build the client and check the endpoint answers. Failure here is fatal to a run.
    pub async fn connect(settings: &StructuringSettings) -> Result<Self, StructureError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let service = Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            max_input_chars: settings.max_input_chars,
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        };
        service.check_models().await?;
        info!("Structuring service ready: {} ({})", service.base_url, service.model);
        Ok(service)
    }

    async fn check_models(&self) -> Result<(), StructureError> {
        let url = format!("{}/models", self.base_url);
        let unavailable = |reason: String| StructureError::Unavailable {
            url: url.clone(),
            reason,
        };
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl StructuringService for ChatStructuringService {
    async fn generate(&self, text: &str, document_title: &str) -> Result<String, StructureError> {
        let truncated = truncate_chars(text, self.max_input_chars);
        if truncated.len() < text.len() {
            debug!(
                "Truncated '{}' from {} to {} chars for structuring",
                document_title,
                text.chars().count(),
                self.max_input_chars
            );
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: build_prompt(truncated, document_title),
            }],
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        };

        let response = self
            .authorized(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StructureError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(StructureError::EmptyCompletion)
    }
}

/// Longest prefix of `text` with at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_prompt(text: &str, document_title: &str) -> String {
    format!(
        r#"Parse the following legal document text into a structured JSON format. The document title is '{title}'.

Text:
{text}

Output a JSON object with the following structure:
{{
    "title": "The title of the document",
    "type": "The type of the document (e.g., 'Act', 'Regulation')",
    "content": [
        {{
            "type": "The type of the section (e.g., 'Part', 'Division', 'Section')",
            "number": "The number or identifier of the section",
            "title": "The title of the section",
            "text": "The main text content of the section",
            "content": []
        }}
    ]
}}

Nest subsections inside "content" following the same structure, preserving the original organization of the document. Only include the JSON object in your response, without any additional text."#,
        title = document_title,
        text = text,
    )
}

// ── Tests ──
