use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::GenerationError;
use crate::schema::{self, Object};

/// Shape the caller expects the service to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// Ordered list of tagged entity/relationship objects
    Objects,
    /// `{"summary": "..."}`
    Summary,
    /// Free text
    Text,
}

impl ResponseShape {
    /// JSON schema for structured shapes, `None` for free text.
    pub fn json_schema(&self) -> Option<Value> {
        let entity = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "type": {"type": "string"},
                "description": {"type": ["string", "null"]}
            },
            "required": ["name", "type", "description"]
        });

        match self {
            ResponseShape::Objects => Some(json!({
                "type": "object",
                "properties": {
                    "objects": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "type": {"type": "string", "enum": ["entity", "relationship"]},
                                "object": {
                                    "anyOf": [
                                        entity.clone(),
                                        {
                                            "type": "object",
                                            "properties": {
                                                "from_entity": entity.clone(),
                                                "to_entity": entity,
                                                "label": {"type": ["string", "null"]},
                                                "strength": {
                                                    "type": ["number", "null"],
                                                    "minimum": 0.0,
                                                    "maximum": 1.0
                                                }
                                            },
                                            "required": ["from_entity", "to_entity", "label", "strength"]
                                        }
                                    ]
                                }
                            },
                            "required": ["type", "object"]
                        }
                    }
                },
                "required": ["objects"]
            })),
            ResponseShape::Summary => Some(json!({
                "type": "object",
                "properties": {"summary": {"type": "string"}},
                "required": ["summary"]
            })),
            ResponseShape::Text => None,
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseShape::Objects => "objects",
            ResponseShape::Summary => "summary",
            ResponseShape::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub instruction: String,
    pub content: String,
    pub shape: ResponseShape,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>, content: impl Into<String>, shape: ResponseShape) -> Self {
        Self {
            instruction: instruction.into(),
            content: content.into(),
            shape,
        }
    }
}

/// The one capability every LLM-backed stage needs.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the raw response body. Structured shapes are decoded by the caller.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

pub async fn generate_objects(
    generator: &dyn TextGenerator,
    instruction: &str,
    content: &str,
) -> Result<Vec<Object>, GenerationError> {
    let request = GenerationRequest::new(instruction, content, ResponseShape::Objects);
    let raw = generator.generate(&request).await?;
    schema::decode_objects(&raw)
}

pub async fn generate_summary(
    generator: &dyn TextGenerator,
    instruction: &str,
    content: &str,
) -> Result<String, GenerationError> {
    let request = GenerationRequest::new(instruction, content, ResponseShape::Summary);
    let raw = generator.generate(&request).await?;
    schema::decode_summary(&raw)
}

pub async fn generate_text(
    generator: &dyn TextGenerator,
    instruction: &str,
    content: &str,
) -> Result<String, GenerationError> {
    let request = GenerationRequest::new(instruction, content, ResponseShape::Text);
    let raw = generator.generate(&request).await?;
    Ok(raw.trim().to_string())
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>, // JSON schema for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            model,
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = OllamaRequest {
            model: &self.model,
            system: &request.instruction,
            prompt: &request.content,
            stream: false,
            format: request.shape.json_schema(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Service(format!("failed to send request to Ollama: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service(format!(
                "Ollama request failed: {status} {detail}"
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Service(format!("failed to parse Ollama response: {e}")))?;

        Ok(ollama_response.response)
    }
}
