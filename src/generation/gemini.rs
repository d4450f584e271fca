//! Gemini `generateContent` client
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::gemini::{self, ApiFailure};
use crate::generation::{GenerationBackend, GenerationOptions};
use crate::rag::prompt::{self, GenerationRequest};
use crate::session::Role;

/// Generation backend calling the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(gemini::DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: gemini::http_client()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_system_instruction(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
        options: GenerationOptions,
    ) -> Result<String> {
        let url = gemini::method_url(&self.base_url, model, "generateContent");
        let body = GenerateContentRequest::build(request, options);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            let failure = ApiFailure::from_body(status, &text);

            return Err(if failure.is_model_unavailable() {
                RagError::ModelUnavailable {
                    model: model.to_string(),
                    reason: failure.to_string(),
                }
            } else {
                RagError::GenerationUnavailable(failure.to_string())
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("invalid response: {}", e)))?;

        let text = extract_text(parsed)?;
        debug!(model = model, chars = text.len(), "gemini response received");
        Ok(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn build(request: &GenerationRequest, options: GenerationOptions) -> Self {
        let contents = request
            .contents()
            .iter()
            .map(|content| Content {
                role: Some(wire_role(content.role()).to_string()),
                parts: content.parts().iter().map(Part::from).collect(),
            })
            .collect();

        let system_instruction = request.system_instruction().map(|text| Content {
            role: None,
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        });

        let tools = if options.live_search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        Self {
            contents,
            system_instruction,
            tools,
            generation_config: GenerationConfig {
                temperature: options.temperature,
            },
        }
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

impl From<&prompt::Part> for Part {
    fn from(part: &prompt::Part) -> Self {
        match part {
            prompt::Part::Text(text) => Part::Text { text: text.clone() },
            prompt::Part::Inline(attachment) => Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: attachment.mime_type().to_string(),
                    data: BASE64_STANDARD.encode(attachment.data()),
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(RagError::GenerationUnavailable(
            "response contained no text".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::PersonaConfig;
    use crate::rag::context::ContextBuilder;
    use crate::rag::prompt::{InstructionPlacement, PromptComposer};
    use crate::session::Turn;
    use crate::upload::{Attachment, UploadContext};

    fn options(live_search: bool) -> GenerationOptions {
        GenerationOptions {
            temperature: 0.3,
            live_search,
        }
    }

    fn compose(upload: Option<&UploadContext>, history: &[Turn]) -> GenerationRequest {
        let context = ContextBuilder::new().assemble(&[], upload);
        PromptComposer::new(PersonaConfig::default(), InstructionPlacement::SystemSlot)
            .compose(&context, history, "why?")
    }

    #[test]
    fn test_request_wire_shape() {
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let body = GenerateContentRequest::build(&compose(None, &history), options(true));
        let json = serde_json::to_value(&body).unwrap();

        assert!(json["systemInstruction"]["parts"][0]["text"].is_string());
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["role"], "user");
        assert_eq!(json["tools"][0]["google_search"], serde_json::json!({}));
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_no_tools_without_live_search() {
        let body = GenerateContentRequest::build(&compose(None, &[]), options(false));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_inline_data_is_base64() {
        let upload = UploadContext::with_attachment(
            "kiln.png",
            "Type: image",
            Attachment::new("image/png", b"abc".to_vec()),
        );
        let body = GenerateContentRequest::build(&compose(Some(&upload), &[]), options(false));
        let json = serde_json::to_value(&body).unwrap();

        let inline = &json["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/png");
        assert_eq!(inline["data"], "YWJj");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"A"},{"text":"B"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "AB");
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(RagError::GenerationUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_generation_unavailable() {
        let client = GeminiClient::with_base_url("http://127.0.0.1:9", "key").unwrap();
        let err = client
            .generate("gemini-2.5-flash", &compose(None, &[]), options(false))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    #[ignore] // Integration test - requires GEMINI_API_KEY
    async fn test_live_generation() {
        let key = std::env::var("GEMINI_API_KEY").unwrap();
        let client = GeminiClient::new(key).unwrap();
        let text = client
            .generate("gemini-2.5-flash", &compose(None, &[]), options(false))
            .await
            .unwrap();
        assert!(!text.is_empty());
    }
}
