//! Generative-AI completion providers

use async_trait::async_trait;
use learnmore_core::{
    config_error, with_timeout, ErrorContext, LearnMoreError, LearnMoreResult, TutorConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A text-completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a reply to `prompt` under `system_instruction`
    async fn complete(&self, system_instruction: &str, prompt: &str) -> LearnMoreResult<String>;

    /// Provider name for logs and errors
    fn name(&self) -> &str;
}

/// Google Gemini `generateContent` client
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    config: TutorConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate; empty when there is none
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, config: TutorConfig) -> LearnMoreResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LearnMoreError::Config {
                message: "Gemini API key is empty".to_string(),
                source: None,
                context: ErrorContext::new("gemini_provider")
                    .with_suggestion(&format!("Set the {} environment variable", config.api_key_env)),
            });
        }

        let client = reqwest::Client::builder()
            .user_agent("learnmore-tutor/0.1")
            .build()
            .map_err(|e| LearnMoreError::Network {
                message: format!("Failed to build HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("gemini_provider"),
            })?;

        info!(model = %config.model, "Created Gemini provider");
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build from the environment variable named in the config
    pub fn from_env(config: TutorConfig) -> LearnMoreResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            config_error!(format!("{} is not set", config.api_key_env), "gemini_provider")
        })?;
        Self::new(api_key, config)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn send(&self, system_instruction: &str, prompt: &str) -> LearnMoreResult<String> {
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let url = self.endpoint();
        debug!("Sending Gemini request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                LearnMoreError::Network {
                    message: format!("Failed to reach Gemini API: {}", e),
                    source: Some(Box::new(e)),
                    context: ErrorContext::new("gemini_provider").with_operation("complete"),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.llm_error(format!("Gemini API returned {}: {}", status, body)));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            self.llm_error(format!("Failed to decode Gemini response: {}", e.without_url()))
        })?;

        Ok(body.into_text())
    }

    fn llm_error(&self, message: String) -> LearnMoreError {
        LearnMoreError::Llm {
            message,
            provider: Some("gemini".to_string()),
            model: Some(self.config.model.clone()),
            context: ErrorContext::new("gemini_provider").with_operation("complete"),
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> LearnMoreResult<String> {
        with_timeout(
            self.send(system_instruction, prompt),
            self.config.timeout_ms,
            "gemini_generate_content",
        )
        .await?
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: "be kind" }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: "why?" }],
            }],
            generation_config: GenerationConfig { temperature: 0.7 },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "why?");
        assert!(json["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_response_text_extraction() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Think about "},{"text":"the sign."}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text(), "Think about the sign.");

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.into_text(), "");
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiProvider::new("  ", TutorConfig::default()),
            Err(LearnMoreError::Config { .. })
        ));
    }

    #[test]
    fn test_endpoint_format() {
        let mut config = TutorConfig::default();
        config.endpoint = "https://example.test/v1beta/".to_string();
        let provider = GeminiProvider::new("key", config).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_expose_api_key() {
        let mut config = TutorConfig::default();
        config.endpoint = "http://127.0.0.1:1/v1beta".to_string();
        config.timeout_ms = 5_000;
        let provider = GeminiProvider::new("SECRET-KEY-123", config).unwrap();

        let err = provider.complete("be kind", "why?").await.unwrap_err();
        assert!(matches!(err, LearnMoreError::Network { .. }));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
    }

    #[test]
    fn test_missing_api_key_env_is_a_config_error() {
        let mut config = TutorConfig::default();
        config.api_key_env = "LEARNMORE_TEST_UNSET_GEMINI_KEY".to_string();

        let err = GeminiProvider::from_env(config).err().unwrap();
        assert!(matches!(err, LearnMoreError::Config { .. }));
        assert!(err.to_string().contains("LEARNMORE_TEST_UNSET_GEMINI_KEY"));
    }
}
