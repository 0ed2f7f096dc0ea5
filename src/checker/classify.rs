use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::checker::browser::ScreenshotPair;
use crate::config::AppConfig;
use crate::models::HarmfulVerdict;

/// Fixed instruction describing the classification task to the model.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that detects harmful content in URLs. \
You will be provided with HTML content and images from the URL. \
Your task is to determine if the content is harmful (like online gambling or phishing) or not, \
and provide a summary of the harmful content detected.";

/// ClassifyError
///
/// Failure surface of the LLM call: transport errors and responses that do
/// not carry a parsable verdict.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected llm response: {0}")]
    Response(String),
}

/// VerdictClassifier
///
/// Structured-output classification seam. Implementations must return a
/// verdict carrying both fields or an error; there is no partial result.
#[async_trait]
pub trait VerdictClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        screenshots: Option<&ScreenshotPair>,
    ) -> Result<HarmfulVerdict, ClassifyError>;
}

/// AzureOpenAiClassifier
///
/// Calls the Azure OpenAI chat-completions REST API with the page text and
/// both screenshots, constrained to the two-field verdict schema via a strict
/// `json_schema` response format. The model's structured output is returned
/// verbatim.
pub struct AzureOpenAiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiClassifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.azure_openai_endpoint.trim_end_matches('/').to_string(),
            api_key: config.azure_openai_api_key.clone(),
            deployment: config.azure_openai_deployment.clone(),
            api_version: config.azure_openai_api_version.clone(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// The strict response schema: both fields required, nothing else allowed.
    fn response_format() -> serde_json::Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": "harmful_checker_verdict",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "is_harmful": {
                            "type": "boolean",
                            "description": "Indicates if the content is harmful (like online gambling or phishing) or not."
                        },
                        "summary_harmful": {
                            "type": "string",
                            "description": "Summary of the harmful content (hoax, phishing, not safe, online gambling, piracy, virus) detected."
                        }
                    },
                    "required": ["is_harmful", "summary_harmful"],
                    "additionalProperties": false
                }
            }
        })
    }
}

#[async_trait]
impl VerdictClassifier for AzureOpenAiClassifier {
    async fn classify(
        &self,
        text: &str,
        screenshots: Option<&ScreenshotPair>,
    ) -> Result<HarmfulVerdict, ClassifyError> {
        let mut user_parts = Vec::new();
        if let Some(pair) = screenshots {
            user_parts.push(json!({ "type": "image_url", "image_url": { "url": pair.top } }));
            user_parts.push(json!({ "type": "image_url", "image_url": { "url": pair.middle } }));
        }
        user_parts.push(json!({ "type": "text", "text": text }));

        let body = json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_parts }
            ],
            "temperature": 0.5,
            "max_tokens": 5000,
            "response_format": Self::response_format(),
        });

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Response(format!(
                "chat completions returned status {}",
                status
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClassifyError::Response("missing message content".to_string()))?;

        serde_json::from_str::<HarmfulVerdict>(content)
            .map_err(|e| ClassifyError::Response(format!("unparsable verdict: {}", e)))
    }
}
