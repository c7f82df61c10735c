//! Intent classification client.
//!
//! Builds a prompt embedding the canonical payload and the full request
//! taxonomy, sends it through a `ClassifierTransport`, and validates the
//! structured response. The external model is not trusted to honor the
//! taxonomy: every result is checked here before routing, and no routed
//! request ever carries an invalid type pair.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

use crate::error::{ClassificationError, ConfigError};
use crate::normalize::CanonicalPayload;
use crate::taxonomy::RequestTaxonomy;

/// Validated classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub request_type: String,
    pub sub_request_type: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

// ── Transport boundary ──────────────────────────────────────────────

/// The wire to the external intent-extraction service. Implementations own
/// transport concerns (HTTP, timeouts); the classifier owns the contract.
#[async_trait]
pub trait ClassifierTransport: Send + Sync {
    /// Model or endpoint name for logging.
    fn name(&self) -> &str;

    /// Send the prompt pair and return the raw model output.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ClassificationError>;
}

/// Transport configuration for the HTTP classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    pub api_key: SecretString,
    pub model: String,
    /// Request timeout; expiry surfaces as `ServiceUnavailable`.
    pub timeout: Duration,
    /// Maximum concurrent in-flight classification calls.
    pub max_inflight: usize,
}

/// HTTP transport speaking the OpenAI-style chat-completions contract.
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "classifier".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

/// Chat-completions response envelope (only the fields we read).
#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl ClassifierTransport for HttpClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, ClassificationError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassificationError::ServiceUnavailable {
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassificationError::ServiceUnavailable {
                reason: format!("classifier returned status {status}"),
            });
        }

        let envelope: CompletionEnvelope =
            response
                .json()
                .await
                .map_err(|e| ClassificationError::MalformedResponse {
                    reason: format!("invalid completion envelope: {e}"),
                })?;

        envelope
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ClassificationError::MalformedResponse {
                reason: "completion had no choices".to_string(),
            })
    }
}

// ── Classifier ──────────────────────────────────────────────────────

/// Classification client: prompt construction, response parsing, and the
/// taxonomy validation boundary.
pub struct IntentClassifier {
    transport: Arc<dyn ClassifierTransport>,
}

impl IntentClassifier {
    pub fn new(transport: Arc<dyn ClassifierTransport>) -> Self {
        Self { transport }
    }

    /// Classify a canonical payload against the taxonomy.
    pub async fn classify(
        &self,
        payload: &CanonicalPayload,
        taxonomy: &RequestTaxonomy,
    ) -> Result<ClassificationResult, ClassificationError> {
        let system = build_system_prompt();
        let user = build_user_prompt(payload, taxonomy);

        let raw = self.transport.complete(&system, &user).await?;

        let result = parse_classification(&raw).map_err(|e| {
            warn!(
                transport = %self.transport.name(),
                error = %e,
                "Classifier returned unparseable output"
            );
            e
        })?;
        validate_against_taxonomy(&result, taxonomy)?;
        Ok(result)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> String {
    "You are an AI that extracts service request details from emails.\n\
     Classify the content into exactly one of the provided request types and, \
     where the type lists sub-types, one of its sub-types.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"request_type\": \"...\", \"sub_request_type\": \"...\", \"attributes\": {...}}\n\n\
     Rules:\n\
     - request_type MUST be one of the provided request types, verbatim\n\
     - sub_request_type MUST come from that type's sub-type list; use \"\" when the type has none\n\
     - attributes is an object of key details found in the content (amounts, dates, deal names)"
        .to_string()
}

/// Render the payload together with the full taxonomy so the model is
/// constrained to valid categories.
fn build_user_prompt(payload: &CanonicalPayload, taxonomy: &RequestTaxonomy) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str("Request types and allowed sub-types:\n");
    for (request_type, sub_types) in taxonomy.entries() {
        if sub_types.is_empty() {
            prompt.push_str(&format!("- {request_type}: (no sub-types)\n"));
        } else {
            prompt.push_str(&format!("- {request_type}: {}\n", sub_types.join(", ")));
        }
    }

    prompt.push_str("\nContent:\n");
    prompt.push_str(payload.as_str());
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Raw classifier response shape. Spaced aliases cover models that echo the
/// record field names instead of the requested snake_case keys.
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(alias = "Request Type")]
    request_type: String,
    #[serde(default, alias = "Sub Request Type")]
    sub_request_type: String,
    #[serde(default, alias = "Attributes")]
    attributes: serde_json::Value,
}

/// Parse the raw model output into a classification result.
fn parse_classification(raw: &str) -> Result<ClassificationResult, ClassificationError> {
    let json_str = extract_json_object(raw);
    let parsed: RawClassification =
        serde_json::from_str(&json_str).map_err(|e| ClassificationError::MalformedResponse {
            reason: format!("JSON parse error: {e}"),
        })?;

    let attributes = match parsed.attributes {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            return Err(ClassificationError::MalformedResponse {
                reason: format!("attributes must be an object, got {other}"),
            });
        }
    };

    Ok(ClassificationResult {
        request_type: parsed.request_type,
        sub_request_type: parsed.sub_request_type,
        attributes,
    })
}

/// Enforce taxonomy membership on a parsed result.
fn validate_against_taxonomy(
    result: &ClassificationResult,
    taxonomy: &RequestTaxonomy,
) -> Result<(), ClassificationError> {
    if !taxonomy.contains(&result.request_type) {
        return Err(ClassificationError::UnknownTaxonomyValue {
            request_type: result.request_type.clone(),
            sub_request_type: None,
        });
    }
    if !taxonomy.is_valid_pair(&result.request_type, &result.sub_request_type) {
        return Err(ClassificationError::UnknownTaxonomyValue {
            request_type: result.request_type.clone(),
            sub_request_type: Some(result.sub_request_type.clone()),
        });
    }
    Ok(())
}

/// Extract a JSON object from model output (handles markdown fencing and
/// surrounding prose).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
