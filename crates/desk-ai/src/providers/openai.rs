//! OpenAI-compatible Chat Completions and Embeddings client
//!
//! Works against any endpoint speaking the `/chat/completions` and
//! `/embeddings` wire format (Mistral, OpenAI, local gateways).

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{AnswerGenerator, Classifier, Embedder, TaskDecomposer};
use crate::{
    error::{Error, Result},
    types::{AnswerRequest, Classification, Embedding, Intent, ServiceType, SplitTask},
};

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_EMBEDDING_MODEL: &str = "mistral-embed";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: [&str; 3] = ["DESK_API_KEY", "MISTRAL_API_KEY", "OPENAI_API_KEY"];

const CLASSIFY_PROMPT: &str = "Classify the request.\n\
intent: POLICY_QUERY | INCIDENT | SERVICE_REQUEST | GENERAL\n\
service_type: HR | Finance | IT | Travel | GENERAL\n\
Reply with a JSON object: {\"intent\": ..., \"service_type\": ..., \"confidence\": 0.0-1.0}";

const SPLIT_PROMPT: &str = "Split the user request into actionable tasks.\n\
Return one or more tasks with intent and service_type.\n\
Allowed intent: POLICY_QUERY, INCIDENT, SERVICE_REQUEST, GENERAL.\n\
Allowed service_type: HR, Finance, IT, Travel, GENERAL.\n\
If the request has a single intent, return one task.\n\
Reply with a JSON object: {\"tasks\": [{\"sub_query\": ..., \"intent\": ..., \"service_type\": ...}]}";

/// Chat + embeddings client
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
}

impl ChatClient {
    /// Create a new client with default endpoint and models
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = super::get_api_key(None, &API_KEY_ENV_VARS)?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_chat_request(&self, system: &str, user: String, json_mode: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: Some(self.temperature),
            response_format: json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => Error::RateLimited { retry_after },
                401 | 403 => Error::Auth(text),
                code => Error::api(code.to_string(), text),
            });
        }

        Ok(response.json().await?)
    }

    async fn complete(&self, system: &str, user: String, json_mode: bool) -> Result<String> {
        let request = self.build_chat_request(system, user, json_mode);
        tracing::debug!("chat completion: model={} json={}", self.model, json_mode);
        let response: ChatResponse = self.post("/chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::UnexpectedResponse("no choices in completion".into()))
    }
}

#[async_trait]
impl Classifier for ChatClient {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let raw = self.complete(CLASSIFY_PROMPT, text.to_string(), true).await?;
        parse_classification(&raw)
    }
}

#[async_trait]
impl TaskDecomposer for ChatClient {
    async fn split(&self, text: &str) -> Result<Vec<SplitTask>> {
        let raw = self.complete(SPLIT_PROMPT, text.to_string(), true).await?;
        parse_split(&raw)
    }
}

#[async_trait]
impl AnswerGenerator for ChatClient {
    async fn answer(&self, request: &AnswerRequest) -> Result<String> {
        let user = match &request.context {
            Some(context) => format!("Context:\n{}\n\nQuestion:\n{}", context, request.user),
            None => request.user.clone(),
        };
        let text = self.complete(&request.system, user, false).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Embedder for ChatClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: vec![text.to_string()],
        };
        let response: EmbeddingResponse = self.post("/embeddings", &request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::UnexpectedResponse("no embedding in response".into()))?;
        if embedding.is_empty() {
            return Err(Error::UnexpectedResponse("empty embedding".into()));
        }
        Ok(embedding)
    }
}

/// Strip a surrounding markdown code fence, if present
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse and validate a classifier reply
pub fn parse_classification(raw: &str) -> Result<Classification> {
    let reply: RawClassification = serde_json::from_str(extract_json(raw))?;
    let intent: Intent = reply.intent.parse()?;
    let service_type: ServiceType = reply.service_type.parse()?;
    if !(0.0..=1.0).contains(&reply.confidence) {
        return Err(Error::Validation(format!(
            "confidence out of range: {}",
            reply.confidence
        )));
    }
    Ok(Classification {
        intent,
        service_type,
        confidence: reply.confidence,
    })
}

/// Parse and validate a decomposer reply. Blank sub-queries are dropped.
pub fn parse_split(raw: &str) -> Result<Vec<SplitTask>> {
    let reply: RawSplit = serde_json::from_str(extract_json(raw))?;
    let mut tasks = Vec::with_capacity(reply.tasks.len());
    for task in reply.tasks {
        let sub_query = task.sub_query.trim();
        if sub_query.is_empty() {
            continue;
        }
        tasks.push(SplitTask::new(
            sub_query,
            task.intent.parse()?,
            task.service_type.parse()?,
        ));
    }
    if tasks.is_empty() {
        return Err(Error::Validation("empty task list".into()));
    }
    Ok(tasks)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    service_type: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct RawSplit {
    tasks: Vec<RawSplitTask>,
}

#[derive(Debug, Deserialize)]
struct RawSplitTask {
    sub_query: String,
    intent: String,
    service_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_json_request() {
        let client = ChatClient::new("key").with_model("test-model");
        let request = client.build_chat_request("sys", "hello".into(), true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_build_text_request_has_no_format() {
        let client = ChatClient::new("key");
        let request = client.build_chat_request("sys", "hello".into(), false);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ChatClient::new("key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_parse_classification() {
        let c = parse_classification(
            r#"{"intent": "INCIDENT", "service_type": "IT", "confidence": 0.91}"#,
        )
        .unwrap();
        assert_eq!(c.intent, Intent::Incident);
        assert_eq!(c.service_type, ServiceType::It);
        assert!((c.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_parse_classification_in_code_fence() {
        let raw = "```json\n{\"intent\": \"POLICY_QUERY\", \"service_type\": \"HR\", \"confidence\": 1}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.intent, Intent::PolicyQuery);
    }

    #[test]
    fn test_parse_classification_rejects_bad_values() {
        let e = parse_classification(
            r#"{"intent": "ESCALATE", "service_type": "IT", "confidence": 0.9}"#,
        )
        .unwrap_err();
        assert!(e.is_validation());

        let e = parse_classification(
            r#"{"intent": "INCIDENT", "service_type": "IT", "confidence": 1.5}"#,
        )
        .unwrap_err();
        assert!(matches!(e, Error::Validation(_)));
    }

    #[test]
    fn test_parse_split() {
        let raw = r#"{"tasks": [
            {"sub_query": "My VPN is down", "intent": "INCIDENT", "service_type": "IT"},
            {"sub_query": "  ", "intent": "GENERAL", "service_type": "GENERAL"},
            {"sub_query": "What is the leave policy?", "intent": "POLICY_QUERY", "service_type": "HR"}
        ]}"#;
        let tasks = parse_split(raw).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].sub_query, "My VPN is down");
        assert_eq!(tasks[1].service_type, ServiceType::Hr);
    }

    #[test]
    fn test_parse_split_empty_is_error() {
        assert!(parse_split(r#"{"tasks": []}"#).is_err());
        assert!(parse_split("not json").is_err());
    }

    #[test]
    fn test_parse_embedding_response() {
        let raw = r#"{"data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}], "model": "m"}"#;
        let response: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.data[0].embedding.len(), 3);
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("hi"));
    }
}
