//! Gemini API client.
//!
//! Speaks the generateContent function-calling contract: the model either
//! returns text parts or a `functionCall` part, never free text that names
//! a tool. Error classification reads the structured error payload, not
//! message substrings.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use fernwood_core::config::LlmConfig;
use fernwood_core::{ChatMessage, Role, ToolCall};

use crate::llm::{ChatRequest, LlmClient, LlmError, ModelTurn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const QUOTA_FAILURE_TYPE: &str = "type.googleapis.com/google.rpc.QuotaFailure";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::Auth)?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| LlmError::Upstream(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            api_key,
        })
    }

    async fn post(&self, url: &str, body: &impl Serialize) -> Result<Value, LlmError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|err| LlmError::Upstream(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| LlmError::Upstream(err.to_string()))?;
        if !status.is_success() {
            return Err(classify_error(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|err| LlmError::Upstream(format!("malformed model response: {err}")))
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ModelTurn, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.chat_model);
        let body = build_generate_request(&request);
        debug!(
            event_name = "agent.gemini.chat",
            model = %self.chat_model,
            messages = request.messages.len(),
            "sending chat request"
        );
        let raw = self.post(&url, &body).await?;
        let response: GenerateResponse = serde_json::from_value(raw)
            .map_err(|err| LlmError::Upstream(format!("malformed model response: {err}")))?;
        parse_turn(&response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.embedding_model);
        let body = json!({
            "content": { "parts": [ { "text": text } ] }
        });
        let raw = self.post(&url, &body).await?;
        let values = raw
            .pointer("/embedding/values")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Upstream("embedding response missing values".to_string()))?;
        values
            .iter()
            .map(|value| {
                value
                    .as_f64()
                    .map(|v| v as f32)
                    .ok_or_else(|| LlmError::Upstream("non-numeric embedding value".to_string()))
            })
            .collect()
    }
}

/// Maps an error response to the crate's error taxonomy. A 429 is quota
/// exhaustion only when the payload carries a QuotaFailure detail;
/// otherwise it is a transient rate limit.
fn classify_error(status: StatusCode, body: &str) -> LlmError {
    let payload: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    match status.as_u16() {
        429 => {
            let quota = payload
                .pointer("/error/details")
                .and_then(Value::as_array)
                .map(|details| {
                    details.iter().any(|detail| {
                        detail.get("@type").and_then(Value::as_str) == Some(QUOTA_FAILURE_TYPE)
                    })
                })
                .unwrap_or(false);
            if quota {
                LlmError::QuotaExhausted
            } else {
                LlmError::RateLimited
            }
        }
        401 | 403 => LlmError::Auth,
        code => {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("no error message");
            LlmError::Upstream(format!("model API returned {code}: {message}"))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: WireContent,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireToolList>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Clone, Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Clone, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolList {
    function_declarations: Vec<WireFunctionDeclaration>,
}

#[derive(Serialize)]
struct WireFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<WireContent>,
}

fn build_generate_request(request: &ChatRequest) -> GenerateRequest {
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![WireToolList {
            function_declarations: request
                .tools
                .iter()
                .map(|spec| WireFunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                })
                .collect(),
        }]
    };

    GenerateRequest {
        system_instruction: WireContent {
            role: None,
            parts: vec![WirePart { text: Some(request.system_prompt.clone()), ..WirePart::default() }],
        },
        contents: build_contents(&request.messages),
        tools,
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

/// Maps stored chat messages to provider contents. Tool results ride as
/// `functionResponse` parts under the user role, paired to the invocation
/// by the echoed call name.
fn build_contents(messages: &[ChatMessage]) -> Vec<WireContent> {
    messages
        .iter()
        .map(|message| match (message.role, &message.tool_call) {
            (Role::User, _) => WireContent {
                role: Some("user".to_string()),
                parts: vec![WirePart { text: Some(message.content.clone()), ..WirePart::default() }],
            },
            (Role::Assistant, Some(call)) => WireContent {
                role: Some("model".to_string()),
                parts: vec![WirePart {
                    function_call: Some(WireFunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..WirePart::default()
                }],
            },
            (Role::Assistant, None) => WireContent {
                role: Some("model".to_string()),
                parts: vec![WirePart { text: Some(message.content.clone()), ..WirePart::default() }],
            },
            (Role::Tool, call) => {
                let name = call
                    .as_ref()
                    .map(|call| call.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let response = serde_json::from_str(&message.content)
                    .unwrap_or_else(|_| json!({ "content": message.content }));
                WireContent {
                    role: Some("user".to_string()),
                    parts: vec![WirePart {
                        function_response: Some(WireFunctionResponse { name, response }),
                        ..WirePart::default()
                    }],
                }
            }
        })
        .collect()
}

/// A `functionCall` part wins over any text in the same candidate; text
/// parts are concatenated otherwise.
fn parse_turn(response: &GenerateResponse) -> Result<ModelTurn, LlmError> {
    let content = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .ok_or_else(|| LlmError::Upstream("model returned no candidates".to_string()))?;

    for part in &content.parts {
        if let Some(call) = &part.function_call {
            return Ok(ModelTurn::Invoke(ToolCall {
                name: call.name.clone(),
                arguments: call.args.clone(),
            }));
        }
    }

    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(LlmError::Upstream("model returned no usable content".to_string()));
    }
    Ok(ModelTurn::Respond(text))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use fernwood_core::{ChatMessage, ToolCall};

    use super::*;
    use crate::llm::ToolSpec;

    fn quota_body() -> String {
        json!({
            "error": {
                "code": 429,
                "status": "RESOURCE_EXHAUSTED",
                "message": "Quota exceeded for quota metric",
                "details": [
                    { "@type": QUOTA_FAILURE_TYPE, "violations": [] }
                ]
            }
        })
        .to_string()
    }

    #[test]
    fn quota_detail_classifies_as_exhausted() {
        let error = classify_error(StatusCode::TOO_MANY_REQUESTS, &quota_body());
        assert!(matches!(error, LlmError::QuotaExhausted));
    }

    #[test]
    fn plain_429_is_a_transient_rate_limit() {
        let body = json!({ "error": { "code": 429, "message": "slow down" } }).to_string();
        let error = classify_error(StatusCode::TOO_MANY_REQUESTS, &body);
        assert!(matches!(error, LlmError::RateLimited));
    }

    #[test]
    fn auth_failures_classify_from_status_alone() {
        assert!(matches!(classify_error(StatusCode::UNAUTHORIZED, "nope"), LlmError::Auth));
        assert!(matches!(classify_error(StatusCode::FORBIDDEN, "{}"), LlmError::Auth));
    }

    #[test]
    fn other_statuses_carry_the_provider_message() {
        let body = json!({ "error": { "message": "internal" } }).to_string();
        match classify_error(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            LlmError::Upstream(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("internal"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn contents_map_roles_and_tool_calls() {
        let call = ToolCall { name: "item_lookup".into(), arguments: json!({"query": "sofa"}) };
        let messages = vec![
            ChatMessage::user("find me a sofa"),
            ChatMessage::assistant_invocation(call.clone()),
            ChatMessage::tool_result(call, json!({"count": 1}).to_string()),
            ChatMessage::assistant("Here is one."),
        ];

        let contents = build_contents(&messages);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[0].parts[0].text.as_deref(), Some("find me a sofa"));

        assert_eq!(contents[1].role.as_deref(), Some("model"));
        let invocation = contents[1].parts[0].function_call.as_ref().unwrap();
        assert_eq!(invocation.name, "item_lookup");
        assert_eq!(invocation.args["query"], "sofa");

        assert_eq!(contents[2].role.as_deref(), Some("user"));
        let result = contents[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(result.name, "item_lookup");
        assert_eq!(result.response["count"], 1);

        assert_eq!(contents[3].role.as_deref(), Some("model"));
        assert_eq!(contents[3].parts[0].text.as_deref(), Some("Here is one."));
    }

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = ChatRequest {
            system_prompt: "be helpful".into(),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![ToolSpec {
                name: "item_lookup".into(),
                description: "search".into(),
                parameters: json!({"type": "object"}),
            }],
        };

        let value = serde_json::to_value(build_generate_request(&request)).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "item_lookup"
        );
        assert_eq!(value["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn function_call_part_wins_over_text() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [ { "content": { "role": "model", "parts": [
                { "text": "thinking" },
                { "functionCall": { "name": "item_lookup", "args": { "query": "bed" } } }
            ] } } ]
        }))
        .unwrap();

        match parse_turn(&response).unwrap() {
            ModelTurn::Invoke(call) => {
                assert_eq!(call.name, "item_lookup");
                assert_eq!(call.arguments["query"], "bed");
            }
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn text_parts_concatenate_into_a_response() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [ { "content": { "parts": [
                { "text": "We have " },
                { "text": "three sofas." }
            ] } } ]
        }))
        .unwrap();

        assert_eq!(
            parse_turn(&response).unwrap(),
            ModelTurn::Respond("We have three sofas.".to_string())
        );
    }

    #[test]
    fn empty_candidates_are_an_upstream_error() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parse_turn(&response), Err(LlmError::Upstream(_))));
    }
}
