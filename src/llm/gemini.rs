//! Gemini generateContent 客户端
//!
//! 通过 reqwest 调用 `{base}/models/{model}:generateContent`：系统指令携带注入的记忆上下文，
//! 工具以 functionDeclarations 声明；响应中的 functionCall 转为 ToolInvocation（无 id 时生成一个）。
//! 超时由 reqwest 客户端负责。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::llm::prompt::{build_prompt, PromptRole};
use crate::llm::{GatewaySettings, LlmError, ModelGateway, ModelReply};
use crate::memory::{MemoryRecord, Turn};
use crate::tools::ToolInvocation;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    settings: GatewaySettings,
}

impl GeminiGateway {
    pub fn new(settings: GatewaySettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        let base_url = settings
            .base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string());
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        })
    }

    fn request_body(&self, history: &[Turn], input: &str, context: &[MemoryRecord]) -> Value {
        let prompt = build_prompt(&self.settings.system_prompt, history, input, context);
        let contents: Vec<Value> = prompt
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    PromptRole::User => "user",
                    PromptRole::Model => "model",
                };
                json!({ "role": role, "parts": [{ "text": m.text }] })
            })
            .collect();
        let declarations: Vec<Value> = self
            .settings
            .tools
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.parameters,
                })
            })
            .collect();

        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": contents,
            "tools": [{ "functionDeclarations": declarations }],
            "generationConfig": { "temperature": self.settings.temperature },
        })
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn send(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<ModelReply, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.settings.model
        );
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(history, input, context))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: GenerateContentResponse = resp.json().await?;
        Ok(parse_response(response))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

/// 只看第一个候选：拼接文本片段，收集 functionCall
fn parse_response(response: GenerateContentResponse) -> ModelReply {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut reply = ModelReply::default();
    for part in parts {
        if let Some(text) = part.text {
            reply.text.push_str(&text);
        }
        if let Some(call) = part.function_call {
            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            reply
                .tool_calls
                .push(ToolInvocation::from_json(id, call.name, call.args));
        }
    }
    reply
}
