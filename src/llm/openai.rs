//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url，DeepSeek、自建代理等同样适用）；
//! 工具以 function tool 声明，响应中的 tool_calls.arguments（JSON 字符串）解析为参数映射。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::llm::prompt::{build_prompt, PromptRole};
use crate::llm::{GatewaySettings, LlmError, ModelGateway, ModelReply};
use crate::memory::{MemoryRecord, Turn};
use crate::tools::ToolInvocation;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

impl From<OpenAIError> for LlmError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::Reqwest(ref inner) if inner.is_timeout() => LlmError::Timeout,
            OpenAIError::JSONDeserialize(..) => LlmError::MalformedResponse(e.to_string()),
            other => LlmError::Transport(other.to_string()),
        }
    }
}

/// OpenAI 兼容网关：持有 async_openai Client 与构造参数
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    settings: GatewaySettings,
}

impl OpenAiGateway {
    pub fn new(settings: GatewaySettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = settings
            .base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        let config = OpenAIConfig::new()
            .with_api_base(base_url.trim_end_matches('/'))
            .with_api_key(api_key.into());
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            settings,
        })
    }

    fn to_openai_messages(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let prompt = build_prompt(&self.settings.system_prompt, history, input, context);
        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system)
                .build()?,
        )];
        for m in prompt.messages {
            messages.push(match m.role {
                PromptRole::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.text)
                        .build()?,
                ),
                PromptRole::Model => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.text)
                        .build()?,
                ),
            });
        }
        Ok(messages)
    }

    fn to_openai_tools(&self) -> Vec<ChatCompletionTools> {
        self.settings
            .tools
            .iter()
            .map(|d| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: d.name.clone(),
                        description: Some(d.description.clone()),
                        parameters: Some(d.parameters.clone()),
                        strict: None,
                    },
                })
            })
            .collect()
    }

    fn request(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.settings.model)
            .messages(self.to_openai_messages(history, input, context)?)
            .temperature(self.settings.temperature);
        let tools = self.to_openai_tools();
        if !tools.is_empty() {
            args.tools(tools);
        }
        args.build()
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn send(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<ModelReply, LlmError> {
        let request = self.request(history, input, context)?;
        let response = self.client.chat().create(request).await?;

        if let Some(usage) = &response.usage {
            tracing::info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "openai token usage"
            );
        }
        parse_response(response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn parse_response(response: CreateChatCompletionResponse) -> Result<ModelReply, LlmError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::MalformedResponse("no choices in response".to_string()))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|call| match call {
            ChatCompletionMessageToolCalls::Function(call) => Some(call),
            _ => {
                tracing::warn!("non-function tool call ignored");
                None
            }
        })
        .map(|call| {
            let args = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    tracing::warn!(tool = %call.function.name, error = %e, "tool arguments are not valid JSON");
                    Value::Object(Default::default())
                })
            };
            let id = Some(call.id)
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            ToolInvocation::from_json(id, call.function.name, args)
        })
        .collect();

    Ok(ModelReply {
        text: message.content.unwrap_or_default(),
        tool_calls,
    })
}
