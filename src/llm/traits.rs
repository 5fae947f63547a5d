//! Model Gateway 抽象
//!
//! 所有后端（Gemini / OpenAI 兼容 / Mock）实现 ModelGateway::send：
//! 输入为历史 Turn、新输入、注入的记忆记录，输出为文本与工具调用列表。
//! send_guarded 是网关边界：任何失败（包括后端 panic）都转为空结果 + 失败信号，绝不越过边界。

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;

use crate::memory::{MemoryRecord, Turn};
use crate::tools::{ToolDeclaration, ToolInvocation};

/// 网关传输 / 模型错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("gateway panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::MalformedResponse(e.to_string())
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

/// 模型的一次回复
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }
}

/// 后端共享的构造参数
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub base_url: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub tools: Vec<ToolDeclaration>,
}

/// Model Gateway：异步请求 / 响应，可能失败
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// context 的顺序即注入顺序（调用方按「最近 / 最重要在前」排好）
    async fn send(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<ModelReply, LlmError>;

    /// 用于日志的后端名
    fn name(&self) -> &str;
}

/// 网关边界的结果：失败时 reply 为空（哨兵），failure 携带原因
#[derive(Debug, Default)]
pub struct GatewayOutcome {
    pub reply: ModelReply,
    pub failure: Option<LlmError>,
}

/// 调用网关并吞掉所有失败
pub async fn send_guarded(
    gateway: &dyn ModelGateway,
    history: &[Turn],
    input: &str,
    context: &[MemoryRecord],
) -> GatewayOutcome {
    let result = AssertUnwindSafe(gateway.send(history, input, context))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(LlmError::Panicked(reason))
        });

    match result {
        Ok(reply) => GatewayOutcome {
            reply,
            failure: None,
        },
        Err(e) => {
            tracing::warn!(gateway = gateway.name(), error = %e, "model gateway call failed");
            GatewayOutcome {
                reply: ModelReply::default(),
                failure: Some(e),
            }
        }
    }
}
