//! Agent 错误类型
//!
//! 只有「拒绝受理」类错误会返回给调用方（空输入、忙碌、等待确认）；
//! 网关失败、参数非法、工具失败都转为对话中的可见 Turn，不会以 Err 冒出。

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Session is busy processing another request")]
    Busy,

    #[error("A memory write is awaiting confirmation")]
    AwaitingConfirmation,

    #[error("Confirmation gate already holds pending write {0}")]
    GateOccupied(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Config error: {0}")]
    ConfigError(String),
}
