//! 状态投影：UiState
//!
//! UI 只持有轻量的 UiState（阶段、对话、记忆列表、待确认写入、锁、错误）；
//! 完整状态由 ChatSession 维护，每次变更后经 watch 通道推送。

use serde::Serialize;

use crate::memory::{MemoryRecord, Turn};
use crate::tools::PendingWrite;

/// UI 看到的「投影」状态
#[derive(Clone, Debug, Default, Serialize)]
pub struct UiState {
    pub phase: AgentPhase,
    pub history: Vec<Turn>,
    pub active_tool: Option<String>,
    /// 忙碌或等待确认时为 true，UI 不再接受发送
    pub input_locked: bool,
    pub pending: Option<PendingWrite>,
    pub short_term: Vec<MemoryRecord>,
    pub long_term: Vec<MemoryRecord>,
    pub error_message: Option<String>,
}

/// Agent 阶段（UI 投影用）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    #[default]
    Idle,
    Thinking,
    ToolExecuting,
    AwaitingConfirmation,
}
