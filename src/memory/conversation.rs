//! 对话日志：只追加的 Turn 序列
//!
//! Dispatcher 与确认门都只通过 append 写入；Turn 一旦追加即不可修改、不可删除，
//! 顺序即唯一的时序保证。snapshot 返回只读副本供渲染与 Model Gateway 使用。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolInvocation;

/// Turn 的发言方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
    Tool,
}

/// 对话中的一条不可变记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            tool_calls: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(Role::Tool, text)
    }

    /// 「已发出工具调用」审计 Turn：列出本次响应请求的全部调用
    pub fn tool_calls_issued(calls: &[ToolInvocation]) -> Self {
        let lines: Vec<String> = calls.iter().map(|c| c.audit_line()).collect();
        let mut turn = Self::tool(format!("Executing Tools:\n{}", lines.join("\n")));
        turn.tool_calls = Some(calls.to_vec());
        turn
    }
}

/// 只追加的对话日志
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条 Turn；created_at 不早于上一条，保证追加顺序与时间顺序一致
    pub fn append(&mut self, mut turn: Turn) {
        if let Some(last) = self.turns.last() {
            if turn.created_at < last.created_at {
                turn.created_at = last.created_at;
            }
        }
        tracing::debug!(role = ?turn.role, id = %turn.id, "turn appended");
        self.turns.push(turn);
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
