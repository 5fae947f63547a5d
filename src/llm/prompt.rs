//! Prompt 构建：记忆上下文注入与历史角色映射
//!
//! 记忆按给定顺序渲染为 `[MEMORY ID:<id> IMPORTANCE:<n>]: <content>`，放在系统指令之前；
//! 历史中 user Turn 映射为 user，其余（model / system / tool）映射为模型一侧。

use serde::Serialize;

use crate::memory::{MemoryRecord, Role, Turn};

/// 未提供 config/prompts/system.txt 时使用的系统指令
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Nexus, a technical assistant backed by a layered memory system.
You have access to short-term memory (this session) and long-term memory (persistent records).

CAPABILITIES:
- execute_python_script: run Python code in a sandbox.
- search_long_term_memory: search your persistent memory database.
- save_core_memory: persist a critical fact. Every write is shown to the user, who may authorize or reject it.

Respond in a concise, engineer-to-engineer format.";

/// 发往模型的消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
}

/// 与后端无关的完整请求
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<PromptMessage>,
}

pub fn render_memory_context(memories: &[MemoryRecord]) -> String {
    memories
        .iter()
        .map(|m| format!("[MEMORY ID:{} IMPORTANCE:{}]: {}", m.id, m.importance, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 系统指令：注入的上下文块在前，基础指令在后
pub fn system_instruction(base: &str, memories: &[MemoryRecord]) -> String {
    let context = if memories.is_empty() {
        "(no memory records)".to_string()
    } else {
        render_memory_context(memories)
    };
    format!("CONTEXT (memory records, most relevant first):\n{context}\n\n{base}")
}

pub fn conversation(history: &[Turn], input: &str) -> Vec<PromptMessage> {
    history
        .iter()
        .map(|t| PromptMessage {
            role: match t.role {
                Role::User => PromptRole::User,
                Role::Model | Role::System | Role::Tool => PromptRole::Model,
            },
            text: t.text.clone(),
        })
        .chain(std::iter::once(PromptMessage {
            role: PromptRole::User,
            text: input.to_string(),
        }))
        .collect()
}

pub fn build_prompt(base: &str, history: &[Turn], input: &str, memories: &[MemoryRecord]) -> Prompt {
    Prompt {
        system: system_instruction(base, memories),
        messages: conversation(history, input),
    }
}
