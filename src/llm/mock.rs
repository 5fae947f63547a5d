//! Mock 网关（无需 API，用于测试与离线演示）
//!
//! 有脚本时按顺序返回预置回复（可包含失败）；脚本耗尽后：
//! `remember: xxx` / `记住：xxx` 转为 save_core_memory 调用，`run: xxx` 转为 execute_python_script，其余回显。
//! 每次请求都会被记录，便于断言注入的上下文。

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::llm::prompt::{build_prompt, Prompt, DEFAULT_SYSTEM_PROMPT};
use crate::llm::{LlmError, ModelGateway, ModelReply};
use crate::memory::{MemoryRecord, Turn};
use crate::tools::{ToolInvocation, EXECUTE_PYTHON_SCRIPT, SAVE_CORE_MEMORY};

/// 一次被记录的请求
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub history: Vec<Turn>,
    pub input: String,
    pub context: Vec<MemoryRecord>,
    pub prompt: Prompt,
}

#[derive(Debug, Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(replies: impl IntoIterator<Item = Result<ModelReply, LlmError>>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_reply(&self, reply: Result<ModelReply, LlmError>) {
        self.script.lock().await.push_back(reply);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn send(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> Result<ModelReply, LlmError> {
        self.requests.lock().await.push(RecordedRequest {
            history: history.to_vec(),
            input: input.to_string(),
            context: context.to_vec(),
            prompt: build_prompt(DEFAULT_SYSTEM_PROMPT, history, input, context),
        });

        match self.script.lock().await.pop_front() {
            Some(reply) => reply,
            None => Ok(default_reply(input)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn default_reply(input: &str) -> ModelReply {
    if let Some(fact) = extract_prefixed(input, &["remember", "记住"]) {
        let call = ToolInvocation::from_json(
            Uuid::new_v4().to_string(),
            SAVE_CORE_MEMORY,
            json!({ "content": fact, "importance": 5, "tags": ["user"] }),
        );
        return ModelReply::with_tool_calls("Requesting a core memory write.", vec![call]);
    }
    if let Some(script) = extract_prefixed(input, &["run"]) {
        let call = ToolInvocation::from_json(
            Uuid::new_v4().to_string(),
            EXECUTE_PYTHON_SCRIPT,
            json!({ "script": script }),
        );
        return ModelReply::with_tool_calls("Running it in the sandbox.", vec![call]);
    }
    ModelReply::text(format!("Echo from Mock: {}", input.trim()))
}

/// 提取 `<关键词>:` 或 `<关键词>：` 之后的内容
fn extract_prefixed(input: &str, keywords: &[&str]) -> Option<String> {
    let input = input.trim();
    let lower = input.to_lowercase();
    keywords.iter().find_map(|kw| {
        if !lower.starts_with(kw) {
            return None;
        }
        let after = input.get(kw.len()..)?.trim_start();
        let rest = after
            .strip_prefix(':')
            .or_else(|| after.strip_prefix('：'))?
            .trim();
        (!rest.is_empty()).then(|| rest.to_string())
    })
}
