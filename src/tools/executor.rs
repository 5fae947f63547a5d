//! 工具执行器
//!
//! 持有 ToolRegistry、固定执行延迟与全局超时：execute 先等待延迟（模拟异步执行耗时），
//! 再在超时内调用工具；失败、超时、panic、未知工具都落为 is_error 的结果。每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{ToolInvocation, ToolRegistry};

/// 单次工具执行结果，id 与发起调用一致
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolExecutionResult {
    pub id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolExecutionResult {
    /// 写入对话日志的文本
    pub fn turn_text(&self) -> String {
        if self.is_error {
            format!("Tool error ({}):\n> {}", self.name, self.output)
        } else {
            self.output.clone()
        }
    }
}

/// 工具执行器：固定延迟 + 超时 + 审计
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    latency: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64, latency: Duration) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            latency,
        }
    }

    /// 执行一次调用；不返回 Err，所有失败都记录在结果中
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolExecutionResult {
        let start = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = self.run(invocation).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::ToolTimeout(_)) => "timeout",
            Err(AgentError::UnknownTool(_)) => "unknown",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": invocation.name,
            "id": invocation.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&invocation.args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        let (output, is_error) = match result {
            Ok(output) => (output, false),
            Err(e) => (e.to_string(), true),
        };
        ToolExecutionResult {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            output,
            is_error,
        }
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(&invocation.name)
            .ok_or_else(|| AgentError::UnknownTool(invocation.name.clone()))?;
        let guarded = AssertUnwindSafe(tool.execute(&invocation.args)).catch_unwind();
        match timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(content))) => Ok(content),
            Ok(Ok(Err(e))) => Err(AgentError::ToolExecutionFailed(e)),
            Ok(Err(panic)) => Err(AgentError::ToolExecutionFailed(format!(
                "tool panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(AgentError::ToolTimeout(invocation.name.clone())),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn args_preview(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let s = serde_json::Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{PythonScriptTool, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: &Map<String, Value>) -> Result<String, String> {
            Err("boom".to_string())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "never finishes in time"
        }

        async fn execute(&self, _args: &Map<String, Value>) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "panics mid-call"
        }

        async fn execute(&self, _args: &Map<String, Value>) -> Result<String, String> {
            panic!("sandbox crashed")
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(PythonScriptTool);
        registry.register(FailingTool);
        registry.register(SlowTool);
        registry.register(PanickingTool);
        ToolExecutor::new(registry, timeout_secs, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_execute_ok() {
        let call = ToolInvocation::from_json("1", "execute_python_script", json!({"script": "1"}));
        let result = executor(5).execute(&call).await;
        assert!(!result.is_error);
        assert_eq!(result.id, "1");
        assert!(result.output.contains("Process exited with code 0"));
        assert_eq!(result.turn_text(), result.output);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let call = ToolInvocation::from_json("2", "launch_rockets", json!({}));
        let result = executor(5).execute(&call).await;
        assert!(result.is_error);
        assert!(result.output.contains("launch_rockets"));
        assert!(result.turn_text().starts_with("Tool error (launch_rockets)"));
    }

    #[tokio::test]
    async fn test_failure_is_error_result() {
        let call = ToolInvocation::from_json("3", "fail", json!({}));
        let result = executor(5).execute(&call).await;
        assert!(result.is_error);
        assert!(result.output.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_is_error_result() {
        let call = ToolInvocation::from_json("4", "slow", json!({}));
        let result = executor(0).execute(&call).await;
        assert!(result.is_error);
        assert!(result.output.contains("timeout"));
    }

    #[tokio::test]
    async fn test_panic_is_error_result() {
        let call = ToolInvocation::from_json("5", "explode", json!({}));
        let result = executor(5).execute(&call).await;
        assert!(result.is_error);
        assert_eq!(result.id, "5");
        assert!(result.output.contains("tool panicked: sandbox crashed"));
    }
}
