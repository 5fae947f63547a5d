//! execute_python_script：沙箱脚本执行的占位实现
//!
//! 不真正运行脚本，只返回一次成功的合成输出；真实执行器接入前用于跑通「其它工具」路径。

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::tools::{Tool, EXECUTE_PYTHON_SCRIPT};

/// 合成输出（进程退出码 0）
pub const PYTHON_SUCCESS_OUTPUT: &str =
    "Output:\nProcess exited with code 0\n> Data processed successfully.";

pub struct PythonScriptTool;

#[async_trait]
impl Tool for PythonScriptTool {
    fn name(&self) -> &str {
        EXECUTE_PYTHON_SCRIPT
    }

    fn description(&self) -> &str {
        "Executes a Python script in the sandboxed environment to perform calculations, data processing, or system checks."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "script": { "type": "string", "description": "The python code to execute." }
            },
            "required": ["script"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String, String> {
        let lines = args
            .get("script")
            .and_then(|v| v.as_str())
            .map(|s| s.lines().count())
            .unwrap_or(0);
        tracing::debug!(lines, "python script acknowledged");
        Ok(PYTHON_SUCCESS_OUTPUT.to_string())
    }
}
