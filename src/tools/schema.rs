//! 向模型声明的函数列表
//!
//! 注册表中的工具各自给出参数 schema；save_core_memory 不可执行，只在这里声明，供模型请求、由确认门拦截。

use serde::Serialize;
use serde_json::Value;

use crate::tools::{ToolRegistry, SAVE_CORE_MEMORY};

/// 单个函数声明（name / description / JSON Schema 参数）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn save_core_memory_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: SAVE_CORE_MEMORY.to_string(),
        description: "Saves a critical piece of information to long-term storage permanently. The user must confirm the write.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "The fact or code to save." },
                "importance": { "type": "number", "description": "Importance score 1-10." },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Categorization tags."
                }
            },
            "required": ["content", "importance"]
        }),
    }
}

/// 注册表工具 + save_core_memory
pub fn tool_declarations(registry: &ToolRegistry) -> Vec<ToolDeclaration> {
    let mut declarations = registry.declarations();
    declarations.push(save_core_memory_declaration());
    declarations
}
