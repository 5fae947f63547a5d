//! search_long_term_memory：只做通用确认，不做真实检索

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::tools::{Tool, SEARCH_LONG_TERM_MEMORY};

pub struct MemorySearchTool;

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        SEARCH_LONG_TERM_MEMORY
    }

    fn description(&self) -> &str {
        "Searches the persistent database for past conversations, code snippets, or facts about the user. Use this when context is missing."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The semantic search query." },
                "limit": { "type": "number", "description": "Max number of results." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("missing required argument: query".to_string());
        }
        let limit = args.get("limit").and_then(|v| v.as_u64());
        let mut out = format!("Memory Search Output:\n> Query dispatched: \"{query}\"");
        if let Some(limit) = limit {
            out.push_str(&format!(" (limit {limit})"));
        }
        Ok(out)
    }
}
