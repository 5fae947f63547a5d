//! 工具调用与待确认写入
//!
//! ToolInvocation 由 Model Gateway 产出、Dispatcher 消费，创建后不再修改；
//! PendingWrite 是 save_core_memory 的参数经校验、强转后的结构化形态（content / importance 1-10 / tags 集合）。

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 唯一需要人工确认的工具名（与模型之间的外部契约）
pub const SAVE_CORE_MEMORY: &str = "save_core_memory";
pub const SEARCH_LONG_TERM_MEMORY: &str = "search_long_term_memory";
pub const EXECUTE_PYTHON_SCRIPT: &str = "execute_python_script";

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 10;

/// 模型请求的一次工具调用：id 在单次运行内唯一，args 为未校验的键值映射
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// 由 `serde_json::json!` 对象构造；非对象参数按空映射处理
    pub fn from_json(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, name, args)
    }

    pub fn is_memory_write(&self) -> bool {
        self.name == SAVE_CORE_MEMORY
    }

    /// 审计行：`> name({"k":"v"})`
    pub fn audit_line(&self) -> String {
        let args = serde_json::to_string(&self.args).unwrap_or_else(|_| "{}".to_string());
        format!("> {}({})", self.name, args)
    }
}

/// save_core_memory 参数校验失败的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PendingWriteError {
    #[error("invalid save_core_memory arguments: {0}")]
    InvalidArgs(String),

    #[error("memory content must not be empty")]
    EmptyContent,

    #[error("importance {0} is outside the range 1-10")]
    ImportanceOutOfRange(i64),
}

/// 单槽位的待确认长期记忆写入
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingWrite {
    /// 与发起该写入的 ToolInvocation id 相同
    pub id: String,
    pub content: String,
    pub importance: u8,
    pub tags: BTreeSet<String>,
}

impl PendingWrite {
    /// 重要度 >= 8 的写入在界面上标记为 CRITICAL
    pub fn is_critical(&self) -> bool {
        self.importance >= 8
    }
}

impl TryFrom<&ToolInvocation> for PendingWrite {
    type Error = PendingWriteError;

    fn try_from(invocation: &ToolInvocation) -> Result<Self, Self::Error> {
        let args: SaveCoreMemoryArgs =
            serde_json::from_value(Value::Object(invocation.args.clone()))
                .map_err(|e| PendingWriteError::InvalidArgs(e.to_string()))?;

        let content = args.content.trim();
        if content.is_empty() {
            return Err(PendingWriteError::EmptyContent);
        }
        if !(MIN_IMPORTANCE as i64..=MAX_IMPORTANCE as i64).contains(&args.importance) {
            return Err(PendingWriteError::ImportanceOutOfRange(args.importance));
        }

        Ok(Self {
            id: invocation.id.clone(),
            content: content.to_string(),
            importance: args.importance as u8,
            tags: args
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }
}

/// save_core_memory 的原始参数形态（仅用于反序列化）
#[derive(Deserialize)]
struct SaveCoreMemoryArgs {
    content: String,
    #[serde(deserialize_with = "deserialize_importance")]
    importance: i64,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// 接受整数、整值浮点（9.0）与数字字符串（"9"）
fn deserialize_importance<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Ok(f as i64)
            } else {
                Err(D::Error::custom(format!("importance must be an integer, got {n}")))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("importance must be an integer, got \"{s}\""))),
        other => Err(D::Error::custom(format!(
            "importance must be an integer, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_call(args: Value) -> ToolInvocation {
        ToolInvocation::from_json("call-1", SAVE_CORE_MEMORY, args)
    }

    #[test]
    fn test_pending_write_from_valid_args() {
        let call = save_call(json!({"content": "X", "importance": 9, "tags": ["a", "b", "a"]}));
        let pending = PendingWrite::try_from(&call).unwrap();
        assert_eq!(pending.id, "call-1");
        assert_eq!(pending.content, "X");
        assert_eq!(pending.importance, 9);
        assert_eq!(pending.tags.len(), 2);
        assert!(pending.tags.contains("a"));
        assert!(pending.is_critical());
    }

    #[test]
    fn test_importance_coercion() {
        let float = save_call(json!({"content": "X", "importance": 3.0}));
        assert_eq!(PendingWrite::try_from(&float).unwrap().importance, 3);

        let string = save_call(json!({"content": "X", "importance": " 7 "}));
        assert_eq!(PendingWrite::try_from(&string).unwrap().importance, 7);

        let fractional = save_call(json!({"content": "X", "importance": 7.5}));
        assert!(matches!(
            PendingWrite::try_from(&fractional),
            Err(PendingWriteError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_importance_out_of_range() {
        let zero = save_call(json!({"content": "X", "importance": 0}));
        assert_eq!(
            PendingWrite::try_from(&zero),
            Err(PendingWriteError::ImportanceOutOfRange(0))
        );
        let eleven = save_call(json!({"content": "X", "importance": 11}));
        assert_eq!(
            PendingWrite::try_from(&eleven),
            Err(PendingWriteError::ImportanceOutOfRange(11))
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        let no_content = save_call(json!({"importance": 5}));
        assert!(matches!(
            PendingWrite::try_from(&no_content),
            Err(PendingWriteError::InvalidArgs(_))
        ));
        let no_importance = save_call(json!({"content": "X"}));
        assert!(matches!(
            PendingWrite::try_from(&no_importance),
            Err(PendingWriteError::InvalidArgs(_))
        ));
        let blank = save_call(json!({"content": "   ", "importance": 5}));
        assert_eq!(PendingWrite::try_from(&blank), Err(PendingWriteError::EmptyContent));
    }

    #[test]
    fn test_non_string_tags_rejected() {
        let call = save_call(json!({"content": "X", "importance": 5, "tags": ["ok", 3]}));
        assert!(matches!(
            PendingWrite::try_from(&call),
            Err(PendingWriteError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_tags_default_to_empty() {
        let call = save_call(json!({"content": "X", "importance": 2}));
        let pending = PendingWrite::try_from(&call).unwrap();
        assert!(pending.tags.is_empty());
        assert!(!pending.is_critical());
    }

    #[test]
    fn test_audit_line() {
        let call = ToolInvocation::from_json("c", EXECUTE_PYTHON_SCRIPT, json!({"script": "print(1)"}));
        assert_eq!(call.audit_line(), r#"> execute_python_script({"script":"print(1)"})"#);
    }
}
