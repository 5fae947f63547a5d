//! 工具分派
//!
//! 按顺序扫描模型返回的调用：第一个 save_core_memory 被拦截，等待人工确认；
//! 同一响应中其后的 save_core_memory 被丢弃（确认门只有一个槽位，这是明确策略），
//! 一旦拦截，其余调用也不再执行。没有 save_core_memory 时，其余调用全部交给执行器。

use crate::tools::{PendingWrite, PendingWriteError, ToolInvocation};

/// 分派结果
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchPlan {
    /// 没有工具调用
    Nothing,
    /// 拦截：打开确认门，不执行任何其它调用
    Intercept(PendingWrite),
    /// 被选中的 save_core_memory 参数非法：不创建 PendingWrite，也不执行其它调用
    InvalidWrite {
        invocation_id: String,
        error: PendingWriteError,
    },
    /// 依次执行（无需确认）
    Execute(Vec<ToolInvocation>),
}

/// 对一次响应中的工具调用做分类；调用方保证确认门此时为 Idle
pub fn classify(tool_calls: &[ToolInvocation]) -> DispatchPlan {
    if tool_calls.is_empty() {
        return DispatchPlan::Nothing;
    }

    let mut writes = tool_calls.iter().filter(|c| c.is_memory_write());
    if let Some(selected) = writes.next() {
        for dropped in writes {
            tracing::debug!(id = %dropped.id, "extra save_core_memory in one response dropped");
        }
        return match PendingWrite::try_from(selected) {
            Ok(pending) => DispatchPlan::Intercept(pending),
            Err(error) => {
                tracing::warn!(id = %selected.id, %error, "save_core_memory rejected");
                DispatchPlan::InvalidWrite {
                    invocation_id: selected.id.clone(),
                    error,
                }
            }
        };
    }

    DispatchPlan::Execute(tool_calls.to_vec())
}
