//! 记忆确认门：单槽位的两态状态机
//!
//! Idle ──open(PendingWrite)──▶ AwaitingConfirmation
//! AwaitingConfirmation ──authorize()──▶ Idle（写入长期记忆 + 确认 Turn）
//! AwaitingConfirmation ──reject()────▶ Idle（丢弃 + 中止 Turn）
//!
//! 没有超时，只等待人工决定；Idle 时 authorize / reject 为空操作。

use crate::core::AgentError;
use crate::memory::{ConversationLog, MemoryRecord, MemoryScope, MemoryStore, Turn};
use crate::tools::PendingWrite;

/// 确认门状态
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GateState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingWrite),
}

/// 经用户授权的长期记录；只有本模块能构造，保证长期记忆只来自 authorize
#[derive(Debug)]
pub struct AuthorizedRecord(MemoryRecord);

impl AuthorizedRecord {
    pub fn into_record(self) -> MemoryRecord {
        self.0
    }
}

/// 记忆确认门
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    state: GateState,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GateState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        match &self.state {
            GateState::Idle => None,
            GateState::AwaitingConfirmation(p) => Some(p),
        }
    }

    /// Idle -> AwaitingConfirmation；已有待确认写入时拒绝第二个
    pub fn open(&mut self, pending: PendingWrite) -> Result<(), AgentError> {
        if let GateState::AwaitingConfirmation(current) = &self.state {
            return Err(AgentError::GateOccupied(current.id.clone()));
        }
        tracing::info!(id = %pending.id, importance = pending.importance, "memory write awaiting confirmation");
        self.state = GateState::AwaitingConfirmation(pending);
        Ok(())
    }

    /// 授权：构造长期记录并置于最前，追加确认 Turn，清空待确认写入
    pub fn authorize(
        &mut self,
        log: &mut ConversationLog,
        store: &mut dyn MemoryStore,
    ) -> Option<MemoryRecord> {
        let pending = self.take()?;
        let record = MemoryRecord::new(
            pending.content,
            pending.importance,
            pending.tags,
            MemoryScope::LongTerm,
        );
        store.commit_long_term(AuthorizedRecord(record.clone()));
        log.append(Turn::tool(format!(
            "Memory System Output:\n> Write confirmed by user [{}/10].\n> Data persisted to vector store.",
            record.importance
        )));
        Some(record)
    }

    /// 拒绝：追加中止 Turn，丢弃待确认写入，不触碰记忆存储
    pub fn reject(&mut self, log: &mut ConversationLog) -> Option<PendingWrite> {
        let pending = self.take()?;
        tracing::info!(id = %pending.id, "memory write rejected");
        log.append(Turn::tool(
            "Memory System Output:\n> Write operation aborted by user.\n> Data discarded.",
        ));
        Some(pending)
    }

    fn take(&mut self) -> Option<PendingWrite> {
        match std::mem::take(&mut self.state) {
            GateState::Idle => {
                tracing::debug!("confirmation gate idle, ignoring decision");
                None
            }
            GateState::AwaitingConfirmation(pending) => Some(pending),
        }
    }
}
