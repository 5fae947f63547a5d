//! 记忆存储：短期（有界、最新在前）与长期（无界、只追加、最新在前）
//!
//! 短期记录在每次用户发送时写入，超出容量淘汰最旧的一条；
//! 长期记录只能通过 commit_long_term 写入，而其参数 AuthorizedRecord 只有确认门能构造。

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::AuthorizedRecord;

/// 短期记忆默认容量
pub const DEFAULT_SHORT_TERM_CAPACITY: usize = 5;

/// 记忆记录所在层
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryScope {
    ShortTerm,
    LongTerm,
}

/// 单条记忆
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    /// 1-10
    pub importance: u8,
    pub tags: BTreeSet<String>,
    pub scope: MemoryScope,
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        content: impl Into<String>,
        importance: u8,
        tags: BTreeSet<String>,
        scope: MemoryScope,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            importance,
            tags,
            scope,
            timestamp: Utc::now(),
        }
    }

    /// 用户发送产生的会话记录：importance 1，标签 session
    pub fn session(content: impl Into<String>) -> Self {
        Self::new(
            content,
            1,
            BTreeSet::from(["session".to_string()]),
            MemoryScope::ShortTerm,
        )
    }
}

/// 外部记忆存储协作者
pub trait MemoryStore: Send + Sync {
    /// 记录一条用户输入到短期记忆，返回新记录
    fn remember_short_term(&mut self, content: &str) -> MemoryRecord;

    /// 提交一条已获授权的长期记录（置于最前）
    fn commit_long_term(&mut self, record: AuthorizedRecord);

    /// 短期记录，最新在前
    fn short_term(&self) -> Vec<MemoryRecord>;

    /// 长期记录，最新在前
    fn long_term(&self) -> Vec<MemoryRecord>;
}

/// 进程内实现（非真实持久化）
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    short_term: VecDeque<MemoryRecord>,
    long_term: VecDeque<MemoryRecord>,
    short_term_capacity: usize,
}

impl InMemoryStore {
    pub fn new(short_term_capacity: usize) -> Self {
        Self {
            short_term: VecDeque::with_capacity(short_term_capacity + 1),
            long_term: VecDeque::new(),
            short_term_capacity,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_TERM_CAPACITY)
    }
}

impl MemoryStore for InMemoryStore {
    fn remember_short_term(&mut self, content: &str) -> MemoryRecord {
        let record = MemoryRecord::session(content);
        self.short_term.push_front(record.clone());
        self.short_term.truncate(self.short_term_capacity);
        record
    }

    fn commit_long_term(&mut self, record: AuthorizedRecord) {
        let record = record.into_record();
        tracing::info!(id = %record.id, importance = record.importance, "long-term memory committed");
        self.long_term.push_front(record);
    }

    fn short_term(&self) -> Vec<MemoryRecord> {
        self.short_term.iter().cloned().collect()
    }

    fn long_term(&self) -> Vec<MemoryRecord> {
        self.long_term.iter().cloned().collect()
    }
}
