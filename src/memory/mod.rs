//! 记忆层：对话日志（只追加）与记忆存储（短期 / 长期）

pub mod conversation;
pub mod store;

pub use conversation::{ConversationLog, Role, Turn};
pub use store::{InMemoryStore, MemoryRecord, MemoryScope, MemoryStore, DEFAULT_SHORT_TERM_CAPACITY};
