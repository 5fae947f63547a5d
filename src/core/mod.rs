//! 核心层：错误、确认门、会话（单飞互斥）、状态投影、命令编排

pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use error::AgentError;
pub use gate::{AuthorizedRecord, ConfirmationGate, GateState};
pub use orchestrator::{
    build_session, create_gateway_from_config, create_session, default_registry, spawn_session,
    Command,
};
pub use session::{ChatSession, TurnOutcome};
pub use state::{AgentPhase, UiState};
