//! 会话：单飞（single-flight）互斥的持有者
//!
//! ConversationLog、MemoryStore 与确认门都在同一把 tokio Mutex 之后，临界区内不跨 await；
//! 忙碌标志（Activity）与确认门的单槽位共同构成互斥：
//! - 忙碌时 submit 返回 Busy，authorize / reject 为空操作；
//! - 等待确认时 submit 返回 AwaitingConfirmation。
//! Model Gateway 调用与工具执行是唯二会挂起的地方，挂起期间忙碌标志保持为真；
//! submit 的所有退出路径都会清除忙碌标志。

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::core::{AgentError, AgentPhase, ConfirmationGate, UiState};
use crate::llm::{send_guarded, GatewayOutcome, LlmError, ModelGateway};
use crate::memory::{ConversationLog, MemoryRecord, MemoryStore, Turn};
use crate::tools::{
    classify, DispatchPlan, PendingWrite, PendingWriteError, ToolExecutionResult, ToolExecutor,
    ToolInvocation,
};

/// 一次发送的结局（拒绝受理之外的情况都在这里，且都已在日志中可见）
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// 无拦截；executed 为依次执行的其它工具结果
    Completed { executed: Vec<ToolExecutionResult> },
    /// 确认门已打开，等待 authorize / reject
    Intercepted(PendingWrite),
    /// save_core_memory 参数非法，已追加系统 Turn
    InvalidWrite(PendingWriteError),
    /// 网关失败，已追加系统 Turn
    GatewayFailed(LlmError),
}

/// 忙碌标志
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Activity {
    #[default]
    Idle,
    WaitingForModel,
    ExecutingTool(String),
}

struct SessionState {
    log: ConversationLog,
    store: Box<dyn MemoryStore>,
    gate: ConfirmationGate,
    activity: Activity,
    last_error: Option<String>,
}

impl SessionState {
    fn is_processing(&self) -> bool {
        self.activity != Activity::Idle
    }

    fn project(&self) -> UiState {
        let phase = match (&self.activity, self.gate.pending()) {
            (Activity::WaitingForModel, _) => AgentPhase::Thinking,
            (Activity::ExecutingTool(_), _) => AgentPhase::ToolExecuting,
            (Activity::Idle, Some(_)) => AgentPhase::AwaitingConfirmation,
            (Activity::Idle, None) => AgentPhase::Idle,
        };
        let active_tool = match &self.activity {
            Activity::ExecutingTool(name) => Some(name.clone()),
            _ => None,
        };
        UiState {
            phase,
            history: self.log.snapshot(),
            active_tool,
            input_locked: self.is_processing() || !self.gate.is_idle(),
            pending: self.gate.pending().cloned(),
            short_term: self.store.short_term(),
            long_term: self.store.long_term(),
            error_message: self.last_error.clone(),
        }
    }
}

/// 单个对话会话
pub struct ChatSession {
    gateway: Arc<dyn ModelGateway>,
    executor: ToolExecutor,
    state: Mutex<SessionState>,
    ui_tx: watch::Sender<UiState>,
}

impl ChatSession {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        executor: ToolExecutor,
        store: Box<dyn MemoryStore>,
    ) -> Self {
        let state = SessionState {
            log: ConversationLog::new(),
            store,
            gate: ConfirmationGate::new(),
            activity: Activity::Idle,
            last_error: None,
        };
        let (ui_tx, _) = watch::channel(state.project());
        Self {
            gateway,
            executor,
            state: Mutex::new(state),
            ui_tx,
        }
    }

    /// 以一条系统 Turn 开场；空字符串不追加
    pub fn with_greeting(mut self, greeting: &str) -> Self {
        if !greeting.trim().is_empty() {
            let state = self.state.get_mut();
            state.log.append(Turn::system(greeting));
            self.ui_tx.send_replace(state.project());
        }
        self
    }

    /// 订阅 UI 状态投影
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.ui_tx.subscribe()
    }

    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.is_processing()
    }

    pub async fn pending(&self) -> Option<PendingWrite> {
        self.state.lock().await.gate.pending().cloned()
    }

    pub async fn snapshot(&self) -> Vec<Turn> {
        self.state.lock().await.log.snapshot()
    }

    pub async fn short_term(&self) -> Vec<MemoryRecord> {
        self.state.lock().await.store.short_term()
    }

    pub async fn long_term(&self) -> Vec<MemoryRecord> {
        self.state.lock().await.store.long_term()
    }

    /// 用户发送：追加 user Turn 与短期记录 -> 调用网关 -> 分派工具调用
    pub async fn submit(&self, input: &str) -> Result<TurnOutcome, AgentError> {
        let (history, context) = {
            let mut state = self.state.lock().await;
            if input.trim().is_empty() {
                return Err(AgentError::EmptyInput);
            }
            if state.is_processing() {
                return Err(AgentError::Busy);
            }
            if !state.gate.is_idle() {
                return Err(AgentError::AwaitingConfirmation);
            }

            let history = state.log.snapshot();
            state.log.append(Turn::user(input));
            state.store.remember_short_term(input);
            state.activity = Activity::WaitingForModel;
            state.last_error = None;
            let context = state.store.long_term();
            self.publish(&state);
            (history, context)
        };

        let outcome = self.complete_turn(&history, input, &context).await;

        let mut state = self.state.lock().await;
        state.activity = Activity::Idle;
        self.publish(&state);
        tracing::info!(outcome = outcome_label(&outcome), "turn finished");
        Ok(outcome)
    }

    /// 授权待确认写入；空闲或忙碌时为空操作
    pub async fn authorize(&self) -> Option<MemoryRecord> {
        let mut state = self.state.lock().await;
        if state.is_processing() {
            tracing::debug!("authorize ignored while processing");
            return None;
        }
        let SessionState {
            gate, log, store, ..
        } = &mut *state;
        let record = gate.authorize(log, &mut **store)?;
        self.publish(&state);
        Some(record)
    }

    /// 拒绝待确认写入；空闲或忙碌时为空操作
    pub async fn reject(&self) -> Option<PendingWrite> {
        let mut state = self.state.lock().await;
        if state.is_processing() {
            tracing::debug!("reject ignored while processing");
            return None;
        }
        let SessionState { gate, log, .. } = &mut *state;
        let discarded = gate.reject(log)?;
        self.publish(&state);
        Some(discarded)
    }

    async fn complete_turn(
        &self,
        history: &[Turn],
        input: &str,
        context: &[MemoryRecord],
    ) -> TurnOutcome {
        let GatewayOutcome { reply, failure } =
            send_guarded(self.gateway.as_ref(), history, input, context).await;

        let mut state = self.state.lock().await;
        if let Some(err) = failure {
            state
                .log
                .append(Turn::system(format!("Error connecting to model gateway: {err}")));
            state.last_error = Some(err.to_string());
            return TurnOutcome::GatewayFailed(err);
        }

        if !reply.text.trim().is_empty() {
            state.log.append(Turn::model(reply.text.as_str()));
        }
        if !reply.tool_calls.is_empty() {
            state.log.append(Turn::tool_calls_issued(&reply.tool_calls));
        }

        match classify(&reply.tool_calls) {
            DispatchPlan::Nothing => TurnOutcome::Completed {
                executed: Vec::new(),
            },
            DispatchPlan::Intercept(pending) => match state.gate.open(pending.clone()) {
                Ok(()) => TurnOutcome::Intercepted(pending),
                Err(e) => {
                    tracing::error!(error = %e, "memory write dropped");
                    TurnOutcome::Completed {
                        executed: Vec::new(),
                    }
                }
            },
            DispatchPlan::InvalidWrite {
                invocation_id,
                error,
            } => {
                state.log.append(Turn::system(format!(
                    "Memory write request {invocation_id} refused: {error}"
                )));
                TurnOutcome::InvalidWrite(error)
            }
            DispatchPlan::Execute(calls) => {
                drop(state);
                let executed = self.execute_all(calls).await;
                TurnOutcome::Completed { executed }
            }
        }
    }

    /// 依次执行其它工具，每完成一个即追加结果 Turn
    async fn execute_all(&self, calls: Vec<ToolInvocation>) -> Vec<ToolExecutionResult> {
        let mut executed = Vec::with_capacity(calls.len());
        for call in calls {
            {
                let mut state = self.state.lock().await;
                state.activity = Activity::ExecutingTool(call.name.clone());
                self.publish(&state);
            }
            let result = self.executor.execute(&call).await;

            let mut state = self.state.lock().await;
            state.log.append(Turn::tool(result.turn_text()));
            self.publish(&state);
            executed.push(result);
        }
        executed
    }

    fn publish(&self, state: &SessionState) {
        self.ui_tx.send_replace(state.project());
    }
}

fn outcome_label(outcome: &TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Completed { .. } => "completed",
        TurnOutcome::Intercepted(_) => "intercepted",
        TurnOutcome::InvalidWrite(_) => "invalid_write",
        TurnOutcome::GatewayFailed(_) => "gateway_failed",
    }
}
