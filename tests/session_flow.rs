//! 会话端到端测试：确认门、单飞互斥、失败恢复、上下文注入、命令通道

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use nexus::config::AppConfig;
use nexus::core::{
    build_session, default_registry, spawn_session, AgentError, AgentPhase, ChatSession, Command,
    TurnOutcome,
};
use nexus::llm::{LlmError, MockGateway, ModelGateway, ModelReply};
use nexus::memory::{InMemoryStore, MemoryRecord, MemoryScope, Role, Turn};
use nexus::tools::{
    PendingWriteError, Tool, ToolExecutor, ToolInvocation, EXECUTE_PYTHON_SCRIPT,
    PYTHON_SUCCESS_OUTPUT, SAVE_CORE_MEMORY,
};

fn session_with(gateway: Arc<dyn ModelGateway>) -> ChatSession {
    let executor = ToolExecutor::new(default_registry(), 5, Duration::ZERO);
    ChatSession::new(gateway, executor, Box::new(InMemoryStore::default()))
}

fn save_call(id: &str, content: &str, importance: serde_json::Value, tags: &[&str]) -> ToolInvocation {
    ToolInvocation::from_json(
        id,
        SAVE_CORE_MEMORY,
        json!({ "content": content, "importance": importance, "tags": tags }),
    )
}

fn python_call(id: &str) -> ToolInvocation {
    ToolInvocation::from_json(id, EXECUTE_PYTHON_SCRIPT, json!({ "script": "print(1)" }))
}

fn write_reply(id: &str, content: &str, importance: u8, tags: &[&str]) -> Result<ModelReply, LlmError> {
    Ok(ModelReply::with_tool_calls(
        "",
        vec![save_call(id, content, json!(importance), tags)],
    ))
}

/// 在收到 release 之前挂起的网关，用于观察忙碌窗口
struct BlockingGateway {
    entered: Notify,
    release: Notify,
    reply: ModelReply,
}

impl BlockingGateway {
    fn new(reply: ModelReply) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply,
        }
    }
}

#[async_trait]
impl ModelGateway for BlockingGateway {
    async fn send(&self, _: &[Turn], _: &str, _: &[MemoryRecord]) -> Result<ModelReply, LlmError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "blocking"
    }
}

/// 执行时 panic 的工具
struct CrashingTool;

#[async_trait]
impl Tool for CrashingTool {
    fn name(&self) -> &str {
        "crash"
    }

    fn description(&self) -> &str {
        "panics inside the sandbox"
    }

    async fn execute(
        &self,
        _args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, String> {
        panic!("sandbox crashed")
    }
}

#[tokio::test]
async fn test_plain_reply_appends_user_and_model_turns() {
    let session = session_with(Arc::new(MockGateway::new()));
    let outcome = session.submit("hello").await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { executed: vec![] });

    let log = session.snapshot().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[1].role, Role::Model);
    assert_eq!(log[1].text, "Echo from Mock: hello");
    assert!(!session.is_processing().await);
}

#[tokio::test]
async fn test_empty_input_refused_without_side_effects() {
    let session = session_with(Arc::new(MockGateway::new()));
    assert!(matches!(session.submit("   ").await, Err(AgentError::EmptyInput)));
    assert!(session.snapshot().await.is_empty());
    assert!(session.short_term().await.is_empty());
}

#[tokio::test]
async fn test_pending_write_blocks_further_sends() {
    let gateway = Arc::new(MockGateway::scripted([
        write_reply("w1", "first", 5, &[]),
        write_reply("w2", "second", 5, &[]),
    ]));
    let session = session_with(gateway.clone());

    let outcome = session.submit("save it").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Intercepted(ref p) if p.id == "w1"));
    let log_len = session.snapshot().await.len();

    assert!(matches!(
        session.submit("another").await,
        Err(AgentError::AwaitingConfirmation)
    ));
    assert_eq!(session.snapshot().await.len(), log_len);
    assert_eq!(gateway.requests().await.len(), 1);
    assert_eq!(session.pending().await.map(|p| p.id), Some("w1".to_string()));

    session.reject().await.unwrap();
    let outcome = session.submit("again").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Intercepted(ref p) if p.id == "w2"));
}

#[tokio::test]
async fn test_authorize_commits_prepended_record() {
    let gateway = Arc::new(MockGateway::scripted([
        write_reply("w1", "older fact", 3, &[]),
        write_reply("w2", "X", 9, &["a"]),
    ]));
    let session = session_with(gateway);

    session.submit("one").await.unwrap();
    session.authorize().await.unwrap();
    session.submit("two").await.unwrap();

    let short_before = session.short_term().await;
    let log_before = session.snapshot().await.len();
    let record = session.authorize().await.unwrap();

    assert_eq!(record.content, "X");
    assert_eq!(record.importance, 9);
    assert_eq!(record.tags.iter().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(record.scope, MemoryScope::LongTerm);

    let long_term = session.long_term().await;
    assert_eq!(long_term.len(), 2);
    assert_eq!(long_term[0].id, record.id);
    assert_eq!(long_term[1].content, "older fact");
    assert_eq!(session.short_term().await, short_before);

    let log = session.snapshot().await;
    assert_eq!(log.len(), log_before + 1);
    assert_eq!(
        log.last().unwrap().text,
        "Memory System Output:\n> Write confirmed by user [9/10].\n> Data persisted to vector store."
    );
    assert!(session.pending().await.is_none());
}

#[tokio::test]
async fn test_reject_discards_pending() {
    let gateway = Arc::new(MockGateway::scripted([write_reply("w1", "X", 9, &["a"])]));
    let session = session_with(gateway);
    session.submit("save").await.unwrap();
    let log_before = session.snapshot().await.len();

    let discarded = session.reject().await.unwrap();
    assert_eq!(discarded.content, "X");
    assert!(session.long_term().await.is_empty());
    assert!(session.pending().await.is_none());

    let log = session.snapshot().await;
    assert_eq!(log.len(), log_before + 1);
    assert_eq!(
        log.last().unwrap().text,
        "Memory System Output:\n> Write operation aborted by user.\n> Data discarded."
    );
}

#[tokio::test]
async fn test_decisions_when_idle_are_noops() {
    let session = session_with(Arc::new(MockGateway::new()));
    session.submit("hello").await.unwrap();
    let log_before = session.snapshot().await.len();
    let short_before = session.short_term().await;

    assert!(session.authorize().await.is_none());
    assert!(session.reject().await.is_none());

    assert_eq!(session.snapshot().await.len(), log_before);
    assert_eq!(session.short_term().await, short_before);
    assert!(session.long_term().await.is_empty());
}

#[tokio::test]
async fn test_short_term_keeps_five_most_recent() {
    let session = session_with(Arc::new(MockGateway::new()));
    for i in 1..=6 {
        session.submit(&format!("input {i}")).await.unwrap();
    }
    let short_term = session.short_term().await;
    let contents: Vec<&str> = short_term.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["input 6", "input 5", "input 4", "input 3", "input 2"]);
    assert!(short_term.iter().all(|r| r.importance == 1 && r.tags.contains("session")));
}

#[tokio::test]
async fn test_interception_drops_other_tools() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "Saving and running.",
        vec![
            save_call("w1", "X", json!(9), &["a"]),
            python_call("py1"),
        ],
    ))]));
    let session = session_with(gateway);

    let outcome = session.submit("do both").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Intercepted(_)));

    let log = session.snapshot().await;
    assert_eq!(log.len(), 3);
    assert_eq!(log[1].text, "Saving and running.");
    assert!(log[2].text.starts_with("Executing Tools:\n> save_core_memory("));
    assert!(log[2].text.contains("> execute_python_script("));
    assert_eq!(log[2].tool_calls.as_ref().map(|c| c.len()), Some(2));

    session.authorize().await.unwrap();
    let log = session.snapshot().await;
    assert!(log.iter().all(|t| t.text != PYTHON_SUCCESS_OUTPUT));
}

#[tokio::test]
async fn test_other_tools_execute_in_order() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "",
        vec![
            python_call("py1"),
            ToolInvocation::from_json("u1", "frobnicate", json!({})),
        ],
    ))]));
    let session = session_with(gateway);

    let outcome = session.submit("go").await.unwrap();
    let TurnOutcome::Completed { executed } = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0].id, "py1");
    assert!(!executed[0].is_error);
    assert!(executed[1].is_error);

    let log = session.snapshot().await;
    let tool_texts: Vec<&str> = log
        .iter()
        .filter(|t| t.role == Role::Tool)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(tool_texts.len(), 3);
    assert_eq!(tool_texts[1], PYTHON_SUCCESS_OUTPUT);
    assert!(tool_texts[2].starts_with("Tool error (frobnicate)"));
    assert!(session.pending().await.is_none());
}

#[tokio::test]
async fn test_tool_panic_clears_busy_flag() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "",
        vec![ToolInvocation::from_json("c1", "crash", json!({}))],
    ))]));
    let mut registry = default_registry();
    registry.register(CrashingTool);
    let executor = ToolExecutor::new(registry, 5, Duration::ZERO);
    let session = Arc::new(ChatSession::new(
        gateway,
        executor,
        Box::new(InMemoryStore::default()),
    ));

    let worker = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit("go").await })
    };
    let outcome = worker.await.expect("submit task must not die").unwrap();
    let TurnOutcome::Completed { executed } = outcome else {
        panic!("expected completed outcome");
    };
    assert!(executed[0].is_error);
    assert!(executed[0].output.contains("sandbox crashed"));

    assert!(!session.is_processing().await);
    let last = session.snapshot().await.last().cloned().unwrap();
    assert!(last.text.starts_with("Tool error (crash)"));

    let retry = session.submit("still there?").await.unwrap();
    assert!(matches!(retry, TurnOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_second_write_in_one_response_is_dropped() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "",
        vec![
            save_call("w1", "first fact", json!(6), &["a"]),
            save_call("w2", "second fact", json!(9), &["b"]),
        ],
    ))]));
    let session = session_with(gateway);

    let outcome = session.submit("save both").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Intercepted(ref p) if p.id == "w1"));

    let record = session.authorize().await.unwrap();
    assert_eq!(record.content, "first fact");
    assert!(session.pending().await.is_none());
    assert!(session.authorize().await.is_none());

    let long_term = session.long_term().await;
    assert_eq!(long_term.len(), 1);
    assert!(long_term.iter().all(|r| r.content != "second fact"));

    let confirmations = session
        .snapshot()
        .await
        .iter()
        .filter(|t| t.text.starts_with("Memory System Output:"))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_invalid_write_appends_system_turn() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "",
        vec![save_call("w1", "X", json!(42), &[]), python_call("py1")],
    ))]));
    let session = session_with(gateway);

    let outcome = session.submit("save").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::InvalidWrite(PendingWriteError::ImportanceOutOfRange(42))
    );
    assert!(session.pending().await.is_none());

    let log = session.snapshot().await;
    let last = log.last().unwrap();
    assert_eq!(last.role, Role::System);
    assert!(last.text.contains("w1"));
    assert!(log.iter().all(|t| t.text != PYTHON_SUCCESS_OUTPUT));
    assert!(!session.is_processing().await);
}

#[tokio::test]
async fn test_coerced_importance_accepted() {
    let gateway = Arc::new(MockGateway::scripted([Ok(ModelReply::with_tool_calls(
        "",
        vec![save_call("w1", "X", json!("7"), &["b", "a", "a"])],
    ))]));
    let session = session_with(gateway);
    let TurnOutcome::Intercepted(pending) = session.submit("save").await.unwrap() else {
        panic!("expected interception");
    };
    assert_eq!(pending.importance, 7);
    assert_eq!(pending.tags.len(), 2);
}

#[tokio::test]
async fn test_gateway_failure_recovers() {
    let gateway = Arc::new(MockGateway::scripted([Err(LlmError::Api {
        status: 503,
        body: "overloaded".to_string(),
    })]));
    let session = session_with(gateway);

    let outcome = session.submit("hello").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::GatewayFailed(LlmError::Api { status: 503, .. })));

    let log = session.snapshot().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[1].role, Role::System);
    assert!(log[1].text.starts_with("Error connecting to model gateway:"));
    assert!(!session.is_processing().await);
    assert!(session.pending().await.is_none());

    let state = session.subscribe().borrow().clone();
    assert_eq!(state.phase, AgentPhase::Idle);
    assert!(state.error_message.is_some());

    session.submit("retry").await.unwrap();
    assert!(session.subscribe().borrow().error_message.is_none());
}

#[tokio::test]
async fn test_busy_window_refuses_other_operations() {
    let gateway = Arc::new(BlockingGateway::new(ModelReply::text("done")));
    let session = Arc::new(session_with(gateway.clone()));

    let worker = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit("first").await })
    };
    gateway.entered.notified().await;

    assert!(session.is_processing().await);
    assert_eq!(session.subscribe().borrow().phase, AgentPhase::Thinking);
    assert!(session.subscribe().borrow().input_locked);
    assert!(matches!(session.submit("second").await, Err(AgentError::Busy)));
    assert!(session.authorize().await.is_none());
    assert!(session.reject().await.is_none());
    assert_eq!(session.snapshot().await.len(), 1);

    gateway.release.notify_one();
    let outcome = worker.await.unwrap().unwrap();
    assert_eq!(outcome, TurnOutcome::Completed { executed: vec![] });
    assert!(!session.is_processing().await);
    assert_eq!(session.snapshot().await.len(), 2);
    assert!(!session.subscribe().borrow().input_locked);
}

#[tokio::test]
async fn test_context_injection_uses_long_term_most_recent_first() {
    let gateway = Arc::new(MockGateway::scripted([
        write_reply("w1", "older", 4, &[]),
        write_reply("w2", "newer", 8, &[]),
    ]));
    let session = session_with(gateway.clone());

    session.submit("a").await.unwrap();
    session.authorize().await.unwrap();
    session.submit("b").await.unwrap();
    session.authorize().await.unwrap();
    session.submit("what do you know").await.unwrap();

    let requests = gateway.requests().await;
    assert_eq!(requests.len(), 3);
    assert!(requests[0].context.is_empty());
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[0].input, "a");

    let last = &requests[2];
    let contents: Vec<&str> = last.context.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["newer", "older"]);
    assert!(last.history.iter().all(|t| t.text != "what do you know"));
    let newer = last.prompt.system.find("newer").unwrap();
    let older = last.prompt.system.find("older").unwrap();
    assert!(newer < older);
}

#[tokio::test]
async fn test_command_channel_drives_gate() {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".to_string();
    cfg.tools.execution_delay_ms = 0;

    let (cmd_tx, mut state_rx) = spawn_session(build_session(&cfg, Arc::new(MockGateway::new())));
    assert_eq!(state_rx.borrow().history.len(), 1);

    cmd_tx
        .send(Command::Submit("remember: deploys happen on friday".to_string()))
        .unwrap();
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| s.pending.is_some()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(state.phase, AgentPhase::AwaitingConfirmation);
    assert!(state.input_locked);

    cmd_tx.send(Command::Authorize).unwrap();
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| !s.long_term.is_empty()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(state.long_term[0].content, "deploys happen on friday");
    assert!(state.pending.is_none());
    assert!(!state.input_locked);

    cmd_tx.send(Command::Quit).unwrap();
}
