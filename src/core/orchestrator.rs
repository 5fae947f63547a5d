//! 编排器：装配会话并消费 UI 命令
//!
//! 负责：加载配置、选择 Model Gateway、注册工具、创建 ChatSession，
//! 建立 cmd（UI -> Core）与 state（Core -> UI）两条通道。
//! 每条命令派生为独立任务，会话自身的忙碌标志保证单飞；
//! 因此 Thinking 期间用户按下的 y / n 会被直接忽略，而不是排队到确认门打开之后。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::{load_config, AppConfig};
use crate::core::{AgentError, ChatSession, UiState};
use crate::llm::{
    GatewaySettings, GeminiGateway, MockGateway, ModelGateway, OpenAiGateway,
    GEMINI_DEFAULT_MODEL, OPENAI_DEFAULT_MODEL,
};
use crate::memory::InMemoryStore;
use crate::tools::{
    tool_declarations, MemorySearchTool, PythonScriptTool, ToolDeclaration, ToolExecutor,
    ToolRegistry,
};

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 发送用户输入
    Submit(String),
    /// 授权待确认的记忆写入
    Authorize,
    /// 拒绝待确认的记忆写入
    Reject,
    /// 退出应用
    Quit,
}

fn env_key(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| std::env::var(n).ok())
        .filter(|k| !k.trim().is_empty())
}

/// 根据配置与环境变量选择网关（Gemini / OpenAI 兼容 / Mock）；缺少 Key 时退回 Mock
pub fn create_gateway_from_config(
    cfg: &AppConfig,
    tools: Vec<ToolDeclaration>,
) -> Result<Arc<dyn ModelGateway>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    let settings = |default_model: &str| GatewaySettings {
        base_url: cfg.llm.base_url.clone(),
        model: cfg
            .llm
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string()),
        system_prompt: cfg.llm.system_prompt(),
        temperature: cfg.llm.temperature,
        timeout: std::time::Duration::from_secs(cfg.llm.timeouts.request),
        tools: tools.clone(),
    };

    match provider.as_str() {
        "gemini" => match env_key(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]) {
            Some(key) => {
                let settings = settings(GEMINI_DEFAULT_MODEL);
                tracing::info!(model = %settings.model, "Using Gemini gateway");
                Ok(Arc::new(GeminiGateway::new(settings, key)?))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, using Mock gateway");
                Ok(Arc::new(MockGateway::new()))
            }
        },
        "openai" => match env_key(&["OPENAI_API_KEY"]) {
            Some(key) => {
                let settings = settings(OPENAI_DEFAULT_MODEL);
                tracing::info!(model = %settings.model, "Using OpenAI-compatible gateway");
                Ok(Arc::new(OpenAiGateway::new(settings, key)?))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock gateway");
                Ok(Arc::new(MockGateway::new()))
            }
        },
        "mock" => Ok(Arc::new(MockGateway::new())),
        other => Err(AgentError::ConfigError(format!(
            "unknown llm provider: {other}"
        ))),
    }
}

/// 注册「其它工具」
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(PythonScriptTool);
    registry.register(MemorySearchTool);
    registry
}

/// 用给定网关装配会话（测试可注入 Mock）
pub fn build_session(cfg: &AppConfig, gateway: Arc<dyn ModelGateway>) -> ChatSession {
    let executor = ToolExecutor::new(
        default_registry(),
        cfg.tools.tool_timeout_secs,
        cfg.tools.execution_delay(),
    );
    let store = InMemoryStore::new(cfg.memory.short_term_capacity);
    ChatSession::new(gateway, executor, Box::new(store)).with_greeting(&cfg.app.greeting)
}

/// 启动命令循环：返回命令发送端与状态接收端
pub fn spawn_session(
    session: ChatSession,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    let session = Arc::new(session);
    let state_rx = session.subscribe();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            let session = Arc::clone(&session);
            match cmd {
                Command::Submit(input) => {
                    tokio::spawn(async move {
                        if let Err(e) = session.submit(&input).await {
                            tracing::info!(error = %e, "submit refused");
                        }
                    });
                }
                Command::Authorize => {
                    tokio::spawn(async move {
                        if let Some(record) = session.authorize().await {
                            tracing::info!(id = %record.id, "memory write committed");
                        }
                    });
                }
                Command::Reject => {
                    tokio::spawn(async move {
                        session.reject().await;
                    });
                }
                Command::Quit => break,
            }
        }
        tracing::info!("command loop stopped");
    });

    (cmd_tx, state_rx)
}

/// 创建会话运行时：加载配置 -> 选择网关 -> 装配会话 -> 启动命令循环
pub async fn create_session(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<UiState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let tools = tool_declarations(&default_registry());
    let gateway = create_gateway_from_config(&cfg, tools)?;
    tracing::info!(gateway = gateway.name(), "session starting");

    Ok(spawn_session(build_session(&cfg, gateway)))
}
