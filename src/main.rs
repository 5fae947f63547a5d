//! Nexus - 带记忆确认门的终端对话助手
//!
//! 入口：加载配置、初始化日志、创建会话与 TUI，并运行主循环。

use anyhow::Context;
use nexus::{
    config::load_config,
    core::create_session,
    observability,
    ui::run_app,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);

    // 日志文件路径与窗口标题需要先读配置；加载失败时由 create_session 再报告
    let app = load_config(config_path.clone()).unwrap_or_default().app;
    observability::init(app.log_file.as_deref());

    // 创建会话：返回命令发送端、状态接收端
    let (cmd_tx, state_rx) = create_session(config_path)
        .await
        .context("Failed to create session")?;

    run_app(&app.name, state_rx, cmd_tx).await.context("App run failed")?;

    Ok(())
}
