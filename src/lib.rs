//! Nexus - 带记忆确认门的终端对话助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 确认门、会话（单飞互斥）、状态投影、命令编排
//! - **llm**: Model Gateway 抽象与实现（Gemini / OpenAI 兼容 / Mock）
//! - **memory**: 对话日志与短期 / 长期记忆存储
//! - **observability**: tracing 初始化
//! - **tools**: 工具调用、分派、注册表与执行器
//! - **ui**: Ratatui TUI 界面

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;
pub mod ui;
