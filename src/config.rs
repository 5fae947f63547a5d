//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NEXUS__*` 覆盖（双下划线表示嵌套，如 `NEXUS__LLM__PROVIDER=openai`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::DEFAULT_SYSTEM_PROMPT;
use crate::memory::DEFAULT_SHORT_TERM_CAPACITY;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub memory: MemorySection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、开场系统消息、日志文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 会话开始时追加的系统 Turn；为空则不追加
    pub greeting: String,
    /// TUI 占用终端，日志写入文件
    pub log_file: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Nexus".to_string(),
            greeting: "Nexus online. Memory gate armed.".to_string(),
            log_file: Some(PathBuf::from("nexus.log")),
        }
    }
}

/// [llm] 段：后端选择、模型、采样温度、系统提示词与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// gemini / openai / mock
    pub provider: String,
    /// 为空时使用各后端默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub system_prompt_file: Option<PathBuf>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            temperature: 0.7,
            system_prompt_file: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    /// 读取系统提示词：配置文件路径 > config/prompts/system.txt > 内置默认
    pub fn system_prompt(&self) -> String {
        self.system_prompt_file
            .iter()
            .cloned()
            .chain([
                PathBuf::from("config/prompts/system.txt"),
                PathBuf::from("../config/prompts/system.txt"),
            ])
            .find_map(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），由传输层执行
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [memory] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub short_term_capacity: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            short_term_capacity: DEFAULT_SHORT_TERM_CAPACITY,
        }
    }
}

/// [tools] 段：「其它工具」的模拟执行延迟与单次调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub execution_delay_ms: u64,
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            execution_delay_ms: 1000,
            tool_timeout_secs: 30,
        }
    }
}

impl ToolsSection {
    pub fn execution_delay(&self) -> Duration {
        Duration::from_millis(self.execution_delay_ms)
    }
}

/// 从 config 目录加载配置，环境变量 NEXUS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NEXUS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NEXUS")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
