//! LLM 层：Model Gateway 抽象与实现（Gemini / OpenAI 兼容 / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod traits;

pub use gemini::{GeminiGateway, GEMINI_BASE_URL, GEMINI_DEFAULT_MODEL};
pub use mock::{MockGateway, RecordedRequest};
pub use openai::{OpenAiGateway, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL};
pub use prompt::{build_prompt, Prompt, PromptMessage, PromptRole, DEFAULT_SYSTEM_PROMPT};
pub use traits::{send_guarded, GatewayOutcome, GatewaySettings, LlmError, ModelGateway, ModelReply};
