//! LLM 层：客户端抽象与实现（Groq / Mock）与模型目录

pub mod catalog;
pub mod groq;
pub mod mock;
pub mod traits;

pub use catalog::{default_model_id, model_catalog, ModelInfo};
pub use groq::GroqClient;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use traits::LlmClient;
