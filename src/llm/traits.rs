//! LLM 客户端抽象
//!
//! 所有后端（Groq / Mock / 测试脚本）实现 LlmClient::complete；失败以 String 形式
//! 返回，在 Planner 边界转为 AgentError。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait：输入完整消息序列（含 system），返回一段补全文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}
