//! Agent 工厂
//!
//! 每个回合用当时的凭证与模型号重新构建推理循环：Groq 客户端（温度 0.1）+
//! "react" 指令模板 + 进程级缓存的工具集，外加迭代上限与格式纠偏。任何构建失败都
//! 以 Err 返回、绝不 panic 越过此边界；调用方将其视为「本回合无回答」。
//! AgentFactory / AgentRunner 是 Turn Controller 的测试接缝。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{LlmSection, ToolsSection};
use crate::core::AgentError;
use crate::llm::GroqClient;
use crate::memory::Message;
use crate::react::{fetch_template, react_loop, render_template, AgentEvent, Planner, REACT_TEMPLATE_NAME};
use crate::tools::{cached_tools, ToolSetup};

/// Agent 配置：每个回合（或每次改选模型后）重新构造，不持久化
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub credential: String,
    pub model_id: String,
    pub max_iterations: usize,
    pub temperature: f32,
}

impl AgentConfig {
    pub fn new(credential: impl Into<String>, model_id: impl Into<String>, llm: &LlmSection) -> Self {
        Self {
            credential: credential.into(),
            model_id: model_id.into(),
            max_iterations: llm.max_iterations,
            temperature: llm.temperature,
        }
    }
}

/// 调用结果：output 为回答字段；结构上成功但字段缺失时由调用方按「无输出」处理
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub output: Option<String>,
}

/// 单回合推理循环的调用接口（测试时可整体 Mock 掉 Agent 的决策）
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn invoke(
        &self,
        question: &str,
        history: &[Message],
        event_tx: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentReply, AgentError>;
}

/// Agent 构建接缝：Turn Controller 只依赖这个 trait
pub trait AgentFactory: Send + Sync {
    fn create_agent(&self, config: &AgentConfig) -> Result<Box<dyn AgentRunner>, AgentError>;
}

/// 真实 Agent：Planner + 工具集 + 迭代上限
pub struct KnowledgeAgent {
    planner: Planner,
    tools: Arc<ToolSetup>,
    max_iterations: usize,
}

#[async_trait]
impl AgentRunner for KnowledgeAgent {
    async fn invoke(
        &self,
        question: &str,
        history: &[Message],
        event_tx: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentReply, AgentError> {
        let result = react_loop(
            &self.planner,
            &self.tools.registry,
            self.max_iterations,
            history,
            question,
            event_tx,
        )
        .await?;
        Ok(AgentReply {
            output: Some(result.answer),
        })
    }
}

/// 生产工厂：持有 LLM 端点配置与工具配置；工具集走进程级缓存，显式清缓存后下次
/// 构建自动重建
pub struct KnowledgeAgentFactory {
    llm: LlmSection,
    tools_cfg: ToolsSection,
    with_web_search: bool,
}

impl KnowledgeAgentFactory {
    pub fn new(llm: LlmSection, tools_cfg: ToolsSection, with_web_search: bool) -> Self {
        Self {
            llm,
            tools_cfg,
            with_web_search,
        }
    }

    /// 当前工具集（含可能的降级提示），供前端展示
    pub fn tool_setup(&self) -> Arc<ToolSetup> {
        cached_tools(&self.tools_cfg, self.with_web_search)
    }
}

impl AgentFactory for KnowledgeAgentFactory {
    fn create_agent(&self, config: &AgentConfig) -> Result<Box<dyn AgentRunner>, AgentError> {
        if config.credential.trim().is_empty() {
            return Err(AgentError::Construction("empty API key".to_string()));
        }
        if config.model_id.trim().is_empty() {
            return Err(AgentError::Construction("empty model id".to_string()));
        }

        let tools = cached_tools(&self.tools_cfg, self.with_web_search);
        let template = fetch_template(REACT_TEMPLATE_NAME)?;
        let system_prompt = render_template(&template, &tools.registry);

        let llm = Arc::new(GroqClient::new(
            &config.credential,
            &config.model_id,
            &self.llm.base_url,
            config.temperature,
        ));

        tracing::debug!(model = %config.model_id, max_iterations = config.max_iterations, "agent constructed");

        Ok(Box::new(KnowledgeAgent {
            planner: Planner::new(llm, system_prompt),
            tools,
            max_iterations: config.max_iterations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_takes_loop_limits_from_config() {
        let llm = LlmSection::default();
        let cfg = AgentConfig::new("gsk_x", "llama-3.3-70b-versatile", &llm);
        assert_eq!(cfg.max_iterations, 5);
        assert!((cfg.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_factory_rejects_blank_credential() {
        let factory = KnowledgeAgentFactory::new(LlmSection::default(), ToolsSection::default(), false);
        let cfg = AgentConfig::new("   ", "llama-3.3-70b-versatile", &LlmSection::default());
        let err = factory.create_agent(&cfg).err().unwrap();
        assert!(matches!(err, AgentError::Construction(_)));
    }
}
