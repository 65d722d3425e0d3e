//! Agent 错误类型
//!
//! 所有外部协作方（LLM、检索后端、模板仓库）的失败在 Agent 工厂与 Turn Controller
//! 边界处显式化为 AgentError；没有任何错误越过 Turn Controller 向上传播。

use thiserror::Error;

/// 一次回合中可能出现的错误（凭证、构建、工具、LLM、解析等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 凭证缺失：回合在派发前中止，只显示告警，不写转录
    #[error("Missing API key")]
    MissingCredential,

    #[error("Prompt template not found: {0}")]
    TemplateNotFound(String),

    /// 模型客户端或 Agent 构建失败（无效凭证、模板缺失等）
    #[error("Agent construction failed: {0}")]
    Construction(String),

    /// 工具后端初始化失败；带降级路径的注册表会转为非致命提示
    #[error("Tool initialization failed: {0}")]
    ToolInit(String),

    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM 输出既不是合法 JSON 工具调用也无法按纯文本回答处理
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// ReAct 循环在迭代上限内未产出最终回答
    #[error("Agent stopped after reaching the iteration limit ({0})")]
    IterationLimit(usize),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// 调用在结构上成功但缺少回答字段
    #[error("No output received from agent")]
    MissingOutput,

    #[error("Config error: {0}")]
    Config(String),
}
