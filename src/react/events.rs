//! ReAct 过程事件：用于 TUI 步骤面板与 Web NDJSON 流展示思考、工具调用、观察与回复

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// ReAct 步数更新（当前第几步 / 上限）
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用 LLM 思考
    Thinking,
    /// LLM 的原始输出预览（规划或推理内容）
    ThinkingContent { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败（作为 Observation 喂回模型，循环继续）
    ToolFailure { tool: String, reason: String },
    /// 输出格式错误后的纠偏重试（消耗一次迭代）
    Retry { detail: String },
    /// 最终回答的一小段（按块推送）
    MessageChunk { text: String },
    /// 最终回答结束
    MessageDone,
    /// 错误（回合将以失败收尾）
    Error { text: String },
}
