//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（阶段、转录、步骤日志、告警）；完整会话状态由
//! Orchestrator 维护并在每次状态迁移后投影推送，渲染层是只读订阅方。

use serde::Serialize;

use crate::memory::Message;

/// 中间推理步骤的一行展示（可折叠面板用）
#[derive(Clone, Debug, Serialize)]
pub struct StepEntry {
    /// 短标签，如 "tool: wikipedia"、"thinking"
    pub label: String,
    pub detail: String,
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub phase: AgentPhase,
    pub history: Vec<Message>,
    /// 正在执行的工具名（ToolExecuting 阶段）
    pub active_tool: Option<String>,
    pub input_locked: bool,
    /// 派发前告警（如凭证缺失）；与错误不同，不进转录
    pub warning: Option<String>,
    /// 非致命提示（如网页搜索降级）
    pub notice: Option<String>,
    /// 本回合的中间步骤日志
    pub steps: Vec<StepEntry>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            phase: AgentPhase::Idle,
            history: Vec::new(),
            active_tool: None,
            input_locked: false,
            warning: None,
            notice: None,
            steps: Vec::new(),
        }
    }
}

/// Agent 阶段（UI 投影用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    Idle,
    Thinking,
    ToolExecuting,
    Responding,
    Error,
}
