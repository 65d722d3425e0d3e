//! 会话编排器：TUI 主控循环
//!
//! 加载配置、构建 Agent 工厂与 Turn Controller，建立 cmd/state 双通道；后台任务
//! 逐条消费用户命令（Submit/Clear/ClearCache/Quit），回合内转发 ReAct 过程事件到
//! UiState 的步骤日志。严格一回合在飞：上一回合收尾前不取下一条命令。

use std::path::PathBuf;

use tokio::sync::{mpsc, watch};

use crate::agent::KnowledgeAgentFactory;
use crate::config::{credential_from_env, load_config, AppConfig};
use crate::core::turn::{TurnController, TurnOutcome};
use crate::core::{AgentPhase, StepEntry, UiState};
use crate::memory::Message;
use crate::react::AgentEvent;

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入，触发一个回合
    Submit(String),
    /// 清空会话（转录恢复为种子问候）
    Clear,
    /// 清空工具缓存，下个回合重建工具集
    ClearCache,
    /// 退出应用
    Quit,
}

/// 过程事件落到步骤日志，并给出当前阶段投影
fn apply_event(steps: &mut Vec<StepEntry>, ev: &AgentEvent) -> (AgentPhase, Option<String>) {
    match ev {
        AgentEvent::StepUpdate { step, max_steps } => {
            steps.push(StepEntry {
                label: "step".to_string(),
                detail: format!("{}/{}", step, max_steps),
            });
            (AgentPhase::Thinking, None)
        }
        AgentEvent::Thinking => (AgentPhase::Thinking, None),
        AgentEvent::ThinkingContent { text } => {
            steps.push(StepEntry {
                label: "thinking".to_string(),
                detail: text.clone(),
            });
            (AgentPhase::Thinking, None)
        }
        AgentEvent::ToolCall { tool, args } => {
            steps.push(StepEntry {
                label: format!("tool: {}", tool),
                detail: args.to_string(),
            });
            (AgentPhase::ToolExecuting, Some(tool.clone()))
        }
        AgentEvent::Observation { tool, preview } => {
            steps.push(StepEntry {
                label: format!("observation: {}", tool),
                detail: preview.clone(),
            });
            (AgentPhase::Thinking, None)
        }
        AgentEvent::ToolFailure { tool, reason } => {
            steps.push(StepEntry {
                label: format!("tool failed: {}", tool),
                detail: reason.clone(),
            });
            (AgentPhase::Thinking, None)
        }
        AgentEvent::Retry { detail } => {
            steps.push(StepEntry {
                label: "retry".to_string(),
                detail: detail.clone(),
            });
            (AgentPhase::Thinking, None)
        }
        AgentEvent::MessageChunk { .. } => (AgentPhase::Responding, None),
        AgentEvent::MessageDone => (AgentPhase::Responding, None),
        AgentEvent::Error { text } => {
            steps.push(StepEntry {
                label: "error".to_string(),
                detail: text.clone(),
            });
            (AgentPhase::Error, None)
        }
    }
}

/// 创建会话运行时：返回命令发送端与状态接收端；后台任务消费命令并推送 UiState。
pub async fn create_session(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<UiState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    // TUI 变体：固定模型，注册网页搜索工具（初始化失败自动降级为两工具）
    let factory = KnowledgeAgentFactory::new(
        cfg.llm.clone(),
        cfg.tools.clone(),
        cfg.tools.enable_web_search,
    );
    let mut notice = factory.tool_setup().notice.clone();
    if let Some(n) = &notice {
        tracing::warn!(notice = %n, "tool registry degraded");
    }

    let mut controller = TurnController::new(cfg.app.greeting.clone(), cfg.llm.clone());

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState {
        history: controller.transcript().to_vec(),
        notice: notice.clone(),
        ..UiState::default()
    });

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Submit(input) => {
                    // 凭证按回合读取（环境变量/配置），不落盘
                    let credential = credential_from_env(&cfg);
                    let model_id = cfg.llm.model.clone();

                    // 乐观投影：凭证在手时用户消息先行可见，无需等待 Agent
                    let mut pending = controller.transcript().to_vec();
                    if credential.is_some() {
                        pending.push(Message::user(input.clone()));
                    }
                    let mut steps: Vec<StepEntry> = Vec::new();
                    let _ = state_tx.send(UiState {
                        phase: AgentPhase::Thinking,
                        history: pending.clone(),
                        active_tool: None,
                        input_locked: true,
                        warning: None,
                        notice: notice.clone(),
                        steps: steps.clone(),
                    });

                    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<AgentEvent>();
                    let outcome = {
                        let turn = controller.run_turn(
                            &factory,
                            credential,
                            &model_id,
                            &input,
                            Some(&ev_tx),
                        );
                        tokio::pin!(turn);
                        loop {
                            tokio::select! {
                                out = &mut turn => break out,
                                Some(ev) = ev_rx.recv() => {
                                    let (phase, active_tool) = apply_event(&mut steps, &ev);
                                    let _ = state_tx.send(UiState {
                                        phase,
                                        history: pending.clone(),
                                        active_tool,
                                        input_locked: true,
                                        warning: None,
                                        notice: notice.clone(),
                                        steps: steps.clone(),
                                    });
                                }
                            }
                        }
                    };
                    drop(ev_tx);
                    while let Some(ev) = ev_rx.recv().await {
                        apply_event(&mut steps, &ev);
                    }

                    let (phase, warning) = match &outcome {
                        TurnOutcome::Answered(_) => (AgentPhase::Idle, None),
                        TurnOutcome::Failed(_) => (AgentPhase::Error, None),
                        TurnOutcome::Warned(w) => (AgentPhase::Idle, Some(w.clone())),
                    };
                    let _ = state_tx.send(UiState {
                        phase,
                        history: controller.transcript().to_vec(),
                        active_tool: None,
                        input_locked: false,
                        warning,
                        notice: notice.clone(),
                        steps,
                    });
                }
                Command::Clear => {
                    controller.reset();
                    let _ = state_tx.send(UiState {
                        history: controller.transcript().to_vec(),
                        notice: notice.clone(),
                        ..UiState::default()
                    });
                }
                Command::ClearCache => {
                    crate::tools::clear_tool_cache();
                    // 立刻重建以便把（可能变化的）降级提示投影出去
                    notice = factory.tool_setup().notice.clone();
                    let _ = state_tx.send(UiState {
                        history: controller.transcript().to_vec(),
                        notice: notice.clone(),
                        ..UiState::default()
                    });
                }
                Command::Quit => break,
            }
        }
    });

    Ok((cmd_tx, state_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_event_projects_phase_and_steps() {
        let mut steps = Vec::new();

        let (phase, tool) = apply_event(
            &mut steps,
            &AgentEvent::ToolCall {
                tool: "wikipedia".to_string(),
                args: serde_json::json!({"query": "q"}),
            },
        );
        assert_eq!(phase, AgentPhase::ToolExecuting);
        assert_eq!(tool.as_deref(), Some("wikipedia"));

        let (phase, _) = apply_event(
            &mut steps,
            &AgentEvent::Observation {
                tool: "wikipedia".to_string(),
                preview: "snippet".to_string(),
            },
        );
        assert_eq!(phase, AgentPhase::Thinking);

        let (phase, _) = apply_event(
            &mut steps,
            &AgentEvent::MessageChunk {
                text: "chunk".to_string(),
            },
        );
        assert_eq!(phase, AgentPhase::Responding);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label, "tool: wikipedia");
        assert_eq!(steps[1].label, "observation: wikipedia");
    }
}
