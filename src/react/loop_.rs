//! ReAct 主循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；迭代上限内必须以最终回答或显式错误
//! 收尾。格式错误与未知工具名注入纠偏提示后继续（各消耗一次迭代），不中止回合；
//! LLM 调用失败原样上抛，由 Turn Controller 收尾。可选 event_tx 向前端推送过程事件。

use tokio::sync::mpsc::UnboundedSender;

use crate::core::AgentError;
use crate::memory::Message;
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput};
use crate::react::AgentEvent;
use crate::tools::ToolRegistry;

/// 最终回答按块推送时每段字符数（模拟增量输出）
const CHUNK_CHARS: usize = 24;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;
/// 思考内容展示最大字符数
const THINKING_PREVIEW_CHARS: usize = 800;

/// ReAct 循环执行结果：最终回答与实际消耗的步数
#[derive(Debug)]
pub struct ReactResult {
    pub answer: String,
    pub steps: usize,
}

fn send_event(tx: &Option<&UnboundedSender<AgentEvent>>, ev: AgentEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect::<String>() + "..."
    } else {
        s.to_string()
    }
}

/// 执行 ReAct 循环
///
/// history 为本轮之前的会话上下文（含种子问候），user_input 为本轮提问；
/// 循环自行维护 scratchpad（工具调用与 Observation 写回消息序列）。
pub async fn react_loop(
    planner: &Planner,
    tools: &ToolRegistry,
    max_iterations: usize,
    history: &[Message],
    user_input: &str,
    event_tx: Option<&UnboundedSender<AgentEvent>>,
) -> Result<ReactResult, AgentError> {
    let mut messages: Vec<Message> = history.to_vec();
    messages.push(Message::user(user_input.to_string()));

    for step in 0..max_iterations {
        send_event(&event_tx, AgentEvent::StepUpdate {
            step: step + 1,
            max_steps: max_iterations,
        });
        send_event(&event_tx, AgentEvent::Thinking);

        let output = match planner.plan(&messages).await {
            Ok(o) => o,
            Err(e) => {
                send_event(&event_tx, AgentEvent::Error { text: e.to_string() });
                return Err(e);
            }
        };

        send_event(&event_tx, AgentEvent::ThinkingContent {
            text: preview(&output, THINKING_PREVIEW_CHARS),
        });

        match parse_llm_output(&output) {
            Ok(PlannerOutput::Response(resp)) => {
                let chars: Vec<char> = resp.chars().collect();
                for chunk in chars.chunks(CHUNK_CHARS) {
                    send_event(&event_tx, AgentEvent::MessageChunk {
                        text: chunk.iter().collect(),
                    });
                }
                send_event(&event_tx, AgentEvent::MessageDone);
                return Ok(ReactResult {
                    answer: resp,
                    steps: step + 1,
                });
            }
            Ok(PlannerOutput::ToolCall(tc)) => {
                send_event(&event_tx, AgentEvent::ToolCall {
                    tool: tc.tool.clone(),
                    args: tc.args.clone(),
                });

                let observation = if tools.get(&tc.tool).is_none() {
                    // 幻觉工具名：纠偏 Observation，循环继续
                    let reason = format!(
                        "unknown tool '{}', available tools: {}",
                        tc.tool,
                        tools.tool_names().join(", ")
                    );
                    send_event(&event_tx, AgentEvent::ToolFailure {
                        tool: tc.tool.clone(),
                        reason: reason.clone(),
                    });
                    format!("Error: {}", reason)
                } else {
                    let started = std::time::Instant::now();
                    let result = tools.execute(&tc.tool, tc.args.clone()).await;
                    let audit = serde_json::json!({
                        "event": "tool_audit",
                        "tool": tc.tool,
                        "ok": result.is_ok(),
                        "duration_ms": started.elapsed().as_millis() as u64,
                    });
                    tracing::info!(audit = %audit.to_string(), "tool");
                    match result {
                        Ok(r) => r,
                        Err(e) => {
                            send_event(&event_tx, AgentEvent::ToolFailure {
                                tool: tc.tool.clone(),
                                reason: e.clone(),
                            });
                            format!("Error: {}", e)
                        }
                    }
                };

                send_event(&event_tx, AgentEvent::Observation {
                    tool: tc.tool.clone(),
                    preview: preview(&observation, OBSERVATION_PREVIEW_CHARS),
                });

                // 工具调用与结果写回 scratchpad，供下一轮 Plan 使用
                messages.push(Message::assistant(output.clone()));
                messages.push(Message::user(format!(
                    "Observation from {}: {}",
                    tc.tool, observation
                )));
            }
            Err(e) => {
                // 格式错误：注入纠偏提示让 LLM 重试，而非中止回合
                let detail = e.to_string();
                send_event(&event_tx, AgentEvent::Retry {
                    detail: detail.clone(),
                });
                messages.push(Message::assistant(output.clone()));
                messages.push(Message::user(format!(
                    "Your previous reply could not be parsed ({}). Reply with exactly one \
                     JSON object {{\"tool\": \"...\", \"args\": {{\"query\": \"...\"}}}} to use \
                     a tool, or with plain text (no JSON) to give the final answer.",
                    detail
                )));
            }
        }
    }

    send_event(&event_tx, AgentEvent::Error {
        text: format!("iteration limit ({}) reached", max_iterations),
    });
    Err(AgentError::IterationLimit(max_iterations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::llm::ScriptedLlmClient;
    use crate::tools::Tool;

    /// 离线测试工具：固定返回一段文本
    struct StaticTool;

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            "lookup"
        }

        fn description(&self) -> &str {
            "Offline lookup for tests"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok("entanglement links particle states".to_string())
        }
    }

    /// 始终失败的工具
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("backend unreachable".to_string())
        }
    }

    fn test_registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(StaticTool);
        reg.register(BrokenTool);
        reg
    }

    fn planner_with(script: Vec<&str>) -> Planner {
        Planner::new(Arc::new(ScriptedLlmClient::new(script)), "test prompt")
    }

    #[tokio::test]
    async fn test_tool_call_then_final_answer() {
        let planner = planner_with(vec![
            r#"{"tool": "lookup", "args": {"query": "entanglement"}}"#,
            "Entanglement correlates particle states.",
        ]);
        let tools = test_registry();
        let result = react_loop(&planner, &tools, 5, &[], "what is entanglement?", None)
            .await
            .unwrap();
        assert_eq!(result.answer, "Entanglement correlates particle states.");
        assert_eq!(result.steps, 2);
    }

    #[tokio::test]
    async fn test_malformed_output_recovers() {
        let planner = planner_with(vec!["{oops not json", "recovered answer"]);
        let tools = test_registry();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = react_loop(&planner, &tools, 5, &[], "q", Some(&tx))
            .await
            .unwrap();
        assert_eq!(result.answer, "recovered answer");

        drop(tx);
        let mut saw_retry = false;
        while let Some(ev) = rx.recv().await {
            if matches!(ev, AgentEvent::Retry { .. }) {
                saw_retry = true;
            }
        }
        assert!(saw_retry);
    }

    #[tokio::test]
    async fn test_unknown_tool_recovers() {
        let planner = planner_with(vec![
            r#"{"tool": "hallucinated", "args": {}}"#,
            "final after correction",
        ]);
        let tools = test_registry();
        let result = react_loop(&planner, &tools, 5, &[], "q", None).await.unwrap();
        assert_eq!(result.answer, "final after correction");
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_observation() {
        let planner = planner_with(vec![
            r#"{"tool": "broken", "args": {"query": "x"}}"#,
            "answered despite failure",
        ]);
        let tools = test_registry();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = react_loop(&planner, &tools, 5, &[], "q", Some(&tx))
            .await
            .unwrap();
        assert_eq!(result.answer, "answered despite failure");

        drop(tx);
        let mut saw_failure = false;
        while let Some(ev) = rx.recv().await {
            if let AgentEvent::ToolFailure { tool, reason } = ev {
                assert_eq!(tool, "broken");
                assert!(reason.contains("unreachable"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_iteration_limit_is_explicit_failure() {
        // 5 次都在调用工具，永不给最终回答
        let call = r#"{"tool": "lookup", "args": {"query": "again"}}"#;
        let planner = planner_with(vec![call; 5]);
        let tools = test_registry();
        let err = react_loop(&planner, &tools, 5, &[], "q", None).await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimit(5)));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        // 脚本为空：complete 直接失败
        let planner = planner_with(vec![]);
        let tools = test_registry();
        let err = react_loop(&planner, &tools, 5, &[], "q", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[tokio::test]
    async fn test_final_answer_chunked() {
        let planner = planner_with(vec!["A final answer that is long enough to span chunks."]);
        let tools = test_registry();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = react_loop(&planner, &tools, 5, &[], "q", Some(&tx))
            .await
            .unwrap();

        drop(tx);
        let mut reassembled = String::new();
        let mut done = false;
        while let Some(ev) = rx.recv().await {
            match ev {
                AgentEvent::MessageChunk { text } => reassembled.push_str(&text),
                AgentEvent::MessageDone => done = true,
                _ => {}
            }
        }
        assert!(done);
        assert_eq!(reassembled, result.answer);
    }
}
