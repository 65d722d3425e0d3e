//! 端到端回合流测试
//!
//! 脚本 LLM + 离线工具驱动完整链路：模板渲染 -> Planner -> ReAct 循环 -> Turn
//! Controller 收尾；不访问网络。Agent 的决策通过脚本 Mock，不触碰循环内部策略。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use owl::agent::{AgentConfig, AgentFactory, AgentReply, AgentRunner};
use owl::config::LlmSection;
use owl::core::{AgentError, TurnController, TurnOutcome, MISSING_KEY_WARNING};
use owl::llm::ScriptedLlmClient;
use owl::memory::Role;
use owl::react::{fetch_template, react_loop, render_template, AgentEvent, Planner, REACT_TEMPLATE_NAME};
use owl::tools::{Tool, ToolRegistry};

/// 离线的 wikipedia 替身：固定返回一段摘要
struct WikipediaStub;

#[async_trait]
impl Tool for WikipediaStub {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "Offline Wikipedia stand-in for tests"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        Ok(format!(
            "Page: Quantum entanglement\nSummary: correlation of particle states ({})",
            query
        ))
    }
}

fn offline_registry() -> Arc<ToolRegistry> {
    let mut reg = ToolRegistry::new();
    reg.register(WikipediaStub);
    Arc::new(reg)
}

/// 真实循环 + 脚本 LLM 的 Agent
struct ScriptedAgent {
    planner: Planner,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    async fn invoke(
        &self,
        question: &str,
        history: &[owl::memory::Message],
        event_tx: Option<&UnboundedSender<AgentEvent>>,
    ) -> Result<AgentReply, AgentError> {
        let result = react_loop(
            &self.planner,
            &self.tools,
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

/// 每次 create_agent 弹出一份脚本，构建走真实模板渲染
struct ScriptedFactory {
    scripts: Mutex<VecDeque<Vec<String>>>,
    tools: Arc<ToolRegistry>,
}

impl ScriptedFactory {
    fn new(scripts: Vec<Vec<&str>>) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|s| s.into_iter().map(String::from).collect())
                    .collect(),
            ),
            tools: offline_registry(),
        }
    }
}

impl AgentFactory for ScriptedFactory {
    fn create_agent(&self, config: &AgentConfig) -> Result<Box<dyn AgentRunner>, AgentError> {
        let script: Vec<String> = self
            .scripts
            .lock()
            .map_err(|_| AgentError::Construction("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::Construction("no script left".to_string()))?;

        let template = fetch_template(REACT_TEMPLATE_NAME)?;
        let system_prompt = render_template(&template, &self.tools);
        let llm = Arc::new(ScriptedLlmClient::new(
            script.iter().map(String::as_str).collect(),
        ));

        Ok(Box::new(ScriptedAgent {
            planner: Planner::new(llm, system_prompt),
            tools: Arc::clone(&self.tools),
            max_iterations: config.max_iterations,
        }))
    }
}

fn controller() -> TurnController {
    TurnController::new(
        "Hi, I'm a knowledge assistant who can search Wikipedia and Arxiv. How can I help you?",
        LlmSection::default(),
    )
}

#[tokio::test]
async fn test_full_turn_with_tool_call_and_events() {
    let factory = ScriptedFactory::new(vec![vec![
        r#"{"tool": "wikipedia", "args": {"query": "quantum entanglement"}}"#,
        "Quantum entanglement is a correlation between particle states.",
    ]]);
    let mut c = controller();

    let (ev_tx, mut ev_rx) = tokio::sync::mpsc::unbounded_channel();
    let outcome = c
        .run_turn(
            &factory,
            Some("gsk_test".into()),
            "llama-3.3-70b-versatile",
            "What is quantum entanglement?",
            Some(&ev_tx),
        )
        .await;

    match outcome {
        TurnOutcome::Answered(answer) => assert!(answer.starts_with("Quantum entanglement")),
        other => panic!("Expected Answered, got {:?}", other),
    }

    let msgs = c.transcript();
    assert_eq!(msgs.len(), 3);
    assert_eq!(msgs[1].role, Role::User);
    assert_eq!(msgs[2].role, Role::Assistant);

    drop(ev_tx);
    let (mut saw_tool_call, mut saw_observation, mut saw_done) = (false, false, false);
    while let Some(ev) = ev_rx.recv().await {
        match ev {
            AgentEvent::ToolCall { tool, .. } => {
                assert_eq!(tool, "wikipedia");
                saw_tool_call = true;
            }
            AgentEvent::Observation { preview, .. } => {
                assert!(preview.contains("Quantum"));
                saw_observation = true;
            }
            AgentEvent::MessageDone => saw_done = true,
            _ => {}
        }
    }
    assert!(saw_tool_call && saw_observation && saw_done);
}

#[tokio::test]
async fn test_transcript_grows_by_two_per_completed_turn() {
    let factory = ScriptedFactory::new(vec![
        vec!["first answer"],
        vec!["second answer"],
        vec!["third answer"],
    ]);
    let mut c = controller();

    for n in 1..=3usize {
        let outcome = c
            .run_turn(
                &factory,
                Some("gsk_test".into()),
                "llama-3.3-70b-versatile",
                &format!("question {}", n),
                None,
            )
            .await;
        assert!(matches!(outcome, TurnOutcome::Answered(_)));
        assert_eq!(c.transcript().len(), 1 + 2 * n);
    }
}

#[tokio::test]
async fn test_iteration_exhaustion_ends_as_failed_turn() {
    // 5 次都在调用工具，循环以显式失败收尾，错误文案进转录
    let call = r#"{"tool": "wikipedia", "args": {"query": "again"}}"#;
    let factory = ScriptedFactory::new(vec![vec![call; 5]]);
    let mut c = controller();

    let outcome = c
        .run_turn(
            &factory,
            Some("gsk_test".into()),
            "llama-3.3-70b-versatile",
            "loop forever",
            None,
        )
        .await;

    let TurnOutcome::Failed(text) = outcome else {
        panic!("Expected Failed");
    };
    assert!(text.contains("iteration limit"));
    assert_eq!(c.transcript().len(), 3);
    assert_eq!(c.transcript()[2].content, text);
}

#[tokio::test]
async fn test_missing_credential_never_reaches_factory() {
    // 不给脚本：凭证缺失时工厂不应被调用
    let factory = ScriptedFactory::new(vec![]);
    let mut c = controller();

    let outcome = c
        .run_turn(&factory, None, "llama-3.3-70b-versatile", "anything", None)
        .await;

    assert_eq!(outcome, TurnOutcome::Warned(MISSING_KEY_WARNING.to_string()));
    assert_eq!(c.transcript().len(), 1);
}

#[tokio::test]
async fn test_reset_between_turns() {
    let factory = ScriptedFactory::new(vec![vec!["a"], vec!["b"]]);
    let mut c = controller();

    c.run_turn(
        &factory,
        Some("gsk_test".into()),
        "llama-3.3-70b-versatile",
        "q1",
        None,
    )
    .await;
    assert_eq!(c.transcript().len(), 3);

    c.reset();
    assert_eq!(c.transcript().len(), 1);

    c.run_turn(
        &factory,
        Some("gsk_test".into()),
        "llama-3.3-70b-versatile",
        "q2",
        None,
    )
    .await;
    assert_eq!(c.transcript().len(), 3);
}
