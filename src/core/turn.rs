//! Turn Controller：回合状态机
//!
//! Idle -> AwaitingInput -> Dispatched -> (Answered | Failed | Warned) -> Idle。
//! 持有会话转录；凭证缺失在派发前拦截（告警、转录不动）；其余一切失败都转成
//! assistant 角色的错误消息写入转录，进程保持可用。渲染层只读订阅转录与结果。

use tokio::sync::mpsc::UnboundedSender;

use crate::agent::{AgentConfig, AgentFactory};
use crate::config::LlmSection;
use crate::core::AgentError;
use crate::memory::{Message, Transcript};
use crate::react::AgentEvent;

/// 调用结构上成功但缺少回答字段时写入转录的固定文案
pub const NO_OUTPUT_MESSAGE: &str = "No output received from agent";
/// 失败描述命中下线关键词时追加的提示
pub const MODEL_SWITCH_HINT: &str =
    "The selected model may be deprecated. Try selecting a different model.";
/// 凭证缺失时的告警（不写转录）
pub const MISSING_KEY_WARNING: &str =
    "Please provide your Groq API key before asking a question.";

const DEPRECATION_KEYWORDS: &[&str] = &["deprecated", "decommissioned"];

/// 单个回合的收尾状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// 正常回答，已追加到转录
    Answered(String),
    /// 失败，错误文案已作为 assistant 消息追加到转录
    Failed(String),
    /// 派发前中止（凭证缺失），仅显示告警，转录未变
    Warned(String),
}

/// 回合控制器：会话转录的唯一所有者
pub struct TurnController {
    transcript: Transcript,
    llm: LlmSection,
}

/// 组装失败文案：嵌入失败描述；命中下线关键词时附加换模型建议
fn error_message(e: &AgentError) -> String {
    let base = format!("An error occurred: {}", e);
    let lower = base.to_lowercase();
    if DEPRECATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        format!("{}\n\n{}", base, MODEL_SWITCH_HINT)
    } else {
        base
    }
}

impl TurnController {
    pub fn new(greeting: impl Into<String>, llm: LlmSection) -> Self {
        Self {
            transcript: Transcript::new(greeting),
            llm,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// 手动重置：任何状态下都可清空回种子问候
    pub fn reset(&mut self) {
        self.transcript.reset();
    }

    /// 处理一个回合：凭证预检 -> 追加用户消息 -> 构建 Agent -> 同步调用 -> 收尾。
    /// 返回后转录已处于最终状态，调用方触发一次渲染即可。
    pub async fn run_turn(
        &mut self,
        factory: &dyn AgentFactory,
        credential: Option<String>,
        model_id: &str,
        input: &str,
        event_tx: Option<&UnboundedSender<AgentEvent>>,
    ) -> TurnOutcome {
        // 派发守卫：凭证缺失 -> 告警，转录保持不变
        let Some(credential) = credential.filter(|c| !c.trim().is_empty()) else {
            tracing::warn!("turn aborted before dispatch: missing credential");
            return TurnOutcome::Warned(MISSING_KEY_WARNING.to_string());
        };

        // 用户消息先于任何处理进入转录（用户无需等待 Agent 即可看到自己的提问）
        self.transcript.push(Message::user(input.to_string()));
        let history_len = self.transcript.len();

        let config = AgentConfig::new(credential, model_id, &self.llm);
        let runner = match factory.create_agent(&config) {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };

        // 本轮之前的上下文（不含刚追加的用户消息，循环自己追加提问）
        let history = self.transcript.messages()[..history_len - 1].to_vec();
        match runner.invoke(input, &history, event_tx).await {
            Ok(reply) => match reply.output {
                Some(answer) => {
                    self.transcript.push(Message::assistant(answer.clone()));
                    TurnOutcome::Answered(answer)
                }
                None => self.fail(AgentError::MissingOutput),
            },
            Err(e) => self.fail(e),
        }
    }

    /// Failed 收尾：错误文案作为 assistant 回复写入转录
    fn fail(&mut self, e: AgentError) -> TurnOutcome {
        tracing::error!(error = %e, "turn failed");
        let text = match e {
            AgentError::MissingOutput => NO_OUTPUT_MESSAGE.to_string(),
            other => error_message(&other),
        };
        self.transcript.push(Message::assistant(text.clone()));
        TurnOutcome::Failed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::agent::{AgentReply, AgentRunner};
    use crate::memory::Role;

    const GREETING: &str = "Hi, I'm a knowledge assistant who can search Wikipedia and Arxiv. How can I help you?";

    /// Mock 工厂：按预设行为构建（或拒绝构建）Mock Runner
    enum Behavior {
        Reply(Option<String>),
        InvokeFails(AgentError),
        ConstructionFails,
    }

    struct MockFactory {
        behavior: Behavior,
    }

    struct MockRunner {
        reply: Result<AgentReply, String>,
    }

    #[async_trait]
    impl AgentRunner for MockRunner {
        async fn invoke(
            &self,
            _question: &str,
            _history: &[crate::memory::Message],
            _event_tx: Option<&UnboundedSender<AgentEvent>>,
        ) -> Result<AgentReply, AgentError> {
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(msg) => Err(AgentError::Llm(msg.clone())),
            }
        }
    }

    impl AgentFactory for MockFactory {
        fn create_agent(
            &self,
            _config: &AgentConfig,
        ) -> Result<Box<dyn AgentRunner>, AgentError> {
            match &self.behavior {
                Behavior::Reply(output) => Ok(Box::new(MockRunner {
                    reply: Ok(AgentReply {
                        output: output.clone(),
                    }),
                })),
                Behavior::InvokeFails(e) => Ok(Box::new(MockRunner {
                    reply: Err(e.to_string()),
                })),
                Behavior::ConstructionFails => {
                    Err(AgentError::Construction("bad credential".to_string()))
                }
            }
        }
    }

    fn controller() -> TurnController {
        TurnController::new(GREETING, LlmSection::default())
    }

    fn answer_factory(answer: &str) -> MockFactory {
        MockFactory {
            behavior: Behavior::Reply(Some(answer.to_string())),
        }
    }

    #[tokio::test]
    async fn test_completed_turns_grow_transcript_by_two() {
        let mut c = controller();
        let factory = answer_factory("an answer");
        for n in 1..=4usize {
            let outcome = c
                .run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
                .await;
            assert!(matches!(outcome, TurnOutcome::Answered(_)));
            assert_eq!(c.transcript().len(), 1 + 2 * n);
        }
    }

    #[tokio::test]
    async fn test_failed_turns_also_grow_by_two() {
        let mut c = controller();
        let factory = MockFactory {
            behavior: Behavior::InvokeFails(AgentError::Llm("boom".into())),
        };
        let outcome = c
            .run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
            .await;
        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        // 失败回合同样是 user + assistant 各一条
        assert_eq!(c.transcript().len(), 3);
        assert_eq!(c.transcript()[2].role, Role::Assistant);
        assert!(c.transcript()[2].content.contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_credential_warns_without_append() {
        let mut c = controller();
        let factory = answer_factory("never used");
        let before = c.transcript().len();
        let outcome = c
            .run_turn(&factory, None, "llama-3.3-70b-versatile", "q", None)
            .await;
        match outcome {
            TurnOutcome::Warned(w) => assert_eq!(w, MISSING_KEY_WARNING),
            other => panic!("Expected Warned, got {:?}", other),
        }
        assert_eq!(c.transcript().len(), before);

        // 空白凭证同样视为缺失
        let outcome = c
            .run_turn(&factory, Some("   ".into()), "llama-3.3-70b-versatile", "q", None)
            .await;
        assert!(matches!(outcome, TurnOutcome::Warned(_)));
        assert_eq!(c.transcript().len(), before);
    }

    #[tokio::test]
    async fn test_deprecation_failure_adds_model_switch_hint() {
        let mut c = controller();
        let factory = MockFactory {
            behavior: Behavior::InvokeFails(AgentError::Llm(
                "model llama-x has been decommissioned".into(),
            )),
        };
        let outcome = c
            .run_turn(&factory, Some("gsk_key".into()), "llama-x", "q", None)
            .await;
        let TurnOutcome::Failed(text) = outcome else {
            panic!("Expected Failed");
        };
        assert!(text.contains("decommissioned"));
        assert!(text.contains(MODEL_SWITCH_HINT));
        assert_eq!(c.transcript().last().unwrap().content, text);
    }

    #[tokio::test]
    async fn test_plain_failure_has_no_hint() {
        let mut c = controller();
        let factory = MockFactory {
            behavior: Behavior::InvokeFails(AgentError::Llm("connection refused".into())),
        };
        let outcome = c
            .run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
            .await;
        let TurnOutcome::Failed(text) = outcome else {
            panic!("Expected Failed");
        };
        assert!(!text.contains(MODEL_SWITCH_HINT));
    }

    #[tokio::test]
    async fn test_missing_output_uses_fixed_generic_text() {
        let mut c = controller();
        let factory = MockFactory {
            behavior: Behavior::Reply(None),
        };
        let outcome = c
            .run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
            .await;
        assert_eq!(outcome, TurnOutcome::Failed(NO_OUTPUT_MESSAGE.to_string()));
        assert_eq!(c.transcript().last().unwrap().content, NO_OUTPUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_construction_failure_is_failed_turn() {
        let mut c = controller();
        let factory = MockFactory {
            behavior: Behavior::ConstructionFails,
        };
        let outcome = c
            .run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
            .await;
        let TurnOutcome::Failed(text) = outcome else {
            panic!("Expected Failed");
        };
        assert!(text.contains("bad credential"));
        assert_eq!(c.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_reset_restores_seed_greeting() {
        let mut c = controller();
        let factory = answer_factory("a");
        for _ in 0..3 {
            c.run_turn(&factory, Some("gsk_key".into()), "llama-3.3-70b-versatile", "q", None)
                .await;
        }
        assert_eq!(c.transcript().len(), 7);
        c.reset();
        assert_eq!(c.transcript().len(), 1);
        assert_eq!(c.transcript()[0].content, GREETING);
        assert_eq!(c.transcript()[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_concrete_entanglement_scenario() {
        let mut c = controller();
        let factory = answer_factory("Quantum entanglement is a phenomenon where particles share state.");
        let outcome = c
            .run_turn(
                &factory,
                Some("gsk_key".into()),
                "llama-3.3-70b-versatile",
                "What is quantum entanglement?",
                None,
            )
            .await;
        assert!(matches!(outcome, TurnOutcome::Answered(_)));

        let msgs = c.transcript();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::Assistant);
        assert!(msgs[0].content.starts_with("Hi, I'm a knowledge assistant"));
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "What is quantum entanglement?");
        assert_eq!(msgs[2].role, Role::Assistant);
        assert!(msgs[2].content.starts_with("Quantum entanglement is"));
    }
}
