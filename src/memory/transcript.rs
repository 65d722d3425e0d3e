//! 会话转录：有序、只追加的消息序列
//!
//! 新会话以一条 assistant 问候语为种子；每个完成的回合追加 user + assistant 各一条，
//! 已有条目永不丢失或重排；reset 恢复为仅种子一条。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致；System 仅用于 LLM 上下文，不进入转录）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 会话转录：种子问候 + 历次回合的 user/assistant 对
#[derive(Clone, Debug)]
pub struct Transcript {
    greeting: String,
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let messages = vec![Message::assistant(greeting.clone())];
        Self { greeting, messages }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 恢复为仅种子问候一条，与会话刚建立时完全一致
    pub fn reset(&mut self) {
        self.messages = vec![Message::assistant(self.greeting.clone())];
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
