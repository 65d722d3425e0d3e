//! 会话记忆：转录（Message 序列）；无跨会话持久化

pub mod transcript;

pub use transcript::{Message, Role, Transcript};
