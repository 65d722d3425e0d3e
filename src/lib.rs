//! Owl - Rust 知识问答智能体
//!
//! 模块划分：
//! - **agent**: Agent 工厂（每轮构建 Groq 客户端 + ReAct 循环，AgentRunner/AgentFactory 接缝）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、回合控制（Turn Controller 状态机）、会话编排、UI 状态投影
//! - **llm**: LLM 客户端抽象与实现（Groq / Mock）与模型目录
//! - **memory**: 会话转录（role + content 的有序消息序列）
//! - **react**: 提示词模板仓库、LLM 输出解析、ReAct 主循环与过程事件
//! - **tools**: 检索工具（wikipedia、arxiv、web_search）、注册表与进程级缓存
//! - **ui**: Ratatui TUI 界面

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod react;
pub mod tools;
pub mod ui;
