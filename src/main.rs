//! Owl - Rust 知识问答智能体
//!
//! 入口：初始化日志、创建会话编排器与 TUI，并运行主循环。
//! 凭证从 GROQ_API_KEY 环境变量读取，模型由 config/default.toml 固定。

use anyhow::Context;
use owl::{core::create_session, ui::run_app};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    // 创建会话运行时：返回命令发送端与状态接收端
    let (cmd_tx, state_rx) = create_session(None)
        .await
        .context("Failed to create session")?;

    // 启动 TUI 主循环（消费 state，向 cmd_tx 发送用户命令）
    run_app(state_rx, cmd_tx).await.context("App run failed")?;

    Ok(())
}
