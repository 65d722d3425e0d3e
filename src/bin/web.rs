//! Owl Web UI
//!
//! 启动: cargo run --bin owl-web --features web
//! 浏览器访问 http://127.0.0.1:8080
//!
//! Web 变体：侧栏输入 API Key（掩码、按回合读取、不落盘）、模型选择器（带推荐默认）、
//! 清空会话 / 清空工具缓存按钮；回合内通过 NDJSON 流推送中间推理步骤。
//! 工具集为两工具（wikipedia + arxiv），与 TUI 变体共用进程级缓存。

#![cfg(feature = "web")]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use owl::agent::KnowledgeAgentFactory;
use owl::config::{credential_from_env, load_config, AppConfig};
use owl::core::{TurnController, TurnOutcome};
use owl::llm::{default_model_id, model_catalog, ModelInfo};
use owl::memory::Message;
use owl::react::AgentEvent;
use owl::tools::clear_tool_cache;

struct AppState {
    config: AppConfig,
    factory: KnowledgeAgentFactory,
    /// session_id -> 会话回合控制器；回合期间从表中取出，收尾后放回（同会话串行）
    sessions: RwLock<HashMap<String, TurnController>>,
    models: Vec<ModelInfo>,
}

impl AppState {
    fn new_controller(&self) -> TurnController {
        TurnController::new(self.config.app.greeting.clone(), self.config.llm.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    /// 可切换模型：缺省用目录中的推荐默认
    #[serde(default)]
    model_id: Option<String>,
    /// 掩码输入的 Key；缺省回退到 GROQ_API_KEY 环境变量
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: String,
    description: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    let config = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    // Web 变体：两工具集（不注册网页搜索）
    let factory = KnowledgeAgentFactory::new(config.llm.clone(), config.tools.clone(), false);
    let setup = factory.tool_setup();
    tracing::info!(tools = ?setup.registry.tool_names(), "tool registry ready");

    let state = Arc::new(AppState {
        config,
        factory,
        sessions: RwLock::new(HashMap::new()),
        models: model_catalog(),
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/api/chat/stream", post(api_chat_stream))
        .route("/api/history", get(api_history))
        .route("/api/session/clear", post(api_session_clear))
        .route("/api/cache/clear", post(api_cache_clear))
        .route("/api/models", get(api_models))
        .route("/api/tools", get(api_tools))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state);

    let addr = "127.0.0.1:8080";
    tracing::info!("owl-web listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// POST /api/chat/stream：NDJSON 流
///
/// 第一行 {"type":"session_id",...}，随后是 ReAct 过程事件，最后一行
/// {"type":"turn","outcome":"answered|failed|warned","text":...}。
async fn api_chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let model_id = req
        .model_id
        .filter(|m| !m.is_empty())
        .unwrap_or_else(default_model_id);
    // 凭证按回合读取：请求里的掩码输入优先，否则回退环境变量默认
    let credential = req
        .api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| credential_from_env(&state.config));

    // 取出会话控制器（同会话的回合严格串行）
    let mut controller = {
        let mut sessions = state.sessions.write().await;
        sessions
            .remove(&session_id)
            .unwrap_or_else(|| state.new_controller())
    };

    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    let state_spawn = Arc::clone(&state);
    let session_id_spawn = session_id.clone();
    tokio::spawn(async move {
        let _ = line_tx.send(format!(
            "{}\n",
            serde_json::json!({"type": "session_id", "session_id": session_id_spawn})
        ));

        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<AgentEvent>();
        let line_tx_fwd = line_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(ev) = ev_rx.recv().await {
                if let Ok(json) = serde_json::to_string(&ev) {
                    let _ = line_tx_fwd.send(format!("{}\n", json));
                }
            }
        });

        let outcome = controller
            .run_turn(
                &state_spawn.factory,
                credential,
                &model_id,
                &message,
                Some(&ev_tx),
            )
            .await;
        drop(ev_tx);
        let _ = forward.await;

        let (kind, text) = match &outcome {
            TurnOutcome::Answered(t) => ("answered", t.clone()),
            TurnOutcome::Failed(t) => ("failed", t.clone()),
            TurnOutcome::Warned(t) => ("warned", t.clone()),
        };
        let _ = line_tx.send(format!(
            "{}\n",
            serde_json::json!({
                "type": "turn",
                "outcome": kind,
                "text": text,
                "history_len": controller.transcript().len(),
            })
        ));

        // 回合收尾，放回会话表
        state_spawn
            .sessions
            .write()
            .await
            .insert(session_id_spawn, controller);
    });

    let body_stream = stream::unfold(line_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|line| (Ok::<Bytes, Infallible>(Bytes::from(line)), rx))
    });

    let mut res = Response::new(Body::from_stream(body_stream));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        "application/x-ndjson; charset=utf-8"
            .parse()
            .expect("static header value"),
    );
    Ok(res)
}

/// GET /api/history?session_id=...：当前转录（会话不存在时即种子问候）
async fn api_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
) -> Json<HistoryResponse> {
    let sessions = state.sessions.read().await;
    let messages = sessions
        .get(&params.session_id)
        .map(|c| c.transcript().to_vec())
        .unwrap_or_else(|| state.new_controller().transcript().to_vec());
    Json(HistoryResponse {
        session_id: params.session_id,
        messages,
    })
}

/// POST /api/session/clear：转录恢复为种子问候
async fn api_session_clear(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Json<HistoryResponse> {
    let mut sessions = state.sessions.write().await;
    let controller = sessions
        .entry(params.session_id.clone())
        .or_insert_with(|| state.new_controller());
    controller.reset();
    Json(HistoryResponse {
        session_id: params.session_id,
        messages: controller.transcript().to_vec(),
    })
}

/// POST /api/cache/clear：工具缓存显式失效，下个回合重建
async fn api_cache_clear(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    clear_tool_cache();
    let setup = state.factory.tool_setup();
    Json(serde_json::json!({
        "ok": true,
        "tools": setup.registry.tool_names(),
        "notice": setup.notice,
    }))
}

async fn api_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelInfo>> {
    Json(state.models.clone())
}

async fn api_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    let setup = state.factory.tool_setup();
    let tools = setup
        .registry
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
        })
        .collect();
    Json(tools)
}
