//! 工具集的进程级缓存
//!
//! 工具列表构建一次、整个进程生命周期内复用（跨回合、Web 变体下跨会话共享，只读）；
//! clear_tool_cache 显式失效，下次取用时重建。首次构建之后传入的配置差异不再生效，
//! 这是有意的 memoize 语义。

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::config::ToolsSection;
use crate::tools::{ArxivTool, ToolRegistry, WebSearchTool, WikipediaTool};

/// 构建完成的工具集：注册表 + 可选的降级提示（web_search 初始化失败时）
pub struct ToolSetup {
    pub registry: Arc<ToolRegistry>,
    pub notice: Option<String>,
}

static TOOL_CACHE: Lazy<RwLock<Option<Arc<ToolSetup>>>> = Lazy::new(|| RwLock::new(None));

/// 构建工具集（不经缓存）：wikipedia + arxiv，可选 web_search。
/// web_search 后端初始化失败时降级为两工具集，并记录非致命提示。
pub fn build_tools(cfg: &ToolsSection, with_web_search: bool) -> ToolSetup {
    let mut registry = ToolRegistry::new();
    registry.register(WikipediaTool::new(
        cfg.timeout_secs,
        cfg.top_k_results,
        cfg.max_snippet_chars,
    ));
    registry.register(ArxivTool::new(
        cfg.timeout_secs,
        cfg.top_k_results,
        cfg.max_snippet_chars,
    ));

    let mut notice = None;
    if with_web_search {
        match WebSearchTool::new(cfg.timeout_secs, cfg.top_k_results, cfg.max_snippet_chars) {
            Ok(tool) => registry.register(tool),
            Err(e) => {
                tracing::warn!(error = %e, "web search unavailable, degrading to two tools");
                notice = Some(format!(
                    "Web search is unavailable ({}); continuing with Wikipedia and arXiv only.",
                    e
                ));
            }
        }
    }

    ToolSetup {
        registry: Arc::new(registry),
        notice,
    }
}

/// 取进程级缓存的工具集；首次调用时构建并缓存
pub fn cached_tools(cfg: &ToolsSection, with_web_search: bool) -> Arc<ToolSetup> {
    if let Ok(guard) = TOOL_CACHE.read() {
        if let Some(setup) = guard.as_ref() {
            return Arc::clone(setup);
        }
    }

    let mut guard = match TOOL_CACHE.write() {
        Ok(g) => g,
        // 锁中毒时不缓存，直接返回新构建的工具集
        Err(_) => return Arc::new(build_tools(cfg, with_web_search)),
    };
    if let Some(setup) = guard.as_ref() {
        return Arc::clone(setup);
    }
    let setup = Arc::new(build_tools(cfg, with_web_search));
    *guard = Some(Arc::clone(&setup));
    setup
}

/// 显式失效：清空缓存，下次 cached_tools 重建
pub fn clear_tool_cache() {
    if let Ok(mut guard) = TOOL_CACHE.write() {
        *guard = None;
    }
}
