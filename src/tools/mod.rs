//! 工具箱：知识检索工具（wikipedia / arxiv / web_search）、注册表与进程级缓存

pub mod arxiv;
pub mod cache;
pub mod registry;
pub mod schema;
pub mod web_search;
pub mod wikipedia;

pub use arxiv::ArxivTool;
pub use cache::{build_tools, cached_tools, clear_tool_cache, ToolSetup};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

/// 统一的结果截断：超过 max 字符时截断并追加 ...[truncated]
pub(crate) fn truncate_snippet(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect::<String>() + "...[truncated]"
    } else {
        s.to_string()
    }
}
