//! 通用网页搜索工具（DuckDuckGo HTML 端点）
//!
//! 抓取结果页，提取 result__snippet 片段并用 html2text 转可读文本；
//! 无片段标记时退化为整页提取。构建 HTTP 客户端可能失败，注册表据此降级为两工具集。

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::query_schema;
use crate::tools::{truncate_snippet, Tool};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
// 浏览器 UA，避免被站点识别为爬虫
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const SNIPPET_MARKER: &str = "result__snippet";

/// 网页搜索工具：query -> 搜索结果片段文本
pub struct WebSearchTool {
    client: Client,
    top_k: usize,
    max_chars: usize,
}

/// 从结果页 HTML 中切出最多 max 个 result__snippet 片段（含内部标签）
fn extract_snippet_fragments(html: &str, max: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut rest = html;
    while fragments.len() < max {
        let Some(marker) = rest.find(SNIPPET_MARKER) else {
            break;
        };
        let after = &rest[marker..];
        // 片段体从标记所在标签的 '>' 之后开始，到对应闭合 </a> / </span> 为止
        let Some(open_end) = after.find('>') else {
            break;
        };
        let body = &after[open_end + 1..];
        let end = body.find("</a>").or_else(|| body.find("</span>"));
        match end {
            Some(end) => {
                fragments.push(body[..end].to_string());
                rest = &body[end..];
            }
            None => break,
        }
    }
    fragments
}

/// HTML 片段转纯文本；失败或为空时返回 None
fn fragment_to_text(fragment: &str) -> Option<String> {
    match from_read(fragment.as_bytes(), 120) {
        Ok(text) => {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        Err(_) => None,
    }
}

impl WebSearchTool {
    /// 客户端构建失败返回 Err，由调用方决定是否降级
    pub fn new(timeout_secs: u64, top_k: usize, max_chars: usize) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("web search client init failed: {}", e))?;
        Ok(Self {
            client,
            top_k,
            max_chars,
        })
    }

    async fn fetch_results_page(&self, query: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("Web search request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.text()
            .await
            .map_err(|e| format!("Web search read body: {}", e))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "General-purpose web search for topics not covered by Wikipedia or arXiv. \
         Args: {\"query\": \"search terms\"}"
    }

    fn parameters_schema(&self) -> Value {
        query_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        tracing::info!(query = %query, "web search tool");

        let html = self.fetch_results_page(query).await?;
        let snippets: Vec<String> = extract_snippet_fragments(&html, self.top_k)
            .iter()
            .filter_map(|f| fragment_to_text(f))
            .collect();

        let text = if snippets.is_empty() {
            // 页面结构变化时的退路：整页提取
            fragment_to_text(&html).unwrap_or_default()
        } else {
            snippets.join("\n\n")
        };

        if text.is_empty() {
            return Ok(format!("No web results for \"{}\"", query));
        }
        Ok(truncate_snippet(&text, self.max_chars))
    }
}
