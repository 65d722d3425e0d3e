//! Wikipedia 检索工具
//!
//! 两步：MediaWiki search API 找条目标题，再取条目首段纯文本摘要；
//! 结果条数与摘要长度受配置限制（默认 1 条 / 200 字符）。后端失败原样上抛为
//! Err 字符串，由 ReAct 循环转为 Observation，不在此层重试。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::query_schema;
use crate::tools::{truncate_snippet, Tool};

const API_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = "owl-knowledge-agent/0.1 (https://github.com/owl-team/owl)";

/// Wikipedia 工具：query -> "Page: 标题\nSummary: 首段摘要"
pub struct WikipediaTool {
    client: Client,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaTool {
    pub fn new(timeout_secs: u64, top_k: usize, max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            top_k,
            max_chars,
        }
    }

    /// 第一步：全文搜索，返回最多 top_k 个条目标题
    async fn search_titles(&self, query: &str) -> Result<Vec<String>, String> {
        let resp: Value = self
            .client
            .get(API_ENDPOINT)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("format", "json"),
                ("srlimit", &self.top_k.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("Wikipedia request failed: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Wikipedia response parse failed: {}", e))?;

        let titles = resp["query"]["search"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|h| h["title"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(titles)
    }

    /// 第二步：取条目首段纯文本（extracts + exintro + explaintext）
    async fn fetch_summary(&self, title: &str) -> Result<Option<String>, String> {
        let resp: Value = self
            .client
            .get(API_ENDPOINT)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("format", "json"),
                ("titles", title),
            ])
            .send()
            .await
            .map_err(|e| format!("Wikipedia request failed: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Wikipedia response parse failed: {}", e))?;

        // pages 以 pageid 为键，取第一个带 extract 的页面
        let extract = resp["query"]["pages"]
            .as_object()
            .and_then(|pages| {
                pages
                    .values()
                    .find_map(|p| p["extract"].as_str().map(String::from))
            })
            .filter(|s| !s.trim().is_empty());
        Ok(extract)
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for encyclopedia articles (general knowledge, history, concepts). \
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
        tracing::info!(query = %query, "wikipedia tool search");

        let titles = self.search_titles(query).await?;
        if titles.is_empty() {
            return Ok(format!("No Wikipedia results for \"{}\"", query));
        }

        let mut sections = Vec::new();
        for title in titles {
            if let Some(summary) = self.fetch_summary(&title).await? {
                let summary = summary.split_whitespace().collect::<Vec<_>>().join(" ");
                sections.push(format!("Page: {}\nSummary: {}", title, summary));
            }
        }
        if sections.is_empty() {
            return Ok(format!("No Wikipedia results for \"{}\"", query));
        }

        Ok(truncate_snippet(&sections.join("\n\n"), self.max_chars))
    }
}
