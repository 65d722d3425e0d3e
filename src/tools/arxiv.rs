//! Arxiv 论文检索工具
//!
//! 调用 arXiv export API（Atom feed），quick-xml 事件流解析 entry 的
//! published / title / author / summary；结果条数与长度受配置限制。

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde_json::Value;

use crate::tools::registry::query_schema;
use crate::tools::{truncate_snippet, Tool};

const API_ENDPOINT: &str = "https://export.arxiv.org/api/query";
const USER_AGENT: &str = "owl-knowledge-agent/0.1 (https://github.com/owl-team/owl)";

/// Arxiv 工具：query -> "Published/Title/Authors/Summary" 摘要块
pub struct ArxivTool {
    client: Client,
    top_k: usize,
    max_chars: usize,
}

/// Atom feed 中的单条论文
#[derive(Debug, Default, Clone)]
pub(crate) struct ArxivEntry {
    pub published: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
}

impl ArxivEntry {
    fn render(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published,
            normalize_ws(&self.title),
            self.authors.join(", "),
            normalize_ws(&self.summary),
        )
    }
}

/// 压平换行与连续空白（Atom 的 title/summary 带换行缩进）
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 解析 Atom feed，取最多 max 条 entry
pub(crate) fn parse_atom_entries(xml: &str, max: usize) -> Result<Vec<ArxivEntry>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries: Vec<ArxivEntry> = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut in_author = false;
    // 当前正在收集文本的字段名（title/summary/published/name）
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"entry" => current = Some(ArxivEntry::default()),
                b"author" if current.is_some() => in_author = true,
                b"title" if current.is_some() => field = Some("title"),
                b"summary" if current.is_some() => field = Some("summary"),
                b"published" if current.is_some() => field = Some("published"),
                b"name" if in_author => field = Some("name"),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let decoded = t
                        .decode()
                        .map_err(|e| format!("Atom text decode failed: {}", e))?;
                    let text = quick_xml::escape::unescape(&decoded)
                        .map_err(|e| format!("Atom text decode failed: {}", e))?
                        .into_owned();
                    match f {
                        "title" => entry.title.push_str(&text),
                        "summary" => entry.summary.push_str(&text),
                        "published" => entry.published.push_str(&text),
                        "name" => entry.authors.push(text.trim().to_string()),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                        if entries.len() >= max {
                            break;
                        }
                    }
                }
                b"author" => in_author = false,
                b"title" | b"summary" | b"published" | b"name" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Atom parse failed: {}", e)),
            _ => {}
        }
    }

    Ok(entries)
}

impl ArxivTool {
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

    async fn fetch_feed(&self, query: &str) -> Result<String, String> {
        let search_query = format!("all:{}", query);
        self.client
            .get(API_ENDPOINT)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", &self.top_k.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("Arxiv request failed: {}", e))?
            .text()
            .await
            .map_err(|e| format!("Arxiv response read failed: {}", e))
    }
}

#[async_trait]
impl Tool for ArxivTool {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "Search arXiv for academic papers and preprints (science, math, CS research). \
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
        tracing::info!(query = %query, "arxiv tool search");

        let feed = self.fetch_feed(query).await?;
        let entries = parse_atom_entries(&feed, self.top_k)?;
        if entries.is_empty() {
            return Ok(format!("No arXiv results for \"{}\"", query));
        }

        let blocks: Vec<String> = entries.iter().map(ArxivEntry::render).collect();
        Ok(truncate_snippet(&blocks.join("\n\n"), self.max_chars))
    }
}
