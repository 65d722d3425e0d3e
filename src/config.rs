//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `OWL__*` 覆盖（双下划线表示嵌套，如 `OWL__LLM__MODEL=...`）。
//! API Key 不放进 TOML，统一走 `GROQ_API_KEY` 环境变量（Web 前端可按回合覆盖）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名与会话种子问候语
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 会话转录的种子消息（assistant 角色），清空会话后恢复为仅此一条
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            greeting: default_greeting(),
        }
    }
}

fn default_greeting() -> String {
    "Hi, I'm a knowledge assistant who can search Wikipedia and Arxiv. \
     How can I help you learn something new?"
        .to_string()
}

/// [llm] 段：Groq 端点、模型与推理循环参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI 兼容端点；默认 Groq
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 低随机性，利于答案可复现
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// ReAct 循环的最大 think/act 轮数，超过即显式失败
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 可选：直接在配置中给 Key（通常留空，走 GROQ_API_KEY）
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            request_timeout_secs: default_request_timeout(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_iterations() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    60
}

/// [tools] 段：检索工具的结果条数与摘要长度上限、HTTP 超时、是否注册网页搜索
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 每个检索后端最多取几条结果
    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,
    /// 单次工具返回内容的最大字符数，超出截断并追加 ...[truncated]
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    /// TUI 变体默认注册第三个通用网页搜索工具；Web 变体不注册
    #[serde(default = "default_enable_web_search")]
    pub enable_web_search: bool,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            top_k_results: default_top_k_results(),
            max_snippet_chars: default_max_snippet_chars(),
            timeout_secs: default_tool_timeout_secs(),
            enable_web_search: default_enable_web_search(),
        }
    }
}

fn default_top_k_results() -> usize {
    1
}

fn default_max_snippet_chars() -> usize {
    200
}

fn default_tool_timeout_secs() -> u64 {
    15
}

fn default_enable_web_search() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 OWL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 OWL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("OWL")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 每回合读取一次的凭证：配置中的 api_key 优先，否则 GROQ_API_KEY 环境变量；空串视同缺失
pub fn credential_from_env(cfg: &AppConfig) -> Option<String> {
    cfg.llm
        .api_key
        .clone()
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_agent_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.max_iterations, 5);
        assert!((cfg.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.tools.top_k_results, 1);
        assert_eq!(cfg.tools.max_snippet_chars, 200);
        assert!(cfg.llm.base_url.contains("groq"));
    }

    #[test]
    fn test_greeting_seed_nonempty() {
        let cfg = AppConfig::default();
        assert!(cfg.app.greeting.contains("Wikipedia"));
    }

    #[test]
    fn test_credential_prefers_config_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("gsk_test".to_string());
        assert_eq!(credential_from_env(&cfg).as_deref(), Some("gsk_test"));

        cfg.llm.api_key = Some("   ".to_string());
        // 空白 Key 视同缺失（GROQ_API_KEY 未设置时）
        if std::env::var("GROQ_API_KEY").is_err() {
            assert!(credential_from_env(&cfg).is_none());
        }
    }
}
