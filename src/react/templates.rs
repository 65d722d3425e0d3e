//! 提示词模板仓库
//!
//! 按众所周知的名称取固定指令模板：优先读 config/prompts/{name}.txt（便于部署替换），
//! "react" 有内置兜底；未知名称是构建期错误。模板占位符 {tools} / {tool_names} /
//! {tool_call_schema} 在 Agent 构建时渲染。

use crate::core::AgentError;
use crate::tools::{tool_call_schema_json, ToolRegistry};

/// 默认模板名；Agent 工厂固定取这个
pub const REACT_TEMPLATE_NAME: &str = "react";

const BUILTIN_REACT_TEMPLATE: &str = r#"You are a knowledge assistant that answers questions by consulting external knowledge sources.

Available tools:
{tools}

To consult a tool, reply with a single JSON object and nothing else:
{"tool": "<one of: {tool_names}>", "args": {"query": "<search terms>"}}

The JSON must conform to this schema:
{tool_call_schema}

After each observation you may consult another tool, or, once you know enough,
reply with the final answer as plain text (no JSON). Keep answers concise and
grounded in the observations you gathered."#;

/// 从某个模板目录读取 {name}.txt；不存在或不可读返回 None
fn read_template_from(dir: &std::path::Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(format!("{}.txt", name))).ok()
}

/// 取名为 name 的指令模板；磁盘文件优先，"react" 回退到内置，其余名称报错
pub fn fetch_template(name: &str) -> Result<String, AgentError> {
    let dirs = [
        std::path::Path::new("config/prompts"),
        std::path::Path::new("../config/prompts"),
    ];
    if let Some(text) = dirs.iter().find_map(|d| read_template_from(d, name)) {
        return Ok(text);
    }
    if name == REACT_TEMPLATE_NAME {
        return Ok(BUILTIN_REACT_TEMPLATE.to_string());
    }
    Err(AgentError::TemplateNotFound(name.to_string()))
}

/// 渲染模板：替换 {tools}（逐行 name: description）、{tool_names}、{tool_call_schema}
pub fn render_template(template: &str, registry: &ToolRegistry) -> String {
    let tool_lines: Vec<String> = registry
        .tools()
        .iter()
        .map(|t| format!("- {}: {}", t.name(), t.description()))
        .collect();
    let names = registry.tool_names().join(", ");

    template
        .replace("{tools}", &tool_lines.join("\n"))
        .replace("{tool_names}", &names)
        .replace("{tool_call_schema}", &tool_call_schema_json())
}
