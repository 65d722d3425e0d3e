//! 模型目录：Web 前端的可选模型列表
//!
//! 与 Groq 当前在线的模型对齐；recommended 标记默认选项。模型下线（deprecated /
//! decommissioned）时由 Turn Controller 的错误提示引导用户换选。

use serde::Serialize;

/// 单个可选模型：id 为请求用标识，label 为展示名
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub label: String,
    pub recommended: bool,
}

/// 可选模型列表（顺序即展示顺序，recommended 在首位）
pub fn model_catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "llama-3.3-70b-versatile".to_string(),
            label: "Llama 3.3 70B (Recommended)".to_string(),
            recommended: true,
        },
        ModelInfo {
            id: "llama-3.1-8b-instant".to_string(),
            label: "Llama 3.1 8B (Faster)".to_string(),
            recommended: false,
        },
        ModelInfo {
            id: "qwen/qwen3-32b".to_string(),
            label: "Qwen 3 32B".to_string(),
            recommended: false,
        },
    ]
}

/// 默认模型 id（目录中标记 recommended 的那个）
pub fn default_model_id() -> String {
    model_catalog()
        .into_iter()
        .find(|m| m.recommended)
        .map(|m| m.id)
        .unwrap_or_else(|| "llama-3.3-70b-versatile".to_string())
}
