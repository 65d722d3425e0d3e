//! 认知层：模板仓库、Planner（输出解析）、ReAct 主循环与过程事件

pub mod events;
pub mod loop_;
pub mod planner;
pub mod templates;

pub use events::AgentEvent;
pub use loop_::{react_loop, ReactResult};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
pub use templates::{fetch_template, render_template, REACT_TEMPLATE_NAME};
