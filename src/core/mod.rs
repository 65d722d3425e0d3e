//! 核心层：错误类型、回合状态机（Turn Controller）、会话编排与 UI 状态投影

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod turn;

pub use error::AgentError;
pub use orchestrator::{create_session, Command};
pub use state::{AgentPhase, StepEntry, UiState};
pub use turn::{TurnController, TurnOutcome, MISSING_KEY_WARNING, MODEL_SWITCH_HINT, NO_OUTPUT_MESSAGE};
