//! 界面渲染
//!
//! 根据 UiState（phase、history、steps、告警）与 input_buffer 绘制：标题栏显示 phase
//! 与工具降级提示，主体为对话历史（按角色着色、按宽度换行），可选的中间步骤面板
//! （Ctrl+T 折叠/展开），底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{AgentPhase, UiState};
use crate::memory::Role;

/// 单条消息在 UI 中显示的最大字符数；过长内容折叠，避免刷屏
const MAX_DISPLAY_CHARS: usize = 600;
/// 步骤面板每行 detail 的显示上限
const MAX_STEP_DETAIL_CHARS: usize = 120;
/// 步骤面板高度（含边框）
const STEPS_PANE_HEIGHT: u16 = 8;

/// 对过长内容做折叠：保留前 N 字 + 省略提示
fn truncate_for_display(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= MAX_DISPLAY_CHARS {
        return content.to_string();
    }
    let head: String = chars.iter().take(MAX_DISPLAY_CHARS).collect();
    format!("{}\n... [内容已省略，共 {} 字]", head, chars.len())
}

/// 将内容按宽度换行，按字符数避免在 UTF-8 中间截断
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// 绘制一帧：对话区（标题 + 历史 + 滚动条）、可选步骤面板、输入区；
/// 将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    state: &UiState,
    input_buffer: &str,
    conversation_scroll: usize,
    show_steps: bool,
    out: &mut (usize, usize),
) {
    let input_height = 5u16;
    let steps_visible = show_steps && !state.steps.is_empty();
    let constraints: Vec<Constraint> = if steps_visible {
        vec![
            Constraint::Min(5),
            Constraint::Length(STEPS_PANE_HEIGHT),
            Constraint::Length(input_height),
        ]
    } else {
        vec![Constraint::Min(5), Constraint::Length(input_height)]
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let phase_str: String = match &state.phase {
        AgentPhase::Idle => "空闲".to_string(),
        AgentPhase::Thinking => "思考中…".to_string(),
        AgentPhase::ToolExecuting => state
            .active_tool
            .as_deref()
            .map(|t| format!("检索: {}", t))
            .unwrap_or_else(|| "检索中…".to_string()),
        AgentPhase::Responding => "回复中".to_string(),
        AgentPhase::Error => "错误".to_string(),
    };

    let title = match &state.notice {
        Some(n) => format!(" Owl │ {} │ {} ", phase_str, n),
        None => format!(" Owl │ {} ", phase_str),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    // 构建对话内容：每条消息先截断过长内容，再按宽度换行；消息之间加空行分隔
    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, m) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = match m.role {
            Role::User => ("You ", Color::Cyan),
            Role::Assistant => ("Owl ", Color::Green),
            Role::System => ("Sys ", Color::Gray),
        };
        let display_text = truncate_for_display(&m.content);
        let wrapped = wrap_text(&display_text, content_width.max(40));
        for (i, line) in wrapped.into_iter().enumerate() {
            let pref = if i == 0 { prefix } else { "    " };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }

    let content_height = conv_area.height.saturating_sub(2) as usize; // 边框
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, conv_area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    // 中间步骤面板：最近几条，label 着色
    if steps_visible {
        let pane_height = STEPS_PANE_HEIGHT.saturating_sub(2) as usize;
        let start = state.steps.len().saturating_sub(pane_height);
        let step_lines: Vec<Line> = state.steps[start..]
            .iter()
            .map(|s| {
                let detail: String = s.detail.chars().take(MAX_STEP_DETAIL_CHARS).collect();
                Line::from(vec![
                    Span::styled(
                        format!("{} ", s.label),
                        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(detail),
                ])
            })
            .collect();
        let steps_block = Block::default()
            .title(" 推理步骤 (Ctrl+T 折叠) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let steps_para = Paragraph::new(Text::from(step_lines))
            .block(steps_block)
            .wrap(Wrap { trim: false });
        f.render_widget(steps_para, chunks[1]);
    }

    let input_area = chunks[chunks.len() - 1];

    let input_prompt = if let Some(w) = &state.warning {
        format!(" 告警: {} ", w.chars().take(48).collect::<String>())
    } else if state.input_locked {
        " 等待回复… ".to_string()
    } else {
        " 输入 ".to_string()
    };

    let border_color = if state.warning.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter 发送 │ ↑↓ PgUp/PgDn 滚动 │ Ctrl+T 步骤 │ Ctrl+L 清空会话 │ Ctrl+R 清缓存 │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .wrap(Wrap { trim: false })
        .style(if state.input_locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        });

    f.render_widget(input, input_area);

    out.0 = total_lines;
    out.1 = content_height;
}
