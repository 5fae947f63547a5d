//! 界面渲染
//!
//! 左侧为对话区（按角色着色、长内容折叠、按宽度换行），右侧为记忆面板（短期 / 长期），
//! 底部为输入框；存在待确认写入时在中央绘制确认浮层，importance >= 8 时标记 CRITICAL。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
    Frame,
};

use crate::core::{AgentPhase, UiState};
use crate::memory::{MemoryRecord, Role};
use crate::tools::PendingWrite;

/// 单条消息在 UI 中显示的最大字符数
const MAX_DISPLAY_CHARS: usize = 600;
/// 工具输出的显示上限
const MAX_TOOL_DISPLAY_CHARS: usize = 280;

/// 对过长内容做折叠：保留前 N 字 + 省略提示
fn truncate_for_display(content: &str, role: Role) -> String {
    let limit = if role == Role::Tool {
        MAX_TOOL_DISPLAY_CHARS
    } else {
        MAX_DISPLAY_CHARS
    };
    let count = content.chars().count();
    if count <= limit {
        return content.to_string();
    }
    let head: String = content.chars().take(limit).collect();
    format!("{}\n... [truncated, {} chars]", head, count)
}

/// 将内容按宽度换行，按字符计数，避免在 UTF-8 中间截断
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
        lines.push(line);
    }
    lines
}

fn phase_label(state: &UiState) -> String {
    match &state.phase {
        AgentPhase::Idle => "空闲".to_string(),
        AgentPhase::Thinking => "思考中…".to_string(),
        AgentPhase::ToolExecuting => state
            .active_tool
            .as_deref()
            .map(|t| format!("执行: {}", t))
            .unwrap_or_else(|| "执行中…".to_string()),
        AgentPhase::AwaitingConfirmation => "等待确认".to_string(),
    }
}

fn role_style(role: Role) -> (&'static str, Color) {
    match role {
        Role::User => ("You ", Color::Cyan),
        Role::Model => ("AI  ", Color::Green),
        Role::System => ("Sys ", Color::Gray),
        Role::Tool => ("Out ", Color::Magenta),
    }
}

/// 绘制一帧；title 为对话区标题（取自 app.name），将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    title: &str,
    state: &UiState,
    input_buffer: &str,
    conversation_scroll: usize,
    out: &mut (usize, usize),
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(f.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(rows[0]);

    *out = draw_conversation(f, columns[0], title, state, conversation_scroll);
    draw_memory_panel(f, columns[1], state);
    draw_input(f, rows[1], state, input_buffer);

    if let Some(pending) = &state.pending {
        draw_confirmation(f, pending);
    }
}

fn draw_conversation(
    f: &mut Frame,
    area: Rect,
    title: &str,
    state: &UiState,
    conversation_scroll: usize,
) -> (usize, usize) {
    let block = Block::default()
        .title(format!(" {} │ {} ", title, phase_label(state)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    // 边框 + 滚动条
    let content_width = area.width.saturating_sub(3) as usize;

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, turn) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(""));
        }
        let (prefix, color) = role_style(turn.role);
        let display_text = truncate_for_display(&turn.text, turn.role);
        let wrapped = wrap_text(&display_text, content_width.saturating_sub(4).max(20));
        for (i, line) in wrapped.into_iter().enumerate() {
            let pref = if i == 0 { prefix } else { "    " };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }

    let content_height = area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    (total_lines, content_height)
}

fn memory_items(records: &[MemoryRecord], empty: &str) -> Vec<ListItem<'static>> {
    if records.is_empty() {
        return vec![ListItem::new(Span::styled(
            empty.to_string(),
            Style::default().fg(Color::DarkGray),
        ))];
    }
    records
        .iter()
        .map(|r| {
            let tags = r.tags.iter().cloned().collect::<Vec<_>>().join(",");
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("[{:>2}] ", r.importance),
                    Style::default().fg(if r.importance >= 8 {
                        Color::Red
                    } else {
                        Color::Yellow
                    }),
                ),
                Span::raw(r.content.clone()),
                Span::styled(format!(" #{}", tags), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect()
}

fn draw_memory_panel(f: &mut Frame, area: Rect, state: &UiState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let short_term = List::new(memory_items(&state.short_term, "(empty)")).block(
        Block::default()
            .title(format!(" Short-term ({}) ", state.short_term.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(short_term, parts[0]);

    let long_term = List::new(memory_items(&state.long_term, "(no records)")).block(
        Block::default()
            .title(format!(" Long-term ({}) ", state.long_term.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );
    f.render_widget(long_term, parts[1]);
}

fn draw_input(f: &mut Frame, area: Rect, state: &UiState, input_buffer: &str) {
    let title = if let Some(err) = &state.error_message {
        format!(" 错误: {} ", err.chars().take(48).collect::<String>())
    } else if state.pending.is_some() {
        " Awaiting confirmation... ".to_string()
    } else if state.input_locked {
        " 等待回复… ".to_string()
    } else {
        " 输入 ".to_string()
    };
    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };
    let hint = if state.pending.is_some() {
        " y 授权 │ n 拒绝 │ Ctrl+Q 退出 "
    } else {
        " Enter 发送 │ ↑↓ PgUp/PgDn 滚动 │ Ctrl+Q 退出 "
    };

    let input_block = Block::default()
        .title(title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
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
    f.render_widget(input, area);
}

/// 居中矩形（百分比）
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_confirmation(f: &mut Frame, pending: &PendingWrite) {
    let area = centered_rect(60, 40, f.area());
    let critical = pending.is_critical();
    let accent = if critical { Color::Red } else { Color::Yellow };

    let mut lines = vec![Line::from(vec![
        Span::styled("Importance: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("{}/10", pending.importance),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            if critical { "  CRITICAL" } else { "" },
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    ])];
    lines.push(Line::from(""));
    lines.push(Line::from(Span::raw(pending.content.clone())));
    if !pending.tags.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            pending
                .tags
                .iter()
                .map(|t| format!("#{t}"))
                .collect::<Vec<_>>()
                .join(" "),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .title(" Memory write requested ")
        .title_bottom(Line::from(" [y] AUTHORIZE  [n] REJECT "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}
