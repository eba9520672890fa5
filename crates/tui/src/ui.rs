use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use spotter_core::logger::{COLOR_BLUE, COLOR_GRAY, COLOR_GREEN, COLOR_MAGENTA};
use spotter_core::scheduler::RunPhase;
use spotter_core::types::{HotkeyScope, Trigger};

use crate::App;
use crate::confirm::centered_rect;
use crate::form::{ActionForm, PathPrompt};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: banner, status, action list, help --

    let (banner_label, banner_bg) = match app.phase() {
        RunPhase::Running => ("RUNNING (Press S to stop)", Color::Green),
        RunPhase::Stopping => ("STOPPING...", Color::Yellow),
        RunPhase::Idle => ("IDLE (Press S to start)", Color::Red),
    };

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(8),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    // Full-width centered banner
    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    draw_status(f, app, left_chunks[1]);
    draw_actions(f, app, left_chunks[2]);
    draw_help(f, left_chunks[3]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    // -- Overlays --
    if let Some(form) = &app.form {
        draw_form(f, form);
    }
    if let Some(prompt) = &app.prompt {
        draw_prompt(f, prompt);
    }
    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

fn kv<'a>(key: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!(" {:<11}", key), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let region = match app.region_view {
        Some(r) => r.to_string(),
        None => "Full screen".to_string(),
    };
    let region = if app.region_capture.in_progress() { format!("{} (selecting...)", region) } else { region };

    let reference = match (&app.reference_size, &app.settings.reference) {
        (Some((w, h)), Some(path)) => format!("{} ({}x{})", path.display(), w, h),
        (Some((w, h)), None) => format!("{}x{}", w, h),
        _ => "None".to_string(),
    };

    let binding = app.hotkeys.binding();
    let scope = match app.hotkeys.scope() {
        HotkeyScope::Focused => "app window",
        HotkeyScope::Global => "global",
    };
    let capture_note = match app.hotkeys.capturing() {
        Some(t) => format!("  (press a key for {})", t.label()),
        None => String::new(),
    };
    let hotkeys = format!(
        "{}={}  {}={}  [{}]{}",
        Trigger::Toggle.label(),
        binding.key_for(Trigger::Toggle).to_uppercase(),
        Trigger::Action.label(),
        binding.key_for(Trigger::Action).to_uppercase(),
        scope,
        capture_note,
    );

    let cursor = app.cursor.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());

    let lines = vec![
        kv("Status", app.status.current().to_string(), Color::Cyan),
        kv("Similarity", format!("{}%", app.settings.similarity), Color::White),
        kv("Region", region, Color::White),
        kv("Image", reference, Color::White),
        kv("Hotkeys", hotkeys, Color::Yellow),
        kv("Cursor", cursor, Color::DarkGray),
    ];

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(panel, area);
}

fn draw_actions(f: &mut Frame, app: &App, area: Rect) {
    let header = Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(format!("   {:<4}{:<30}{:<14}{}", "#", "Action", "Position", "Delay"), header)),
        Line::from(Span::styled("   If image found:", Style::default().fg(Color::Magenta))),
    ];

    if app.sequence.is_empty() {
        lines.push(Line::from(Span::styled("   (no actions, press e to add one)", Style::default().fg(Color::DarkGray))));
    }

    for (i, item) in app.sequence.items().iter().enumerate() {
        let is_selected = i == app.selected;
        let prefix = if is_selected { "> " } else { "  " };
        let style = if is_selected {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(format!(" {:<4}", i + 1), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:<30}", truncate(&item.summary(), 29)), style),
            Span::styled(format!("{:<14}", item.position_label()), Style::default().fg(Color::Yellow)),
            Span::styled(item.delay_label(), Style::default().fg(Color::Cyan)),
        ]));
    }

    let list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .title(actions_title(app.sequence.len(), app.phase()))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(list, area);
}

/// Edits made while running apply from the next match on.
fn actions_title(count: usize, phase: RunPhase) -> String {
    match phase {
        RunPhase::Idle => format!(" Actions ({}) ", count),
        _ => format!(" Actions ({}, running) ", count),
    }
}

fn draw_help(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let lines = vec![
        Line::from(vec![
            key(" s"), Span::raw(" start/stop "),
            key("m"), Span::raw(" run once "),
            key("e"), Span::raw(" add "),
            key("x"), Span::raw(" delete "),
            key("w"), Span::raw("/"), key("o"), Span::raw(" save/load "),
            key("i"), Span::raw("/"), key("^v"), Span::raw("/"), key("c"), Span::raw(" image "),
        ]),
        Line::from(vec![
            key(" r"), Span::raw("/"), key("f"), Span::raw(" region/full "),
            key("[ ]"), Span::raw(" similarity "),
            key("t"), Span::raw("/"), key("a"), Span::raw(" set hotkeys "),
            key("h"), Span::raw(" scope "),
            key("l"), Span::raw(" logs "),
            key("q"), Span::raw(" quit"),
        ]),
    ];
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(help, area);
}

fn draw_form(f: &mut Frame, form: &ActionForm) {
    let fields = form.fields();
    let height = fields.len() as u16 + 6;
    let area = centered_rect(56, height, f.area());
    f.render_widget(Clear, area);

    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        format!(" {}", form.hint()),
        Style::default().fg(Color::DarkGray),
    ))];
    lines.push(Line::from(""));
    for field in fields {
        let focused = field == form.focus;
        let marker = if focused { ">" } else { " " };
        let value = if field == crate::form::Field::Kind {
            format!("< {} >", form.value(field))
        } else if focused {
            format!("{}_", form.value(field))
        } else {
            form.value(field).to_string()
        };
        let style = if focused {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{} {:<12}", marker, field.label()), Style::default().fg(Color::Yellow)),
            Span::styled(value, style),
        ]));
    }
    lines.push(Line::from(""));
    match &form.error {
        Some(e) => lines.push(Line::from(Span::styled(format!(" {}", e), Style::default().fg(Color::Red)))),
        None => lines.push(Line::from(Span::styled(
            " enter add  esc cancel  tab next  F2 cursor pos",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Add action ")
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(panel, area);
}

fn draw_prompt(f: &mut Frame, prompt: &PathPrompt) {
    let area = centered_rect(60, 3, f.area());
    f.render_widget(Clear, area);
    let input = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(format!("{}_", prompt.input), Style::default().fg(Color::White)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(prompt.purpose.title())
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(input, area);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line for TUI rendering.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        // Fallback for unstructured messages
        return Line::from(raw);
    }

    let level = parts[0];
    let prefix = parts[1];
    let color_idx: u8 = parts[2].parse().unwrap_or(0);
    let timestamp = parts[3];
    let message = parts[4];

    let prefix_color = match color_idx {
        COLOR_GRAY => Color::DarkGray,
        COLOR_BLUE => Color::LightBlue,
        COLOR_GREEN => Color::LightGreen,
        COLOR_MAGENTA => Color::LightMagenta,
        _ => Color::White,
    };

    let mut spans = Vec::new();

    spans.push(Span::styled(timestamp, Style::default().fg(Color::DarkGray)));
    spans.push(Span::raw(" "));

    // Level tag: only show for warn/error
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }

    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(prefix_color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::styled(message, Style::default().fg(prefix_color)));

    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_line_gets_prefix_and_level() {
        let raw = "WARN\x1fsched\x1f3\x1f12:00:01\x1fDetection failed: boom";
        let line = parse_log_line(raw);
        let text: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, vec!["12:00:01", " ", "warn ", "sched", " ", "Detection failed: boom"]);
        assert_eq!(line.spans[3].style.fg, Some(Color::LightGreen));
    }

    #[test]
    fn unstructured_line_passes_through() {
        let line = parse_log_line("plain");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "plain");
    }

    #[test]
    fn actions_title_flags_running() {
        assert_eq!(actions_title(3, RunPhase::Idle), " Actions (3) ");
        assert_eq!(actions_title(3, RunPhase::Stopping), " Actions (3, running) ");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Type Text \"hello world\"", 10), "Type Text~");
    }
}
