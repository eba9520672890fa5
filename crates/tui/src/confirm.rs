use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Yes/No modal. Starts on No.
pub struct ConfirmDialog {
    pub message: String,
    pub selected: bool, // true = Yes
}

impl ConfirmDialog {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), selected: false }
    }

    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }

    /// `Some(answer)` once the dialog is closed.
    pub fn handle_key(&mut self, key: &str) -> Option<bool> {
        match key {
            "left" | "right" | "tab" | "h" | "l" => {
                self.toggle();
                None
            }
            "y" => Some(true),
            "n" | "esc" => Some(false),
            "enter" => Some(self.selected),
            _ => None,
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.message.chars().count() as u16 + 8).max(30);
        let area = centered_rect(width, 6, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Confirm ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        let msg = Paragraph::new(Span::styled(self.message.as_str(), Style::default().fg(Color::White)))
            .alignment(Alignment::Center);
        f.render_widget(msg, rows[0]);

        let button = |label: &'static str, on: bool, bg: Color| {
            if on {
                Span::styled(label, Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD))
            } else {
                Span::styled(label, Style::default().fg(Color::DarkGray))
            }
        };
        let buttons = Line::from(vec![
            button(" [Y]es ", self.selected, Color::Green),
            Span::raw("   "),
            button(" [N]o ", !self.selected, Color::Red),
        ]);
        f.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), rows[2]);
    }
}

/// Return a centered `Rect` of `width` columns and `height` rows inside `area`.
pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
