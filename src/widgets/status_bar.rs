use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::ui::{Toast, ToastLevel};

pub fn draw_status(f: &mut Frame, area: Rect, toast: Option<&Toast>, help_text: &str) {
    let mut spans: Vec<Span> = vec![Span::styled(
        format!(" {help_text}"),
        crate::theme::text_muted(),
    )];
    if let Some(t) = toast {
        spans.push(Span::raw("  |  "));
        let color = crate::theme::toast_color(t.level);
        let tag = match t.level {
            ToastLevel::Success => "[OK]",
            ToastLevel::Error => "[ERROR]",
            ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(t.text.clone(), Style::default().fg(color)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
