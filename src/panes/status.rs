use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::engine::PlayerState;

/// One-line summary under the progress bar.
pub struct StatusBarPane;

impl StatusBarPane {
    pub fn render(
        &self,
        f: &mut Frame,
        area: Rect,
        state: &PlayerState,
        waiting: bool,
        message: Option<&str>,
    ) {
        let (icon, label) = if state.playing { ("▶", "Playing") } else { ("⏸", "Paused") };
        let total = state.num_sentences();
        let position = if total == 0 { 0 } else { state.play_idx + 1 };

        let mut spans = vec![
            Span::styled(
                format!(" {icon} {label} "),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {position}/{total} ")),
            Span::raw(format!(" {:.2}x ", state.speed)),
        ];
        if waiting {
            spans.push(Span::styled(" buffering… ", Style::default().fg(Color::Yellow)));
        }
        if !state.channel_ready {
            spans.push(Span::styled(" offline ", Style::default().fg(Color::Red)));
        }
        if let Some(message) = message {
            spans.push(Span::styled(format!(" {message}"), Style::default().fg(Color::Gray)));
        }

        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
