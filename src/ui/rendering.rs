use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph},
    Frame,
};

use super::{UIState, UI};

const ACCENT: Color = Color::Rgb(0x00, 0x7b, 0xff);
const MUTED: Color = Color::Rgb(0x8f, 0xa0, 0xa6);
const DIALOG_BG: Color = Color::Rgb(0x1c, 0x1e, 0x22);

impl UI {
    pub(super) fn render(&mut self, f: &mut Frame) {
        let size = f.area();

        // sentences | separator | progress bar | status line
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .margin(0)
            .spacing(0)
            .split(size);

        let state = self.controller.state();
        let sentences = state
            .metadata
            .as_ref()
            .map(|m| m.sentences.as_slice())
            .unwrap_or_default();
        self.sentences.render(f, layout[0], sentences, state.play_idx);

        let separator = Paragraph::new(Line::from("─".repeat(layout[1].width as usize)))
            .style(Style::default().fg(MUTED));
        f.render_widget(separator, layout[1]);

        self.progress_area = layout[2];
        self.progress
            .render(f, layout[2], self.controller.progress_bar());

        self.status_bar.render(
            f,
            layout[3],
            self.controller.state(),
            self.controller.is_waiting(),
            self.message.as_deref(),
        );

        match &self.state {
            UIState::Menu => self.render_menu(f, size),
            UIState::KeyBindings => self.render_keybindings(f, size),
            UIState::About => self.render_about(f, size),
            UIState::Login { url } => self.render_login(f, size, url),
            _ => {}
        }
    }

    fn dialog_block(title: &str) -> Block<'_> {
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .padding(Padding::new(2, 2, 1, 1))
            .style(Style::default().fg(MUTED).bg(DIALOG_BG))
    }

    fn render_menu(&self, f: &mut Frame, size: Rect) {
        let items = ["Key Bindings", "About", "Exit"];
        let lines: Vec<Line> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let marker = if i == self.menu_index { "> " } else { "  " };
                let style = if i == self.menu_index {
                    Style::default().fg(ACCENT)
                } else {
                    Style::default().fg(MUTED)
                };
                Line::from(Span::styled(format!("{marker}{item}"), style))
            })
            .collect();

        let dialog_height = (items.len() as u16) + 4; // borders + padding
        let area = Self::centered_rect(size, 30, dialog_height);

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(Self::dialog_block(" Menu (Esc to close) ")),
            area,
        );
    }

    fn render_keybindings(&self, f: &mut Frame, size: Rect) {
        let heading = Style::default().fg(ACCENT);
        let lines = vec![
            Line::from(Span::styled("General", heading)),
            Line::from("  Esc     Menu"),
            Line::from("  q       Quit"),
            Line::from("  Ctrl+c  Quit"),
            Line::from(""),
            Line::from(Span::styled("Playback Controls", heading)),
            Line::from("  Space   Play / Pause"),
            Line::from("  h / l   Previous / Next sentence"),
            Line::from("  + / -   Faster / Slower"),
            Line::from("  0 - 9   Jump to 0% - 90%"),
            Line::from("  Click   Jump to position on the bar"),
        ];

        let dialog_height = (lines.len() as u16) + 4;
        let area = Self::centered_rect(size, 46, dialog_height);

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(Self::dialog_block(" Key Bindings (Esc to close) ")),
            area,
        );
    }

    fn render_about(&self, f: &mut Frame, size: Rect) {
        let version = env!("CARGO_PKG_VERSION");
        let lines = vec![
            Line::from(Span::styled("readly", Style::default().fg(ACCENT))),
            Line::from(format!("Version {version}")),
            Line::from(""),
            Line::from("Listen to any text, one sentence at a time."),
        ];

        let dialog_height = (lines.len() as u16) + 4;
        let area = Self::centered_rect(size, 50, dialog_height);

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(Self::dialog_block(" About (Esc to close) ")),
            area,
        );
    }

    fn render_login(&self, f: &mut Frame, size: Rect, url: &str) {
        let lines = vec![
            Line::from("Your session was rejected. Log in at:"),
            Line::from(""),
            Line::from(Span::styled(url.to_string(), Style::default().fg(ACCENT))),
            Line::from(""),
            Line::from("Press any key to exit."),
        ];

        let width = (url.len() as u16 + 8).max(48);
        let dialog_height = (lines.len() as u16) + 4;
        let area = Self::centered_rect(size, width, dialog_height);

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(Self::dialog_block(" Login required ")),
            area,
        );
    }

    pub(super) fn centered_rect(outer: Rect, width: u16, height: u16) -> Rect {
        Rect {
            x: outer.x + (outer.width.saturating_sub(width)) / 2,
            y: outer.y + (outer.height.saturating_sub(height)) / 2,
            width: width.min(outer.width),
            height: height.min(outer.height),
        }
    }
}
