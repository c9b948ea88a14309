use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::progress::{depth_style, DepthStyle};

/// Stack of sentences around the one being read. The active sentence sits in
/// the middle; the others fade and dim with distance.
pub struct SentencesPane;

/// Brightest foreground used for text at full opacity.
const TEXT_LEVEL: f32 = 235.0;
/// Blur above which a sentence is drawn dimmed.
const DIM_BLUR: f32 = 4.0;

impl SentencesPane {
    pub fn render(&self, f: &mut Frame, area: Rect, sentences: &[String], play_idx: usize) {
        let block = Block::default().borders(Borders::NONE);
        let inner = block.inner(area);
        f.render_widget(block, area);
        if sentences.is_empty() || inner.height == 0 {
            return;
        }

        let width = inner.width.saturating_sub(4).max(10) as usize;
        let total = sentences.len();
        let middle = inner.y + inner.height / 2;

        let active = wrap(&sentences[play_idx.min(total - 1)], width);
        let active_height = active.len() as u16;
        // translateY(-50%): the active sentence is centred on the middle row
        let active_top = middle.saturating_sub(active_height / 2).max(inner.y);
        self.draw(f, inner, active_top, active, depth_style(play_idx, play_idx, total));

        let mut top = active_top;
        for idx in (0..play_idx.min(total)).rev() {
            let lines = wrap(&sentences[idx], width);
            let height = lines.len() as u16;
            if top < inner.y + height {
                break;
            }
            top -= height;
            self.draw(f, inner, top, lines, depth_style(idx, play_idx, total));
        }

        let mut bottom = active_top + active_height;
        for idx in play_idx + 1..total {
            let lines = wrap(&sentences[idx], width);
            let height = lines.len() as u16;
            if bottom + height > inner.y + inner.height {
                break;
            }
            self.draw(f, inner, bottom, lines, depth_style(idx, play_idx, total));
            bottom += height;
        }
    }

    fn draw(&self, f: &mut Frame, inner: Rect, top: u16, lines: Vec<String>, style: DepthStyle) {
        let height = (lines.len() as u16).min(inner.y + inner.height - top);
        let rect = Rect {
            x: inner.x + 2,
            y: top,
            width: inner.width.saturating_sub(4),
            height,
        };
        let text: Vec<Line> = lines.into_iter().map(Line::from).collect();
        f.render_widget(Paragraph::new(text).style(text_style(style)), rect);
    }
}

pub fn text_style(style: DepthStyle) -> Style {
    let level = (TEXT_LEVEL * style.opacity).round() as u8;
    let mut text = Style::default().fg(Color::Rgb(level, level, level));
    if style.active {
        text = text.add_modifier(Modifier::BOLD);
    } else if style.blur >= DIM_BLUR {
        text = text.add_modifier(Modifier::DIM);
    }
    text
}

/// Greedy word wrap by display width.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.width()
        } else {
            current.width() + 1 + word.width()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn long_word_gets_its_own_line() {
        let lines = wrap("a supercalifragilistic b", 5);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn wide_characters_count_double() {
        let lines = wrap("日本語 日本語", 7);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn fading_follows_distance() {
        let near = text_style(depth_style(4, 5, 10));
        let far = text_style(depth_style(1, 5, 10));
        assert_ne!(near.fg, far.fg);
        assert!(far.add_modifier.contains(Modifier::DIM));
        assert!(text_style(depth_style(5, 5, 10)).add_modifier.contains(Modifier::BOLD));
    }
}
