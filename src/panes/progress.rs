use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::progress::{ProgressBar, SegmentState};

pub struct ProgressPane;

impl ProgressPane {
    pub fn render(&self, f: &mut Frame, area: Rect, bar: &ProgressBar) {
        let spans: Vec<Span> = bar
            .downsample(area.width as usize)
            .into_iter()
            .map(|segment| Span::styled("█", Style::default().fg(segment_color(segment))))
            .collect();
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    /// Fraction of the text under terminal column `column`, if it falls on
    /// the bar drawn in `area`.
    pub fn fraction_at(area: Rect, column: u16, row: u16) -> Option<f64> {
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        inside.then(|| f64::from(column - area.x) / f64::from(area.width))
    }
}

pub fn segment_color(segment: SegmentState) -> Color {
    let (r, g, b) = segment.rgb();
    Color::Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_maps_to_fraction() {
        let area = Rect::new(10, 5, 100, 1);
        assert_eq!(ProgressPane::fraction_at(area, 10, 5), Some(0.0));
        assert_eq!(ProgressPane::fraction_at(area, 60, 5), Some(0.5));
        assert_eq!(ProgressPane::fraction_at(area, 110, 5), None);
        assert_eq!(ProgressPane::fraction_at(area, 50, 4), None);
    }

    #[test]
    fn playing_is_blue() {
        assert_eq!(segment_color(SegmentState::Playing), Color::Rgb(0x00, 0x7b, 0xff));
    }
}
