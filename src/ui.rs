//! UI rendering and layout utilities

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Application state for UI rendering
#[derive(Clone)]
pub struct UiState {
    pub device_name: String,
    pub format: String,
    pub status: String,
    /// Smoothed level, percent
    pub current: f32,
    /// Highest smoothed level since reset, percent
    pub max: f32,
    /// Peak of the latest buffer, percent
    pub raw: f32,
}

/// Percentage shown on the bar, truncated like the readout it came from
pub fn display_percent(scaled_mean: f32) -> u16 {
    scaled_mean.clamp(0.0, 100.0) as u16
}

/// Max and current readouts, one per line
pub fn format_levels(max: f32, current: f32) -> String {
    format!("{:4.2}\n{:4.2}", max, current)
}

fn zone_color(i: usize, width: usize) -> Color {
    if i < width / 3 {
        Color::Green
    } else if i < 2 * width / 3 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Create a gradient bar showing the smoothed level
pub fn create_gradient_bar(width: usize, ratio: f64) -> Line<'static> {
    let filled = (ratio * width as f64) as usize;
    let partial_fill = (ratio * width as f64) - filled as f64;
    let mut spans = Vec::new();

    for i in 0..width {
        let ch = if i < filled {
            '█'
        } else if i == filled && partial_fill > 0.0 {
            match (partial_fill * 8.0) as usize {
                0 | 1 => '░',
                2 | 3 => '▒',
                4 | 5 => '▓',
                _ => '█',
            }
        } else {
            '░'
        };
        spans.push(Span::styled(ch.to_string(), Style::default().fg(zone_color(i, width))));
    }

    Line::from(spans)
}

/// Column of the maximum-seen marker for a bar `width` cells wide
pub fn max_marker_position(width: usize, max_ratio: f64) -> usize {
    (max_ratio.clamp(0.0, 1.0) * width.saturating_sub(1) as f64).round() as usize
}

/// Scale line under the bar with the maximum-seen marker
pub fn create_max_marker(width: usize, max_ratio: f64) -> Line<'static> {
    let marker = max_marker_position(width, max_ratio);
    let mut spans = Vec::new();

    for i in 0..width {
        if i == marker {
            spans.push(Span::styled("▲".to_string(), Style::default().fg(Color::White)));
            continue;
        }

        let label = if i == 0 {
            "0"
        } else if i == width - 1 {
            "100"
        } else if i == width / 2 {
            "50"
        } else {
            " "
        };
        spans.push(Span::styled(label.to_string(), Style::default().fg(zone_color(i, width))));
    }

    Line::from(spans)
}

/// Render the complete UI
pub fn render_ui(f: &mut Frame, state: &UiState) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(size);

    let device_block = Block::default().title("Device").borders(Borders::ALL);
    let device_text =
        Paragraph::new(format!("{} [{}]", state.device_name, state.format)).block(device_block);
    f.render_widget(device_text, chunks[0]);

    let status_block = Block::default().title("Status").borders(Borders::ALL);
    let status_text = Paragraph::new(state.status.as_str()).block(status_block);
    f.render_widget(status_text, chunks[1]);

    // Level bar with max marker
    let bar_width =
        (chunks[2].width as usize).saturating_sub(crate::constants::ui::BAR_BORDER_WIDTH);
    let ratio = (state.current as f64 / 100.0).clamp(0.0, 1.0);
    let bar_line = create_gradient_bar(bar_width, ratio);
    let marker_line = create_max_marker(bar_width, state.max as f64 / 100.0);
    let gauge = Paragraph::new(vec![bar_line, marker_line]).block(
        Block::default()
            .title(format!(
                "Level: {}% (Peak: {:.1})",
                display_percent(state.current),
                state.raw
            ))
            .borders(Borders::ALL),
    );
    f.render_widget(gauge, chunks[2]);

    let readout = Paragraph::new(format_levels(state.max, state.current))
        .block(Block::default().title("Max / Current").borders(Borders::ALL));
    f.render_widget(readout, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_levels_matches_readout() {
        assert_eq!(format_levels(12.346, 3.0), "12.35\n3.00");
        assert_eq!(format_levels(0.0, 0.0), "0.00\n0.00");
    }

    #[test]
    fn test_display_percent_truncates_and_clamps() {
        assert_eq!(display_percent(49.9), 49);
        assert_eq!(display_percent(100.0), 100);
        assert_eq!(display_percent(250.0), 100);
        assert_eq!(display_percent(-3.0), 0);
    }

    #[test]
    fn test_gradient_bar_fill() {
        let line = create_gradient_bar(10, 0.5);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text.chars().filter(|c| *c == '█').count(), 5);
        assert_eq!(text.chars().count(), 10);
    }

    #[test]
    fn test_max_marker_position() {
        assert_eq!(max_marker_position(11, 0.0), 0);
        assert_eq!(max_marker_position(11, 0.5), 5);
        assert_eq!(max_marker_position(11, 1.0), 10);
        assert_eq!(max_marker_position(11, 2.0), 10);
        assert_eq!(max_marker_position(0, 0.5), 0);
    }

    #[test]
    fn test_max_marker_line_has_one_marker() {
        let line = create_max_marker(20, 0.25);
        let markers = line.spans.iter().filter(|s| s.content == "▲").count();
        assert_eq!(markers, 1);
    }
}
