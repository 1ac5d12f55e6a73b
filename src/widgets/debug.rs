use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Paragraph, Widget},
};

/// Counters shown on the debug line when `--debug` is set.
#[derive(Debug, Default, Clone)]
pub struct DebugState {
    pub enabled: bool,
    pub num_events: usize,
    pub num_frames: usize,
    pub last_event: Option<String>,
}

impl DebugState {
    pub fn record_event(&mut self, name: &str) {
        self.num_events += 1;
        self.last_event = Some(name.to_string());
    }
}

impl Widget for &DebugState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let text = format!(
            "events: {}  frames: {}  last: {}",
            self.num_events,
            self.num_frames,
            self.last_event.as_deref().unwrap_or("-")
        );
        Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .render(area, buf);
    }
}
