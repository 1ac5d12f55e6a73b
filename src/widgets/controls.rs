use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

/// Key hints shared by every tab.
pub const COMMON_CONTROLS: [(&str, &str); 5] = [
    ("Tab", "Next"),
    ("e", "Export"),
    ("r", "Reload"),
    ("?", "Help"),
    ("q", "Quit"),
];

/// Bottom bar of key/action pairs, with the row count on the right.
pub struct Controls {
    pub hints: Vec<(&'static str, &'static str)>,
    pub row_count: Option<usize>,
    pub dimmed: bool,
    pub bg: Color,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            hints: COMMON_CONTROLS.to_vec(),
            row_count: None,
            dimmed: false,
            bg: Color::DarkGray,
        }
    }
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tab-specific hints go before the common ones.
    pub fn with_hints(mut self, hints: &[(&'static str, &'static str)]) -> Self {
        let mut all = hints.to_vec();
        all.extend_from_slice(&COMMON_CONTROLS);
        self.hints = all;
        self
    }

    pub fn with_row_count(mut self, row_count: Option<usize>) -> Self {
        self.row_count = row_count;
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = self
            .hints
            .iter()
            .fold(vec![], |mut acc, (key, action)| {
                acc.push(Constraint::Length(key.chars().count() as u16 + 2));
                acc.push(Constraint::Length(action.chars().count() as u16 + 1));
                acc
            });
        if self.row_count.is_some() {
            constraints.push(Constraint::Length(15));
        }
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in self.hints.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(base_style.bg(self.bg))
                .render(layout[j + 1], buf);
        }

        let mut fill_start_idx = self.hints.len() * 2;
        if let Some(count) = self.row_count {
            Paragraph::new(format!("Rows: {}", count))
                .style(base_style.bg(self.bg).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    Color::White
                }))
                .right_aligned()
                .render(layout[fill_start_idx], buf);
            fill_start_idx += 1;
        }

        Paragraph::new("")
            .style(base_style.bg(self.bg))
            .render(layout[fill_start_idx], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    #[test]
    fn keys_are_bold_and_rows_are_shown() {
        let area = Rect::new(0, 0, 100, 1);
        let mut buf = Buffer::empty(area);
        let controls = Controls::new()
            .with_hints(&[("Enter", "Count")])
            .with_row_count(Some(4));
        (&controls).render(area, &mut buf);

        let line: String = (0..area.width).map(|x| buf[(x, 0)].symbol()).collect();
        assert!(line.starts_with(" Enter Count"));
        assert!(line.contains("Rows: 4"));
        let e = line.find('E').unwrap() as u16;
        assert!(buf[(e, 0)].modifier.contains(Modifier::BOLD));
    }
}
