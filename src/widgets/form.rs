use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// One of several options, changed with Left/Right.
    Choice(String),
    Number(usize),
    Button(String),
    /// Items with their checked state; `cursor` is the item Space toggles.
    MultiSelect {
        items: Vec<(String, bool)>,
        cursor: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub label: String,
    pub value: FormValue,
    pub focused: bool,
}

impl FormRow {
    pub fn new(label: impl Into<String>, value: FormValue) -> Self {
        Self {
            label: label.into(),
            value,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

/// Sidebar of labelled inputs. The focused row is highlighted and kept in view.
pub struct Form {
    title: String,
    rows: Vec<FormRow>,
    active_fg: Color,
    border_fg: Color,
    dimmed_fg: Color,
    /// Highlight for the item under the cursor; `Reset` means reversed video.
    selected_bg: Color,
}

impl Form {
    pub fn new(title: impl Into<String>, rows: Vec<FormRow>) -> Self {
        Self {
            title: title.into(),
            rows,
            active_fg: Color::Yellow,
            border_fg: Color::Cyan,
            dimmed_fg: Color::DarkGray,
            selected_bg: Color::Reset,
        }
    }

    pub fn with_colors(mut self, active_fg: Color, border_fg: Color, dimmed_fg: Color) -> Self {
        self.active_fg = active_fg;
        self.border_fg = border_fg;
        self.dimmed_fg = dimmed_fg;
        self
    }

    pub fn with_selected_bg(mut self, selected_bg: Color) -> Self {
        self.selected_bg = selected_bg;
        self
    }

    fn selected_style(&self) -> Style {
        match self.selected_bg {
            Color::Reset => Style::default().add_modifier(Modifier::REVERSED),
            bg => Style::default().bg(bg),
        }
    }

    /// Text lines plus the index of the line holding the focus.
    fn lines(&self) -> (Vec<Line<'static>>, usize) {
        let mut lines = Vec::new();
        let mut focus_line = 0;
        for row in &self.rows {
            let label_style = if row.focused {
                Style::default()
                    .fg(self.active_fg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.border_fg)
            };
            if row.focused {
                focus_line = lines.len();
            }
            match &row.value {
                FormValue::Choice(value) => lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", row.label), label_style),
                    Span::raw(format!("◀ {} ▶", value)),
                ])),
                FormValue::Number(n) => lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", row.label), label_style),
                    Span::raw(format!("- {} +", n)),
                ])),
                FormValue::Button(text) => {
                    let style = if row.focused {
                        self.selected_style().fg(self.active_fg)
                    } else {
                        Style::default().fg(self.border_fg)
                    };
                    lines.push(Line::from(Span::styled(format!("[ {} ]", text), style)));
                }
                FormValue::MultiSelect { items, cursor } => {
                    lines.push(Line::from(Span::styled(format!("{}:", row.label), label_style)));
                    if items.is_empty() {
                        lines.push(Line::from(Span::styled(
                            "  (no columns)",
                            Style::default().fg(self.dimmed_fg),
                        )));
                    }
                    for (i, (name, checked)) in items.iter().enumerate() {
                        let marker = if *checked { "☑" } else { "☐" };
                        let style = if row.focused && i == *cursor {
                            focus_line = lines.len();
                            self.selected_style()
                        } else {
                            Style::default()
                        };
                        lines.push(Line::from(Span::styled(
                            format!("  {} {}", marker, name),
                            style,
                        )));
                    }
                }
            }
        }
        (lines, focus_line)
    }
}

impl Widget for Form {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_fg))
            .title(self.title.as_str());
        let inner = block.inner(area);
        block.render(area, buf);

        let (lines, focus_line) = self.lines();
        let height = inner.height as usize;
        let scroll = if height > 0 && focus_line >= height {
            focus_line + 1 - height
        } else {
            0
        };
        Paragraph::new(lines)
            .scroll((scroll as u16, 0))
            .render(inner, buf);
    }
}
