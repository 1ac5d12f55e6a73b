use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use crate::dataset::format_value;

/// A DataFrame drawn as a table. Each column is as wide as its widest visible
/// value; columns that do not fit are dropped from the right.
pub struct DataTable<'a> {
    df: &'a DataFrame,
    title: Option<String>,
    /// Number shown for the first row; `None` hides row numbers.
    first_row_number: Option<usize>,
    header_fg: Color,
    border_fg: Color,
    dimmed_fg: Color,
    alternate_row_bg: Option<Color>,
    cell_padding: u16,
}

impl<'a> DataTable<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        Self {
            df,
            title: None,
            first_row_number: None,
            header_fg: Color::White,
            border_fg: Color::Cyan,
            dimmed_fg: Color::DarkGray,
            alternate_row_bg: None,
            cell_padding: 2,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_row_numbers(mut self, first: usize) -> Self {
        self.first_row_number = Some(first);
        self
    }

    pub fn with_colors(mut self, header_fg: Color, border_fg: Color, dimmed_fg: Color) -> Self {
        self.header_fg = header_fg;
        self.border_fg = border_fg;
        self.dimmed_fg = dimmed_fg;
        self
    }

    pub fn with_alternate_row_bg(mut self, bg: Option<Color>) -> Self {
        self.alternate_row_bg = bg;
        self
    }

    /// Rows that fit under the header in `area` once the border is drawn.
    pub fn visible_rows(area: Rect) -> usize {
        area.height.saturating_sub(3) as usize
    }
}

impl Widget for DataTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_fg));
        if let Some(title) = &self.title {
            block = block.title(title.as_str());
        }
        let inner = block.inner(area);
        block.render(area, buf);

        let (height, cols) = self.df.shape();
        if cols == 0 {
            Paragraph::new("No columns")
                .style(Style::default().fg(self.dimmed_fg))
                .centered()
                .render(inner, buf);
            return;
        }

        let rows_to_render = height.min(inner.height.saturating_sub(1) as usize);

        let mut headers: Vec<String> = Vec::with_capacity(cols + 1);
        let mut columns: Vec<Vec<String>> = Vec::with_capacity(cols + 1);

        if let Some(first) = self.first_row_number {
            headers.push("#".to_string());
            columns.push((0..rows_to_render).map(|i| (first + i).to_string()).collect());
        }
        for column in self.df.get_columns() {
            headers.push(column.name().to_string());
            columns.push(
                (0..rows_to_render)
                    .map(|i| {
                        column
                            .get(i)
                            .map(|v| format_value(&v))
                            .unwrap_or_default()
                    })
                    .collect(),
            );
        }

        // keep whole columns while they fit; a string column may be cut to the remaining width
        let mut widths: Vec<u16> = Vec::with_capacity(columns.len());
        let mut used_width = 0u16;
        for (i, cells) in columns.iter().enumerate() {
            let max_len = cells
                .iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0) as u16;
            if used_width + max_len > inner.width {
                let remaining = inner.width.saturating_sub(used_width);
                if remaining > 3 {
                    widths.push(remaining);
                }
                break;
            }
            widths.push(max_len);
            used_width += max_len + self.cell_padding;
        }
        let visible_columns = widths.len();

        let number_style = Style::default().fg(self.dimmed_fg);
        let has_numbers = self.first_row_number.is_some();
        let rows: Vec<Row> = (0..rows_to_render)
            .map(|r| {
                let cells: Vec<Cell> = columns
                    .iter()
                    .take(visible_columns)
                    .enumerate()
                    .map(|(c, values)| {
                        let text = values[r].as_str();
                        if has_numbers && c == 0 {
                            Cell::from(Line::from(Span::styled(text.to_string(), number_style)))
                        } else {
                            Cell::from(Line::from(text.to_string()))
                        }
                    })
                    .collect();
                let style = match self.alternate_row_bg {
                    Some(bg) if r % 2 == 1 => Style::default().bg(bg),
                    _ => Style::default(),
                };
                Row::new(cells).style(style)
            })
            .collect();

        let header = Row::new(
            headers
                .into_iter()
                .take(visible_columns)
                .map(|h| Cell::from(Span::raw(h))),
        )
        .style(
            Style::default()
                .fg(self.header_fg)
                .add_modifier(Modifier::BOLD),
        );

        Table::new(rows, widths)
            .column_spacing(self.cell_padding)
            .header(header)
            .render(inner, buf);

        if height == 0 {
            Paragraph::new("No rows")
                .style(Style::default().fg(self.dimmed_fg))
                .centered()
                .render(
                    Rect {
                        y: inner.y.saturating_add(1),
                        height: inner.height.saturating_sub(1),
                        ..inner
                    },
                    buf,
                );
        }
    }
}
