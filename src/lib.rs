use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{info, warn};
use std::path::{Path, PathBuf};

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

pub mod aggregate;
pub mod cache;
pub mod chart_data;
pub mod chart_export;
pub mod chart_spec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod session;
pub mod summary;
pub mod value_counts;
pub mod widgets;
pub mod window;

pub use aggregate::{group_and_aggregate, AggOperator, AggregationSpec};
pub use cache::CacheManager;
pub use chart_spec::{Channel, ChannelMapping, ChartKind, ChartSpec};
pub use config::{
    rgb_to_256_color, rgb_to_basic_ansi, AppConfig, ColorParser, ConfigManager, Theme,
};
pub use dataportal_cli::Args;
pub use dataset::{Dataset, ResultTable};
pub use error::PortalError;
pub use loader::{FileFormat, OpenOptions};
pub use session::{Interaction, RenderOutput, Session, UiState};

use chart_export::{export_charts, SvgChartRenderer};
use error::{user_message, user_message_from_io};
use widgets::chart::ChartView;
use widgets::controls::Controls;
use widgets::datatable::DataTable;
use widgets::debug::DebugState;
use widgets::form::{Form, FormRow, FormValue};

/// Application name used for config and cache directories
pub const APP_NAME: &str = "dataportal";

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Open(PathBuf, OpenOptions),
    DoLoad(PathBuf, OpenOptions), // performs the read after the loading screen is drawn
    Reload,
    ExportCharts,
    Exit,
    Crash(String),
    Resize(u16, u16),
}

#[derive(Default)]
pub struct ErrorModal {
    pub active: bool,
    pub message: String,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, message: String) {
        self.active = true;
        self.message = message;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.message.clear();
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Data,
    Summary,
    Rows,
    Types,
    Columns,
    ValueCounts,
    GroupBy,
}

impl Tab {
    pub const ALL: [Tab; 7] = [
        Tab::Data,
        Tab::Summary,
        Tab::Rows,
        Tab::Types,
        Tab::Columns,
        Tab::ValueCounts,
        Tab::GroupBy,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Data => "Data",
            Tab::Summary => "Summary",
            Tab::Rows => "Top & Bottom",
            Tab::Types => "Types",
            Tab::Columns => "Columns",
            Tab::ValueCounts => "Value Counts",
            Tab::GroupBy => "Group By",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn hints(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Tab::Data => &[("↑↓", "Scroll")],
            Tab::Rows => &[("↑↓", "Field"), ("←→", "Change")],
            Tab::ValueCounts => &[("↑↓", "Field"), ("←→", "Change"), ("Enter", "Count")],
            Tab::GroupBy => &[("↑↓", "Field"), ("←→", "Change"), ("Space", "Toggle")],
            _ => &[],
        }
    }
}

/// An input on the current tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    HeadRows,
    TailRows,
    CountColumn,
    TopK,
    Count,
    GroupColumns,
    Target,
    Operator,
    ChartKind,
    Channel(Channel),
}

const HELP_TEXT: &str = "\
Tab / Shift+Tab   switch tabs (1-7 jump directly)
Up / Down         move between fields, or scroll the data
Left / Right      change the focused value (- and + also work)
Space             toggle the column under the cursor
Enter             press Count on the Value Counts tab
e                 export the charts on screen as SVG files
r                 reload the file from disk
?                 show or hide this help
q / Esc           quit, or close a dialog";

/// Next option after `current`, wrapping around. Starts at either end when `current` is absent.
fn cycle<T: PartialEq + Clone>(options: &[T], current: Option<&T>, delta: isize) -> Option<T> {
    if options.is_empty() {
        return None;
    }
    let len = options.len() as isize;
    let next = match current.and_then(|c| options.iter().position(|o| o == c)) {
        Some(i) => (i as isize + delta).rem_euclid(len),
        None if delta >= 0 => 0,
        None => len - 1,
    };
    options.get(next as usize).cloned()
}

fn step(value: usize, delta: isize) -> usize {
    if delta < 0 {
        value.saturating_sub(delta.unsigned_abs()).max(1)
    } else {
        value.saturating_add(delta as usize)
    }
}

pub struct App {
    session: Session,
    config: AppConfig,
    theme: Theme,
    path: Option<PathBuf>,
    open_options: OpenOptions,
    loading: Option<PathBuf>,
    tab: Tab,
    focus: usize,
    /// Item under the cursor in a multiselect field.
    cursor: usize,
    data_offset: usize,
    data_page: usize,
    /// Status text and the theme slot it is drawn with.
    status: Option<(String, &'static str)>,
    pub error_modal: ErrorModal,
    show_help: bool,
    pub debug: DebugState,
}

impl App {
    pub fn new(config: AppConfig, theme: Theme) -> Self {
        Self {
            session: Session::new(&config),
            config,
            theme,
            path: None,
            open_options: OpenOptions::default(),
            loading: None,
            tab: Tab::default(),
            focus: 0,
            cursor: 0,
            data_offset: 0,
            data_page: 20,
            status: None,
            error_modal: ErrorModal::new(),
            show_help: false,
            debug: DebugState::default(),
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn focused_field(&self) -> Option<Field> {
        self.fields().get(self.focus).copied()
    }

    fn color(&self, name: &str) -> ratatui::style::Color {
        self.theme.get(name)
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => {
                self.debug.record_event("key");
                self.key(key)
            }
            AppEvent::Open(path, options) => {
                self.debug.record_event("open");
                self.loading = Some(path.clone());
                Some(AppEvent::DoLoad(path.clone(), options.clone()))
            }
            AppEvent::DoLoad(path, options) => {
                self.debug.record_event("load");
                self.load(path, options);
                self.loading = None;
                None
            }
            AppEvent::Reload => {
                self.debug.record_event("reload");
                self.path
                    .clone()
                    .map(|path| AppEvent::Open(path, self.open_options.clone()))
            }
            AppEvent::ExportCharts => {
                self.debug.record_event("export");
                self.export();
                None
            }
            AppEvent::Resize(..) => {
                self.debug.record_event("resize");
                None
            }
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    /// Read `path` and make it the session dataset. Failures go to the error modal.
    fn load(&mut self, path: &Path, options: &OpenOptions) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not read {}: {}", path.display(), e);
                self.error_modal
                    .show(user_message_from_io(&e, Some(&path.display().to_string())));
                return;
            }
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match self.session.open(&bytes, &filename, options) {
            Ok(()) => {
                self.path = Some(path.to_path_buf());
                self.open_options = options.clone();
                self.data_offset = 0;
                self.set_status(format!("Loaded {}", filename), "success");
                self.clamp_focus();
            }
            Err(e) => {
                warn!("could not load {}: {}", filename, e);
                self.error_modal.show(user_message(&e));
            }
        }
    }

    fn export(&mut self) {
        let Some(output) = self.session.output() else {
            self.set_status("Nothing to export: no file is loaded", "warning");
            return;
        };
        let charts = output.exportable_charts();
        if charts.is_empty() {
            self.set_status(
                "No charts to export. Press Count or select grouping columns first",
                "warning",
            );
            return;
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let dir = self.config.charts.export_dir_or(&cwd);
        let stem = self
            .session
            .source()
            .and_then(|s| Path::new(s).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart".to_string());
        let renderer = SvgChartRenderer::from_config(&self.config.charts);
        let result = export_charts(&dir, &stem, &charts, &renderer);
        match result {
            Ok(paths) => {
                info!("exported {} charts to {}", paths.len(), dir.display());
                self.set_status(
                    format!("Exported {} chart(s) to {}", paths.len(), dir.display()),
                    "success",
                );
            }
            Err(e) => self.error_modal.show(user_message(&e)),
        }
    }

    fn set_status(&mut self, text: impl Into<String>, slot: &'static str) {
        self.status = Some((text.into(), slot));
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.kind != KeyEventKind::Press {
            return None;
        }

        if self.error_modal.active {
            if let KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') = event.code {
                self.error_modal.hide();
            }
            return None;
        }

        if self.show_help {
            if let KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') = event.code {
                self.show_help = false;
            }
            return None;
        }

        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(AppEvent::Exit)
            }
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Char('?') => {
                self.show_help = true;
                None
            }
            KeyCode::Char('r') => Some(AppEvent::Reload),
            KeyCode::Char('e') => Some(AppEvent::ExportCharts),
            KeyCode::Tab => {
                self.set_tab(self.tab.next());
                None
            }
            KeyCode::BackTab => {
                self.set_tab(self.tab.prev());
                None
            }
            KeyCode::Char(c @ '1'..='7') => {
                let i = c as usize - '1' as usize;
                self.set_tab(Tab::ALL[i]);
                None
            }
            KeyCode::Up => {
                self.move_focus(-1);
                None
            }
            KeyCode::Down => {
                self.move_focus(1);
                None
            }
            KeyCode::PageUp if self.tab == Tab::Data => {
                self.scroll(-(self.data_page as isize));
                None
            }
            KeyCode::PageDown if self.tab == Tab::Data => {
                self.scroll(self.data_page as isize);
                None
            }
            KeyCode::Left | KeyCode::Char('-') => {
                self.adjust(-1);
                None
            }
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => {
                self.adjust(1);
                None
            }
            KeyCode::Char(' ') => {
                self.toggle();
                None
            }
            KeyCode::Enter => {
                match self.focused_field() {
                    Some(Field::GroupColumns) | Some(Field::Channel(Channel::Path)) => {
                        self.toggle()
                    }
                    _ if self.tab == Tab::ValueCounts => self.interact(Interaction::PressCount),
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }

    fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.focus = 0;
        self.cursor = 0;
    }

    /// Inputs of the current tab, top to bottom.
    pub fn fields(&self) -> Vec<Field> {
        match self.tab {
            Tab::Rows => vec![Field::HeadRows, Field::TailRows],
            Tab::ValueCounts => vec![Field::CountColumn, Field::TopK, Field::Count],
            Tab::GroupBy => {
                let mut fields = vec![
                    Field::GroupColumns,
                    Field::Target,
                    Field::Operator,
                    Field::ChartKind,
                ];
                fields.extend(
                    self.session
                        .ui()
                        .chart_kind
                        .channels()
                        .into_iter()
                        .map(Field::Channel),
                );
                fields
            }
            _ => Vec::new(),
        }
    }

    fn clamp_focus(&mut self) {
        let n = self.fields().len();
        self.focus = self.focus.min(n.saturating_sub(1));
    }

    fn move_focus(&mut self, delta: isize) {
        if self.tab == Tab::Data {
            self.scroll(delta);
            return;
        }
        let n = self.fields().len();
        if n == 0 {
            return;
        }
        let next = (self.focus as isize + delta).clamp(0, n as isize - 1) as usize;
        if next != self.focus {
            self.focus = next;
            self.cursor = 0;
        }
    }

    fn scroll(&mut self, delta: isize) {
        let rows = self
            .session
            .dataset()
            .map(|ds| ds.height().min(self.config.display.max_preview_rows))
            .unwrap_or(0);
        let max_offset = rows.saturating_sub(1);
        self.data_offset = if delta < 0 {
            self.data_offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.data_offset.saturating_add(delta as usize).min(max_offset)
        };
    }

    fn interact(&mut self, interaction: Interaction) {
        if self.session.apply(interaction).is_some() {
            self.status = None;
        }
        self.clamp_focus();
    }

    fn dataset_columns(&self) -> Vec<String> {
        self.session
            .dataset()
            .map(|ds| ds.column_names())
            .unwrap_or_default()
    }

    /// Columns a chart channel can reference: those of the group-by result.
    pub fn chart_columns(&self) -> Vec<String> {
        if let Some(Ok(view)) = self.session.output().and_then(|o| o.group_by.as_ref()) {
            return view.table.column_names();
        }
        self.session
            .ui()
            .result_columns(&self.session.aggregation().result_column)
    }

    /// Channel selections as drawn: the chart on screen, or the stored selections.
    pub fn displayed_channels(&self) -> ChannelMapping {
        match self.session.output().and_then(|o| o.group_by.as_ref()) {
            Some(Ok(view)) => view.chart.spec.channels.clone(),
            _ => self.session.ui().channels.clone(),
        }
    }

    fn multiselect_len(&self, field: Field) -> usize {
        match field {
            Field::GroupColumns => self.dataset_columns().len(),
            Field::Channel(Channel::Path) => self.chart_columns().len(),
            _ => 0,
        }
    }

    fn adjust(&mut self, delta: isize) {
        if self.tab == Tab::Data {
            return;
        }
        let Some(field) = self.focused_field() else {
            return;
        };
        let ui = self.session.ui().clone();
        let interaction = match field {
            Field::HeadRows => Some(Interaction::SetHeadRows(step(ui.head_rows, delta))),
            Field::TailRows => Some(Interaction::SetTailRows(step(ui.tail_rows, delta))),
            Field::TopK => Some(Interaction::SetTopK(step(ui.top_k, delta))),
            Field::CountColumn => cycle(&self.dataset_columns(), ui.count_column.as_ref(), delta)
                .map(Interaction::SelectCountColumn),
            Field::Target => cycle(&self.dataset_columns(), ui.target.as_ref(), delta)
                .map(Interaction::SetTarget),
            Field::Operator => cycle(&AggOperator::ALL, Some(&ui.operator), delta)
                .map(Interaction::SetOperator),
            Field::ChartKind => cycle(&ChartKind::ALL, Some(&ui.chart_kind), delta)
                .map(Interaction::SetChartKind),
            Field::GroupColumns | Field::Channel(Channel::Path) => {
                let n = self.multiselect_len(field);
                if n > 0 {
                    self.cursor = (self.cursor as isize + delta).clamp(0, n as isize - 1) as usize;
                }
                None
            }
            Field::Channel(channel) => {
                let mut options: Vec<Option<String>> =
                    self.chart_columns().into_iter().map(Some).collect();
                if !ui.chart_kind.required_channels().contains(&channel) {
                    options.insert(0, None);
                }
                let current = self.displayed_channels().get(channel).map(str::to_string);
                cycle(&options, Some(&current), delta)
                    .map(|column| Interaction::SetChannel(channel, column))
            }
            Field::Count => None,
        };
        if let Some(interaction) = interaction {
            self.interact(interaction);
        }
    }

    fn toggle(&mut self) {
        let Some(field) = self.focused_field() else {
            return;
        };
        match field {
            Field::GroupColumns => {
                if let Some(column) = self.dataset_columns().get(self.cursor).cloned() {
                    self.interact(Interaction::ToggleGroupColumn(column));
                }
            }
            Field::Channel(Channel::Path) => {
                if let Some(column) = self.chart_columns().get(self.cursor).cloned() {
                    self.interact(Interaction::TogglePathColumn(column));
                }
            }
            Field::Count => self.interact(Interaction::PressCount),
            _ => {}
        }
    }

    fn form_row(&self, index: usize, field: Field) -> FormRow {
        let ui = self.session.ui();
        let focused = index == self.focus;
        let text = |s: Option<&str>| s.unwrap_or("(none)").to_string();
        let row = match field {
            Field::HeadRows => FormRow::new("Head rows", FormValue::Number(ui.head_rows)),
            Field::TailRows => FormRow::new("Tail rows", FormValue::Number(ui.tail_rows)),
            Field::CountColumn => FormRow::new(
                "Column",
                FormValue::Choice(text(ui.count_column.as_deref())),
            ),
            Field::TopK => FormRow::new("Top K", FormValue::Number(ui.top_k)),
            Field::Count => FormRow::new("", FormValue::Button("Count".to_string())),
            Field::GroupColumns => FormRow::new(
                "Group by",
                FormValue::MultiSelect {
                    items: self
                        .dataset_columns()
                        .into_iter()
                        .map(|c| {
                            let checked = ui.group_by.contains(&c);
                            (c, checked)
                        })
                        .collect(),
                    cursor: self.cursor,
                },
            ),
            Field::Target => {
                FormRow::new("Target", FormValue::Choice(text(ui.target.as_deref())))
            }
            Field::Operator => FormRow::new(
                "Operator",
                FormValue::Choice(ui.operator.as_str().to_string()),
            ),
            Field::ChartKind => FormRow::new(
                "Chart",
                FormValue::Choice(ui.chart_kind.as_str().to_string()),
            ),
            Field::Channel(Channel::Path) => {
                let path = self.displayed_channels().path;
                let items = self
                    .chart_columns()
                    .into_iter()
                    .map(|c| match path.iter().position(|p| *p == c) {
                        Some(level) => (format!("{} ({})", c, level + 1), true),
                        None => (c, false),
                    })
                    .collect();
                FormRow::new(
                    Channel::Path.label(),
                    FormValue::MultiSelect {
                        items,
                        cursor: self.cursor,
                    },
                )
            }
            Field::Channel(channel) => FormRow::new(
                channel.label(),
                FormValue::Choice(text(self.displayed_channels().get(channel))),
            ),
        };
        row.focused(focused)
    }

    fn render_form(&self, title: &str, area: Rect, buf: &mut Buffer) {
        let rows = self
            .fields()
            .into_iter()
            .enumerate()
            .map(|(i, f)| self.form_row(i, f))
            .collect();
        Form::new(title, rows)
            .with_colors(
                self.color("modal_border_active"),
                self.color("modal_border"),
                self.color("dimmed"),
            )
            .with_selected_bg(self.color("table_selected"))
            .render(area, buf);
    }

    fn table<'a>(&self, df: &'a polars::prelude::DataFrame) -> DataTable<'a> {
        DataTable::new(df).with_colors(
            self.color("table_header"),
            self.color("table_border"),
            self.color("dimmed"),
        )
    }

    fn render_message(&self, text: &str, color: &str, area: Rect, buf: &mut Buffer) {
        Paragraph::new(text.to_string())
            .style(Style::default().fg(self.color(color)))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).border_style(
                Style::default().fg(self.color("table_border")),
            ))
            .render(area, buf);
    }

    /// Draw the preview window and return how many rows fit.
    fn render_data(&self, ds: &Dataset, area: Rect, buf: &mut Buffer) -> usize {
        let visible = DataTable::visible_rows(area).max(1);
        let limit = ds.height().min(self.config.display.max_preview_rows);
        let offset = self.data_offset.min(limit.saturating_sub(1));
        let len = visible.min(limit.saturating_sub(offset));
        let frame = ds.frame().slice(offset as i64, len);
        let title = format!(
            " {} ({} rows, {} columns) ",
            self.session.source().unwrap_or(""),
            ds.height(),
            ds.width()
        );
        self.table(&frame)
            .with_title(title)
            .with_row_numbers(offset)
            .render(area, buf);
        visible
    }

    fn render_summary(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Fill(1)])
            .split(area);
        Paragraph::new(format!(
            "Rows: {}    Columns: {}",
            output.summary.row_count, output.summary.col_count
        ))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.color("table_border")))
                .title(" Shape "),
        )
        .render(layout[0], buf);

        if output.summary.column_stats.is_empty() {
            self.render_message("No numeric columns to describe", "dimmed", layout[1], buf);
            return;
        }
        match output.summary.describe_frame() {
            Ok(df) => self
                .table(&df)
                .with_title(" Statistics ")
                .render(layout[1], buf),
            Err(e) => self.render_message(
                &error::user_message_from_polars(&e),
                "error",
                layout[1],
                buf,
            ),
        }
    }

    fn render_rows(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Fill(1)])
            .split(area);
        self.render_form(" Rows ", layout[0], buf);

        let tables = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1), Constraint::Fill(1)])
            .split(layout[1]);
        let total = output.summary.row_count;
        self.table(output.head.frame())
            .with_title(format!(" Top {} ", output.head.height()))
            .with_row_numbers(0)
            .render(tables[0], buf);
        self.table(output.tail.frame())
            .with_title(format!(" Bottom {} ", output.tail.height()))
            .with_row_numbers(total.saturating_sub(output.tail.height()))
            .render(tables[1], buf);
    }

    fn render_types(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        match output.summary.dtypes_frame() {
            Ok(df) => self.table(&df).with_title(" Column Types ").render(area, buf),
            Err(e) => {
                self.render_message(&error::user_message_from_polars(&e), "error", area, buf)
            }
        }
    }

    fn render_columns(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        let items: Vec<ListItem> = output
            .summary
            .column_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:>4}  ", i),
                        Style::default().fg(self.color("dimmed")),
                    ),
                    Span::raw(name.clone()),
                ]))
            })
            .collect();
        List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.color("table_border")))
                    .title(" Columns "),
            )
            .render(area, buf);
    }

    fn render_value_counts(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Fill(1)])
            .split(area);
        self.render_form(" Value Counts ", layout[0], buf);

        match &output.value_counts {
            None => {
                let column = self.session.ui().count_column.as_deref().unwrap_or("a column");
                self.render_message(
                    &format!("Press Enter to count the values of {}", column),
                    "dimmed",
                    layout[1],
                    buf,
                );
            }
            Some(Err(e)) => self.render_message(&user_message(e), error_slot(e), layout[1], buf),
            Some(Ok(view)) => {
                let parts = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(35), Constraint::Fill(1)])
                    .split(layout[1]);
                self.table(view.counts.table.frame())
                    .with_title(format!(" Top {} ", view.counts.len()))
                    .render(parts[0], buf);

                let constraints = vec![Constraint::Fill(1); view.charts.len().max(1)];
                let chart_areas = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints(constraints)
                    .split(parts[1]);
                for (chart, chart_area) in view.charts.iter().zip(chart_areas.iter()) {
                    ChartView::new(format!(" {} ", chart.spec.title()), &chart.data)
                        .with_theme(&self.theme)
                        .render(*chart_area, buf);
                }
            }
        }
    }

    fn render_group_by(&self, output: &RenderOutput, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Fill(1)])
            .split(area);
        self.render_form(" Group By ", layout[0], buf);

        match &output.group_by {
            None => self.render_message(
                "Select one or more grouping columns (Space) to aggregate",
                "dimmed",
                layout[1],
                buf,
            ),
            Some(Err(e)) => self.render_message(&user_message(e), error_slot(e), layout[1], buf),
            Some(Ok(view)) => {
                let parts = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Percentage(40), Constraint::Fill(1)])
                    .split(layout[1]);
                self.table(view.table.frame())
                    .with_title(format!(
                        " {} of {} by {} ",
                        view.spec.operator,
                        view.spec.target,
                        view.spec.grouping_columns().join(", ")
                    ))
                    .render(parts[0], buf);
                ChartView::new(format!(" {} ", view.chart.spec.title()), &view.chart.data)
                    .with_theme(&self.theme)
                    .render(parts[1], buf);
            }
        }
    }

    fn render_popup(&self, title: &str, text: &str, border: &str, area: Rect, buf: &mut Buffer) {
        let popup_area = centered_rect(area, 70, 50);
        Clear.render(popup_area, buf);
        Paragraph::new(text.to_string())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title.to_string())
                    .border_style(Style::default().fg(self.color(border))),
            )
            .render(popup_area, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        let mut constraints = vec![
            Constraint::Length(1), // tabs
            Constraint::Fill(1),
            Constraint::Length(1), // status
            Constraint::Length(1), // controls
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let titles: Vec<String> = Tab::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{} {}", i + 1, t.title()))
            .collect();
        Tabs::new(titles)
            .select(self.tab.index())
            .style(Style::default().fg(self.color("text_secondary")))
            .highlight_style(
                Style::default()
                    .fg(self.color("primary"))
                    .add_modifier(Modifier::BOLD),
            )
            .render(layout[0], buf);

        let main = layout[1];
        if self.session.output().is_none() {
            let text = match &self.loading {
                Some(path) => format!("Loading {}...", path.display()),
                None => "No data loaded. Press r to retry or q to quit.".to_string(),
            };
            Paragraph::new(text)
                .centered()
                .style(Style::default().fg(self.color("text_secondary")))
                .render(main, buf);
        } else if self.tab == Tab::Data {
            if let Some(ds) = self.session.dataset() {
                let page = self.render_data(ds, main, buf);
                self.data_page = page;
            }
        } else if let Some(output) = self.session.output() {
            match self.tab {
                Tab::Summary => self.render_summary(output, main, buf),
                Tab::Rows => self.render_rows(output, main, buf),
                Tab::Types => self.render_types(output, main, buf),
                Tab::Columns => self.render_columns(output, main, buf),
                Tab::ValueCounts => self.render_value_counts(output, main, buf),
                Tab::GroupBy => self.render_group_by(output, main, buf),
                Tab::Data => {}
            }
        }

        let (status, slot) = self
            .status
            .clone()
            .or_else(|| {
                self.path
                    .as_ref()
                    .map(|p| (p.display().to_string(), "secondary"))
            })
            .unwrap_or_default();
        Paragraph::new(status)
            .style(Style::default().fg(self.color(slot)))
            .render(layout[2], buf);

        let controls = Controls::new()
            .with_hints(self.tab.hints())
            .with_row_count(self.session.dataset().map(|ds| ds.height()))
            .with_dimmed(self.error_modal.active || self.show_help)
            .with_bg(self.color("controls_bg"));
        (&controls).render(layout[3], buf);

        if self.debug.enabled {
            (&self.debug).render(layout[4], buf);
        }

        if self.show_help {
            self.render_popup(" Help ", HELP_TEXT, "modal_border", area, buf);
        }

        if self.error_modal.active {
            let message = format!("{}\n\nPress Enter to close", self.error_modal.message);
            self.render_popup(" Error ", &message, "modal_border_error", area, buf);
        }
    }
}

/// Theme slot for a section error: stale column references are warnings.
fn error_slot(err: &PortalError) -> &'static str {
    if err.is_column_not_found() {
        "warning"
    } else {
        "error"
    }
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_both_ways() {
        let options = ["a", "b", "c"];
        assert_eq!(cycle(&options, Some(&"c"), 1), Some("a"));
        assert_eq!(cycle(&options, Some(&"a"), -1), Some("c"));
        assert_eq!(cycle(&options, None, 1), Some("a"));
        assert_eq!(cycle(&options, None, -1), Some("c"));
        assert_eq!(cycle::<&str>(&[], None, 1), None);
    }

    #[test]
    fn step_never_goes_below_one() {
        assert_eq!(step(1, -1), 1);
        assert_eq!(step(5, -1), 4);
        assert_eq!(step(5, 1), 6);
    }

    #[test]
    fn stale_columns_are_warnings() {
        assert_eq!(error_slot(&PortalError::ColumnNotFound("x".into())), "warning");
        assert_eq!(error_slot(&PortalError::Render("boom".into())), "error");
    }

    #[test]
    fn status_slots() {
        let mut app = App::new(AppConfig::default(), Theme::default());
        app.export();
        assert_eq!(app.status.as_ref().map(|(_, slot)| *slot), Some("warning"));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "city,sales\nA,10\n").unwrap();
        app.load(&path, &OpenOptions::default());
        assert_eq!(app.status(), Some("Loaded sales.csv"));
        assert_eq!(app.status.as_ref().map(|(_, slot)| *slot), Some("success"));

        app.export();
        assert_eq!(
            app.status(),
            Some("No charts to export. Press Count or select grouping columns first")
        );
        assert_eq!(app.status.as_ref().map(|(_, slot)| *slot), Some("warning"));
    }

    #[test]
    fn tabs_wrap() {
        assert_eq!(Tab::Data.prev(), Tab::GroupBy);
        assert_eq!(Tab::GroupBy.next(), Tab::Data);
        assert_eq!(Tab::Rows.next(), Tab::Types);
    }
}
