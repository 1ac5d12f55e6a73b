//! Interaction handling: widget state, pure evaluation, and the session-scoped dataset slot.
//!
//! Every widget change is an [`Interaction`]. [`Session::apply`] folds it into the
//! [`UiState`] and re-runs [`evaluate`], which recomputes every section from the
//! current dataset. Nothing is cached between evaluations.

use log::{debug, info};

use crate::aggregate::{group_and_aggregate, AggOperator, AggregationSpec};
use crate::chart_data::ChartData;
use crate::chart_spec::{Channel, ChannelMapping, ChartKind, ChartSpec};
use crate::config::{AggregationConfig, AppConfig, DisplayConfig};
use crate::dataset::{Dataset, ResultTable};
use crate::error::Result;
use crate::loader::{self, OpenOptions};
use crate::summary::{summarize, Summary};
use crate::value_counts::{value_counts, ValueCounts};
use crate::window;

/// Current value of every widget.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub head_rows: usize,
    pub tail_rows: usize,
    pub count_column: Option<String>,
    pub top_k: usize,
    /// Set by the Count button; cleared when the counted column or `top_k` changes.
    pub count_requested: bool,
    pub group_by: Vec<String>,
    pub target: Option<String>,
    pub operator: AggOperator,
    pub chart_kind: ChartKind,
    /// Unset until the user picks a channel; defaults follow the result table until then.
    pub channels: ChannelMapping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    SetHeadRows(usize),
    SetTailRows(usize),
    SelectCountColumn(String),
    SetTopK(usize),
    PressCount,
    ToggleGroupColumn(String),
    SetGroupColumns(Vec<String>),
    SetTarget(String),
    SetOperator(AggOperator),
    SetChartKind(ChartKind),
    SetChannel(Channel, Option<String>),
    TogglePathColumn(String),
}

impl UiState {
    /// Initial widget values before any dataset is loaded.
    pub fn new(display: &DisplayConfig, aggregation: &AggregationConfig) -> Self {
        Self {
            head_rows: display.head_rows.max(1),
            tail_rows: display.tail_rows.max(1),
            count_column: None,
            top_k: display.top_k.max(1),
            count_requested: false,
            group_by: Vec::new(),
            target: None,
            operator: aggregation.default_operator,
            chart_kind: ChartKind::default(),
            channels: ChannelMapping::default(),
        }
    }

    /// Initial widget values for `ds`: the first column is counted, and the first
    /// numeric column (or the first column) is the aggregation target.
    pub fn for_dataset(
        ds: &Dataset,
        display: &DisplayConfig,
        aggregation: &AggregationConfig,
    ) -> Self {
        let names = ds.column_names();
        let target = names
            .iter()
            .find(|name| ds.kind(name).map(|k| k.is_numeric()).unwrap_or(false))
            .or_else(|| names.first())
            .cloned();
        Self {
            count_column: names.first().cloned(),
            target,
            ..Self::new(display, aggregation)
        }
    }

    /// Fold one interaction into the state. Row counts are clamped to `[1, row_count]`.
    pub fn apply(&mut self, interaction: Interaction, row_count: usize) {
        let clamp = |n: usize| n.clamp(1, row_count.max(1));
        match interaction {
            Interaction::SetHeadRows(n) => self.head_rows = clamp(n),
            Interaction::SetTailRows(n) => self.tail_rows = clamp(n),
            Interaction::SelectCountColumn(column) => {
                if self.count_column.as_deref() != Some(column.as_str()) {
                    self.count_requested = false;
                }
                self.count_column = Some(column);
            }
            Interaction::SetTopK(k) => {
                let k = k.max(1);
                if k != self.top_k {
                    self.count_requested = false;
                }
                self.top_k = k;
            }
            Interaction::PressCount => self.count_requested = true,
            Interaction::ToggleGroupColumn(column) => {
                match self.group_by.iter().position(|c| *c == column) {
                    Some(pos) => {
                        self.group_by.remove(pos);
                    }
                    None => self.group_by.push(column),
                }
            }
            Interaction::SetGroupColumns(columns) => self.group_by = columns,
            Interaction::SetTarget(column) => self.target = Some(column),
            Interaction::SetOperator(op) => self.operator = op,
            Interaction::SetChartKind(kind) => self.chart_kind = kind,
            Interaction::SetChannel(channel, column) => self.channels.set(channel, column),
            Interaction::TogglePathColumn(column) => self.channels.toggle_path(&column),
        }
    }

    /// Columns the group-by result will have: grouping columns, then `result_column`.
    pub fn result_columns(&self, result_column: &str) -> Vec<String> {
        let mut columns: Vec<String> = Vec::with_capacity(self.group_by.len() + 1);
        for c in &self.group_by {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
        columns.push(result_column.to_string());
        columns
    }

    /// Channel selections to use against `table`.
    pub fn effective_channels(&self, table: &ResultTable) -> ChannelMapping {
        if self.channels.is_unset() {
            ChannelMapping::defaults_for(&table.column_names())
        } else {
            self.channels.clone()
        }
    }
}

/// A chart spec and its projection, or the reason it cannot be drawn.
#[derive(Debug)]
pub struct ProjectedChart {
    pub spec: ChartSpec,
    pub data: Result<ChartData>,
}

impl ProjectedChart {
    fn project(spec: ChartSpec, table: &ResultTable) -> Self {
        let data = ChartData::project(&spec, table);
        Self { spec, data }
    }
}

#[derive(Debug)]
pub struct ValueCountsView {
    pub counts: ValueCounts,
    /// Bar, line and pie, in that order.
    pub charts: Vec<ProjectedChart>,
}

#[derive(Debug)]
pub struct GroupByView {
    pub spec: AggregationSpec,
    pub table: ResultTable,
    pub chart: ProjectedChart,
}

/// Everything the screen shows for one evaluation.
#[derive(Debug)]
pub struct RenderOutput {
    pub summary: Summary,
    pub head: Dataset,
    pub tail: Dataset,
    /// `None` until Count is pressed.
    pub value_counts: Option<Result<ValueCountsView>>,
    /// `None` while no grouping column is selected.
    pub group_by: Option<Result<GroupByView>>,
}

impl RenderOutput {
    /// Every chart that projected cleanly, with the table it was drawn from.
    pub fn exportable_charts(&self) -> Vec<(ChartSpec, &ResultTable)> {
        let mut charts = Vec::new();
        if let Some(Ok(view)) = &self.value_counts {
            for chart in view.charts.iter().filter(|c| c.data.is_ok()) {
                charts.push((chart.spec.clone(), &view.counts.table));
            }
        }
        if let Some(Ok(view)) = &self.group_by {
            if view.chart.data.is_ok() {
                charts.push((view.chart.spec.clone(), &view.table));
            }
        }
        charts
    }
}

/// Recompute every section for `ds` under `ui`. Errors are reported per section.
pub fn evaluate(ds: &Dataset, ui: &UiState, aggregation: &AggregationConfig) -> RenderOutput {
    let value_counts = match (&ui.count_requested, &ui.count_column) {
        (true, Some(column)) => Some(value_counts(ds, column, ui.top_k).map(|counts| {
            let charts = counts
                .charts()
                .into_iter()
                .map(|spec| ProjectedChart::project(spec, &counts.table))
                .collect();
            ValueCountsView { counts, charts }
        })),
        _ => None,
    };

    let group_by = match &ui.target {
        Some(target) if !ui.group_by.is_empty() => {
            let spec = AggregationSpec::new(ui.group_by.clone(), target.as_str(), ui.operator);
            group_and_aggregate(ds, &spec, &aggregation.result_column)
                .transpose()
                .map(|result| {
                    result.map(|table| {
                        let chart = ChartSpec::new(ui.chart_kind, ui.effective_channels(&table));
                        let chart = ProjectedChart::project(chart, &table);
                        GroupByView { spec, table, chart }
                    })
                })
        }
        _ => None,
    };

    RenderOutput {
        summary: summarize(ds),
        head: window::head(ds, ui.head_rows),
        tail: window::tail(ds, ui.tail_rows),
        value_counts,
        group_by,
    }
}

/// Holds the one loaded dataset, the widget state, and the latest render.
pub struct Session {
    dataset: Option<Dataset>,
    source: Option<String>,
    ui: UiState,
    output: Option<RenderOutput>,
    display: DisplayConfig,
    aggregation: AggregationConfig,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            dataset: None,
            source: None,
            ui: UiState::new(&config.display, &config.aggregation),
            output: None,
            display: config.display.clone(),
            aggregation: config.aggregation.clone(),
        }
    }

    /// Parse `bytes` and make the result the current dataset.
    ///
    /// On failure the previous dataset (if any) stays loaded. Widget state survives
    /// a reopen, so selections that no longer match a column surface as
    /// `ColumnNotFound` in the affected section.
    pub fn open(&mut self, bytes: &[u8], filename: &str, options: &OpenOptions) -> Result<()> {
        let ds = loader::load(bytes, filename, options)?;
        info!(
            "Opened {}: {} rows x {} columns",
            filename,
            ds.height(),
            ds.width()
        );
        self.replace_dataset(ds, filename);
        Ok(())
    }

    /// Install an already-loaded dataset.
    pub fn replace_dataset(&mut self, ds: Dataset, source: &str) {
        if self.dataset.is_none() {
            self.ui = UiState::for_dataset(&ds, &self.display, &self.aggregation);
        }
        self.dataset = Some(ds);
        self.source = Some(source.to_string());
        self.refresh();
    }

    /// Apply one widget change and re-evaluate. A no-op before any dataset is loaded.
    pub fn apply(&mut self, interaction: Interaction) -> Option<&RenderOutput> {
        let row_count = self.dataset.as_ref()?.height();
        debug!("interaction: {:?}", interaction);

        if matches!(
            interaction,
            Interaction::SetChannel(..) | Interaction::TogglePathColumn(_)
        ) && self.ui.channels.is_unset()
        {
            // start from what is on screen
            if let Some(Ok(view)) = self.output.as_ref().and_then(|o| o.group_by.as_ref()) {
                self.ui.channels = view.chart.spec.channels.clone();
            }
        }

        let regroups = matches!(
            interaction,
            Interaction::ToggleGroupColumn(_) | Interaction::SetGroupColumns(_)
        );
        self.ui.apply(interaction, row_count);
        if regroups && !self.ui.channels.is_unset() {
            let columns = self.ui.result_columns(&self.aggregation.result_column);
            let defaults = ChannelMapping::defaults_for(&columns);
            self.ui.channels = self.ui.channels.rebased_on(&columns, &defaults);
        }
        self.refresh();
        self.output.as_ref()
    }

    fn refresh(&mut self) {
        self.output = self
            .dataset
            .as_ref()
            .map(|ds| evaluate(ds, &self.ui, &self.aggregation));
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn output(&self) -> Option<&RenderOutput> {
        self.output.as_ref()
    }

    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use polars::prelude::*;

    const SALES_CSV: &[u8] = b"city,sales\nA,10\nA,20\nB,30\nB,40\n";

    fn session() -> Session {
        let mut s = Session::new(&AppConfig::default());
        s.open(SALES_CSV, "sales.csv", &OpenOptions::default())
            .unwrap();
        s
    }

    fn group_view(s: &Session) -> &GroupByView {
        match s.output().unwrap().group_by.as_ref() {
            Some(Ok(view)) => view,
            other => panic!("expected group-by view, got {:?}", other),
        }
    }

    #[test]
    fn open_fills_every_section() {
        let s = session();
        let out = s.output().unwrap();
        assert_eq!(out.summary.row_count, 4);
        assert_eq!(out.summary.col_count, 2);
        assert_eq!(out.head.height(), 4);
        assert!(out.value_counts.is_none());
        assert!(out.group_by.is_none());
        assert_eq!(s.ui().count_column.as_deref(), Some("city"));
        assert_eq!(s.ui().target.as_deref(), Some("sales"));
        assert_eq!(s.source(), Some("sales.csv"));
    }

    #[test]
    fn failed_open_keeps_previous_dataset() {
        let mut s = session();
        let err = s
            .open(&[0xff, 0xfe, 0x00, 0x80], "junk.csv", &OpenOptions::default())
            .unwrap_err();
        assert!(matches!(err, PortalError::Format { .. }));
        assert_eq!(s.dataset().unwrap().height(), 4);
        assert_eq!(s.source(), Some("sales.csv"));
    }

    #[test]
    fn apply_before_open_is_a_no_op() {
        let mut s = Session::new(&AppConfig::default());
        assert!(s.apply(Interaction::PressCount).is_none());
        assert!(s.output().is_none());
    }

    #[test]
    fn row_windows_are_clamped() {
        let mut s = session();
        s.apply(Interaction::SetHeadRows(2));
        s.apply(Interaction::SetTailRows(50));
        assert_eq!(s.ui().tail_rows, 4);
        let out = s.output().unwrap();
        assert_eq!(out.head.height(), 2);
        assert_eq!(out.tail.height(), 4);
        s.apply(Interaction::SetHeadRows(0));
        assert_eq!(s.ui().head_rows, 1);
    }

    #[test]
    fn count_button_reveals_value_counts() {
        let mut s = session();
        s.apply(Interaction::SetTopK(2));
        s.apply(Interaction::PressCount);
        let view = match s.output().unwrap().value_counts.as_ref() {
            Some(Ok(view)) => view,
            other => panic!("expected counts, got {:?}", other),
        };
        assert_eq!(view.counts.table.text_values("city").unwrap(), vec!["A", "B"]);
        assert_eq!(view.charts.len(), 3);
        assert!(view.charts.iter().all(|c| c.data.is_ok()));

        // unrelated widgets keep the counts on screen
        s.apply(Interaction::SetHeadRows(1));
        assert!(s.output().unwrap().value_counts.is_some());

        // changing what is counted needs another press
        s.apply(Interaction::SelectCountColumn("sales".into()));
        assert!(s.output().unwrap().value_counts.is_none());
    }

    #[test]
    fn group_by_scenario() {
        let mut s = session();
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        let view = group_view(&s);
        assert_eq!(view.table.column_names(), vec!["city", "newcol"]);
        assert_eq!(
            view.table.f64_values("newcol").unwrap(),
            vec![Some(30.0), Some(70.0)]
        );
        // default chart: line of newcol by city
        assert_eq!(view.chart.spec.kind, ChartKind::Line);
        assert_eq!(view.chart.spec.channels.x.as_deref(), Some("city"));
        assert_eq!(view.chart.spec.channels.y.as_deref(), Some("newcol"));
        assert!(view.chart.data.is_ok());

        s.apply(Interaction::SetOperator(AggOperator::Mean));
        assert_eq!(
            group_view(&s).table.f64_values("newcol").unwrap(),
            vec![Some(15.0), Some(35.0)]
        );

        // deselecting the last grouping column hides the section
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        assert!(s.output().unwrap().group_by.is_none());
    }

    #[test]
    fn type_mismatch_is_reported_in_section() {
        let mut s = session();
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        s.apply(Interaction::SetTarget("city".into()));
        s.apply(Interaction::SetOperator(AggOperator::Median));
        match s.output().unwrap().group_by.as_ref() {
            Some(Err(PortalError::TypeAggregationMismatch { column, .. })) => {
                assert_eq!(column, "city")
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        // the other sections still render
        assert_eq!(s.output().unwrap().summary.row_count, 4);

        s.apply(Interaction::SetOperator(AggOperator::Count));
        assert!(matches!(s.output().unwrap().group_by, Some(Ok(_))));
    }

    #[test]
    fn channel_edits_start_from_defaults() {
        let mut s = session();
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        s.apply(Interaction::SetChartKind(ChartKind::Bar));
        s.apply(Interaction::SetChannel(Channel::Color, Some("city".into())));
        let spec = &group_view(&s).chart.spec;
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.channels.x.as_deref(), Some("city"));
        assert_eq!(spec.channels.color.as_deref(), Some("city"));

        s.apply(Interaction::SetChannel(Channel::Y, Some("profit".into())));
        assert!(matches!(
            group_view(&s).chart.data,
            Err(PortalError::ColumnNotFound(ref c)) if c == "profit"
        ));

        s.apply(Interaction::SetChartKind(ChartKind::Sunburst));
        s.apply(Interaction::TogglePathColumn("city".into()));
        // "city" was already in the default path, so toggling removes it
        assert!(matches!(
            group_view(&s).chart.data,
            Err(PortalError::MissingChannel {
                channel: Channel::Path,
                ..
            })
        ));
    }

    #[test]
    fn regrouping_rebases_edited_channels() {
        let mut s = Session::new(&AppConfig::default());
        s.open(
            b"region,city,sales\nn,A,1\ns,A,2\nn,B,3\n",
            "regions.csv",
            &OpenOptions::default(),
        )
        .unwrap();
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        s.apply(Interaction::SetChartKind(ChartKind::Bar));
        s.apply(Interaction::SetChannel(Channel::Color, Some("city".into())));
        assert_eq!(group_view(&s).chart.spec.channels.x.as_deref(), Some("city"));

        // still a result column: selections stay
        s.apply(Interaction::ToggleGroupColumn("region".into()));
        assert_eq!(group_view(&s).chart.spec.channels.color.as_deref(), Some("city"));

        s.apply(Interaction::ToggleGroupColumn("city".into()));
        let view = group_view(&s);
        assert_eq!(view.table.column_names(), vec!["region", "newcol"]);
        assert_eq!(view.chart.spec.channels.x.as_deref(), Some("region"));
        assert_eq!(view.chart.spec.channels.color, None);
        assert!(view.chart.data.is_ok());
    }

    #[test]
    fn reopen_keeps_selections_and_reports_stale_columns() {
        let mut s = session();
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        s.open(b"region,sales\nn,1\ns,2\n", "other.csv", &OpenOptions::default())
            .unwrap();
        assert!(matches!(
            s.output().unwrap().group_by,
            Some(Err(PortalError::ColumnNotFound(ref c))) if c == "city"
        ));
        assert_eq!(s.output().unwrap().summary.row_count, 2);
    }

    #[test]
    fn exportable_charts_skip_failures() {
        let mut s = session();
        s.apply(Interaction::PressCount);
        s.apply(Interaction::ToggleGroupColumn("city".into()));
        assert_eq!(s.output().unwrap().exportable_charts().len(), 4);
        s.apply(Interaction::SetChannel(Channel::X, Some("gone".into())));
        assert_eq!(s.output().unwrap().exportable_charts().len(), 3);
    }

    #[test]
    fn evaluate_is_pure() {
        let ds = Dataset::new(
            df!("city" => &["A", "A", "B", "B"], "sales" => &[10i64, 20, 30, 40]).unwrap(),
        );
        let config = AppConfig::default();
        let mut ui = UiState::for_dataset(&ds, &config.display, &config.aggregation);
        ui.group_by = vec!["city".into()];
        ui.count_requested = true;
        let first = evaluate(&ds, &ui, &config.aggregation);
        let second = evaluate(&ds, &ui, &config.aggregation);
        let a = &first.group_by.as_ref().unwrap().as_ref().unwrap().table;
        let b = &second.group_by.as_ref().unwrap().as_ref().unwrap().table;
        assert!(a.frame().equals(b.frame()));
        assert_eq!(ds.height(), 4);
    }
}
