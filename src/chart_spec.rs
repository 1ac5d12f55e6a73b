//! Chart kinds, visual channels, and validation of a chart against a result table.

use std::fmt;

use crate::dataset::ResultTable;
use crate::error::{PortalError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Scatter,
    Pie,
    Sunburst,
}

impl ChartKind {
    pub const ALL: [Self; 5] = [
        Self::Line,
        Self::Bar,
        Self::Scatter,
        Self::Pie,
        Self::Sunburst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Scatter => "scatter",
            Self::Pie => "pie",
            Self::Sunburst => "sunburst",
        }
    }

    /// Channels that must be mapped before the chart can render.
    pub fn required_channels(self) -> &'static [Channel] {
        match self {
            Self::Line | Self::Bar | Self::Scatter => &[Channel::X, Channel::Y],
            Self::Pie => &[Channel::Values, Channel::Names],
            Self::Sunburst => &[Channel::Path],
        }
    }

    pub fn optional_channels(self) -> &'static [Channel] {
        match self {
            Self::Line => &[Channel::Color],
            Self::Bar => &[Channel::Color, Channel::Facet],
            Self::Scatter => &[Channel::Color, Channel::Size],
            Self::Pie | Self::Sunburst => &[],
        }
    }

    /// Required channels followed by optional ones.
    pub fn channels(self) -> Vec<Channel> {
        self.required_channels()
            .iter()
            .chain(self.optional_channels())
            .copied()
            .collect()
    }

    pub fn is_cartesian(self) -> bool {
        matches!(self, Self::Line | Self::Bar | Self::Scatter)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A visual role a column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    X,
    Y,
    Color,
    Size,
    Facet,
    Values,
    Names,
    Path,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Color => "color",
            Self::Size => "size",
            Self::Facet => "facet",
            Self::Values => "values",
            Self::Names => "names",
            Self::Path => "path",
        }
    }

    /// Form label shown next to the selector.
    pub fn label(self) -> &'static str {
        match self {
            Self::X => "X axis",
            Self::Y => "Y axis",
            Self::Color => "Color",
            Self::Size => "Size",
            Self::Facet => "Facet column",
            Self::Values => "Values",
            Self::Names => "Labels",
            Self::Path => "Path",
        }
    }

    /// Path takes an ordered list of columns; every other channel takes one.
    pub fn is_multi(self) -> bool {
        matches!(self, Self::Path)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column assigned to each channel. Unset channels are `None` (or an empty path).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelMapping {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub facet: Option<String>,
    pub values: Option<String>,
    pub names: Option<String>,
    pub path: Vec<String>,
}

impl ChannelMapping {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Column of a single-column channel. Always `None` for `Path`.
    pub fn get(&self, channel: Channel) -> Option<&str> {
        let slot = match channel {
            Channel::X => &self.x,
            Channel::Y => &self.y,
            Channel::Color => &self.color,
            Channel::Size => &self.size,
            Channel::Facet => &self.facet,
            Channel::Values => &self.values,
            Channel::Names => &self.names,
            Channel::Path => return None,
        };
        slot.as_deref()
    }

    /// Every column referenced by a channel, in path order for `Path`.
    pub fn columns(&self, channel: Channel) -> Vec<&str> {
        match channel {
            Channel::Path => self.path.iter().map(String::as_str).collect(),
            other => self.get(other).into_iter().collect(),
        }
    }

    /// Assign a single-column channel. Setting `Path` replaces the path with the one column.
    pub fn set(&mut self, channel: Channel, column: Option<String>) {
        match channel {
            Channel::X => self.x = column,
            Channel::Y => self.y = column,
            Channel::Color => self.color = column,
            Channel::Size => self.size = column,
            Channel::Facet => self.facet = column,
            Channel::Values => self.values = column,
            Channel::Names => self.names = column,
            Channel::Path => self.path = column.into_iter().collect(),
        }
    }

    /// Add the column to the end of the path, or remove it if present.
    pub fn toggle_path(&mut self, column: &str) {
        if let Some(pos) = self.path.iter().position(|c| c == column) {
            self.path.remove(pos);
        } else {
            self.path.push(column.to_string());
        }
    }

    /// Selections carried over to a result table with `columns`. A stale
    /// x, y, values or names selection takes the value from `defaults`; a stale
    /// color, size or facet is cleared; stale path levels are dropped.
    pub fn rebased_on(&self, columns: &[String], defaults: &ChannelMapping) -> Self {
        let present = |c: &String| columns.contains(c);
        let keep = |slot: &Option<String>| slot.clone().filter(present);
        let keep_or_default = |slot: &Option<String>, default: &Option<String>| match slot {
            Some(c) if !present(c) => default.clone(),
            other => other.clone(),
        };

        let mut path: Vec<String> = self.path.iter().filter(|c| present(*c)).cloned().collect();
        if path.is_empty() && !self.path.is_empty() {
            path = defaults.path.clone();
        }

        Self {
            x: keep_or_default(&self.x, &defaults.x),
            y: keep_or_default(&self.y, &defaults.y),
            color: keep(&self.color),
            size: keep(&self.size),
            facet: keep(&self.facet),
            values: keep_or_default(&self.values, &defaults.values),
            names: keep_or_default(&self.names, &defaults.names),
            path,
        }
    }

    /// Starting selections for a result table whose grouping columns come first
    /// and whose reduced or count column is last.
    pub fn defaults_for(columns: &[String]) -> Self {
        let first = columns.first().cloned();
        let last = columns.last().cloned();
        let path = if columns.len() > 1 {
            columns[..columns.len() - 1].to_vec()
        } else {
            columns.to_vec()
        };
        Self {
            x: first.clone(),
            y: last.clone(),
            color: None,
            size: None,
            facet: None,
            values: last,
            names: first,
            path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub channels: ChannelMapping,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, channels: ChannelMapping) -> Self {
        Self { kind, channels }
    }

    /// Every required channel is mapped, and every channel the kind uses names a
    /// column of `table`. Channels the kind does not use are ignored.
    pub fn validate(&self, table: &ResultTable) -> Result<()> {
        for &channel in self.kind.required_channels() {
            if self.channels.columns(channel).is_empty() {
                return Err(PortalError::MissingChannel {
                    kind: self.kind,
                    channel,
                });
            }
        }
        for channel in self.kind.channels() {
            table.require_columns(self.channels.columns(channel))?;
        }
        Ok(())
    }

    /// Short description, e.g. `bar: count by city`.
    pub fn title(&self) -> String {
        let c = &self.channels;
        match self.kind {
            ChartKind::Line | ChartKind::Bar | ChartKind::Scatter => format!(
                "{}: {} by {}",
                self.kind,
                c.y.as_deref().unwrap_or("?"),
                c.x.as_deref().unwrap_or("?")
            ),
            ChartKind::Pie => format!(
                "pie: {} by {}",
                c.values.as_deref().unwrap_or("?"),
                c.names.as_deref().unwrap_or("?")
            ),
            ChartKind::Sunburst => format!("sunburst: {}", c.path.join(" > ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn result() -> ResultTable {
        Dataset::new(
            df!(
                "city" => &["A", "B"],
                "store" => &["s1", "s2"],
                "newcol" => &[30i64, 70],
            )
            .unwrap(),
        )
    }

    fn mapping(x: &str, y: &str) -> ChannelMapping {
        ChannelMapping {
            x: Some(x.into()),
            y: Some(y.into()),
            ..Default::default()
        }
    }

    #[test]
    fn rebase_defaults_or_clears_stale_channels() {
        let picked = ChannelMapping {
            x: Some("store".into()),
            y: Some("newcol".into()),
            color: Some("store".into()),
            names: Some("city".into()),
            path: vec!["store".into(), "city".into()],
            ..Default::default()
        };
        let columns: Vec<String> = vec!["city".into(), "newcol".into()];
        let defaults = ChannelMapping::defaults_for(&columns);
        let rebased = picked.rebased_on(&columns, &defaults);
        assert_eq!(rebased.x.as_deref(), Some("city"));
        assert_eq!(rebased.y.as_deref(), Some("newcol"));
        assert_eq!(rebased.color, None);
        assert_eq!(rebased.names.as_deref(), Some("city"));
        assert_eq!(rebased.values, None);
        assert_eq!(rebased.path, vec!["city".to_string()]);

        let only_store = ChannelMapping {
            path: vec!["store".into()],
            ..Default::default()
        };
        assert_eq!(only_store.rebased_on(&columns, &defaults).path, defaults.path);
    }

    #[test]
    fn dispatch_table() {
        assert_eq!(ChartKind::Line.channels(), vec![Channel::X, Channel::Y, Channel::Color]);
        assert_eq!(
            ChartKind::Bar.channels(),
            vec![Channel::X, Channel::Y, Channel::Color, Channel::Facet]
        );
        assert_eq!(
            ChartKind::Scatter.channels(),
            vec![Channel::X, Channel::Y, Channel::Color, Channel::Size]
        );
        assert_eq!(ChartKind::Pie.channels(), vec![Channel::Values, Channel::Names]);
        assert_eq!(ChartKind::Sunburst.channels(), vec![Channel::Path]);
    }

    #[test]
    fn valid_spec_passes() {
        let spec = ChartSpec::new(ChartKind::Bar, mapping("city", "newcol"));
        assert!(spec.validate(&result()).is_ok());
    }

    #[test]
    fn missing_required_channel() {
        let mut channels = mapping("city", "newcol");
        channels.y = None;
        let err = ChartSpec::new(ChartKind::Line, channels)
            .validate(&result())
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::MissingChannel {
                kind: ChartKind::Line,
                channel: Channel::Y
            }
        ));

        let err = ChartSpec::new(ChartKind::Sunburst, ChannelMapping::default())
            .validate(&result())
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::MissingChannel {
                channel: Channel::Path,
                ..
            }
        ));
    }

    #[test]
    fn absent_optional_column_is_column_not_found() {
        let mut channels = mapping("city", "newcol");
        channels.color = Some("region".into());
        let err = ChartSpec::new(ChartKind::Scatter, channels)
            .validate(&result())
            .unwrap_err();
        assert!(matches!(err, PortalError::ColumnNotFound(ref c) if c == "region"));
    }

    #[test]
    fn unused_channels_are_ignored() {
        let mut channels = mapping("city", "newcol");
        // pie ignores x/y; line ignores facet
        channels.facet = Some("gone".into());
        assert!(ChartSpec::new(ChartKind::Line, channels.clone())
            .validate(&result())
            .is_ok());
        channels.values = Some("newcol".into());
        channels.names = Some("city".into());
        assert!(ChartSpec::new(ChartKind::Pie, channels)
            .validate(&result())
            .is_ok());
    }

    #[test]
    fn path_toggle_and_defaults() {
        let mut m = ChannelMapping::default();
        assert!(m.is_unset());
        m.toggle_path("city");
        m.toggle_path("store");
        assert_eq!(m.columns(Channel::Path), vec!["city", "store"]);
        m.toggle_path("city");
        assert_eq!(m.path, vec!["store"]);

        let cols: Vec<String> = vec!["city".into(), "store".into(), "newcol".into()];
        let d = ChannelMapping::defaults_for(&cols);
        assert_eq!(d.x.as_deref(), Some("city"));
        assert_eq!(d.y.as_deref(), Some("newcol"));
        assert_eq!(d.names.as_deref(), Some("city"));
        assert_eq!(d.values.as_deref(), Some("newcol"));
        assert_eq!(d.path, vec!["city", "store"]);
    }

    #[test]
    fn titles() {
        let spec = ChartSpec::new(ChartKind::Bar, mapping("city", "newcol"));
        assert_eq!(spec.title(), "bar: newcol by city");
        let mut m = ChannelMapping::default();
        m.path = vec!["city".into(), "store".into()];
        assert_eq!(
            ChartSpec::new(ChartKind::Sunburst, m).title(),
            "sunburst: city > store"
        );
    }
}
