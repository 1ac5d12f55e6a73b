use color_eyre::eyre::eyre;
use color_eyre::Result;
use log::warn;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

use crate::aggregate::{AggOperator, DEFAULT_RESULT_COLUMN};

pub const CONFIG_VERSION: &str = "0.1";
const CONFIG_FILE: &str = "config.toml";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Config directory for the given app name, under the platform config root
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write the commented default template to `config.toml`
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path(CONFIG_FILE);

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read the user config file. A missing file yields the defaults.
    pub fn read_user_config(&self) -> Result<AppConfig> {
        let config_path = self.config_path(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Defaults merged with the user file, then validated
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::default();
        match self.read_user_config() {
            Ok(user) => config.merge(user),
            Err(e) => warn!("Ignoring user config: {}", e),
        }
        config.validate()?;
        Ok(config)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub display: DisplayConfig,
    pub aggregation: AggregationConfig,
    pub charts: ChartsConfig,
    pub performance: PerformanceConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    /// Worksheet by name or 0-based index
    pub sheet: Option<String>,
    pub parse_dates: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub head_rows: usize,
    pub tail_rows: usize,
    pub top_k: usize,
    /// Rows shown in the full-table preview
    pub max_preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Name of the reduced column in group-by results
    pub result_column: String,
    pub default_operator: AggOperator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartsConfig {
    /// Where `e` writes SVG files. Defaults to the current directory.
    pub export_dir: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorConfig {
    pub primary: String,
    pub secondary: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub table_header: String,
    pub table_border: String,
    pub table_selected: String,
    pub modal_border: String,
    pub modal_border_active: String,
    pub modal_border_error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Log file path; defaults to `dataportal.log` in the cache directory
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            file_loading: FileLoadingConfig::default(),
            display: DisplayConfig::default(),
            aggregation: AggregationConfig::default(),
            charts: ChartsConfig::default(),
            performance: PerformanceConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            head_rows: 5,
            tail_rows: 5,
            top_k: 10,
            max_preview_rows: 1000,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            result_column: DEFAULT_RESULT_COLUMN.to_string(),
            default_operator: AggOperator::Sum,
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            width: 800,
            height: 600,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "cyan".to_string(),
            secondary: "yellow".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            table_header: "white".to_string(),
            table_border: "cyan".to_string(),
            table_selected: "reversed".to_string(),
            modal_border: "cyan".to_string(),
            modal_border_active: "yellow".to_string(),
            modal_border_error: "red".to_string(),
        }
    }
}

/// Replace each listed field of `$self` with `$other`'s when it differs from the default.
macro_rules! merge_changed {
    ($self:ident, $other:ident, $default:expr, [$($field:ident),* $(,)?]) => {{
        let default = $default;
        $(
            if $other.$field != default.$field {
                $self.$field = $other.$field;
            }
        )*
    }};
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        ConfigManager::new(app_name)?.load_config()
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != CONFIG_VERSION {
            self.version = other.version;
        }
        self.file_loading.merge(other.file_loading);
        self.display.merge(other.display);
        self.aggregation.merge(other.aggregation);
        self.charts.merge(other.charts);
        self.performance.merge(other.performance);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with(CONFIG_VERSION) {
            return Err(eyre!(
                "Unsupported config version: {}. Expected {}.x",
                self.version,
                CONFIG_VERSION
            ));
        }

        let display = &self.display;
        for (name, value) in [
            ("head_rows", display.head_rows),
            ("tail_rows", display.tail_rows),
            ("top_k", display.top_k),
            ("max_preview_rows", display.max_preview_rows),
        ] {
            if value == 0 {
                return Err(eyre!("display.{} must be greater than 0", name));
            }
        }

        if self.aggregation.result_column.trim().is_empty() {
            return Err(eyre!("aggregation.result_column must not be empty"));
        }

        if self.charts.width < 100 || self.charts.height < 100 {
            return Err(eyre!(
                "charts.width and charts.height must be at least 100 (got {}x{})",
                self.charts.width,
                self.charts.height
            ));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.sheet.is_some() {
            self.sheet = other.sheet;
        }
        if other.parse_dates.is_some() {
            self.parse_dates = other.parse_dates;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        merge_changed!(
            self,
            other,
            Self::default(),
            [head_rows, tail_rows, top_k, max_preview_rows]
        );
    }
}

impl AggregationConfig {
    pub fn merge(&mut self, other: Self) {
        merge_changed!(self, other, Self::default(), [result_column, default_operator]);
    }
}

impl ChartsConfig {
    pub fn merge(&mut self, other: Self) {
        if other.export_dir.is_some() {
            self.export_dir = other.export_dir;
        }
        merge_changed!(self, other, Self::default(), [width, height]);
    }

    /// Export directory, falling back to `fallback` when unset.
    pub fn export_dir_or(&self, fallback: &Path) -> PathBuf {
        self.export_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        merge_changed!(self, other, Self::default(), [event_poll_interval_ms]);
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    /// Every color slot as `(name, value)`.
    pub fn entries(&self) -> [(&'static str, &str); 15] {
        [
            ("primary", self.primary.as_str()),
            ("secondary", self.secondary.as_str()),
            ("success", self.success.as_str()),
            ("error", self.error.as_str()),
            ("warning", self.warning.as_str()),
            ("dimmed", self.dimmed.as_str()),
            ("controls_bg", self.controls_bg.as_str()),
            ("text_primary", self.text_primary.as_str()),
            ("text_secondary", self.text_secondary.as_str()),
            ("table_header", self.table_header.as_str()),
            ("table_border", self.table_border.as_str()),
            ("table_selected", self.table_selected.as_str()),
            ("modal_border", self.modal_border.as_str()),
            ("modal_border_active", self.modal_border_active.as_str()),
            ("modal_border_error", self.modal_border_error.as_str()),
        ]
    }

    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.entries() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        merge_changed!(
            self,
            other,
            Self::default(),
            [
                primary,
                secondary,
                success,
                error,
                warning,
                dimmed,
                controls_bg,
                text_primary,
                text_secondary,
                table_header,
                table_border,
                table_selected,
                modal_border,
                modal_border_active,
                modal_border_error,
            ]
        );
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file;
        }
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse `#rrggbb`, `indexed(n)` or a color name into a terminal color
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();
        if trimmed.starts_with('#') {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.rgb(r, g, b));
        }

        let lower = trimmed.to_lowercase();
        if let Some(inner) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let num = inner.trim().parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        let color = match lower.replace(' ', "_").as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "white" => Color::White,
            "bright_black" | "gray" | "grey" | "dark_gray" | "dark_grey" => Color::Indexed(8),
            "bright_red" => Color::Indexed(9),
            "bright_green" => Color::Indexed(10),
            "bright_yellow" => Color::Indexed(11),
            "bright_blue" => Color::Indexed(12),
            "bright_magenta" => Color::Indexed(13),
            "bright_cyan" => Color::Indexed(14),
            "bright_white" => Color::Indexed(15),
            "light_gray" | "light_grey" => Color::Indexed(7),
            // handled as a modifier by the renderer
            "reset" | "reversed" => Color::Reset,
            _ => {
                return Err(eyre!(
                    "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                     bright variants (bright_red, etc.), indexed(n), or hex colors (#ff0000)",
                    trimmed
                ))
            }
        };
        Ok(color)
    }

    fn rgb(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let digits = s.strip_prefix('#').unwrap_or(s);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|_| eyre!("Invalid hex digits in color: {}", s))
    };
    Ok((component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Nearest index in the xterm 256-color palette
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let spread = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if spread < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        return match gray {
            0..=7 => 16,
            248.. => 231,
            _ => 232 + ((gray - 8) * 24 / 240) as u8,
        };
    }
    let level = |c: u8| (c as u16 * 5 / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

/// Nearest of the 8 basic ANSI colors
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let spread = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if spread < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }
    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Parsed theme colors, keyed by slot name
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();
        for (name, value) in config.colors.entries() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { colors })
    }

    /// Color by name, `Reset` if unknown
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }

    pub fn get_optional(&self, name: &str) -> Option<Color> {
        self.colors.get(name).copied()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_config(&ThemeConfig::default()).unwrap_or_else(|_| Self {
            colors: HashMap::new(),
        })
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
