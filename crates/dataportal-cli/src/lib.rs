//! Shared CLI definitions for dataportal.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for data files (used to bypass extension-based detection).
/// When `--format` is not specified, a name ending in `.csv` is read as CSV and
/// anything else as a spreadsheet.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with a header row
    Csv,
    /// Spreadsheet workbook (.xlsx, .xls, .xlsm, .xlsb, .ods)
    Excel,
}

impl FileFormat {
    /// Detect file format from a file name. Only `.csv` is delimited text.
    pub fn from_path(path: &Path) -> Self {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            Self::Csv
        } else {
            Self::Excel
        }
    }
}

/// Parse a single-byte delimiter: a literal character (`;`), `\t` or `tab`, or a byte value (`59`).
pub fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii() {
            return Ok(c as u8);
        }
        return Err(format!("delimiter '{}' is not a single ASCII character", s));
    }
    s.parse::<u8>()
        .map_err(|_| format!("invalid delimiter '{}': expected one character or a byte value", s))
}

/// Command-line arguments for dataportal
#[derive(Clone, Parser, Debug)]
#[command(
    name = "dataportal",
    version,
    about = "Explore CSV and spreadsheet files in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path to the CSV or spreadsheet file to open
    #[arg(required_unless_present_any = ["generate_config", "clear_cache"], value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Force file format (csv, excel). By default a name ending in .csv is read as CSV
    /// and anything else as a spreadsheet.
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Delimiter for CSV files: a character (e.g. ';'), 'tab', or a byte value
    #[arg(long = "delimiter", value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Specify that the file has no header row
    #[arg(long = "no-header")]
    pub no_header: Option<bool>,

    /// Try to parse CSV string columns as dates (default: true)
    #[arg(long = "parse-dates", value_name = "BOOL", value_parser = clap::value_parser!(bool))]
    pub parse_dates: Option<bool>,

    /// Spreadsheet sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Number of most frequent values shown by Value Counts (default from config: 10)
    #[arg(long = "top-k", value_name = "N")]
    pub top_k: Option<usize>,

    /// Name of the reduced column in group-by results (default: newcol)
    #[arg(long = "result-column", value_name = "NAME")]
    pub result_column: Option<String>,

    /// Directory where exported SVG charts are written (default: current directory)
    #[arg(long = "chart-dir", value_name = "DIR")]
    pub chart_dir: Option<PathBuf>,

    /// Enable debug mode: on-screen counters and a log file in the cache directory
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data (log file) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/dataportal/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if !arg.get_action().takes_values() || placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("data.csv")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("DATA.CSV")), FileFormat::Csv);
        assert_eq!(
            FileFormat::from_path(Path::new("sales.xlsx")),
            FileFormat::Excel
        );
        assert_eq!(FileFormat::from_path(Path::new("noext")), FileFormat::Excel);
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("\\t"), Ok(b'\t'));
        assert_eq!(parse_delimiter("59"), Ok(b';'));
        assert!(parse_delimiter("é").is_err());
        assert!(parse_delimiter("abc").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "dataportal",
            "sales.csv",
            "--delimiter",
            ";",
            "--top-k",
            "3",
        ])
        .unwrap();
        assert_eq!(args.path, Some(PathBuf::from("sales.csv")));
        assert_eq!(args.delimiter, Some(b';'));
        assert_eq!(args.top_k, Some(3));
        assert!(!args.debug);
    }

    #[test]
    fn test_path_required_unless_early_exit_flag() {
        assert!(Args::try_parse_from(["dataportal"]).is_err());
        assert!(Args::try_parse_from(["dataportal", "--clear-cache"]).is_ok());
        assert!(Args::try_parse_from(["dataportal", "--generate-config", "--force"]).is_ok());
    }

    #[test]
    fn test_options_markdown_lists_flags() {
        let md = render_options_markdown();
        assert!(md.contains("--top-k"));
        assert!(md.contains("--chart-dir"));
        assert!(!md.contains("--help"));
    }
}
