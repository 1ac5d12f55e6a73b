//! Error taxonomy and user-facing error message formatting.
//!
//! Uses typed error matching (PolarsError variants, io::ErrorKind) rather than
//! string parsing to produce actionable messages.

use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

use crate::aggregate::AggOperator;
use crate::chart_spec::{Channel, ChartKind};

pub type Result<T, E = PortalError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PortalError {
    /// The uploaded bytes do not match the declared file structure.
    #[error("could not read {format} file: {message}")]
    Format {
        format: &'static str,
        message: String,
    },

    /// A column reference that is absent from the table it was used on.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// A numeric operator applied to a non-numeric column.
    #[error("cannot compute {operator} of non-numeric column '{column}' ({dtype})")]
    TypeAggregationMismatch {
        column: String,
        operator: AggOperator,
        dtype: String,
    },

    #[error("{kind} chart needs a column for '{channel}'")]
    MissingChannel { kind: ChartKind, channel: Channel },

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PortalError {
    pub fn format(format: &'static str, message: impl Into<String>) -> Self {
        Self::Format {
            format,
            message: message.into(),
        }
    }

    /// True for errors caused by a stale or invalid column reference.
    pub fn is_column_not_found(&self) -> bool {
        match self {
            Self::ColumnNotFound(_) => true,
            Self::Polars(PolarsError::ColumnNotFound(_)) => true,
            _ => false,
        }
    }
}

/// One-line message shown to the user for any error.
pub fn user_message(err: &PortalError) -> String {
    match err {
        PortalError::ColumnNotFound(name) => format!(
            "Column not found: '{}'. It may not exist in the current file; pick another column.",
            name
        ),
        PortalError::TypeAggregationMismatch { .. } => {
            format!("{}. Choose a numeric column or use count.", capitalize(&err.to_string()))
        }
        PortalError::Polars(e) => user_message_from_polars(e),
        PortalError::Io(e) => user_message_from_io(e, None),
        _ => capitalize(&err.to_string()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!(
            "Duplicate column name: {}. Column names must be unique.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Keep the first line of a compute error; polars appends hints on later lines.
fn simplify_compute_message(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or(msg).trim();
    if first.is_empty() {
        "Computation failed.".to_string()
    } else {
        first.to_string()
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}
