//! Output rendering contract.
//!
//! Three modes, one precedence rule: raw beats pretty beats compact.
//! Raw exists for filter projections that land on a single scalar, so
//! strings print without quotes and anything structured falls back to
//! compact JSON rather than failing.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// How a value is turned into the line written to stdout or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No JSON encoding for scalars; structures fall back to compact.
    Raw,
    /// Tab-indented JSON.
    Pretty,
    /// Single-line JSON.
    #[default]
    Compact,
}

impl OutputMode {
    /// Combine the two output flags, raw winning over pretty.
    #[must_use]
    pub fn from_flags(raw: bool, pretty: bool) -> Self {
        if raw {
            Self::Raw
        } else if pretty {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

/// Render an already-built value in the given mode.
///
/// # Errors
///
/// Returns the underlying `serde_json` error when encoding fails.
pub fn render(value: &Value, mode: OutputMode) -> serde_json::Result<String> {
    match mode {
        OutputMode::Raw => match value {
            Value::String(text) => Ok(text.clone()),
            Value::Null => Ok("null".to_owned()),
            Value::Bool(flag) => Ok(flag.to_string()),
            Value::Number(number) => Ok(number.to_string()),
            Value::Array(_) | Value::Object(_) => serde_json::to_string(value),
        },
        OutputMode::Pretty => {
            let mut buf = Vec::new();
            let mut serializer =
                Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        OutputMode::Compact => serde_json::to_string(value),
    }
}
