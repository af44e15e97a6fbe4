//! Connection settings and the layered resolver that produces them.
//!
//! Flag-vs-environment merging happens in the CLI layer; this module
//! takes the merged value per field, layers in the batch file's `wsdl`
//! key, and falls back to interactive prompting through [`Prompter`].
//! Empty strings count as absent at every layer, so `--username ""`
//! falls through the same way an unset flag does.

use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Well-known service path segment, matched case-insensitively so it
/// can be rewritten to the canonical casing the server publishes.
#[allow(clippy::unwrap_used)]
static WSDL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)sswebservice\.asmx\?wsdl").unwrap());

/// Everything needed to authenticate against one server. Built once
/// per invocation by [`resolve_connection`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub wsdl_url: String,
    pub username: String,
    pub password: String,
    /// Forwarded to the authenticate call; empty means unset.
    pub organization: String,
    /// Forwarded to the authenticate call; empty means unset.
    pub domain: String,
}

/// Per-field values after the CLI has merged flags with environment
/// variables. `None` (or an empty string) means the field was not
/// supplied and the next layer applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub wsdl: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub organization: Option<String>,
    pub domain: Option<String>,
}

/// Interactive fallback for credentials nothing else supplied.
///
/// The CLI implements this over stderr and a no-echo password reader;
/// tests implement it with canned answers. Implementations render the
/// label followed by `": "` before reading.
pub trait Prompter {
    /// Ask for a value with the answer echoed back.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when reading the answer fails.
    fn visible(&mut self, label: &str) -> io::Result<String>;

    /// Ask for a value without echoing the answer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when reading the answer fails.
    fn hidden(&mut self, label: &str) -> io::Result<String>;
}

/// Resolve the connection settings for this invocation.
///
/// Priority per field: merged flag/env value, then the batch file's
/// `wsdl` key (endpoint only), then a prompt for the credentials. The
/// endpoint has no prompt fallback and missing it fails before any
/// prompting or network activity. Prompts run username first, then
/// password, matching the order the fields are checked.
///
/// # Errors
///
/// Returns [`ConfigError::MissingWsdl`] when no layer supplies an
/// endpoint, [`ConfigError::MissingCredential`] when a prompt answer
/// comes back empty, and [`ConfigError::Prompt`] when reading an
/// answer fails.
pub fn resolve_connection(
    overrides: ConnectionOverrides,
    file_wsdl: Option<&str>,
    prompter: &mut dyn Prompter,
) -> Result<ConnectionConfig, ConfigError> {
    let wsdl_url = provided(overrides.wsdl)
        .or_else(|| provided(file_wsdl.map(str::to_owned)))
        .ok_or(ConfigError::MissingWsdl)?;
    let wsdl_url = normalize_wsdl_url(&wsdl_url);

    let username = match provided(overrides.username) {
        Some(value) => value,
        None => require(prompter.visible("username")?, "username")?,
    };
    let password = match provided(overrides.password) {
        Some(value) => value,
        None => require(prompter.hidden("password")?, "password")?,
    };

    Ok(ConnectionConfig {
        wsdl_url,
        username,
        password,
        organization: overrides.organization.unwrap_or_default(),
        domain: overrides.domain.unwrap_or_default(),
    })
}

/// Rewrite the service path segment to its canonical casing. Only the
/// first occurrence is touched; URLs without the segment pass through
/// unchanged.
#[must_use]
pub fn normalize_wsdl_url(url: &str) -> String {
    WSDL_PATH.replace(url, "SSWebService.asmx?WSDL").into_owned()
}

fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require(answer: String, field: &'static str) -> Result<String, ConfigError> {
    if answer.is_empty() {
        return Err(ConfigError::MissingCredential { field });
    }
    Ok(answer)
}
