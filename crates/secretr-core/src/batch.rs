//! Batch retrieval config files.
//!
//! A batch file is YAML with an optional `wsdl` key and a `secrets`
//! list of `{id, outfile}` entries. Ids may be written as integers or
//! strings; both load as the string form. Outfile paths are taken
//! relative to the directory containing the config file, so a batch
//! file can be invoked from anywhere.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::BatchError;
use crate::secret::SecretRequest;

/// Parsed batch file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Endpoint to use when neither flag nor environment supplies one.
    #[serde(default)]
    pub wsdl: Option<String>,
    pub secrets: Vec<BatchEntry>,
}

/// One secret to fetch and where to write it.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEntry {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub outfile: PathBuf,
}

impl BatchConfig {
    /// Load and parse a batch file.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Read`] when the file cannot be read,
    /// [`BatchError::Parse`] when it is not valid YAML for this shape,
    /// and [`BatchError::Empty`] when its `secrets` list has no
    /// entries.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let text = fs::read_to_string(path).map_err(|source| BatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| BatchError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.secrets.is_empty() {
            return Err(BatchError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(config)
    }

    /// The entries as retrieval requests, with every relative outfile
    /// resolved against the directory of `config_path` (the file this
    /// config was loaded from). Absolute outfiles are kept as given.
    #[must_use]
    pub fn requests(&self, config_path: &Path) -> Vec<SecretRequest> {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        self.secrets
            .iter()
            .map(|entry| SecretRequest {
                id: entry.id.clone(),
                outfile: Some(if entry.outfile.is_absolute() {
                    entry.outfile.clone()
                } else {
                    base.join(&entry.outfile)
                }),
            })
            .collect()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}
