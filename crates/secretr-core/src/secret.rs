//! Secret record shapes, from raw server response to emitted JSON.
//!
//! The server hands back each secret's fields as a *mapping* keyed by
//! field name — an artifact of the transport deserialization, not a
//! semantically ordered structure. [`SecretRecord`] preserves that raw
//! shape; [`normalize`](crate::normalize) converts it into the ordered
//! [`NormalizedSecret`] list shape consumers expect. All emitted types
//! serialize with PascalCase keys (`Id`, `Name`, `Items`,
//! `RetrievalStatus`) to keep the JSON contract of the tool stable.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// One secret to retrieve: the requested identifier, plus the output
/// file destination when the request came from a batch config entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    /// Identifier as the user supplied it (kept verbatim for error
    /// records even when the server would report a numeric id).
    pub id: String,
    /// Destination file for config-driven batch mode; `None` in direct
    /// mode, where results aggregate into the envelope instead.
    pub outfile: Option<PathBuf>,
}

/// One field of a secret, with the slug metadata the server reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretField {
    /// Item id on the server, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Field-definition id on the server, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<i64>,
    pub field_name: String,
    pub value: String,
    pub is_file: bool,
    pub is_notes: bool,
    pub is_password: bool,
}

impl SecretField {
    /// A plain text field with no server-side ids.
    #[must_use]
    pub fn text(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            field_id: None,
            field_name: field_name.into(),
            value: value.into(),
            is_file: false,
            is_notes: false,
            is_password: false,
        }
    }
}

/// A secret as the transport adapter hands it over: items still keyed
/// by field name. Keys are unique per record; enumeration order is the
/// map's and must only be relied on for stability, not meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: i64,
    pub name: String,
    pub items: BTreeMap<String, SecretField>,
}

/// Retrieval outcome tag carried on every emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetrievalStatus {
    Ok,
    Error,
}

/// A successfully retrieved secret with items in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedSecret {
    pub id: i64,
    pub name: String,
    pub items: Vec<SecretField>,
    pub retrieval_status: RetrievalStatus,
}

/// Lossy projection of a [`NormalizedSecret`]: identity plus a flat
/// field-name → value mapping, all other metadata dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimplifiedSecret {
    pub name: String,
    pub id: i64,
    pub items: BTreeMap<String, String>,
    pub retrieval_status: RetrievalStatus,
}

/// Substitute record for a secret whose fetch failed. Carries the
/// identifier as requested, since the server never told us its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorRecord {
    pub id: String,
    pub error: String,
    pub retrieval_status: RetrievalStatus,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            retrieval_status: RetrievalStatus::Error,
        }
    }
}

/// One per-secret outcome. Serializes untagged, so the envelope holds
/// the three shapes side by side exactly as consumers see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RetrievedSecret {
    Full(NormalizedSecret),
    Simple(SimplifiedSecret),
    Failed(ErrorRecord),
}

impl RetrievedSecret {
    /// The failure record, if this retrieval failed.
    #[must_use]
    pub fn failure(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Failed(record) => Some(record),
            Self::Full(_) | Self::Simple(_) => None,
        }
    }
}

/// Top-level aggregate emitted by direct mode: all retrievals of one
/// invocation, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultEnvelope {
    pub secrets: Vec<RetrievedSecret>,
}

impl ResultEnvelope {
    #[must_use]
    pub fn new(secrets: Vec<RetrievedSecret>) -> Self {
        Self { secrets }
    }

    /// Iterate the error records in the envelope, in request order.
    pub fn failures(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.secrets.iter().filter_map(RetrievedSecret::failure)
    }
}
