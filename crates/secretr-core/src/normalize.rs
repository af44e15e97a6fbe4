//! Transforms from the raw keyed-map record to the emitted shapes.

use crate::secret::{NormalizedSecret, RetrievalStatus, SecretRecord, SimplifiedSecret};

/// Convert a raw record into the ordered output shape. The items map
/// is enumerated in key order into the `Items` sequence, so the result
/// is stable for a given record. Empty items become an empty sequence.
#[must_use]
pub fn normalize(record: SecretRecord) -> NormalizedSecret {
    NormalizedSecret {
        id: record.id,
        name: record.name,
        items: record.items.into_values().collect(),
        retrieval_status: RetrievalStatus::Ok,
    }
}

/// Project a normalized secret down to identity plus a flat
/// field-name to value mapping. All other field metadata is dropped.
#[must_use]
pub fn simplify(secret: NormalizedSecret) -> SimplifiedSecret {
    SimplifiedSecret {
        name: secret.name,
        id: secret.id,
        items: secret
            .items
            .into_iter()
            .map(|field| (field.field_name, field.value))
            .collect(),
        retrieval_status: RetrievalStatus::Ok,
    }
}
