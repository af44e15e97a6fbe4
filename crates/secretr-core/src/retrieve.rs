//! Concurrent batch retrieval.
//!
//! All requested ids are fetched together and joined once; the result
//! vector lines up with the input ids, so callers can zip outcomes
//! back onto whatever produced the requests. A failed fetch becomes an
//! error record in its slot and never disturbs its siblings.

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::normalize::{normalize, simplify};
use crate::secret::{ErrorRecord, RetrievedSecret};
use crate::source::SecretSource;

/// Knobs for one batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalOptions {
    /// Emit the flattened projection instead of the full record.
    pub simplify: bool,
    /// Upper bound on in-flight fetches. `None` (and `Some(0)`) mean
    /// every fetch is issued at once.
    pub max_concurrent: Option<usize>,
}

/// Fetch every id through `source`, one attempt each, and return the
/// outcomes in request order. Each failure is logged and converted to
/// an [`ErrorRecord`] carrying the id as requested; the call itself
/// never fails.
pub async fn retrieve_all<S>(
    source: &S,
    ids: &[String],
    options: RetrievalOptions,
) -> Vec<RetrievedSecret>
where
    S: SecretSource + ?Sized,
{
    let gate = options
        .max_concurrent
        .filter(|bound| *bound > 0)
        .map(Semaphore::new);

    let fetches = ids.iter().map(|id| {
        let gate = gate.as_ref();
        async move {
            // The gate is never closed, so a permit is always granted.
            let _permit = match gate {
                Some(semaphore) => semaphore.acquire().await.ok(),
                None => None,
            };
            fetch_one(source, id, options.simplify).await
        }
    });

    join_all(fetches).await
}

async fn fetch_one<S>(source: &S, id: &str, simplify_result: bool) -> RetrievedSecret
where
    S: SecretSource + ?Sized,
{
    match source.fetch(id).await {
        Ok(record) => {
            let full = normalize(record);
            tracing::debug!(secret_id = %id, name = %full.name, "retrieved secret");
            if simplify_result {
                RetrievedSecret::Simple(simplify(full))
            } else {
                RetrievedSecret::Full(full)
            }
        }
        Err(err) => {
            tracing::debug!(secret_id = %id, error = %err, "failed to retrieve secret");
            RetrievedSecret::Failed(ErrorRecord::new(id, err.to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::SourceError;
    use crate::secret::{SecretField, SecretRecord};

    /// Source that synthesizes records, fails ids prefixed `bad`, and
    /// tracks how many fetches overlap.
    #[derive(Default)]
    struct MockSource {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SecretSource for MockSource {
        async fn fetch(&self, id: &str) -> Result<SecretRecord, SourceError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if id.starts_with("bad") {
                return Err(SourceError::Server(format!("no secret with id {id}")));
            }

            let mut items = BTreeMap::new();
            items.insert(
                "Password".to_owned(),
                SecretField::text("Password", format!("pw-{id}")),
            );
            Ok(SecretRecord {
                id: id.parse().unwrap_or(0),
                name: format!("secret {id}"),
                items,
            })
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn outcome_count_matches_request_count() {
        let source = MockSource::default();
        let results = retrieve_all(
            &source,
            &ids(&["101", "bad-7", "202"]),
            RetrievalOptions::default(),
        )
        .await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn failures_become_error_records_in_place() {
        let source = MockSource::default();
        let results = retrieve_all(
            &source,
            &ids(&["101", "bad-7", "202"]),
            RetrievalOptions::default(),
        )
        .await;

        assert!(matches!(results[0], RetrievedSecret::Full(_)));
        assert!(matches!(results[2], RetrievedSecret::Full(_)));
        let failed = results[1].failure().unwrap();
        assert_eq!(failed.id, "bad-7");
        assert!(failed.error.contains("bad-7"));
    }

    #[tokio::test]
    async fn order_follows_the_request_list() {
        let source = MockSource::default();
        let results =
            retrieve_all(&source, &ids(&["3", "1", "2"]), RetrievalOptions::default()).await;

        let names: Vec<String> = results
            .iter()
            .map(|r| match r {
                RetrievedSecret::Full(s) => s.name.clone(),
                RetrievedSecret::Simple(s) => s.name.clone(),
                RetrievedSecret::Failed(e) => e.id.clone(),
            })
            .collect();
        assert_eq!(names, ["secret 3", "secret 1", "secret 2"]);
    }

    #[tokio::test]
    async fn simplify_option_switches_the_shape() {
        let source = MockSource::default();
        let options = RetrievalOptions {
            simplify: true,
            max_concurrent: None,
        };
        let results = retrieve_all(&source, &ids(&["101"]), options).await;

        assert!(matches!(results[0], RetrievedSecret::Simple(_)));
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["Items"]["Password"], "pw-101");
    }

    #[tokio::test]
    async fn unbounded_runs_fan_out_together() {
        let source = MockSource::default();
        retrieve_all(
            &source,
            &ids(&["1", "2", "3", "4"]),
            RetrievalOptions::default(),
        )
        .await;
        assert_eq!(source.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn bound_caps_in_flight_fetches() {
        let source = MockSource::default();
        let options = RetrievalOptions {
            simplify: false,
            max_concurrent: Some(2),
        };
        retrieve_all(&source, &ids(&["1", "2", "3", "4"]), options).await;
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_bound_means_unbounded() {
        let source = MockSource::default();
        let options = RetrievalOptions {
            simplify: false,
            max_concurrent: Some(0),
        };
        retrieve_all(&source, &ids(&["1", "2", "3"]), options).await;
        assert_eq!(source.peak.load(Ordering::SeqCst), 3);
    }
}
