//! The seam between the retrieval orchestrator and the transport.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::secret::SecretRecord;

/// A backend that can fetch one secret by identifier.
///
/// The orchestrator fans calls out concurrently, so implementations
/// must be shareable across tasks (`Send + Sync`). One call is one
/// attempt: the orchestrator never retries, and a failed fetch only
/// affects its own request.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the secret identified by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Auth`] when the server rejects the
    /// credentials, [`SourceError::Server`] when the server reports a
    /// failure for this secret (unknown id, access denied),
    /// [`SourceError::Transport`] when the request cannot be carried
    /// out, and [`SourceError::Protocol`] when the response cannot be
    /// understood.
    async fn fetch(&self, id: &str) -> Result<SecretRecord, SourceError>;
}
