// Backend hooks used by the conformance harness.
//
// The harness never trusts the adapter to check itself: after an operation it
// reads the raw backend storage through these hooks, keyed the same way as
// the entities.

use async_trait::async_trait;

use auth_adapter_core::{
    Account, BoxError, ProviderAccountKey, Session, User, VerificationKey, VerificationToken,
};

pub type InspectorResult<T> = Result<T, BoxError>;

/// Direct access to an adapter's underlying storage.
#[async_trait]
pub trait StorageInspector: Send + Sync {
    /// Prepare storage for a run. Implementations should leave it empty.
    async fn connect(&self) -> InspectorResult<()>;

    /// Tear down after a run, clearing whatever the run stored.
    async fn disconnect(&self) -> InspectorResult<()>;

    async fn user(&self, id: &str) -> InspectorResult<Option<User>>;

    async fn account(&self, key: &ProviderAccountKey) -> InspectorResult<Option<Account>>;

    async fn session(&self, session_token: &str) -> InspectorResult<Option<Session>>;

    async fn verification_token(
        &self,
        key: &VerificationKey,
    ) -> InspectorResult<Option<VerificationToken>>;
}
