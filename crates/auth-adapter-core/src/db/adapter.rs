// Adapter trait — the persistence contract every storage backend implements.
//
// The auth framework core talks to storage only through this trait. It never
// sees a query language, a transaction handle or a driver error type; all of
// that stays inside the implementing crate.

use std::fmt;

use async_trait::async_trait;

use crate::db::models::{
    Account, NewUser, ProviderAccountKey, Session, SessionAndUser, SessionUpdate, User,
    UserUpdate, VerificationKey, VerificationToken,
};
use crate::error::AdapterResult;

/// The persistence contract.
///
/// Every operation is atomic from the caller's point of view. Lookups that
/// can legitimately find nothing return `Ok(None)`; backend failures are
/// surfaced as [`AdapterError::Backend`](crate::error::AdapterError::Backend)
/// and never folded into an absent result.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Short backend name used in logs and conformance reports.
    fn name(&self) -> &'static str;

    // ─── Users ───────────────────────────────────────────────────

    /// Store a new user, assigning an id when the input has none.
    ///
    /// Fails with `Conflict` if the email or the explicit id is taken.
    async fn create_user(&self, user: NewUser) -> AdapterResult<User>;

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>>;

    /// Resolve the user owning the account with the given natural key.
    async fn get_user_by_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<User>>;

    /// Apply a partial update.
    ///
    /// Fails with `PreconditionFailed` if the user does not exist and with
    /// `Conflict` if the new email belongs to another user.
    async fn update_user(&self, update: UserUpdate) -> AdapterResult<User>;

    /// Delete a user together with all of its accounts and sessions.
    ///
    /// Deleting an unknown id is a no-op.
    async fn delete_user(&self, id: &str) -> AdapterResult<()>;

    // ─── Accounts ────────────────────────────────────────────────

    /// Link an external identity to an existing user.
    ///
    /// Fails with `Conflict` if the provider key is already linked and with
    /// `PreconditionFailed` if the owning user does not exist.
    async fn link_account(&self, account: Account) -> AdapterResult<Account>;

    /// Remove a linked account. No-op if absent.
    async fn unlink_account(&self, key: &ProviderAccountKey) -> AdapterResult<()>;

    async fn get_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<Account>>;

    // ─── Sessions ────────────────────────────────────────────────

    /// Store a new session for an existing user.
    async fn create_session(&self, session: Session) -> AdapterResult<Session>;

    /// Fetch a session and its owning user in one lookup.
    async fn get_session_and_user(&self, session_token: &str)
        -> AdapterResult<Option<SessionAndUser>>;

    /// Apply a partial update. Returns `None` if the session no longer exists.
    async fn update_session(&self, update: SessionUpdate) -> AdapterResult<Option<Session>>;

    /// Remove a session. No-op if absent.
    async fn delete_session(&self, session_token: &str) -> AdapterResult<()>;

    // ─── Verification tokens ─────────────────────────────────────

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken>;

    /// Consume a token: return it and remove it in one step.
    ///
    /// Concurrent callers racing on the same key observe the token at most
    /// once between them.
    async fn use_verification_token(
        &self,
        key: &VerificationKey,
    ) -> AdapterResult<Option<VerificationToken>>;
}
