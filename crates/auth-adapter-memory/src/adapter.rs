// In-memory adapter — indexed maps implementing the core Adapter trait.
//
// Every entity lives in a map keyed by its natural key, plus an email index
// for users. All maps sit behind one `tokio::sync::RwLock`, so each operation,
// including the delete-user cascade, is applied under a single write guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use auth_adapter_core::db::validation;
use auth_adapter_core::error::{AdapterError, AdapterResult, Entity};
use auth_adapter_core::options::AdapterOptions;
use auth_adapter_core::{
    Account, Adapter, NewUser, ProviderAccountKey, Session, SessionAndUser, SessionUpdate, User,
    UserUpdate, VerificationKey, VerificationToken,
};

const BACKEND: &str = "memory";

/// The indexed tables.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<String, User>,
    /// email → user id
    users_by_email: HashMap<String, String>,
    accounts: HashMap<ProviderAccountKey, Account>,
    sessions: HashMap<String, Session>,
    verification_tokens: HashMap<VerificationKey, VerificationToken>,
}

/// Point-in-time copy of the raw tables, for inspection in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub users: HashMap<String, User>,
    pub accounts: HashMap<ProviderAccountKey, Account>,
    pub sessions: HashMap<String, Session>,
    pub verification_tokens: HashMap<VerificationKey, VerificationToken>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.accounts.is_empty()
            && self.sessions.is_empty()
            && self.verification_tokens.is_empty()
    }
}

/// In-memory adapter.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    tables: Arc<RwLock<Tables>>,
    options: AdapterOptions,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create a new empty adapter with default options.
    pub fn new() -> Self {
        Self::with_options(AdapterOptions::default())
    }

    pub fn with_options(options: AdapterOptions) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            options,
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Copy of all raw records.
    pub async fn snapshot(&self) -> MemorySnapshot {
        let tables = self.tables.read().await;
        MemorySnapshot {
            users: tables.users.clone(),
            accounts: tables.accounts.clone(),
            sessions: tables.sessions.clone(),
            verification_tokens: tables.verification_tokens.clone(),
        }
    }

    /// Drop all data.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create_user(&self, user: NewUser) -> AdapterResult<User> {
        validation::validate_new_user(&user)?;

        let mut tables = self.tables.write().await;
        if tables.users_by_email.contains_key(&user.email) {
            tracing::warn!(backend = BACKEND, email = %user.email, "email already registered");
            return Err(AdapterError::conflict(Entity::User, &user.email));
        }
        let id = match user.id.clone() {
            Some(id) if tables.users.contains_key(&id) => {
                tracing::warn!(backend = BACKEND, user_id = %id, "user id already taken");
                return Err(AdapterError::conflict(Entity::User, id));
            }
            Some(id) => id,
            None => self.options.next_user_id(),
        };

        let user = user.into_user(id);
        tables.users_by_email.insert(user.email.clone(), user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        tracing::debug!(backend = BACKEND, user_id = %user.id, "created user");
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn get_user_by_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .get(key)
            .and_then(|account| tables.users.get(&account.user_id))
            .cloned())
    }

    async fn update_user(&self, update: UserUpdate) -> AdapterResult<User> {
        validation::validate_user_update(&update)?;

        let mut tables = self.tables.write().await;
        let Some(current) = tables.users.get(&update.id).cloned() else {
            tracing::warn!(backend = BACKEND, user_id = %update.id, "update of unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &update.id));
        };

        if let Some(ref email) = update.email {
            if let Some(owner) = tables.users_by_email.get(email) {
                if owner != &update.id {
                    tracing::warn!(backend = BACKEND, email = %email, "email already registered");
                    return Err(AdapterError::conflict(Entity::User, email));
                }
            }
        }

        let mut user = current.clone();
        update.apply_to(&mut user);
        if user.email != current.email {
            tables.users_by_email.remove(&current.email);
            tables.users_by_email.insert(user.email.clone(), user.id.clone());
        }
        tables.users.insert(user.id.clone(), user.clone());
        tracing::debug!(backend = BACKEND, user_id = %user.id, "updated user");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.remove(id) else {
            return Ok(());
        };
        tables.users_by_email.remove(&user.email);

        let accounts_before = tables.accounts.len();
        tables.accounts.retain(|_, account| account.user_id != id);
        let sessions_before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.user_id != id);

        tracing::debug!(
            backend = BACKEND,
            user_id = %id,
            accounts = accounts_before - tables.accounts.len(),
            sessions = sessions_before - tables.sessions.len(),
            "deleted user"
        );
        Ok(())
    }

    async fn link_account(&self, account: Account) -> AdapterResult<Account> {
        validation::validate_account(&account)?;

        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&account.user_id) {
            tracing::warn!(backend = BACKEND, user_id = %account.user_id, "link to unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &account.user_id));
        }
        let key = account.key();
        if tables.accounts.contains_key(&key) {
            tracing::warn!(backend = BACKEND, account = %key, "account already linked");
            return Err(AdapterError::conflict(Entity::Account, key));
        }
        tables.accounts.insert(key.clone(), account.clone());
        tracing::debug!(
            backend = BACKEND,
            account = %key,
            user_id = %account.user_id,
            "linked account"
        );
        Ok(account)
    }

    async fn unlink_account(&self, key: &ProviderAccountKey) -> AdapterResult<()> {
        let mut tables = self.tables.write().await;
        if tables.accounts.remove(key).is_some() {
            tracing::debug!(backend = BACKEND, account = %key, "unlinked account");
        }
        Ok(())
    }

    async fn get_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(key).cloned())
    }

    async fn create_session(&self, session: Session) -> AdapterResult<Session> {
        validation::validate_session(&session)?;

        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            tracing::warn!(
                backend = BACKEND,
                user_id = %session.user_id,
                "session for unknown user"
            );
            return Err(AdapterError::precondition_failed(Entity::User, &session.user_id));
        }
        if tables.sessions.contains_key(&session.session_token) {
            tracing::warn!(backend = BACKEND, "session token collision");
            return Err(AdapterError::conflict(Entity::Session, "sessionToken"));
        }
        tables
            .sessions
            .insert(session.session_token.clone(), session.clone());
        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "created session");
        Ok(session)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<SessionAndUser>> {
        let tables = self.tables.read().await;
        let Some(session) = tables.sessions.get(session_token) else {
            return Ok(None);
        };
        Ok(tables.users.get(&session.user_id).map(|user| SessionAndUser {
            session: session.clone(),
            user: user.clone(),
        }))
    }

    async fn update_session(&self, update: SessionUpdate) -> AdapterResult<Option<Session>> {
        validation::validate_session_update(&update)?;

        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(&update.session_token) {
            return Ok(None);
        }
        if let Some(ref user_id) = update.user_id {
            if !tables.users.contains_key(user_id) {
                tracing::warn!(
                    backend = BACKEND,
                    user_id = %user_id,
                    "session moved to unknown user"
                );
                return Err(AdapterError::precondition_failed(Entity::User, user_id));
            }
        }
        let Some(session) = tables.sessions.get_mut(&update.session_token) else {
            return Ok(None);
        };
        update.apply_to(session);
        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "updated session");
        Ok(Some(session.clone()))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(session) = tables.sessions.remove(session_token) {
            tracing::debug!(backend = BACKEND, user_id = %session.user_id, "deleted session");
        }
        Ok(())
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        validation::validate_verification_token(&token)?;

        let mut tables = self.tables.write().await;
        let key = token.key();
        if tables.verification_tokens.contains_key(&key) {
            tracing::warn!(
                backend = BACKEND,
                identifier = %key.identifier,
                "verification token collision"
            );
            return Err(AdapterError::conflict(Entity::VerificationToken, &key.identifier));
        }
        tables.verification_tokens.insert(key, token.clone());
        tracing::debug!(
            backend = BACKEND,
            identifier = %token.identifier,
            "created verification token"
        );
        Ok(token)
    }

    async fn use_verification_token(
        &self,
        key: &VerificationKey,
    ) -> AdapterResult<Option<VerificationToken>> {
        validation::validate_verification_key(key)?;

        let mut tables = self.tables.write().await;
        let used = tables.verification_tokens.remove(key);
        if used.is_some() {
            tracing::debug!(
                backend = BACKEND,
                identifier = %key.identifier,
                "consumed verification token"
            );
        }
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_adapter_core::options::GenerateIdStrategy;
    use auth_adapter_core::AccountType;
    use chrono::{TimeDelta, Utc};

    async fn seeded() -> (MemoryAdapter, User) {
        let adapter = MemoryAdapter::new();
        let user = adapter
            .create_user(NewUser::new("alice@test.com").with_name("Alice"))
            .await
            .unwrap();
        (adapter, user)
    }

    #[tokio::test]
    async fn test_create_user_assigns_uuid() {
        let (_, user) = seeded().await;
        assert_eq!(user.id.len(), 36);
        assert_eq!(user.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_create_user_random_strategy() {
        let options = AdapterOptions::default().generate_id(GenerateIdStrategy::Random);
        let adapter = MemoryAdapter::with_options(options);
        let user = adapter.create_user(NewUser::new("r@test.com")).await.unwrap();
        assert_eq!(user.id.len(), 32);
    }

    #[tokio::test]
    async fn test_create_user_keeps_explicit_id() {
        let adapter = MemoryAdapter::new();
        let user = adapter
            .create_user(NewUser::new("bob@test.com").with_id("u-bob"))
            .await
            .unwrap();
        assert_eq!(user.id, "u-bob");

        let err = adapter
            .create_user(NewUser::new("other@test.com").with_id("u-bob"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (adapter, _) = seeded().await;
        let err = adapter
            .create_user(NewUser::new("alice@test.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(adapter.snapshot().await.users.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected_before_storage() {
        let adapter = MemoryAdapter::new();
        let err = adapter.create_user(NewUser::new("not-an-email")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(adapter.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_user_moves_email_index() {
        let (adapter, user) = seeded().await;
        let updated = adapter
            .update_user(UserUpdate::new(&user.id).email("alice@new.com"))
            .await
            .unwrap();
        assert_eq!(updated.email, "alice@new.com");
        assert!(adapter.get_user_by_email("alice@test.com").await.unwrap().is_none());
        assert_eq!(
            adapter.get_user_by_email("alice@new.com").await.unwrap(),
            Some(updated)
        );

        // The freed address can be registered again.
        adapter.create_user(NewUser::new("alice@test.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_user_email_taken() {
        let (adapter, alice) = seeded().await;
        adapter.create_user(NewUser::new("bob@test.com")).await.unwrap();
        let err = adapter
            .update_user(UserUpdate::new(&alice.id).email("bob@test.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            adapter.get_user(&alice.id).await.unwrap().unwrap().email,
            "alice@test.com"
        );
    }

    #[tokio::test]
    async fn test_update_user_same_email_is_fine() {
        let (adapter, alice) = seeded().await;
        let updated = adapter
            .update_user(
                UserUpdate::new(&alice.id)
                    .email("alice@test.com")
                    .image(Some("pic".into())),
            )
            .await
            .unwrap();
        assert_eq!(updated.image.as_deref(), Some("pic"));
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let adapter = MemoryAdapter::new();
        let err = adapter
            .update_user(UserUpdate::new("ghost").name(Some("x".into())))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_link_account_requires_user() {
        let adapter = MemoryAdapter::new();
        let err = adapter
            .link_account(Account::new("ghost", AccountType::OAuth, "github", "1"))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_user_owns_many_accounts() {
        let (adapter, user) = seeded().await;
        adapter
            .link_account(Account::new(&user.id, AccountType::OAuth, "github", "1"))
            .await
            .unwrap();
        adapter
            .link_account(Account::new(&user.id, AccountType::Oidc, "google", "1"))
            .await
            .unwrap();

        for provider in ["github", "google"] {
            let owner = adapter
                .get_user_by_account(&ProviderAccountKey::new(provider, "1"))
                .await
                .unwrap();
            assert_eq!(owner.map(|u| u.id), Some(user.id.clone()));
        }
    }

    #[tokio::test]
    async fn test_session_for_unknown_user() {
        let adapter = MemoryAdapter::new();
        let err = adapter
            .create_session(Session::new("tok", "ghost", Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_duplicate_session_token() {
        let (adapter, user) = seeded().await;
        let expires = Utc::now() + TimeDelta::days(1);
        adapter
            .create_session(Session::new("tok", &user.id, expires))
            .await
            .unwrap();
        let err = adapter
            .create_session(Session::new("tok", &user.id, expires))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_session_is_absent() {
        let adapter = MemoryAdapter::new();
        let updated = adapter
            .update_session(SessionUpdate::new("gone").expires(Utc::now()))
            .await
            .unwrap();
        assert!(updated.is_none());

        let updated = adapter
            .update_session(SessionUpdate::new("gone").user_id("nobody"))
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let (adapter, user) = seeded().await;
        let other = adapter.create_user(NewUser::new("bob@test.com")).await.unwrap();
        let expires = Utc::now() + TimeDelta::days(1);

        adapter
            .link_account(Account::new(&user.id, AccountType::OAuth, "github", "1"))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("alice-tok", &user.id, expires))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("bob-tok", &other.id, expires))
            .await
            .unwrap();

        adapter.delete_user(&user.id).await.unwrap();

        let snap = adapter.snapshot().await;
        assert_eq!(snap.users.len(), 1);
        assert!(snap.accounts.is_empty());
        assert_eq!(snap.sessions.len(), 1);
        assert!(snap.sessions.contains_key("bob-tok"));
        assert!(adapter.get_user_by_email("alice@test.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_use_verification_token_once() {
        let adapter = MemoryAdapter::new();
        let token = VerificationToken::new("a@x.com", "t1", Utc::now() + TimeDelta::hours(1));
        adapter.create_verification_token(token.clone()).await.unwrap();

        let key = token.key();
        assert_eq!(adapter.use_verification_token(&key).await.unwrap(), Some(token));
        assert_eq!(adapter.use_verification_token(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_use_verification_token() {
        let adapter = MemoryAdapter::new();
        let token = VerificationToken::new("a@x.com", "race", Utc::now() + TimeDelta::hours(1));
        adapter.create_verification_token(token.clone()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let adapter = adapter.clone();
            let key = token.key();
            handles.push(tokio::spawn(async move {
                adapter.use_verification_token(&key).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let (adapter, _) = seeded().await;
        adapter.clear().await;
        assert!(adapter.snapshot().await.is_empty());
    }
}
