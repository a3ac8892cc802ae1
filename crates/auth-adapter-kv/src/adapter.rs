// Key-value adapter: records as JSON documents under prefixed keys.
//
// Layout (default prefixes):
//   user:{id}                          → User
//   user:email:{email}                 → user id
//   user:account:{provider}:{id}       → Account
//   user:account:by-user-id:{userId}   → [ProviderAccountKey]
//   user:session:{token}               → Session
//   user:session:by-user-id:{userId}   → [session token]
//   user:token:{identifier}:{token}    → VerificationToken
//
// Multi-key mutations are serialized by one in-process mutex. Uniqueness is
// claimed with `set_if_absent` and verification tokens are consumed with
// `take`, so those two guarantees also hold across processes sharing a store.
// When a later step of a mutation fails, the earlier steps are undone before
// the error is returned.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use async_trait::async_trait;

use auth_adapter_core::db::validation;
use auth_adapter_core::error::{AdapterError, AdapterResult, Entity, ValidationError};
use auth_adapter_core::utils::id::generate_id;
use auth_adapter_core::{
    Account, Adapter, NewUser, ProviderAccountKey, Session, SessionAndUser, SessionUpdate, User,
    UserUpdate, VerificationKey, VerificationToken,
};

use crate::options::KeyValueAdapterOptions;
use crate::store::KeyValueStore;

const BACKEND: &str = "kv";
const SEPARATOR: char = ':';

/// Adapter over any [`KeyValueStore`].
#[derive(Debug)]
pub struct KeyValueAdapter<S> {
    store: S,
    options: KeyValueAdapterOptions,
    writes: Mutex<()>,
}

impl<S: KeyValueStore> KeyValueAdapter<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, KeyValueAdapterOptions::default())
    }

    pub fn with_options(store: S, options: KeyValueAdapterOptions) -> Self {
        Self {
            store,
            options,
            writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &KeyValueAdapterOptions {
        &self.options
    }

    // ─── Store helpers ───────────────────────────────────────────

    async fn get_raw(&self, op: &'static str, key: &str) -> AdapterResult<Option<String>> {
        self.store
            .get(key)
            .await
            .map_err(|e| backend_error(op, e))
    }

    async fn read<T: DeserializeOwned>(
        &self,
        op: &'static str,
        key: &str,
    ) -> AdapterResult<Option<T>> {
        self.get_raw(op, key)
            .await?
            .map(|raw| decode(op, &raw))
            .transpose()
    }

    async fn write<T: Serialize>(
        &self,
        op: &'static str,
        key: &str,
        value: &T,
    ) -> AdapterResult<()> {
        let raw = encode(op, value)?;
        self.store
            .set(key, &raw)
            .await
            .map_err(|e| backend_error(op, e))
    }

    /// Claim `key` for `value`. Returns `false` if it was already taken.
    async fn claim<T: Serialize>(
        &self,
        op: &'static str,
        key: &str,
        value: &T,
    ) -> AdapterResult<bool> {
        let raw = encode(op, value)?;
        self.store
            .set_if_absent(key, &raw)
            .await
            .map_err(|e| backend_error(op, e))
    }

    async fn remove(&self, op: &'static str, key: &str) -> AdapterResult<bool> {
        self.store
            .delete(key)
            .await
            .map_err(|e| backend_error(op, e))
    }

    async fn remove_all(&self, op: &'static str, keys: &[String]) -> AdapterResult<usize> {
        self.store
            .delete_many(keys)
            .await
            .map_err(|e| backend_error(op, e))
    }

    async fn take<T: DeserializeOwned>(
        &self,
        op: &'static str,
        key: &str,
    ) -> AdapterResult<Option<T>> {
        self.store
            .take(key)
            .await
            .map_err(|e| backend_error(op, e))?
            .map(|raw| decode(op, &raw))
            .transpose()
    }

    async fn read_list<T: DeserializeOwned>(
        &self,
        op: &'static str,
        key: &str,
    ) -> AdapterResult<Vec<T>> {
        Ok(self.read(op, key).await?.unwrap_or_default())
    }

    /// Store an index list, deleting the key once the list is empty.
    async fn write_list<T: Serialize>(
        &self,
        op: &'static str,
        key: &str,
        items: &[T],
    ) -> AdapterResult<()> {
        if items.is_empty() {
            self.remove(op, key).await?;
            Ok(())
        } else {
            self.write(op, key, &items).await
        }
    }

    async fn index_push<T>(&self, op: &'static str, key: &str, item: T) -> AdapterResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut items: Vec<T> = self.read_list(op, key).await?;
        items.push(item);
        self.write_list(op, key, &items).await
    }

    async fn index_remove<T>(&self, op: &'static str, key: &str, item: &T) -> AdapterResult<()>
    where
        T: Serialize + DeserializeOwned + PartialEq,
    {
        let mut items: Vec<T> = self.read_list(op, key).await?;
        items.retain(|i| i != item);
        self.write_list(op, key, &items).await
    }

    async fn user_exists(&self, op: &'static str, id: &str) -> AdapterResult<bool> {
        Ok(self.get_raw(op, &self.options.user_key(id)).await?.is_some())
    }

    /// Whether an account key can be stored without landing in the index
    /// namespace.
    fn account_key_is_addressable(&self, key: &ProviderAccountKey) -> bool {
        !key.provider.contains(SEPARATOR)
            && !self
                .options
                .account_key(key)
                .starts_with(&self.options.account_by_user_id_key(""))
    }

    fn check_account_key(&self, key: &ProviderAccountKey) -> Result<(), ValidationError> {
        validation::validate_account_key(key)?;
        no_separator(Entity::Account, "provider", &key.provider)?;
        if !self.account_key_is_addressable(key) {
            return Err(ValidationError::Malformed {
                entity: Entity::Account,
                field: "provider",
                reason: format!("{:?} is reserved", key.provider),
            });
        }
        Ok(())
    }
}

fn backend_error(
    op: &'static str,
    source: impl Into<auth_adapter_core::BoxError>,
) -> AdapterError {
    let err = AdapterError::backend(BACKEND, op, source);
    tracing::error!(backend = BACKEND, operation = op, error = %err, "store failure");
    err
}

/// Report a compensating write that failed. The caller still returns the
/// error that triggered it.
fn check_undo<T>(op: &'static str, key: &str, result: AdapterResult<T>) {
    if let Err(err) = result {
        tracing::warn!(
            backend = BACKEND,
            operation = op,
            key = %key,
            error = %err,
            "could not undo partial write"
        );
    }
}

fn decode<T: DeserializeOwned>(op: &'static str, raw: &str) -> AdapterResult<T> {
    serde_json::from_str(raw).map_err(|e| backend_error(op, e))
}

fn encode<T: Serialize>(op: &'static str, value: &T) -> AdapterResult<String> {
    serde_json::to_string(value).map_err(|e| backend_error(op, e))
}

fn no_separator(entity: Entity, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains(SEPARATOR) {
        return Err(ValidationError::Malformed {
            entity,
            field,
            reason: format!("must not contain '{SEPARATOR}'"),
        });
    }
    Ok(())
}

#[async_trait]
impl<S: KeyValueStore> Adapter for KeyValueAdapter<S> {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create_user(&self, user: NewUser) -> AdapterResult<User> {
        const OP: &str = "create_user";
        validation::validate_new_user(&user)?;
        if let Some(ref id) = user.id {
            no_separator(Entity::User, "id", id)?;
        }

        let _guard = self.writes.lock().await;
        let id = match user.id.clone() {
            Some(id) => {
                if self.user_exists(OP, &id).await? {
                    tracing::warn!(backend = BACKEND, user_id = %id, "user id already taken");
                    return Err(AdapterError::conflict(Entity::User, id));
                }
                id
            }
            None => generate_id(self.options.generate_id),
        };

        let email_key = self.options.user_by_email_key(&user.email);
        let claimed = self
            .store
            .set_if_absent(&email_key, &id)
            .await
            .map_err(|e| backend_error(OP, e))?;
        if !claimed {
            tracing::warn!(backend = BACKEND, email = %user.email, "email already registered");
            return Err(AdapterError::conflict(Entity::User, &user.email));
        }

        let user = user.into_user(id);
        if let Err(err) = self.write(OP, &self.options.user_key(&user.id), &user).await {
            check_undo(OP, &email_key, self.remove(OP, &email_key).await);
            return Err(err);
        }
        tracing::debug!(backend = BACKEND, user_id = %user.id, "created user");
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>> {
        if id.contains(SEPARATOR) {
            return Ok(None);
        }
        self.read("get_user", &self.options.user_key(id)).await
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>> {
        let key = self.options.user_by_email_key(email);
        match self.get_raw("get_user_by_email", &key).await? {
            Some(id) => self.read("get_user_by_email", &self.options.user_key(&id)).await,
            None => Ok(None),
        }
    }

    async fn get_user_by_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<User>> {
        match self.get_account(key).await? {
            Some(account) => {
                self.read("get_user_by_account", &self.options.user_key(&account.user_id))
                    .await
            }
            None => Ok(None),
        }
    }

    async fn update_user(&self, update: UserUpdate) -> AdapterResult<User> {
        const OP: &str = "update_user";
        validation::validate_user_update(&update)?;

        let _guard = self.writes.lock().await;
        let current: Option<User> = if update.id.contains(SEPARATOR) {
            None
        } else {
            self.read(OP, &self.options.user_key(&update.id)).await?
        };
        let Some(current) = current else {
            tracing::warn!(backend = BACKEND, user_id = %update.id, "update of unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &update.id));
        };

        let mut user = current.clone();
        update.apply_to(&mut user);

        let user_key = self.options.user_key(&user.id);
        let new_email_key = self.options.user_by_email_key(&user.email);
        let email_changed = user.email != current.email;
        if email_changed {
            let claimed = self
                .store
                .set_if_absent(&new_email_key, &user.id)
                .await
                .map_err(|e| backend_error(OP, e))?;
            if !claimed {
                tracing::warn!(backend = BACKEND, email = %user.email, "email already registered");
                return Err(AdapterError::conflict(Entity::User, &user.email));
            }
        }

        if let Err(err) = self.write(OP, &user_key, &user).await {
            if email_changed {
                check_undo(OP, &new_email_key, self.remove(OP, &new_email_key).await);
            }
            return Err(err);
        }
        if email_changed {
            let old_email_key = self.options.user_by_email_key(&current.email);
            if let Err(err) = self.remove(OP, &old_email_key).await {
                check_undo(OP, &user_key, self.write(OP, &user_key, &current).await);
                check_undo(OP, &new_email_key, self.remove(OP, &new_email_key).await);
                return Err(err);
            }
        }
        tracing::debug!(backend = BACKEND, user_id = %user.id, "updated user");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        const OP: &str = "delete_user";
        if id.contains(SEPARATOR) {
            return Ok(());
        }

        let _guard = self.writes.lock().await;
        let Some(user) = self.read::<User>(OP, &self.options.user_key(id)).await? else {
            return Ok(());
        };

        let sessions_key = self.options.session_by_user_id_key(id);
        let sessions: Vec<String> = self.read_list(OP, &sessions_key).await?;
        let accounts_key = self.options.account_by_user_id_key(id);
        let accounts: Vec<ProviderAccountKey> = self.read_list(OP, &accounts_key).await?;

        // Dependents, their indexes and the user go in one store call.
        let mut keys: Vec<String> = sessions
            .iter()
            .map(|token| self.options.session_key(token))
            .collect();
        keys.push(sessions_key);
        keys.extend(accounts.iter().map(|key| self.options.account_key(key)));
        keys.push(accounts_key);
        keys.push(self.options.user_by_email_key(&user.email));
        keys.push(self.options.user_key(id));
        self.remove_all(OP, &keys).await?;

        tracing::debug!(
            backend = BACKEND,
            user_id = %id,
            accounts = accounts.len(),
            sessions = sessions.len(),
            "deleted user"
        );
        Ok(())
    }

    async fn link_account(&self, account: Account) -> AdapterResult<Account> {
        const OP: &str = "link_account";
        validation::validate_account(&account)?;
        let key = account.key();
        self.check_account_key(&key)?;

        let _guard = self.writes.lock().await;
        if account.user_id.contains(SEPARATOR) || !self.user_exists(OP, &account.user_id).await? {
            tracing::warn!(backend = BACKEND, user_id = %account.user_id, "link to unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &account.user_id));
        }
        let account_key = self.options.account_key(&key);
        if !self.claim(OP, &account_key, &account).await? {
            tracing::warn!(backend = BACKEND, account = %key, "account already linked");
            return Err(AdapterError::conflict(Entity::Account, key));
        }

        let index_key = self.options.account_by_user_id_key(&account.user_id);
        if let Err(err) = self.index_push(OP, &index_key, key.clone()).await {
            check_undo(OP, &account_key, self.remove(OP, &account_key).await);
            return Err(err);
        }

        tracing::debug!(
            backend = BACKEND,
            account = %key,
            user_id = %account.user_id,
            "linked account"
        );
        Ok(account)
    }

    async fn unlink_account(&self, key: &ProviderAccountKey) -> AdapterResult<()> {
        const OP: &str = "unlink_account";
        if !self.account_key_is_addressable(key) {
            return Ok(());
        }

        let _guard = self.writes.lock().await;
        let account_key = self.options.account_key(key);
        let Some(account) = self.take::<Account>(OP, &account_key).await? else {
            return Ok(());
        };

        let index_key = self.options.account_by_user_id_key(&account.user_id);
        if let Err(err) = self.index_remove(OP, &index_key, key).await {
            check_undo(OP, &account_key, self.write(OP, &account_key, &account).await);
            return Err(err);
        }

        tracing::debug!(backend = BACKEND, account = %key, "unlinked account");
        Ok(())
    }

    async fn get_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<Account>> {
        if !self.account_key_is_addressable(key) {
            return Ok(None);
        }
        self.read("get_account", &self.options.account_key(key)).await
    }

    async fn create_session(&self, session: Session) -> AdapterResult<Session> {
        const OP: &str = "create_session";
        validation::validate_session(&session)?;
        no_separator(Entity::Session, "sessionToken", &session.session_token)?;

        let _guard = self.writes.lock().await;
        if session.user_id.contains(SEPARATOR) || !self.user_exists(OP, &session.user_id).await? {
            tracing::warn!(
                backend = BACKEND,
                user_id = %session.user_id,
                "session for unknown user"
            );
            return Err(AdapterError::precondition_failed(Entity::User, &session.user_id));
        }
        let session_key = self.options.session_key(&session.session_token);
        if !self.claim(OP, &session_key, &session).await? {
            tracing::warn!(backend = BACKEND, "session token collision");
            return Err(AdapterError::conflict(Entity::Session, "sessionToken"));
        }

        let index_key = self.options.session_by_user_id_key(&session.user_id);
        if let Err(err) = self
            .index_push(OP, &index_key, session.session_token.clone())
            .await
        {
            check_undo(OP, &session_key, self.remove(OP, &session_key).await);
            return Err(err);
        }

        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "created session");
        Ok(session)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<SessionAndUser>> {
        const OP: &str = "get_session_and_user";
        if session_token.contains(SEPARATOR) {
            return Ok(None);
        }
        let Some(session) = self
            .read::<Session>(OP, &self.options.session_key(session_token))
            .await?
        else {
            return Ok(None);
        };
        let user: Option<User> = self.read(OP, &self.options.user_key(&session.user_id)).await?;
        Ok(user.map(|user| SessionAndUser { session, user }))
    }

    async fn update_session(&self, update: SessionUpdate) -> AdapterResult<Option<Session>> {
        const OP: &str = "update_session";
        validation::validate_session_update(&update)?;
        if update.session_token.contains(SEPARATOR) {
            return Ok(None);
        }

        let _guard = self.writes.lock().await;
        let key = self.options.session_key(&update.session_token);
        let Some(previous) = self.read::<Session>(OP, &key).await? else {
            return Ok(None);
        };

        if let Some(ref user_id) = update.user_id {
            if user_id.contains(SEPARATOR) || !self.user_exists(OP, user_id).await? {
                tracing::warn!(
                    backend = BACKEND,
                    user_id = %user_id,
                    "session moved to unknown user"
                );
                return Err(AdapterError::precondition_failed(Entity::User, user_id));
            }
        }
        let mut session = previous.clone();
        update.apply_to(&mut session);
        self.write(OP, &key, &session).await?;

        if session.user_id != previous.user_id {
            let token = &session.session_token;
            let old_index = self.options.session_by_user_id_key(&previous.user_id);
            let new_index = self.options.session_by_user_id_key(&session.user_id);

            if let Err(err) = self.index_remove(OP, &old_index, token).await {
                check_undo(OP, &key, self.write(OP, &key, &previous).await);
                return Err(err);
            }
            if let Err(err) = self.index_push(OP, &new_index, token.clone()).await {
                check_undo(OP, &old_index, self.index_push(OP, &old_index, token.clone()).await);
                check_undo(OP, &key, self.write(OP, &key, &previous).await);
                return Err(err);
            }
        }

        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "updated session");
        Ok(Some(session))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()> {
        const OP: &str = "delete_session";
        if session_token.contains(SEPARATOR) {
            return Ok(());
        }

        let _guard = self.writes.lock().await;
        let key = self.options.session_key(session_token);
        let Some(session) = self.take::<Session>(OP, &key).await? else {
            return Ok(());
        };

        let index_key = self.options.session_by_user_id_key(&session.user_id);
        if let Err(err) = self
            .index_remove(OP, &index_key, &session.session_token)
            .await
        {
            check_undo(OP, &key, self.write(OP, &key, &session).await);
            return Err(err);
        }

        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "deleted session");
        Ok(())
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        validation::validate_verification_token(&token)?;
        no_separator(Entity::VerificationToken, "identifier", &token.identifier)?;

        let key = token.key();
        if !self
            .claim(
                "create_verification_token",
                &self.options.verification_token_key(&key),
                &token,
            )
            .await?
        {
            tracing::warn!(
                backend = BACKEND,
                identifier = %key.identifier,
                "verification token collision"
            );
            return Err(AdapterError::conflict(Entity::VerificationToken, &key.identifier));
        }
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
        if key.identifier.contains(SEPARATOR) {
            return Ok(None);
        }
        let used: Option<VerificationToken> = self
            .take("use_verification_token", &self.options.verification_token_key(key))
            .await?;
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
    use crate::store::{MemoryKeyValueStore, StoreError};
    use auth_adapter_core::AccountType;
    use chrono::{TimeDelta, Utc};

    fn adapter() -> KeyValueAdapter<MemoryKeyValueStore> {
        KeyValueAdapter::with_options(
            MemoryKeyValueStore::new(),
            KeyValueAdapterOptions::default().base_key_prefix("testApp:"),
        )
    }

    #[tokio::test]
    async fn test_keys_written_for_user_graph() {
        let adapter = adapter();
        let user = adapter
            .create_user(NewUser::new("alice@test.com").with_id("u1"))
            .await
            .unwrap();
        adapter
            .link_account(Account::new(&user.id, AccountType::OAuth, "github", "42"))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("tok", &user.id, Utc::now() + TimeDelta::days(1)))
            .await
            .unwrap();

        assert_eq!(
            adapter.store().keys("testApp:").await,
            vec![
                "testApp:user:account:by-user-id:u1",
                "testApp:user:account:github:42",
                "testApp:user:email:alice@test.com",
                "testApp:user:session:by-user-id:u1",
                "testApp:user:session:tok",
                "testApp:user:u1",
            ]
        );
        assert_eq!(
            adapter
                .store()
                .get("testApp:user:email:alice@test.com")
                .await
                .unwrap(),
            Some("u1".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_user_leaves_no_keys() {
        let adapter = adapter();
        let user = adapter.create_user(NewUser::new("alice@test.com")).await.unwrap();
        for pid in ["1", "2"] {
            adapter
                .link_account(Account::new(&user.id, AccountType::OAuth, "github", pid))
                .await
                .unwrap();
        }
        adapter
            .create_session(Session::new("tok", &user.id, Utc::now()))
            .await
            .unwrap();

        adapter.delete_user(&user.id).await.unwrap();
        assert!(adapter.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_unlink_and_delete_session_shrink_indexes() {
        let adapter = adapter();
        let user = adapter
            .create_user(NewUser::new("alice@test.com").with_id("u1"))
            .await
            .unwrap();
        let account = adapter
            .link_account(Account::new("u1", AccountType::Oidc, "google", "g"))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("tok", "u1", Utc::now()))
            .await
            .unwrap();

        adapter.unlink_account(&account.key()).await.unwrap();
        adapter.delete_session("tok").await.unwrap();

        assert_eq!(
            adapter.store().keys("testApp:").await,
            vec!["testApp:user:email:alice@test.com", "testApp:user:u1"]
        );
        assert_eq!(adapter.get_user(&user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_update_session_moves_between_owners() {
        let adapter = adapter();
        adapter
            .create_user(NewUser::new("a@test.com").with_id("a"))
            .await
            .unwrap();
        adapter
            .create_user(NewUser::new("b@test.com").with_id("b"))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("tok", "a", Utc::now()))
            .await
            .unwrap();

        let moved = adapter
            .update_session(SessionUpdate::new("tok").user_id("b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.user_id, "b");

        // Deleting the old owner must not take the moved session with it.
        adapter.delete_user("a").await.unwrap();
        let joined = adapter.get_session_and_user("tok").await.unwrap().unwrap();
        assert_eq!(joined.user.id, "b");
    }

    #[tokio::test]
    async fn test_separator_rejected_in_key_parts() {
        let adapter = adapter();
        let user = adapter.create_user(NewUser::new("a@test.com")).await.unwrap();

        let err = adapter
            .link_account(Account::new(&user.id, AccountType::OAuth, "git:hub", "1"))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = adapter
            .link_account(Account::new(&user.id, AccountType::OAuth, "by-user-id", "x"))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = adapter
            .create_verification_token(VerificationToken::new("a:b", "t", Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = adapter
            .create_user(NewUser::new("b@test.com").with_id("email:x"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_lookups_never_cross_namespaces() {
        let adapter = adapter();
        let user = adapter.create_user(NewUser::new("a@test.com")).await.unwrap();
        adapter
            .create_verification_token(VerificationToken::new("a", "b:c", Utc::now()))
            .await
            .unwrap();

        // "user:email:a@test.com" holds a bare id, not a user document.
        assert!(adapter.get_user("email:a@test.com").await.unwrap().is_none());
        // ("a:b", "c") would otherwise address the ("a", "b:c") token.
        assert!(adapter
            .use_verification_token(&VerificationKey::new("a:b", "c"))
            .await
            .unwrap()
            .is_none());
        assert!(adapter
            .get_user_by_account(&ProviderAccountKey::new("by-user-id", &user.id))
            .await
            .unwrap()
            .is_none());
    }

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
        async fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
        async fn set_if_absent(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
        async fn delete_many(&self, _: &[String]) -> Result<usize, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
        async fn take(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_not_absent_results() {
        let adapter = KeyValueAdapter::new(DownStore);

        let err = adapter.get_user("u1").await.unwrap_err();
        assert!(err.is_backend());
        assert!(err.to_string().contains("connection refused"));

        let err = adapter
            .get_session_and_user("tok")
            .await
            .unwrap_err();
        assert!(err.is_backend());

        let err = adapter
            .use_verification_token(&VerificationKey::new("a@x.com", "t"))
            .await
            .unwrap_err();
        assert!(err.is_backend());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_backend_error() {
        let adapter = adapter();
        adapter
            .store()
            .set("testApp:user:u1", "not json")
            .await
            .unwrap();
        let err = adapter.get_user("u1").await.unwrap_err();
        assert!(err.is_backend());
    }

    /// Wraps the in-process store, failing calls on keys containing a
    /// chosen fragment.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        failing_reads: std::sync::Mutex<Option<String>>,
        failing_writes: std::sync::Mutex<Option<String>>,
    }

    impl FlakyStore {
        fn fail_reads(&self, fragment: &str) {
            *self.failing_reads.lock().unwrap() = Some(fragment.to_string());
        }

        fn fail_writes(&self, fragment: &str) {
            *self.failing_writes.lock().unwrap() = Some(fragment.to_string());
        }

        fn heal(&self) {
            *self.failing_reads.lock().unwrap() = None;
            *self.failing_writes.lock().unwrap() = None;
        }

        fn check(slot: &std::sync::Mutex<Option<String>>, key: &str) -> Result<(), StoreError> {
            match slot.lock().unwrap().as_deref() {
                Some(fragment) if key.contains(fragment) => {
                    Err(StoreError::Connection(format!("{key} unavailable")))
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Self::check(&self.failing_reads, key)?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            Self::check(&self.failing_writes, key)?;
            self.inner.set(key, value).await
        }
        async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
            self.inner.set_if_absent(key, value).await
        }
        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.delete(key).await
        }
        async fn delete_many(&self, keys: &[String]) -> Result<usize, StoreError> {
            for key in keys {
                Self::check(&self.failing_writes, key)?;
            }
            self.inner.delete_many(keys).await
        }
        async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.take(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_index_update_undoes_link_and_session() {
        let adapter = KeyValueAdapter::new(FlakyStore::default());
        adapter
            .create_user(NewUser::new("a@test.com").with_id("u1"))
            .await
            .unwrap();
        let account = Account::new("u1", AccountType::OAuth, "github", "1");
        let session = Session::new("tok", "u1", Utc::now() + TimeDelta::days(1));

        let failures: [fn(&FlakyStore, &str); 2] =
            [FlakyStore::fail_reads, FlakyStore::fail_writes];
        for fail in failures {
            fail(adapter.store(), "by-user-id");
            let err = adapter.link_account(account.clone()).await.unwrap_err();
            assert!(err.is_backend());
            let err = adapter.create_session(session.clone()).await.unwrap_err();
            assert!(err.is_backend());
            adapter.store().heal();

            assert!(adapter.get_account(&account.key()).await.unwrap().is_none());
            assert!(adapter.get_session_and_user("tok").await.unwrap().is_none());
        }

        // Nothing was left claimed, and what is linked now is indexed.
        adapter.link_account(account.clone()).await.unwrap();
        adapter.create_session(session).await.unwrap();
        adapter.delete_user("u1").await.unwrap();
        assert!(adapter.store().inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_user_write_releases_new_email() {
        let adapter = KeyValueAdapter::new(FlakyStore::default());
        adapter
            .create_user(NewUser::new("old@test.com").with_id("u1"))
            .await
            .unwrap();

        adapter.store().fail_writes("user:u1");
        let err = adapter
            .update_user(UserUpdate::new("u1").email("new@test.com"))
            .await
            .unwrap_err();
        assert!(err.is_backend());
        adapter.store().heal();

        let user = adapter.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.email, "old@test.com");
        assert!(adapter.get_user_by_email("new@test.com").await.unwrap().is_none());
        assert_eq!(
            adapter.get_user_by_email("old@test.com").await.unwrap(),
            Some(user)
        );
        adapter
            .create_user(NewUser::new("new@test.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_cascade_removes_nothing() {
        let adapter = KeyValueAdapter::new(FlakyStore::default());
        adapter
            .create_user(NewUser::new("a@test.com").with_id("u1"))
            .await
            .unwrap();
        adapter
            .link_account(Account::new("u1", AccountType::OAuth, "github", "1"))
            .await
            .unwrap();
        adapter
            .create_session(Session::new("tok", "u1", Utc::now() + TimeDelta::days(1)))
            .await
            .unwrap();
        let before = adapter.store().inner.keys("").await;

        adapter.store().fail_writes("session:tok");
        let err = adapter.delete_user("u1").await.unwrap_err();
        assert!(err.is_backend());
        adapter.store().heal();

        assert_eq!(adapter.store().inner.keys("").await, before);
        let joined = adapter.get_session_and_user("tok").await.unwrap().unwrap();
        assert_eq!(joined.user.id, "u1");
    }

    #[tokio::test]
    async fn test_blank_verification_key_is_rejected() {
        let adapter = adapter();
        let err = adapter
            .use_verification_token(&VerificationKey::new("a@x.com", ""))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
