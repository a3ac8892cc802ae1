// SqlxAdapter — implementation of the core Adapter trait using sqlx::Any.
//
// Uses the `sqlx::any` driver to support Postgres and SQLite through a single
// runtime-polymorphic pool. The pool is owned by the caller; the adapter only
// borrows connections from it.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool};

use auth_adapter_core::db::validation;
use auth_adapter_core::error::{AdapterError, AdapterResult, Entity};
use auth_adapter_core::{
    Account, Adapter, AdapterOptions, BoxError, NewUser, ProviderAccountKey, Session,
    SessionAndUser, SessionUpdate, User, UserUpdate, VerificationKey, VerificationToken,
};

use crate::rows::{
    account_from_row, encode_timestamp, session_from_row, user_from_row,
    verification_token_from_row, ACCOUNT_COLUMNS, SESSION_COLUMNS, USER_COLUMNS,
    VERIFICATION_TOKEN_COLUMNS,
};
use crate::schema::Tables;

const BACKEND: &str = "sqlx";

/// Typed bind value, owned so queries can be assembled dynamically.
#[derive(Debug, Clone)]
enum BindValue {
    Text(String),
    NullableText(Option<String>),
    NullableInt(Option<i64>),
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    binds: &'q [BindValue],
) -> Query<'q, Any, AnyArguments<'q>> {
    for bv in binds {
        query = match bv {
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::NullableText(s) => query.bind(s.clone()),
            BindValue::NullableInt(i) => query.bind(*i),
        };
    }
    query
}

fn nullable_timestamp(at: Option<chrono::DateTime<chrono::Utc>>) -> BindValue {
    BindValue::NullableText(at.map(encode_timestamp))
}

fn db_error(op: &'static str, source: impl Into<BoxError>) -> AdapterError {
    let err = AdapterError::backend(BACKEND, op, source);
    tracing::error!(backend = BACKEND, operation = op, error = %err, "query failed");
    err
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// SQLx-based adapter.
///
/// Wraps an `AnyPool` and implements the core `Adapter` trait.
#[derive(Debug, Clone)]
pub struct SqlxAdapter {
    pool: AnyPool,
    tables: Tables,
    options: AdapterOptions,
}

impl SqlxAdapter {
    /// Create a new adapter from an existing pool with default options.
    pub fn new(pool: AnyPool) -> Self {
        let options = AdapterOptions::default();
        let tables = Tables {
            users: options.model_names.user.clone(),
            accounts: options.model_names.account.clone(),
            sessions: options.model_names.session.clone(),
            verification_tokens: options.model_names.verification_token.clone(),
        };
        Self {
            pool,
            tables,
            options,
        }
    }

    /// Create a new adapter from an existing pool, validating table names.
    pub fn with_options(pool: AnyPool, options: AdapterOptions) -> AdapterResult<Self> {
        let tables = Tables::from_model_names(&options.model_names)?;
        Ok(Self {
            pool,
            tables,
            options,
        })
    }

    /// Create a new adapter by connecting to a database URL.
    pub async fn connect(url: &str) -> AdapterResult<Self> {
        Self::connect_with_options(url, AdapterOptions::default()).await
    }

    pub async fn connect_with_options(url: &str, options: AdapterOptions) -> AdapterResult<Self> {
        sqlx::any::install_default_drivers();

        // Each connection to "sqlite::memory:" opens a separate database.
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            AnyPoolOptions::new().max_connections(1).connect(url).await
        } else {
            AnyPool::connect(url).await
        }
        .map_err(|e| db_error("connect", e))?;

        tracing::debug!(backend = BACKEND, "connected");
        Self::with_options(pool, options)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Create the tables and indexes if they do not exist.
    pub async fn migrate(&self) -> AdapterResult<()> {
        for statement in self.tables.create_statements() {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("migrate", e))?;
        }
        tracing::info!(backend = BACKEND, users = %self.tables.users, "schema ready");
        Ok(())
    }

    async fn fetch_optional(
        &self,
        op: &'static str,
        sql: &str,
        binds: &[BindValue],
    ) -> AdapterResult<Option<AnyRow>> {
        bind_all(sqlx::query(sql), binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(op, e))
    }

    async fn fetch_user(
        &self,
        op: &'static str,
        sql: &str,
        binds: &[BindValue],
    ) -> AdapterResult<Option<User>> {
        self.fetch_optional(op, sql, binds)
            .await?
            .map(|row| user_from_row(&row).map_err(|e| db_error(op, e)))
            .transpose()
    }

    async fn user_exists(&self, op: &'static str, id: &str) -> AdapterResult<bool> {
        let sql = format!("SELECT id FROM {} WHERE id = $1", self.tables.users);
        Ok(self
            .fetch_optional(op, &sql, &[BindValue::Text(id.to_string())])
            .await?
            .is_some())
    }

    async fn session_exists(&self, op: &'static str, session_token: &str) -> AdapterResult<bool> {
        let sql = format!(
            r#"SELECT "sessionToken" FROM {} WHERE "sessionToken" = $1"#,
            self.tables.sessions
        );
        Ok(self
            .fetch_optional(op, &sql, &[BindValue::Text(session_token.to_string())])
            .await?
            .is_some())
    }

    async fn email_taken(&self, op: &'static str, email: &str) -> AdapterResult<bool> {
        let sql = format!("SELECT id FROM {} WHERE email = $1", self.tables.users);
        Ok(self
            .fetch_optional(op, &sql, &[BindValue::Text(email.to_string())])
            .await?
            .is_some())
    }
}

#[async_trait]
impl Adapter for SqlxAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn create_user(&self, user: NewUser) -> AdapterResult<User> {
        const OP: &str = "create_user";
        validation::validate_new_user(&user)?;

        let id = user.id.clone().unwrap_or_else(|| self.options.next_user_id());
        let user = user.into_user(id);
        let sql = format!(
            "INSERT INTO {} ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5)",
            self.tables.users
        );
        let binds = [
            BindValue::Text(user.id.clone()),
            BindValue::Text(user.email.clone()),
            BindValue::NullableText(user.name.clone()),
            BindValue::NullableText(user.image.clone()),
            nullable_timestamp(user.email_verified),
        ];

        match bind_all(sqlx::query(&sql), &binds).execute(&self.pool).await {
            Ok(_) => {
                tracing::debug!(backend = BACKEND, user_id = %user.id, "created user");
                Ok(user)
            }
            Err(err) if is_unique_violation(&err) => {
                let key = if self.email_taken(OP, &user.email).await? {
                    user.email
                } else {
                    user.id
                };
                tracing::warn!(backend = BACKEND, key = %key, "user already exists");
                Err(AdapterError::conflict(Entity::User, key))
            }
            Err(err) => Err(db_error(OP, err)),
        }
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE id = $1", self.tables.users);
        self.fetch_user("get_user", &sql, &[BindValue::Text(id.to_string())])
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE email = $1", self.tables.users);
        self.fetch_user("get_user_by_email", &sql, &[BindValue::Text(email.to_string())])
            .await
    }

    async fn get_user_by_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<User>> {
        let sql = format!(
            r#"SELECT u.id, u.email, u.name, u.image, u."emailVerified"
FROM {users} u
JOIN {accounts} a ON a."userId" = u.id
WHERE a.provider = $1 AND a."providerAccountId" = $2"#,
            users = self.tables.users,
            accounts = self.tables.accounts,
        );
        let binds = [
            BindValue::Text(key.provider.clone()),
            BindValue::Text(key.provider_account_id.clone()),
        ];
        self.fetch_user("get_user_by_account", &sql, &binds).await
    }

    async fn update_user(&self, update: UserUpdate) -> AdapterResult<User> {
        const OP: &str = "update_user";
        validation::validate_user_update(&update)?;

        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        if let Some(ref email) = update.email {
            binds.push(BindValue::Text(email.clone()));
            assignments.push(format!("email = ${}", binds.len()));
        }
        if let Some(ref name) = update.name {
            binds.push(BindValue::NullableText(name.clone()));
            assignments.push(format!("name = ${}", binds.len()));
        }
        if let Some(ref image) = update.image {
            binds.push(BindValue::NullableText(image.clone()));
            assignments.push(format!("image = ${}", binds.len()));
        }
        if let Some(email_verified) = update.email_verified {
            binds.push(nullable_timestamp(email_verified));
            assignments.push(format!(r#""emailVerified" = ${}"#, binds.len()));
        }
        binds.push(BindValue::Text(update.id.clone()));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ${} RETURNING {USER_COLUMNS}",
            self.tables.users,
            assignments.join(", "),
            binds.len()
        );

        let row = match bind_all(sqlx::query(&sql), &binds)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                let email = update.email.unwrap_or_default();
                tracing::warn!(backend = BACKEND, email = %email, "email already registered");
                return Err(AdapterError::conflict(Entity::User, email));
            }
            Err(err) => return Err(db_error(OP, err)),
        };
        let Some(row) = row else {
            tracing::warn!(backend = BACKEND, user_id = %update.id, "update of unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &update.id));
        };

        let user = user_from_row(&row).map_err(|e| db_error(OP, e))?;
        tracing::debug!(backend = BACKEND, user_id = %user.id, "updated user");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        const OP: &str = "delete_user";
        let mut tx = self.pool.begin().await.map_err(|e| db_error(OP, e))?;

        let sessions = sqlx::query(&format!(
            r#"DELETE FROM {} WHERE "userId" = $1"#,
            self.tables.sessions
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(OP, e))?
        .rows_affected();

        let accounts = sqlx::query(&format!(
            r#"DELETE FROM {} WHERE "userId" = $1"#,
            self.tables.accounts
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(OP, e))?
        .rows_affected();

        let users = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.tables.users))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error(OP, e))?
            .rows_affected();

        tx.commit().await.map_err(|e| db_error(OP, e))?;
        if users > 0 {
            tracing::debug!(backend = BACKEND, user_id = %id, accounts, sessions, "deleted user");
        }
        Ok(())
    }

    async fn link_account(&self, account: Account) -> AdapterResult<Account> {
        const OP: &str = "link_account";
        validation::validate_account(&account)?;

        if !self.user_exists(OP, &account.user_id).await? {
            tracing::warn!(backend = BACKEND, user_id = %account.user_id, "link to unknown user");
            return Err(AdapterError::precondition_failed(Entity::User, &account.user_id));
        }

        let sql = format!(
            "INSERT INTO {} ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            self.tables.accounts
        );
        let binds = [
            BindValue::Text(account.user_id.clone()),
            BindValue::Text(account.account_type.as_str().to_string()),
            BindValue::Text(account.provider.clone()),
            BindValue::Text(account.provider_account_id.clone()),
            BindValue::NullableText(account.refresh_token.clone()),
            BindValue::NullableText(account.access_token.clone()),
            BindValue::NullableInt(account.expires_at),
            BindValue::NullableText(account.token_type.clone()),
            BindValue::NullableText(account.scope.clone()),
            BindValue::NullableText(account.id_token.clone()),
            BindValue::NullableText(account.session_state.clone()),
        ];

        match bind_all(sqlx::query(&sql), &binds).execute(&self.pool).await {
            Ok(_) => {
                tracing::debug!(
                    backend = BACKEND,
                    account = %account.key(),
                    user_id = %account.user_id,
                    "linked account"
                );
                Ok(account)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(
                    backend = BACKEND,
                    account = %account.key(),
                    "account already linked"
                );
                Err(AdapterError::conflict(Entity::Account, account.key()))
            }
            // The owner was deleted between the check and the insert.
            Err(err) if is_foreign_key_violation(&err) => {
                Err(AdapterError::precondition_failed(Entity::User, &account.user_id))
            }
            Err(err) => Err(db_error(OP, err)),
        }
    }

    async fn unlink_account(&self, key: &ProviderAccountKey) -> AdapterResult<()> {
        let sql = format!(
            r#"DELETE FROM {} WHERE provider = $1 AND "providerAccountId" = $2"#,
            self.tables.accounts
        );
        let removed = sqlx::query(&sql)
            .bind(key.provider.as_str())
            .bind(key.provider_account_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("unlink_account", e))?
            .rows_affected();
        if removed > 0 {
            tracing::debug!(backend = BACKEND, account = %key, "unlinked account");
        }
        Ok(())
    }

    async fn get_account(&self, key: &ProviderAccountKey) -> AdapterResult<Option<Account>> {
        const OP: &str = "get_account";
        let sql = format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM {} WHERE provider = $1 AND "providerAccountId" = $2"#,
            self.tables.accounts
        );
        let binds = [
            BindValue::Text(key.provider.clone()),
            BindValue::Text(key.provider_account_id.clone()),
        ];
        self.fetch_optional(OP, &sql, &binds)
            .await?
            .map(|row| account_from_row(&row).map_err(|e| db_error(OP, e)))
            .transpose()
    }

    async fn create_session(&self, session: Session) -> AdapterResult<Session> {
        const OP: &str = "create_session";
        validation::validate_session(&session)?;

        if !self.user_exists(OP, &session.user_id).await? {
            tracing::warn!(
                backend = BACKEND,
                user_id = %session.user_id,
                "session for unknown user"
            );
            return Err(AdapterError::precondition_failed(Entity::User, &session.user_id));
        }

        let sql = format!(
            "INSERT INTO {} ({SESSION_COLUMNS}) VALUES ($1, $2, $3)",
            self.tables.sessions
        );
        let result = sqlx::query(&sql)
            .bind(session.session_token.as_str())
            .bind(session.user_id.as_str())
            .bind(encode_timestamp(session.expires))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(backend = BACKEND, user_id = %session.user_id, "created session");
                Ok(session)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(backend = BACKEND, "session token collision");
                Err(AdapterError::conflict(Entity::Session, "sessionToken"))
            }
            Err(err) if is_foreign_key_violation(&err) => {
                Err(AdapterError::precondition_failed(Entity::User, &session.user_id))
            }
            Err(err) => Err(db_error(OP, err)),
        }
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<SessionAndUser>> {
        const OP: &str = "get_session_and_user";
        let sql = format!(
            r#"SELECT s."sessionToken", s."userId", s.expires,
       u.id, u.email, u.name, u.image, u."emailVerified"
FROM {sessions} s
JOIN {users} u ON u.id = s."userId"
WHERE s."sessionToken" = $1"#,
            sessions = self.tables.sessions,
            users = self.tables.users,
        );
        let Some(row) = self
            .fetch_optional(OP, &sql, &[BindValue::Text(session_token.to_string())])
            .await?
        else {
            return Ok(None);
        };

        let session = session_from_row(&row).map_err(|e| db_error(OP, e))?;
        let user = user_from_row(&row).map_err(|e| db_error(OP, e))?;
        Ok(Some(SessionAndUser { session, user }))
    }

    async fn update_session(&self, update: SessionUpdate) -> AdapterResult<Option<Session>> {
        const OP: &str = "update_session";
        validation::validate_session_update(&update)?;

        if !self.session_exists(OP, &update.session_token).await? {
            return Ok(None);
        }
        if let Some(ref user_id) = update.user_id {
            if !self.user_exists(OP, user_id).await? {
                tracing::warn!(
                    backend = BACKEND,
                    user_id = %user_id,
                    "session moved to unknown user"
                );
                return Err(AdapterError::precondition_failed(Entity::User, user_id));
            }
        }

        let mut assignments = Vec::new();
        let mut binds = Vec::new();
        if let Some(ref user_id) = update.user_id {
            binds.push(BindValue::Text(user_id.clone()));
            assignments.push(format!(r#""userId" = ${}"#, binds.len()));
        }
        if let Some(expires) = update.expires {
            binds.push(BindValue::Text(encode_timestamp(expires)));
            assignments.push(format!("expires = ${}", binds.len()));
        }
        binds.push(BindValue::Text(update.session_token.clone()));
        let sql = format!(
            r#"UPDATE {} SET {} WHERE "sessionToken" = ${} RETURNING {SESSION_COLUMNS}"#,
            self.tables.sessions,
            assignments.join(", "),
            binds.len()
        );

        let row = match bind_all(sqlx::query(&sql), &binds)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(err) if is_foreign_key_violation(&err) => {
                let user_id = update.user_id.unwrap_or_default();
                return Err(AdapterError::precondition_failed(Entity::User, user_id));
            }
            Err(err) => return Err(db_error(OP, err)),
        };
        let Some(row) = row else {
            return Ok(None);
        };

        let session = session_from_row(&row).map_err(|e| db_error(OP, e))?;
        tracing::debug!(backend = BACKEND, user_id = %session.user_id, "updated session");
        Ok(Some(session))
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()> {
        let sql = format!(r#"DELETE FROM {} WHERE "sessionToken" = $1"#, self.tables.sessions);
        let removed = sqlx::query(&sql)
            .bind(session_token)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_session", e))?
            .rows_affected();
        if removed > 0 {
            tracing::debug!(backend = BACKEND, "deleted session");
        }
        Ok(())
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        validation::validate_verification_token(&token)?;

        let sql = format!(
            "INSERT INTO {} ({VERIFICATION_TOKEN_COLUMNS}) VALUES ($1, $2, $3)",
            self.tables.verification_tokens
        );
        let result = sqlx::query(&sql)
            .bind(token.identifier.as_str())
            .bind(token.token.as_str())
            .bind(encode_timestamp(token.expires))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(
                    backend = BACKEND,
                    identifier = %token.identifier,
                    "created verification token"
                );
                Ok(token)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(
                    backend = BACKEND,
                    identifier = %token.identifier,
                    "verification token collision"
                );
                Err(AdapterError::conflict(Entity::VerificationToken, &token.identifier))
            }
            Err(err) => Err(db_error("create_verification_token", err)),
        }
    }

    async fn use_verification_token(
        &self,
        key: &VerificationKey,
    ) -> AdapterResult<Option<VerificationToken>> {
        const OP: &str = "use_verification_token";
        validation::validate_verification_key(key)?;

        // Read and delete in one statement.
        let sql = format!(
            "DELETE FROM {} WHERE identifier = $1 AND token = $2 RETURNING {VERIFICATION_TOKEN_COLUMNS}",
            self.tables.verification_tokens
        );
        let binds = [
            BindValue::Text(key.identifier.clone()),
            BindValue::Text(key.token.clone()),
        ];
        let used = self
            .fetch_optional(OP, &sql, &binds)
            .await?
            .map(|row| verification_token_from_row(&row).map_err(|e| db_error(OP, e)))
            .transpose()?;
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
