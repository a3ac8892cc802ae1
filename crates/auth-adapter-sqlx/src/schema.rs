// Table layout and DDL.
//
// Column names follow the record field names. Timestamps are stored as
// RFC 3339 text so every backend round-trips them at full precision.

use auth_adapter_core::error::{Entity, ValidationError};
use auth_adapter_core::ModelNames;

/// Validated table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub users: String,
    pub accounts: String,
    pub sessions: String,
    pub verification_tokens: String,
}

impl Tables {
    /// Check configured names are plain SQL identifiers.
    pub fn from_model_names(names: &ModelNames) -> Result<Self, ValidationError> {
        Ok(Self {
            users: identifier(Entity::User, &names.user)?,
            accounts: identifier(Entity::Account, &names.account)?,
            sessions: identifier(Entity::Session, &names.session)?,
            verification_tokens: identifier(Entity::VerificationToken, &names.verification_token)?,
        })
    }

    /// `CREATE TABLE` / `CREATE INDEX` statements, in dependency order.
    pub fn create_statements(&self) -> Vec<String> {
        let Tables {
            users,
            accounts,
            sessions,
            verification_tokens,
        } = self;
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {users} (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    image TEXT,
    "emailVerified" TEXT
)"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {accounts} (
    "userId" TEXT NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    provider TEXT NOT NULL,
    "providerAccountId" TEXT NOT NULL,
    refresh_token TEXT,
    access_token TEXT,
    expires_at BIGINT,
    token_type TEXT,
    scope TEXT,
    id_token TEXT,
    session_state TEXT,
    PRIMARY KEY (provider, "providerAccountId")
)"#
            ),
            format!(r#"CREATE INDEX IF NOT EXISTS {accounts}_user_id_idx ON {accounts} ("userId")"#),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {sessions} (
    "sessionToken" TEXT PRIMARY KEY,
    "userId" TEXT NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
    expires TEXT NOT NULL
)"#
            ),
            format!(r#"CREATE INDEX IF NOT EXISTS {sessions}_user_id_idx ON {sessions} ("userId")"#),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {verification_tokens} (
    identifier TEXT NOT NULL,
    token TEXT NOT NULL,
    expires TEXT NOT NULL,
    PRIMARY KEY (identifier, token)
)"#
            ),
        ]
    }

    /// `DELETE` statements emptying every table, dependents first.
    pub fn truncate_statements(&self) -> Vec<String> {
        [
            &self.sessions,
            &self.accounts,
            &self.verification_tokens,
            &self.users,
        ]
        .iter()
        .map(|table| format!("DELETE FROM {table}"))
        .collect()
    }
}

fn identifier(entity: Entity, name: &str) -> Result<String, ValidationError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ValidationError::Malformed {
            entity,
            field: "tableName",
            reason: format!("{name:?} is not a plain SQL identifier"),
        });
    }
    Ok(name.to_string())
}
