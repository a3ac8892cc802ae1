// Row ↔ record mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

use auth_adapter_core::{Account, AccountType, BoxError, Session, User, VerificationToken};

/// Columns selected for a user, in `user_from_row` order.
pub const USER_COLUMNS: &str = r#"id, email, name, image, "emailVerified""#;

pub const ACCOUNT_COLUMNS: &str = r#""userId", type, provider, "providerAccountId", refresh_token, access_token, expires_at, token_type, scope, id_token, session_state"#;

pub const SESSION_COLUMNS: &str = r#""sessionToken", "userId", expires"#;

pub const VERIFICATION_TOKEN_COLUMNS: &str = "identifier, token, expires";

pub type RowResult<T> = Result<T, BoxError>;

/// Stored form of a timestamp.
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_timestamp(raw: &str) -> RowResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

pub fn user_from_row(row: &AnyRow) -> RowResult<User> {
    let email_verified: Option<String> = row.try_get("emailVerified")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        image: row.try_get("image")?,
        email_verified: email_verified.as_deref().map(decode_timestamp).transpose()?,
    })
}

pub fn account_from_row(row: &AnyRow) -> RowResult<Account> {
    let account_type: String = row.try_get("type")?;
    let account_type = AccountType::parse(&account_type)
        .ok_or_else(|| format!("unknown account type {account_type:?}"))?;
    Ok(Account {
        user_id: row.try_get("userId")?,
        account_type,
        provider: row.try_get("provider")?,
        provider_account_id: row.try_get("providerAccountId")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        token_type: row.try_get("token_type")?,
        scope: row.try_get("scope")?,
        id_token: row.try_get("id_token")?,
        session_state: row.try_get("session_state")?,
    })
}

pub fn session_from_row(row: &AnyRow) -> RowResult<Session> {
    let expires: String = row.try_get("expires")?;
    Ok(Session {
        session_token: row.try_get("sessionToken")?,
        user_id: row.try_get("userId")?,
        expires: decode_timestamp(&expires)?,
    })
}

pub fn verification_token_from_row(row: &AnyRow) -> RowResult<VerificationToken> {
    let expires: String = row.try_get("expires")?;
    Ok(VerificationToken {
        identifier: row.try_get("identifier")?,
        token: row.try_get("token")?,
        expires: decode_timestamp(&expires)?,
    })
}
