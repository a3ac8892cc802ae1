// Integration tests for the SqlxAdapter using SQLite in-memory.
//
// Covers behaviour that only shows at the SQL level: stored column values,
// the transactional cascade and foreign keys.

use chrono::{TimeDelta, Utc};
use sqlx::Row;

use auth_adapter_core::{
    Account, AccountType, Adapter, NewUser, ProviderAccountKey, Session, UserUpdate,
    VerificationToken,
};
use auth_adapter_sqlx::SqlxAdapter;

/// Helper: create a fresh SQLite in-memory adapter with the schema in place.
async fn setup_adapter() -> SqlxAdapter {
    let adapter = SqlxAdapter::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite in-memory");
    adapter.migrate().await.expect("Failed to create schema");
    adapter
}

async fn count(adapter: &SqlxAdapter, table: &str) -> i64 {
    sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
        .fetch_one(adapter.pool())
        .await
        .unwrap()
        .get::<i64, _>("n")
}

#[tokio::test]
async fn test_timestamps_stored_as_rfc3339_text() {
    let adapter = setup_adapter().await;
    let user = adapter.create_user(NewUser::new("a@x.com")).await.unwrap();
    let expires = Utc::now() + TimeDelta::days(1);
    adapter
        .create_session(Session::new("tok", &user.id, expires))
        .await
        .unwrap();

    let raw: String = sqlx::query(r#"SELECT expires FROM sessions WHERE "sessionToken" = $1"#)
        .bind("tok")
        .fetch_one(adapter.pool())
        .await
        .unwrap()
        .get("expires");
    assert!(raw.ends_with('Z'));

    let joined = adapter.get_session_and_user("tok").await.unwrap().unwrap();
    assert_eq!(joined.session.expires, expires);
}

#[tokio::test]
async fn test_update_user_clears_nullable_fields() {
    let adapter = setup_adapter().await;
    let user = adapter
        .create_user(
            NewUser::new("a@x.com")
                .with_name("Alice")
                .with_image("https://example.com/a.png")
                .verified_at(Utc::now()),
        )
        .await
        .unwrap();

    let updated = adapter
        .update_user(UserUpdate::new(&user.id).image(None).email_verified(None))
        .await
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Alice"));
    assert_eq!(updated.image, None);
    assert_eq!(updated.email_verified, None);
}

#[tokio::test]
async fn test_delete_user_cascade_counts() {
    let adapter = setup_adapter().await;
    let user = adapter.create_user(NewUser::new("a@x.com")).await.unwrap();
    let other = adapter.create_user(NewUser::new("b@x.com")).await.unwrap();
    let expires = Utc::now() + TimeDelta::days(1);

    for (pid, owner) in [("1", &user.id), ("2", &user.id), ("3", &other.id)] {
        adapter
            .link_account(Account::new(owner, AccountType::OAuth, "github", pid))
            .await
            .unwrap();
    }
    adapter
        .create_session(Session::new("t1", &user.id, expires))
        .await
        .unwrap();
    adapter
        .create_session(Session::new("t2", &other.id, expires))
        .await
        .unwrap();

    adapter.delete_user(&user.id).await.unwrap();

    assert_eq!(count(&adapter, "users").await, 1);
    assert_eq!(count(&adapter, "accounts").await, 1);
    assert_eq!(count(&adapter, "sessions").await, 1);
    assert!(adapter
        .get_account(&ProviderAccountKey::new("github", "3"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_account_token_material_round_trips() {
    let adapter = setup_adapter().await;
    let user = adapter.create_user(NewUser::new("a@x.com")).await.unwrap();

    let mut account = Account::new(&user.id, AccountType::Oidc, "google", "g-1");
    account.access_token = Some("at".into());
    account.refresh_token = Some("rt".into());
    account.expires_at = Some(1_900_000_000);
    account.id_token = Some("jwt".into());
    adapter.link_account(account.clone()).await.unwrap();

    let stored = adapter.get_account(&account.key()).await.unwrap();
    assert_eq!(stored, Some(account));
}

#[tokio::test]
async fn test_use_verification_token_deletes_row() {
    let adapter = setup_adapter().await;
    let token = VerificationToken::new("a@x.com", "t1", Utc::now() + TimeDelta::hours(1));
    adapter.create_verification_token(token.clone()).await.unwrap();
    assert_eq!(count(&adapter, "verification_tokens").await, 1);

    let used = adapter.use_verification_token(&token.key()).await.unwrap();
    assert_eq!(used, Some(token));
    assert_eq!(count(&adapter, "verification_tokens").await, 0);
}
