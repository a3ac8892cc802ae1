// Fixture generators.
//
// Every call yields fresh random keys so scenarios can share one backend
// without stepping on each other.

use chrono::{TimeDelta, Utc};

use auth_adapter_core::utils::id::{generate_id_with_length, generate_token};
use auth_adapter_core::{
    Account, AccountType, AdapterOptions, NewUser, Session, VerificationToken,
};

fn suffix() -> String {
    generate_id_with_length(12).to_lowercase()
}

/// A user with a unique address, a name and an avatar.
pub fn generate_user() -> NewUser {
    let suffix = suffix();
    NewUser::new(format!("user-{suffix}@example.com"))
        .with_name(format!("Test User {suffix}"))
        .with_image(format!("https://example.com/avatars/{suffix}.png"))
}

/// An OAuth account with token material, owned by `user_id`.
pub fn generate_account(user_id: &str) -> Account {
    let mut account = Account::new(user_id, AccountType::OAuth, "github", suffix());
    account.access_token = Some(generate_token());
    account.refresh_token = Some(generate_token());
    account.expires_at = Some((Utc::now() + TimeDelta::hours(1)).timestamp());
    account.token_type = Some("bearer".to_string());
    account.scope = Some("read:user user:email".to_string());
    account
}

/// A session for `user_id` expiring after the default session lifetime.
pub fn generate_session(user_id: &str) -> Session {
    let max_age = AdapterOptions::default().session_max_age;
    Session::new(
        generate_token(),
        user_id,
        Utc::now() + TimeDelta::seconds(max_age),
    )
}

/// An email verification token expiring after the default token lifetime.
pub fn generate_verification_token() -> VerificationToken {
    let max_age = AdapterOptions::default().verification_token_max_age;
    VerificationToken::new(
        format!("verify-{}@example.com", suffix()),
        generate_token(),
        Utc::now() + TimeDelta::seconds(max_age),
    )
}
