// Input checks applied by every adapter before it touches storage.
//
// Keeps malformed records out of every backend the same way, so the
// conformance suite can expect identical rejections from all of them.

use crate::db::models::{
    Account, NewUser, ProviderAccountKey, Session, SessionUpdate, UserUpdate, VerificationKey,
    VerificationToken,
};
use crate::error::{Entity, ValidationError};

/// Shorthand result for validation helpers.
pub type ValidationResult = Result<(), ValidationError>;

fn non_empty(entity: Entity, field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { entity, field });
    }
    Ok(())
}

/// Minimal structural email check: `local@domain`, no whitespace.
pub fn validate_email(entity: Entity, email: &str) -> ValidationResult {
    non_empty(entity, "email", email)?;
    let malformed = |reason: &str| ValidationError::Malformed {
        entity,
        field: "email",
        reason: reason.to_string(),
    };
    if email.chars().any(char::is_whitespace) {
        return Err(malformed("contains whitespace"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            if domain.contains('@') {
                Err(malformed("more than one '@'"))
            } else {
                Ok(())
            }
        }
        _ => Err(malformed("expected local@domain")),
    }
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult {
    if let Some(ref id) = user.id {
        non_empty(Entity::User, "id", id)?;
    }
    validate_email(Entity::User, &user.email)
}

pub fn validate_user_id(id: &str) -> ValidationResult {
    non_empty(Entity::User, "id", id)
}

pub fn validate_user_update(update: &UserUpdate) -> ValidationResult {
    validate_user_id(&update.id)?;
    if update.is_empty() {
        return Err(ValidationError::EmptyUpdate {
            entity: Entity::User,
            key: update.id.clone(),
        });
    }
    if let Some(ref email) = update.email {
        validate_email(Entity::User, email)?;
    }
    Ok(())
}

pub fn validate_account_key(key: &ProviderAccountKey) -> ValidationResult {
    non_empty(Entity::Account, "provider", &key.provider)?;
    non_empty(Entity::Account, "providerAccountId", &key.provider_account_id)
}

pub fn validate_account(account: &Account) -> ValidationResult {
    non_empty(Entity::Account, "userId", &account.user_id)?;
    non_empty(Entity::Account, "provider", &account.provider)?;
    non_empty(Entity::Account, "providerAccountId", &account.provider_account_id)?;
    if let Some(expires_at) = account.expires_at {
        if expires_at < 0 {
            return Err(ValidationError::Malformed {
                entity: Entity::Account,
                field: "expires_at",
                reason: format!("negative epoch seconds {expires_at}"),
            });
        }
    }
    Ok(())
}

pub fn validate_session_token(token: &str) -> ValidationResult {
    non_empty(Entity::Session, "sessionToken", token)
}

pub fn validate_session(session: &Session) -> ValidationResult {
    validate_session_token(&session.session_token)?;
    non_empty(Entity::Session, "userId", &session.user_id)
}

pub fn validate_session_update(update: &SessionUpdate) -> ValidationResult {
    validate_session_token(&update.session_token)?;
    if let Some(ref user_id) = update.user_id {
        non_empty(Entity::Session, "userId", user_id)?;
    }
    if update.user_id.is_none() && update.expires.is_none() {
        return Err(ValidationError::EmptyUpdate {
            entity: Entity::Session,
            key: update.session_token.clone(),
        });
    }
    Ok(())
}

pub fn validate_verification_key(key: &VerificationKey) -> ValidationResult {
    non_empty(Entity::VerificationToken, "identifier", &key.identifier)?;
    non_empty(Entity::VerificationToken, "token", &key.token)
}

pub fn validate_verification_token(token: &VerificationToken) -> ValidationResult {
    non_empty(Entity::VerificationToken, "identifier", &token.identifier)?;
    non_empty(Entity::VerificationToken, "token", &token.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountType;
    use chrono::Utc;

    #[test]
    fn test_email_shapes() {
        assert!(validate_email(Entity::User, "a@x.com").is_ok());
        assert!(validate_email(Entity::User, "first.last+tag@sub.example.org").is_ok());

        assert!(matches!(
            validate_email(Entity::User, ""),
            Err(ValidationError::Empty { field: "email", .. })
        ));
        for bad in ["ax.com", "@x.com", "a@", "a b@x.com", "a@b@c"] {
            assert!(
                matches!(
                    validate_email(Entity::User, bad),
                    Err(ValidationError::Malformed { field: "email", .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_user_explicit_blank_id() {
        let user = NewUser::new("a@x.com").with_id("  ");
        assert!(matches!(
            validate_new_user(&user),
            Err(ValidationError::Empty { field: "id", .. })
        ));
        assert!(validate_new_user(&NewUser::new("a@x.com")).is_ok());
    }

    #[test]
    fn test_empty_user_update_rejected() {
        assert!(matches!(
            validate_user_update(&UserUpdate::new("u1")),
            Err(ValidationError::EmptyUpdate { .. })
        ));
        assert!(validate_user_update(&UserUpdate::new("u1").name(Some("n".into()))).is_ok());
        assert!(validate_user_update(&UserUpdate::new("u1").email("nope")).is_err());
    }

    #[test]
    fn test_account_checks() {
        let ok = Account::new("u1", AccountType::Oidc, "google", "g-1");
        assert!(validate_account(&ok).is_ok());

        let blank_provider = Account::new("u1", AccountType::Oidc, "", "g-1");
        assert!(matches!(
            validate_account(&blank_provider),
            Err(ValidationError::Empty { field: "provider", .. })
        ));

        let mut negative = ok.clone();
        negative.expires_at = Some(-5);
        assert!(validate_account(&negative).is_err());

        assert!(validate_account_key(&ProviderAccountKey::new("google", "")).is_err());
    }

    #[test]
    fn test_session_checks() {
        let now = Utc::now();
        assert!(validate_session(&Session::new("tok", "u1", now)).is_ok());
        assert!(validate_session(&Session::new("", "u1", now)).is_err());
        assert!(validate_session(&Session::new("tok", "", now)).is_err());

        assert!(validate_session_update(&SessionUpdate::new("tok")).is_err());
        assert!(validate_session_update(&SessionUpdate::new("tok").expires(now)).is_ok());
    }

    #[test]
    fn test_verification_checks() {
        let now = Utc::now();
        assert!(validate_verification_token(&VerificationToken::new("a@x.com", "t", now)).is_ok());
        assert!(validate_verification_token(&VerificationToken::new("a@x.com", "", now)).is_err());
        assert!(validate_verification_key(&VerificationKey::new("", "t")).is_err());
    }
}
