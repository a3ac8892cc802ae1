// The fixed conformance suite.
//
// Every adapter runs exactly these scenarios, unmodified. Each one drives the
// adapter through its public contract and, where it matters, checks the raw
// backend storage through the `StorageInspector`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{TimeDelta, Utc};

use auth_adapter_core::utils::id::generate_id_with_length;
use auth_adapter_core::{
    Adapter, AdapterError, AdapterResult, BoxError, NewUser, ProviderAccountKey, SessionAndUser,
    SessionUpdate, UserUpdate, VerificationKey,
};

use crate::fixtures::{
    generate_account, generate_session, generate_user, generate_verification_token,
};
use crate::inspector::StorageInspector;

/// Why a scenario failed.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("unexpected adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("storage inspection failed: {0}")]
    Inspector(#[from] BoxError),
}

pub type ScenarioResult = Result<(), ScenarioError>;

pub type ScenarioFuture<'a> = Pin<Box<dyn Future<Output = ScenarioResult> + Send + 'a>>;

/// What a scenario gets to work with.
pub struct ScenarioContext<'a> {
    pub adapter: &'a dyn Adapter,
    pub inspector: &'a dyn StorageInspector,
}

/// A named entry of the suite.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: for<'a> fn(&'a ScenarioContext<'a>) -> ScenarioFuture<'a>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(ScenarioError::Assertion(format!($($arg)+)));
        }
    };
}

macro_rules! ensure_eq {
    ($actual:expr, $expected:expr, $what:expr) => {{
        let (actual, expected) = (&$actual, &$expected);
        if actual != expected {
            return Err(ScenarioError::Assertion(format!(
                "{}: expected {:?}, got {:?}",
                $what, expected, actual
            )));
        }
    }};
}

/// Check that `result` failed with the given error kind.
fn expect_kind<T: fmt::Debug>(result: AdapterResult<T>, kind: &str, what: &str) -> ScenarioResult {
    match result {
        Err(err) if err.kind() == kind => Ok(()),
        Err(err) => Err(ScenarioError::Assertion(format!(
            "{what}: expected {kind}, got {} ({err})",
            err.kind()
        ))),
        Ok(value) => Err(ScenarioError::Assertion(format!(
            "{what}: expected {kind}, got Ok({value:?})"
        ))),
    }
}

fn missing_id() -> String {
    format!("missing-{}", generate_id_with_length(16))
}

/// The full suite, in execution order.
pub fn all() -> Vec<Scenario> {
    macro_rules! scenario {
        ($name:literal, $f:ident) => {
            Scenario {
                name: $name,
                run: $f,
            }
        };
    }

    vec![
        // Users
        scenario!("create user assigns an id", create_user_assigns_id),
        scenario!("create user keeps an explicit id", create_user_keeps_explicit_id),
        scenario!("lookups of unknown keys are absent", unknown_lookups_are_absent),
        scenario!("get user by email", get_user_by_email),
        scenario!("duplicate email conflicts", duplicate_email_conflicts),
        scenario!("update user", update_user),
        scenario!("update unknown user fails", update_unknown_user_fails),
        scenario!("update user to a taken email conflicts", update_user_email_conflicts),
        // Accounts
        scenario!("link account", link_account),
        scenario!("duplicate account link conflicts", duplicate_link_conflicts),
        scenario!("link account for unknown user fails", link_account_unknown_user),
        scenario!("unlink account", unlink_account),
        // Sessions
        scenario!("create session and join user", create_session_and_join),
        scenario!("session join reflects user updates", session_join_reflects_user_update),
        scenario!("update session", update_session),
        scenario!("move session to another user", update_session_moves_owner),
        scenario!("update session ownership checks", update_session_unknown_owner),
        scenario!("delete session", delete_session),
        scenario!("create session for unknown user fails", create_session_unknown_user),
        scenario!("duplicate session token conflicts", duplicate_session_token),
        // Verification tokens
        scenario!("create verification token", create_verification_token),
        scenario!("verification token is used once", use_verification_token_once),
        scenario!(
            "concurrent verification token use",
            use_verification_token_concurrently
        ),
        scenario!(
            "verification token needs both key parts",
            use_verification_token_wrong_token
        ),
        // Cross-entity
        scenario!("delete user cascades", delete_user_cascades),
        scenario!("email sign-up lifecycle", email_lifecycle),
        scenario!("invalid input is rejected", invalid_input_rejected),
    ]
}

// ─── Users ───────────────────────────────────────────────────────

fn create_user_assigns_id<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let input = generate_user();
        let user = cx.adapter.create_user(input.clone()).await?;
        ensure!(!user.id.is_empty(), "created user has an empty id");
        ensure_eq!(user.email, input.email, "email");
        ensure_eq!(user.name, input.name, "name");
        ensure_eq!(user.image, input.image, "image");

        ensure_eq!(cx.adapter.get_user(&user.id).await?, Some(user.clone()), "get_user");
        ensure_eq!(cx.inspector.user(&user.id).await?, Some(user), "stored user");
        Ok(())
    })
}

fn create_user_keeps_explicit_id<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let id = generate_id_with_length(24);
        let user = cx
            .adapter
            .create_user(generate_user().with_id(id.clone()))
            .await?;
        ensure_eq!(user.id, id, "explicit id");

        let again = cx.adapter.create_user(generate_user().with_id(id.clone())).await;
        expect_kind(again, "conflict", "reusing an explicit id")?;
        ensure_eq!(cx.inspector.user(&id).await?, Some(user), "stored user");
        Ok(())
    })
}

fn unknown_lookups_are_absent<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let id = missing_id();
        let key = ProviderAccountKey::new("github", &id);

        ensure!(cx.adapter.get_user(&id).await?.is_none(), "get_user");
        ensure!(
            cx.adapter
                .get_user_by_email(&format!("{id}@example.com"))
                .await?
                .is_none(),
            "get_user_by_email"
        );
        ensure!(cx.adapter.get_user_by_account(&key).await?.is_none(), "get_user_by_account");
        ensure!(cx.adapter.get_account(&key).await?.is_none(), "get_account");
        ensure!(cx.adapter.get_session_and_user(&id).await?.is_none(), "get_session_and_user");
        ensure!(
            cx.adapter
                .use_verification_token(&VerificationKey::new(&id, &id))
                .await?
                .is_none(),
            "use_verification_token"
        );
        Ok(())
    })
}

fn get_user_by_email<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        cx.adapter.create_user(generate_user()).await?;

        let found = cx.adapter.get_user_by_email(&user.email).await?;
        ensure_eq!(found, Some(user), "get_user_by_email");
        Ok(())
    })
}

fn duplicate_email_conflicts<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let first = cx.adapter.create_user(generate_user()).await?;
        let second = cx
            .adapter
            .create_user(NewUser::new(first.email.clone()).with_name("Impostor"))
            .await;
        expect_kind(second, "conflict", "second user with the same email")?;

        let found = cx.adapter.get_user_by_email(&first.email).await?;
        ensure_eq!(found, Some(first), "owner of the email");
        Ok(())
    })
}

fn update_user<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let verified_at = Utc::now();

        let updated = cx
            .adapter
            .update_user(
                UserUpdate::new(&user.id)
                    .name(Some("Renamed".to_string()))
                    .image(None)
                    .email_verified(Some(verified_at)),
            )
            .await?;
        ensure_eq!(updated.id, user.id, "id");
        ensure_eq!(updated.email, user.email, "untouched email");
        ensure_eq!(updated.name.as_deref(), Some("Renamed"), "name");
        ensure_eq!(updated.image, None::<String>, "cleared image");
        ensure_eq!(updated.email_verified, Some(verified_at), "emailVerified");

        ensure_eq!(cx.adapter.get_user(&user.id).await?, Some(updated.clone()), "get_user");
        ensure_eq!(cx.inspector.user(&user.id).await?, Some(updated), "stored user");
        Ok(())
    })
}

fn update_unknown_user_fails<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let id = missing_id();
        let result = cx
            .adapter
            .update_user(UserUpdate::new(&id).name(Some("Ghost".to_string())))
            .await;
        expect_kind(result, "precondition_failed", "update of unknown user")?;
        ensure!(cx.inspector.user(&id).await?.is_none(), "update created a user");
        Ok(())
    })
}

fn update_user_email_conflicts<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let alice = cx.adapter.create_user(generate_user()).await?;
        let bob = cx.adapter.create_user(generate_user()).await?;

        let result = cx
            .adapter
            .update_user(UserUpdate::new(&bob.id).email(alice.email.clone()))
            .await;
        expect_kind(result, "conflict", "taking another user's email")?;
        ensure_eq!(cx.inspector.user(&bob.id).await?, Some(bob), "unchanged user");
        Ok(())
    })
}

// ─── Accounts ────────────────────────────────────────────────────

fn link_account<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let account = generate_account(&user.id);
        let key = account.key();

        let linked = cx.adapter.link_account(account.clone()).await?;
        ensure_eq!(linked, account, "linked account");
        ensure_eq!(cx.adapter.get_account(&key).await?, Some(account.clone()), "get_account");
        ensure_eq!(
            cx.adapter.get_user_by_account(&key).await?,
            Some(user),
            "get_user_by_account"
        );
        ensure_eq!(cx.inspector.account(&key).await?, Some(account), "stored account");
        Ok(())
    })
}

fn duplicate_link_conflicts<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let first = cx.adapter.create_user(generate_user()).await?;
        let second = cx.adapter.create_user(generate_user()).await?;
        let account = generate_account(&first.id);
        let key = account.key();
        cx.adapter.link_account(account.clone()).await?;

        let mut stolen = generate_account(&second.id);
        stolen.provider_account_id = account.provider_account_id.clone();
        let result = cx.adapter.link_account(stolen).await;
        expect_kind(result, "conflict", "linking the same provider account twice")?;

        ensure_eq!(
            cx.adapter.get_user_by_account(&key).await?,
            Some(first),
            "owner after conflict"
        );
        ensure_eq!(cx.inspector.account(&key).await?, Some(account), "stored account");
        Ok(())
    })
}

fn link_account_unknown_user<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let account = generate_account(&missing_id());
        let key = account.key();
        let result = cx.adapter.link_account(account).await;
        expect_kind(result, "precondition_failed", "linking to an unknown user")?;
        ensure!(cx.inspector.account(&key).await?.is_none(), "orphan account stored");
        Ok(())
    })
}

fn unlink_account<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let kept = cx.adapter.link_account(generate_account(&user.id)).await?;
        let removed = cx.adapter.link_account(generate_account(&user.id)).await?;

        cx.adapter.unlink_account(&removed.key()).await?;
        ensure!(
            cx.adapter.get_account(&removed.key()).await?.is_none(),
            "get_account after unlink"
        );
        ensure!(
            cx.adapter.get_user_by_account(&removed.key()).await?.is_none(),
            "get_user_by_account after unlink"
        );
        ensure!(
            cx.inspector.account(&removed.key()).await?.is_none(),
            "stored account after unlink"
        );
        ensure_eq!(cx.inspector.account(&kept.key()).await?, Some(kept), "sibling account");

        // Unlinking again is a no-op.
        cx.adapter.unlink_account(&removed.key()).await?;
        ensure_eq!(cx.inspector.user(&user.id).await?, Some(user), "owner survives unlink");
        Ok(())
    })
}

// ─── Sessions ────────────────────────────────────────────────────

fn create_session_and_join<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let session = generate_session(&user.id);

        let created = cx.adapter.create_session(session.clone()).await?;
        ensure_eq!(created, session, "created session");
        ensure_eq!(
            cx.adapter.get_session_and_user(&session.session_token).await?,
            Some(SessionAndUser {
                session: session.clone(),
                user,
            }),
            "get_session_and_user"
        );
        ensure_eq!(
            cx.inspector.session(&session.session_token).await?,
            Some(session),
            "stored session"
        );
        Ok(())
    })
}

fn session_join_reflects_user_update<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&user.id)).await?;
        // Prime any read path before the update.
        cx.adapter.get_session_and_user(&session.session_token).await?;

        let updated = cx
            .adapter
            .update_user(UserUpdate::new(&user.id).name(Some("After Update".to_string())))
            .await?;
        let joined = cx.adapter.get_session_and_user(&session.session_token).await?;
        ensure_eq!(
            joined.map(|pair| pair.user),
            Some(updated),
            "joined user after update"
        );
        Ok(())
    })
}

fn update_session<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&user.id)).await?;
        let expires = session.expires + TimeDelta::days(7);

        let updated = cx
            .adapter
            .update_session(SessionUpdate::new(&session.session_token).expires(expires))
            .await?;
        let Some(updated) = updated else {
            return Err(ScenarioError::Assertion(
                "update_session returned nothing for a live session".to_string(),
            ));
        };
        ensure_eq!(updated.expires, expires, "expires");
        ensure_eq!(updated.user_id, user.id, "userId");
        ensure_eq!(
            cx.inspector.session(&session.session_token).await?,
            Some(updated),
            "stored session"
        );

        let gone = cx
            .adapter
            .update_session(SessionUpdate::new(missing_id()).expires(expires))
            .await?;
        ensure!(gone.is_none(), "update of unknown session returned {gone:?}");
        Ok(())
    })
}

fn update_session_moves_owner<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let from = cx.adapter.create_user(generate_user()).await?;
        let to = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&from.id)).await?;
        let token = session.session_token.clone();

        let moved = cx
            .adapter
            .update_session(SessionUpdate::new(&token).user_id(&to.id))
            .await?;
        let Some(moved) = moved else {
            return Err(ScenarioError::Assertion(
                "update_session returned nothing for a live session".to_string(),
            ));
        };
        ensure_eq!(moved.user_id, to.id, "userId");
        ensure_eq!(moved.expires, session.expires, "expires");
        ensure_eq!(cx.inspector.session(&token).await?, Some(moved.clone()), "stored session");
        ensure_eq!(
            cx.adapter.get_session_and_user(&token).await?,
            Some(SessionAndUser {
                session: moved,
                user: to.clone(),
            }),
            "joined session"
        );

        // Only the new owner's cascade takes the session with it.
        cx.adapter.delete_user(&from.id).await?;
        ensure!(
            cx.inspector.session(&token).await?.is_some(),
            "session removed with its previous owner"
        );
        cx.adapter.delete_user(&to.id).await?;
        ensure!(
            cx.inspector.session(&token).await?.is_none(),
            "session outlived its owner"
        );
        Ok(())
    })
}

fn update_session_unknown_owner<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        // An unknown session is absent whatever the update carries.
        let gone = cx
            .adapter
            .update_session(SessionUpdate::new(missing_id()).user_id(missing_id()))
            .await?;
        ensure!(gone.is_none(), "update of unknown session returned {gone:?}");

        let user = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&user.id)).await?;
        let result = cx
            .adapter
            .update_session(SessionUpdate::new(&session.session_token).user_id(missing_id()))
            .await;
        expect_kind(result, "precondition_failed", "session moved to an unknown user")?;
        ensure_eq!(
            cx.inspector.session(&session.session_token).await?,
            Some(session),
            "session after rejected move"
        );
        Ok(())
    })
}

fn delete_session<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&user.id)).await?;

        cx.adapter.delete_session(&session.session_token).await?;
        ensure!(
            cx.adapter.get_session_and_user(&session.session_token).await?.is_none(),
            "get_session_and_user after delete"
        );
        ensure!(
            cx.inspector.session(&session.session_token).await?.is_none(),
            "stored session after delete"
        );

        // Deleting again is a no-op.
        cx.adapter.delete_session(&session.session_token).await?;
        ensure_eq!(cx.inspector.user(&user.id).await?, Some(user), "owner survives");
        Ok(())
    })
}

fn create_session_unknown_user<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let session = generate_session(&missing_id());
        let result = cx.adapter.create_session(session.clone()).await;
        expect_kind(result, "precondition_failed", "session for unknown user")?;
        ensure!(
            cx.inspector.session(&session.session_token).await?.is_none(),
            "orphan session stored"
        );
        Ok(())
    })
}

fn duplicate_session_token<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let other = cx.adapter.create_user(generate_user()).await?;
        let session = cx.adapter.create_session(generate_session(&user.id)).await?;

        let mut clash = generate_session(&other.id);
        clash.session_token = session.session_token.clone();
        let result = cx.adapter.create_session(clash).await;
        expect_kind(result, "conflict", "reusing a session token")?;
        ensure_eq!(
            cx.inspector.session(&session.session_token).await?,
            Some(session),
            "original session"
        );
        Ok(())
    })
}

// ─── Verification tokens ─────────────────────────────────────────

fn create_verification_token<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let token = generate_verification_token();
        let created = cx.adapter.create_verification_token(token.clone()).await?;
        ensure_eq!(created, token, "created token");
        ensure_eq!(
            cx.inspector.verification_token(&token.key()).await?,
            Some(token.clone()),
            "stored token"
        );

        let result = cx.adapter.create_verification_token(token).await;
        expect_kind(result, "conflict", "reusing a verification key")
    })
}

fn use_verification_token_once<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let token = cx
            .adapter
            .create_verification_token(generate_verification_token())
            .await?;
        let key = token.key();

        let first = cx.adapter.use_verification_token(&key).await?;
        ensure_eq!(first, Some(token), "first use");
        let second = cx.adapter.use_verification_token(&key).await?;
        ensure!(second.is_none(), "second use returned {second:?}");
        ensure!(
            cx.inspector.verification_token(&key).await?.is_none(),
            "token still stored after use"
        );
        Ok(())
    })
}

fn use_verification_token_concurrently<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let token = cx
            .adapter
            .create_verification_token(generate_verification_token())
            .await?;
        let key = token.key();

        let (a, b, c) = tokio::join!(
            cx.adapter.use_verification_token(&key),
            cx.adapter.use_verification_token(&key),
            cx.adapter.use_verification_token(&key),
        );
        let winners = [a?, b?, c?].into_iter().flatten().collect::<Vec<_>>();
        ensure_eq!(winners, vec![token], "tokens handed out");
        Ok(())
    })
}

fn use_verification_token_wrong_token<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let token = cx
            .adapter
            .create_verification_token(generate_verification_token())
            .await?;

        let wrong = VerificationKey::new(&token.identifier, missing_id());
        ensure!(
            cx.adapter.use_verification_token(&wrong).await?.is_none(),
            "token matched on identifier alone"
        );
        ensure_eq!(
            cx.inspector.verification_token(&token.key()).await?,
            Some(token),
            "token after mismatched use"
        );
        Ok(())
    })
}

// ─── Cross-entity ────────────────────────────────────────────────

fn delete_user_cascades<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(generate_user()).await?;
        let bystander = cx.adapter.create_user(generate_user()).await?;

        let accounts = [
            cx.adapter.link_account(generate_account(&user.id)).await?,
            cx.adapter.link_account(generate_account(&user.id)).await?,
        ];
        let sessions = [
            cx.adapter.create_session(generate_session(&user.id)).await?,
            cx.adapter.create_session(generate_session(&user.id)).await?,
        ];
        let kept_account = cx.adapter.link_account(generate_account(&bystander.id)).await?;
        let kept_session = cx.adapter.create_session(generate_session(&bystander.id)).await?;

        cx.adapter.delete_user(&user.id).await?;

        ensure!(cx.adapter.get_user(&user.id).await?.is_none(), "get_user after delete");
        ensure!(
            cx.adapter.get_user_by_email(&user.email).await?.is_none(),
            "get_user_by_email after delete"
        );
        ensure!(cx.inspector.user(&user.id).await?.is_none(), "stored user after delete");
        for account in &accounts {
            let key = account.key();
            ensure!(cx.adapter.get_account(&key).await?.is_none(), "account {key} survived");
            ensure!(
                cx.adapter.get_user_by_account(&key).await?.is_none(),
                "account {key} still resolves"
            );
            ensure!(cx.inspector.account(&key).await?.is_none(), "stored account {key} survived");
        }
        for session in &sessions {
            ensure!(
                cx.adapter.get_session_and_user(&session.session_token).await?.is_none(),
                "session survived"
            );
            ensure!(
                cx.inspector.session(&session.session_token).await?.is_none(),
                "stored session survived"
            );
        }

        ensure_eq!(cx.inspector.user(&bystander.id).await?, Some(bystander), "bystander");
        ensure_eq!(
            cx.inspector.account(&kept_account.key()).await?,
            Some(kept_account),
            "bystander account"
        );
        ensure_eq!(
            cx.inspector.session(&kept_session.session_token).await?,
            Some(kept_session),
            "bystander session"
        );

        // Deleting again is a no-op.
        cx.adapter.delete_user(&user.id).await?;
        Ok(())
    })
}

fn email_lifecycle<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let user = cx.adapter.create_user(NewUser::new("a@x.com")).await?;
        ensure!(!user.id.is_empty(), "no id assigned");
        ensure_eq!(
            cx.adapter.get_user_by_email("a@x.com").await?,
            Some(user.clone()),
            "get_user_by_email"
        );
        cx.adapter.delete_user(&user.id).await?;
        ensure!(cx.adapter.get_user(&user.id).await?.is_none(), "get_user after delete");
        Ok(())
    })
}

fn invalid_input_rejected<'a>(cx: &'a ScenarioContext<'a>) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_kind(
            cx.adapter.create_user(NewUser::new("not-an-email")).await,
            "validation",
            "malformed email",
        )?;
        ensure!(
            cx.adapter.get_user_by_email("not-an-email").await?.is_none(),
            "malformed user stored"
        );

        let user = cx.adapter.create_user(generate_user()).await?;
        expect_kind(
            cx.adapter.update_user(UserUpdate::new(&user.id)).await,
            "validation",
            "empty user update",
        )?;

        let mut account = generate_account(&user.id);
        account.provider_account_id = String::new();
        expect_kind(cx.adapter.link_account(account).await, "validation", "blank account id")?;

        let mut session = generate_session(&user.id);
        session.session_token = String::new();
        expect_kind(cx.adapter.create_session(session).await, "validation", "blank session token")?;

        expect_kind(
            cx.adapter.update_session(SessionUpdate::new("some-token")).await,
            "validation",
            "empty session update",
        )?;

        let mut token = generate_verification_token();
        token.token = String::new();
        expect_kind(
            cx.adapter.create_verification_token(token).await,
            "validation",
            "blank verification token",
        )?;

        let token = generate_verification_token();
        expect_kind(
            cx.adapter
                .use_verification_token(&VerificationKey::new(&token.identifier, ""))
                .await,
            "validation",
            "blank verification key",
        )
    })
}
