// Key layout for the key-value adapter.
//
// Every key is `base_key_prefix + entity prefix + natural key`. Composite keys
// join their parts with ':'.

use serde::{Deserialize, Serialize};

use auth_adapter_core::options::GenerateIdStrategy;
use auth_adapter_core::{ProviderAccountKey, VerificationKey};

/// Key prefixes and id strategy for [`KeyValueAdapter`](crate::KeyValueAdapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueAdapterOptions {
    /// Prepended to every key, e.g. `"app:"`.
    #[serde(default)]
    pub base_key_prefix: String,

    #[serde(default = "default_user_key_prefix")]
    pub user_key_prefix: String,

    #[serde(default = "default_user_by_email_key_prefix")]
    pub user_by_email_key_prefix: String,

    #[serde(default = "default_account_key_prefix")]
    pub account_key_prefix: String,

    #[serde(default = "default_account_by_user_id_prefix")]
    pub account_by_user_id_prefix: String,

    #[serde(default = "default_session_key_prefix")]
    pub session_key_prefix: String,

    #[serde(default = "default_session_by_user_id_key_prefix")]
    pub session_by_user_id_key_prefix: String,

    #[serde(default = "default_verification_token_key_prefix")]
    pub verification_token_key_prefix: String,

    #[serde(default)]
    pub generate_id: GenerateIdStrategy,
}

fn default_user_key_prefix() -> String { "user:".into() }
fn default_user_by_email_key_prefix() -> String { "user:email:".into() }
fn default_account_key_prefix() -> String { "user:account:".into() }
fn default_account_by_user_id_prefix() -> String { "user:account:by-user-id:".into() }
fn default_session_key_prefix() -> String { "user:session:".into() }
fn default_session_by_user_id_key_prefix() -> String { "user:session:by-user-id:".into() }
fn default_verification_token_key_prefix() -> String { "user:token:".into() }

impl Default for KeyValueAdapterOptions {
    fn default() -> Self {
        Self {
            base_key_prefix: String::new(),
            user_key_prefix: default_user_key_prefix(),
            user_by_email_key_prefix: default_user_by_email_key_prefix(),
            account_key_prefix: default_account_key_prefix(),
            account_by_user_id_prefix: default_account_by_user_id_prefix(),
            session_key_prefix: default_session_key_prefix(),
            session_by_user_id_key_prefix: default_session_by_user_id_key_prefix(),
            verification_token_key_prefix: default_verification_token_key_prefix(),
            generate_id: GenerateIdStrategy::default(),
        }
    }
}

impl KeyValueAdapterOptions {
    pub fn base_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.base_key_prefix = prefix.into();
        self
    }

    pub fn generate_id(mut self, strategy: GenerateIdStrategy) -> Self {
        self.generate_id = strategy;
        self
    }

    /// Parse options from a JSON document; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    // ─── Key builders ────────────────────────────────────────────

    pub fn user_key(&self, id: &str) -> String {
        format!("{}{}{id}", self.base_key_prefix, self.user_key_prefix)
    }

    pub fn user_by_email_key(&self, email: &str) -> String {
        format!("{}{}{email}", self.base_key_prefix, self.user_by_email_key_prefix)
    }

    pub fn account_key(&self, key: &ProviderAccountKey) -> String {
        format!(
            "{}{}{}:{}",
            self.base_key_prefix, self.account_key_prefix, key.provider, key.provider_account_id
        )
    }

    pub fn account_by_user_id_key(&self, user_id: &str) -> String {
        format!("{}{}{user_id}", self.base_key_prefix, self.account_by_user_id_prefix)
    }

    pub fn session_key(&self, session_token: &str) -> String {
        format!("{}{}{session_token}", self.base_key_prefix, self.session_key_prefix)
    }

    pub fn session_by_user_id_key(&self, user_id: &str) -> String {
        format!("{}{}{user_id}", self.base_key_prefix, self.session_by_user_id_key_prefix)
    }

    pub fn verification_token_key(&self, key: &VerificationKey) -> String {
        format!(
            "{}{}{}:{}",
            self.base_key_prefix, self.verification_token_key_prefix, key.identifier, key.token
        )
    }
}
