// Adapter configuration shared by every backend.
//
// Backends read the pieces they need: relational and document backends use
// the model names as table/collection names, all of them use the id strategy
// when `create_user` receives no id.

use serde::{Deserialize, Serialize};

/// Storage names for the four entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelNames {
    #[serde(default = "default_user_model")]
    pub user: String,
    #[serde(default = "default_account_model")]
    pub account: String,
    #[serde(default = "default_session_model")]
    pub session: String,
    #[serde(default = "default_verification_token_model")]
    pub verification_token: String,
}

fn default_user_model() -> String { "users".into() }
fn default_account_model() -> String { "accounts".into() }
fn default_session_model() -> String { "sessions".into() }
fn default_verification_token_model() -> String { "verification_tokens".into() }

impl Default for ModelNames {
    fn default() -> Self {
        Self {
            user: default_user_model(),
            account: default_account_model(),
            session: default_session_model(),
            verification_token: default_verification_token_model(),
        }
    }
}

/// How user ids are generated when the caller does not supply one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateIdStrategy {
    /// Random v4 UUID (default).
    #[default]
    Uuid,
    /// 32-character alphanumeric string.
    Random,
}

/// Top-level adapter options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOptions {
    #[serde(default)]
    pub model_names: ModelNames,

    #[serde(default)]
    pub generate_id: GenerateIdStrategy,

    /// Lifetime of a freshly created session in seconds (default: 30 days).
    #[serde(default = "default_session_max_age")]
    pub session_max_age: i64,

    /// Lifetime of a verification token in seconds (default: 24 hours).
    #[serde(default = "default_verification_token_max_age")]
    pub verification_token_max_age: i64,
}

fn default_session_max_age() -> i64 { 30 * 24 * 3600 }
fn default_verification_token_max_age() -> i64 { 24 * 3600 }

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            model_names: ModelNames::default(),
            generate_id: GenerateIdStrategy::default(),
            session_max_age: default_session_max_age(),
            verification_token_max_age: default_verification_token_max_age(),
        }
    }
}

impl AdapterOptions {
    pub fn generate_id(mut self, strategy: GenerateIdStrategy) -> Self {
        self.generate_id = strategy;
        self
    }

    pub fn model_names(mut self, names: ModelNames) -> Self {
        self.model_names = names;
        self
    }

    /// Parse options from a JSON document; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Id for a new user under the configured strategy.
    pub fn next_user_id(&self) -> String {
        crate::utils::id::generate_id(self.generate_id)
    }
}
