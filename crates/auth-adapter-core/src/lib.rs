// auth-adapter-core — the persistence contract for auth storage backends.
//
// Defines the four records (user, account, session, verification token), the
// `Adapter` trait every backend implements, the error taxonomy, and the input
// validation all backends share.

pub mod db;
pub mod env;
pub mod error;
pub mod options;
pub mod utils;

pub use db::adapter::Adapter;
pub use db::models::{
    Account, AccountType, NewUser, ProviderAccountKey, Session, SessionAndUser, SessionUpdate,
    User, UserUpdate, VerificationKey, VerificationToken,
};
pub use env::init_logging;
pub use error::{AdapterError, AdapterResult, BackendError, BoxError, Entity, ValidationError};
pub use options::{AdapterOptions, GenerateIdStrategy, ModelNames};
