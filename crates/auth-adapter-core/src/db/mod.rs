pub mod adapter;
pub mod models;
pub mod validation;

pub use adapter::Adapter;
pub use models::{
    Account, AccountType, NewUser, ProviderAccountKey, Session, SessionAndUser, SessionUpdate,
    User, UserUpdate, VerificationKey, VerificationToken,
};
