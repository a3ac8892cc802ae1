// auth-adapter-sqlx — relational adapter over `sqlx::Any`.
//
// One table per entity, created by `SqlxAdapter::migrate`. Works with SQLite
// and Postgres through a single runtime-polymorphic pool.

pub mod adapter;
pub mod rows;
pub mod schema;

pub use adapter::SqlxAdapter;
pub use schema::Tables;
