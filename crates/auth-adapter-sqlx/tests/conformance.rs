// Runs the shared conformance suite against the SQLx adapter on SQLite.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::AnyPool;

use auth_adapter_core::{
    Account, ProviderAccountKey, Session, User, VerificationKey, VerificationToken,
};
use auth_adapter_sqlx::rows::{
    self, ACCOUNT_COLUMNS, SESSION_COLUMNS, USER_COLUMNS, VERIFICATION_TOKEN_COLUMNS,
};
use auth_adapter_sqlx::{SqlxAdapter, Tables};
use auth_adapter_test_utils::{ConformanceRunner, InspectorResult, StorageInspector};

/// Reads rows with its own queries on the shared pool.
struct SqlInspector {
    adapter: SqlxAdapter,
}

impl SqlInspector {
    fn pool(&self) -> &AnyPool {
        self.adapter.pool()
    }

    fn tables(&self) -> &Tables {
        self.adapter.tables()
    }

    async fn truncate(&self) -> InspectorResult<()> {
        for statement in self.tables().truncate_statements() {
            sqlx::query(&statement).execute(self.pool()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageInspector for SqlInspector {
    async fn connect(&self) -> InspectorResult<()> {
        self.adapter.migrate().await?;
        self.truncate().await
    }

    async fn disconnect(&self) -> InspectorResult<()> {
        self.truncate().await
    }

    async fn user(&self, id: &str) -> InspectorResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE id = $1", self.tables().users);
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.pool()).await?;
        row.as_ref().map(rows::user_from_row).transpose()
    }

    async fn account(&self, key: &ProviderAccountKey) -> InspectorResult<Option<Account>> {
        let sql = format!(
            r#"SELECT {ACCOUNT_COLUMNS} FROM {} WHERE provider = $1 AND "providerAccountId" = $2"#,
            self.tables().accounts
        );
        let row = sqlx::query(&sql)
            .bind(key.provider.as_str())
            .bind(key.provider_account_id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::account_from_row).transpose()
    }

    async fn session(&self, session_token: &str) -> InspectorResult<Option<Session>> {
        let sql = format!(
            r#"SELECT {SESSION_COLUMNS} FROM {} WHERE "sessionToken" = $1"#,
            self.tables().sessions
        );
        let row = sqlx::query(&sql)
            .bind(session_token)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::session_from_row).transpose()
    }

    async fn verification_token(
        &self,
        key: &VerificationKey,
    ) -> InspectorResult<Option<VerificationToken>> {
        let sql = format!(
            "SELECT {VERIFICATION_TOKEN_COLUMNS} FROM {} WHERE identifier = $1 AND token = $2",
            self.tables().verification_tokens
        );
        let row = sqlx::query(&sql)
            .bind(key.identifier.as_str())
            .bind(key.token.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::verification_token_from_row).transpose()
    }
}

#[tokio::test]
async fn sqlite_adapter_passes_conformance_suite() {
    auth_adapter_core::init_logging();
    let adapter = SqlxAdapter::connect("sqlite::memory:").await.unwrap();
    let inspector = SqlInspector {
        adapter: adapter.clone(),
    };

    let report = ConformanceRunner::new(Arc::new(adapter), Arc::new(inspector))
        .display_name("sqlx (sqlite)")
        .run()
        .await
        .unwrap();
    report.print_summary();
    report.assert_all_passed();
}
