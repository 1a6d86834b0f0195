mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use token::{RefreshTokenRecord, RefreshTokenStore};
pub use user::{NewUser, User, UserRole, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT UNIQUE COLLATE NOCASE,
                    phone TEXT UNIQUE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'citizen',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE INDEX idx_users_phone ON users(phone)",
                // Revoked rows are kept as tombstones; the app never deletes them
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token TEXT UNIQUE NOT NULL,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    expires_at INTEGER NOT NULL,
                    revoked INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citizen<'a>(email: &'a str, phone: &'a str) -> NewUser<'a> {
        NewUser {
            name: "Asha",
            email: Some(email),
            phone: Some(phone),
            password_hash: "hash",
            role: UserRole::Citizen,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let user = db
            .users()
            .create(&citizen("asha@example.org", "+911234"))
            .await
            .unwrap();

        let fetched = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Asha");
        assert_eq!(fetched.email.as_deref(), Some("asha@example.org"));
        assert_eq!(fetched.role, UserRole::Citizen);
        assert!(fetched.is_active);

        let by_email = db
            .users()
            .get_by_contact(Some("ASHA@example.org"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_phone = db
            .users()
            .get_by_contact(None, Some("+911234"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_phone.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_contact_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create(&citizen("asha@example.org", "+911234"))
            .await
            .unwrap();
        let result = db
            .users()
            .create(&citizen("asha@example.org", "+915678"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deactivate_and_set_role() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(&citizen("asha@example.org", "+911234"))
            .await
            .unwrap();

        assert!(db.users().set_active(&user.id, false).await.unwrap());
        assert!(db.users().set_role(&user.id, UserRole::Admin).await.unwrap());

        let fetched = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert_eq!(fetched.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_exact_lookups_match_one_column() {
        let db = Database::open(":memory:").await.unwrap();
        let asha = db
            .users()
            .create(&citizen("asha@example.org", "+911234"))
            .await
            .unwrap();
        let ravi = db
            .users()
            .create(&citizen("ravi@example.org", "+915678"))
            .await
            .unwrap();

        let by_email = db.users().get_by_email("ASHA@example.org").await.unwrap();
        assert_eq!(by_email.unwrap().id, asha.id);
        let by_phone = db.users().get_by_phone("+915678").await.unwrap();
        assert_eq!(by_phone.unwrap().id, ravi.id);

        // A phone is never matched against the email column and vice versa
        assert!(db.users().get_by_email("+911234").await.unwrap().is_none());
        assert!(db.users().get_by_phone("asha@example.org").await.unwrap().is_none());
    }
}
