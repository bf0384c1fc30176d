use sqlx::{sqlite::SqliteRow, Row};

use fixquote_core::domain::user::{User, UserId};

use super::{format_timestamp, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, created_at
             FROM users
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, created_at
             FROM users
             WHERE email = ?",
        )
        .bind(email.trim().to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn insert(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(user.email.trim().to_ascii_lowercase())
        .bind(user.phone.as_deref())
        .bind(format_timestamp(user.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use fixquote_core::domain::user::UserId;

    use super::SqlUserRepository;
    use crate::repositories::fixtures::{setup_pool, user};
    use crate::repositories::{RepositoryError, UserRepository};

    #[tokio::test]
    async fn sql_user_repo_round_trip_by_id_and_email() {
        let pool = setup_pool().await;
        let repo = SqlUserRepository::new(pool.clone());
        let dana = user("u-1", "dana@example.com");

        repo.insert(dana.clone()).await.expect("insert");

        assert_eq!(repo.find_by_id(&UserId("u-1".into())).await.expect("by id"), Some(dana.clone()));
        assert_eq!(repo.find_by_email("Dana@Example.com ").await.expect("by email"), Some(dana));
        assert_eq!(repo.find_by_id(&UserId("missing".into())).await.expect("missing"), None);
        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let pool = setup_pool().await;
        let repo = SqlUserRepository::new(pool.clone());

        repo.insert(user("u-1", "dana@example.com")).await.expect("first insert");
        let error = repo.insert(user("u-2", "dana@example.com")).await.expect_err("duplicate");

        assert!(matches!(error, RepositoryError::Conflict(_)));
        pool.close().await;
    }
}
