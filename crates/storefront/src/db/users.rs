//! User, password, reset token, and OAuth identity queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use vivero_core::{Email, UserId};

use super::{PgBackend, RepositoryError};
use crate::backend::AccountBackend;
use crate::models::User;

const USER_COLUMNS: &str = "u.id, u.email, u.display_name, u.created_at";

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    email: Email,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[async_trait]
impl AccountBackend for PgBackend {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.users u WHERE u.email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(User::from))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.users u WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(
        &self,
        email: &Email,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO storefront.users AS u (email, display_name)
             VALUES ($1, $2)
             RETURNING u.id, u.email, u.display_name, u.created_at",
        )
        .bind(email)
        .bind(display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        if let Some(hash) = password_hash {
            sqlx::query(
                "INSERT INTO storefront.user_passwords (user_id, password_hash) VALUES ($1, $2)",
            )
            .bind(row.id)
            .bind(hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(User::from(row))
    }

    async fn password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, pw.password_hash
             FROM storefront.users u
             JOIN storefront.user_passwords pw ON pw.user_id = u.id
             WHERE u.email = $1"
        );
        let row = sqlx::query_as::<_, UserWithPasswordRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| (User::from(r.user), r.password_hash)))
    }

    async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.user_passwords (user_id, password_hash)
             VALUES ($1, $2)
             ON CONFLICT (user_id)
             DO UPDATE SET password_hash = EXCLUDED.password_hash, updated_at = NOW()",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn create_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.password_reset_tokens (user_id, token_hash, expires_at)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "reset token"))?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            "UPDATE storefront.password_reset_tokens
             SET used_at = $2
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(user_id)
    }

    async fn find_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM storefront.oauth_identities WHERE provider = $1 AND subject = $2",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(self.pool())
        .await?;
        Ok(user_id)
    }

    async fn link_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.oauth_identities (provider, subject, user_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (provider, subject) DO NOTHING",
        )
        .bind(provider)
        .bind(subject)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
