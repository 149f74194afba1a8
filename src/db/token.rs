//! Issued token storage.
//!
//! Every issued JWT is stored verbatim so it can be revoked server-side.
//! Records are keyed by the full token string and are never updated after
//! insertion; they leave the table only through an explicit delete.

use sqlx::sqlite::SqlitePool;

use super::user::{User, UserRole};

/// A stored token together with its owner, if the owner still exists.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    /// Owning user, `None` when the record is orphaned.
    pub user: Option<User>,
    pub token: String,
    pub label: String,
    pub expires_at: String,
    pub last_used_at: Option<String>,
    /// Reserved; nothing writes it yet.
    pub refreshed_at: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    user_id: Option<i64>,
    token: String,
    label: String,
    expires_at: String,
    last_used_at: Option<String>,
    refreshed_at: Option<String>,
    created_at: String,
    u_id: Option<i64>,
    u_uuid: Option<String>,
    u_first_name: Option<String>,
    u_last_name: Option<String>,
    u_email: Option<String>,
    u_password: Option<String>,
    u_avatar: Option<String>,
    u_address: Option<String>,
    u_phone_number: Option<String>,
    u_is_admin: Option<i32>,
    u_is_marketing: Option<i32>,
    u_created_at: Option<String>,
    u_updated_at: Option<String>,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        let user = match (
            row.u_id,
            row.u_uuid,
            row.u_first_name,
            row.u_last_name,
            row.u_email,
            row.u_password,
            row.u_address,
            row.u_phone_number,
            row.u_is_admin,
            row.u_is_marketing,
            row.u_created_at,
            row.u_updated_at,
        ) {
            (
                Some(id),
                Some(uuid),
                Some(first_name),
                Some(last_name),
                Some(email),
                Some(password_hash),
                Some(address),
                Some(phone_number),
                Some(is_admin),
                Some(is_marketing),
                Some(created_at),
                Some(updated_at),
            ) => Some(User {
                id,
                uuid,
                first_name,
                last_name,
                email,
                password_hash,
                avatar: row.u_avatar,
                address,
                phone_number,
                is_marketing: is_marketing != 0,
                role: UserRole::from_flag(is_admin),
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            user_id: row.user_id,
            user,
            token: row.token,
            label: row.label,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            refreshed_at: row.refreshed_at,
            created_at: row.created_at,
        }
    }
}

/// Store for issued tokens.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a token record for `user`. Timestamps are Unix seconds.
    pub async fn create(
        &self,
        user: &User,
        token: &str,
        label: &str,
        expires_at: u64,
        last_used_at: u64,
    ) -> Result<TokenRecord, sqlx::Error> {
        sqlx::query(
            "INSERT INTO jwt_tokens (user_id, token, label, expires_at, last_used_at, refreshed_at)
             VALUES (?, ?, ?, datetime(?, 'unixepoch'), datetime(?, 'unixepoch'), NULL)",
        )
        .bind(user.id)
        .bind(token)
        .bind(label)
        .bind(expires_at as i64)
        .bind(last_used_at as i64)
        .execute(&self.pool)
        .await?;

        self.find_by_token(token, Some(label))
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Look up a record by its exact token string, optionally requiring a label.
    pub async fn find_by_token(
        &self,
        token: &str,
        label: Option<&str>,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.token, t.label, t.expires_at, t.last_used_at, t.refreshed_at, t.created_at,
                    u.id AS u_id, u.uuid AS u_uuid, u.first_name AS u_first_name, u.last_name AS u_last_name,
                    u.email AS u_email, u.password AS u_password, u.avatar AS u_avatar, u.address AS u_address,
                    u.phone_number AS u_phone_number, u.is_admin AS u_is_admin, u.is_marketing AS u_is_marketing,
                    u.created_at AS u_created_at, u.updated_at AS u_updated_at
             FROM jwt_tokens t
             LEFT JOIN users u ON u.id = t.user_id
             WHERE t.token = ?1 AND (?2 IS NULL OR t.label = ?2)",
        )
        .bind(token)
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TokenRecord::from))
    }

    /// Delete a record. Returns false if it was already gone.
    pub async fn delete(&self, record: &TokenRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jwt_tokens WHERE id = ?")
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all records owned by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<TokenRecord>, sqlx::Error> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.token, t.label, t.expires_at, t.last_used_at, t.refreshed_at, t.created_at,
                    u.id AS u_id, u.uuid AS u_uuid, u.first_name AS u_first_name, u.last_name AS u_last_name,
                    u.email AS u_email, u.password AS u_password, u.avatar AS u_avatar, u.address AS u_address,
                    u.phone_number AS u_phone_number, u.is_admin AS u_is_admin, u.is_marketing AS u_is_marketing,
                    u.created_at AS u_created_at, u.updated_at AS u_updated_at
             FROM jwt_tokens t
             LEFT JOIN users u ON u.id = t.user_id
             WHERE t.user_id = ?
             ORDER BY t.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }
}
