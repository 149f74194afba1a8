use sqlx::sqlite::SqlitePool;

use super::page::{Page, PageRequest};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub(crate) fn from_flag(is_admin: i32) -> Self {
        if is_admin != 0 {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    fn as_flag(self) -> i32 {
        match self {
            UserRole::User => 0,
            UserRole::Admin => 1,
        }
    }
}

/// A stored account. `uuid` is the public identifier; `id` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub address: String,
    pub phone_number: String,
    pub is_marketing: bool,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Fields for inserting a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub address: String,
    pub phone_number: String,
    pub is_marketing: bool,
    pub role: UserRole,
}

impl NewUser {
    pub fn new(first_name: &str, last_name: &str, email: &str, password_hash: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            avatar: None,
            address: String::new(),
            phone_number: String::new(),
            is_marketing: false,
            role: UserRole::User,
        }
    }

    pub fn contact(mut self, address: &str, phone_number: &str) -> Self {
        self.address = address.to_string();
        self.phone_number = phone_number.to_string();
        self
    }

    pub fn avatar(mut self, avatar: Option<&str>) -> Self {
        self.avatar = avatar.map(str::to_string);
        self
    }

    pub fn marketing(mut self, is_marketing: bool) -> Self {
        self.is_marketing = is_marketing;
        self
    }

    pub fn admin(mut self) -> Self {
        self.role = UserRole::Admin;
        self
    }
}

/// Replacement profile for an existing user. The role is never changed here.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub address: String,
    pub phone_number: String,
    pub is_marketing: bool,
}

/// Substring filters for the customer listing. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Prefix of the `YYYY-MM-DD HH:MM:SS` creation time, e.g. `2024-01-15`.
    pub created_at: Option<String>,
    pub marketing: Option<bool>,
}

/// Sortable columns of the customer listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    #[default]
    CreatedAt,
    FirstName,
    LastName,
    Email,
}

impl UserSort {
    /// Parse a column name, `None` for anything not sortable.
    pub fn parse(column: &str) -> Option<Self> {
        match column {
            "created_at" => Some(Self::CreatedAt),
            "first_name" => Some(Self::FirstName),
            "last_name" => Some(Self::LastName),
            "email" => Some(Self::Email),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    avatar: Option<String>,
    address: String,
    phone_number: String,
    is_admin: i32,
    is_marketing: i32,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password,
            avatar: row.avatar,
            address: row.address,
            phone_number: row.phone_number,
            is_marketing: row.is_marketing != 0,
            role: UserRole::from_flag(row.is_admin),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with a fresh UUID and return the stored record.
    pub async fn create(&self, user: &NewUser) -> Result<User, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO users (uuid, first_name, last_name, email, password, avatar, address, phone_number, is_admin, is_marketing)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .bind(&user.address)
        .bind(&user.phone_number)
        .bind(user.role.as_flag())
        .bind(user.is_marketing)
        .execute(&self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, first_name, last_name, email, password, avatar, address, phone_number, is_admin, is_marketing, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, first_name, last_name, email, password, avatar, address, phone_number, is_admin, is_marketing, created_at, updated_at
             FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, first_name, last_name, email, password, avatar, address, phone_number, is_admin, is_marketing, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Check whether an email is already registered.
    pub async fn is_email_taken(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Overwrite a user's profile and password hash.
    /// Returns the updated user, or `None` if no user has this ID.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, email = ?, password = ?, avatar = ?, address = ?, phone_number = ?, is_marketing = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(&update.password_hash)
        .bind(&update.avatar)
        .bind(&update.address)
        .bind(&update.phone_number)
        .bind(update.is_marketing)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// List non-admin users matching `filter`, one page at a time.
    /// Ties on the sort column are broken by ID in the same direction.
    pub async fn list_customers(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        descending: bool,
        page: PageRequest,
    ) -> Result<Page<User>, sqlx::Error> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users
             WHERE is_admin = 0
               AND (?1 IS NULL OR first_name LIKE '%' || ?1 || '%')
               AND (?2 IS NULL OR email LIKE '%' || ?2 || '%')
               AND (?3 IS NULL OR phone_number LIKE '%' || ?3 || '%')
               AND (?4 IS NULL OR address LIKE '%' || ?4 || '%')
               AND (?5 IS NULL OR created_at LIKE ?5 || '%')
               AND (?6 IS NULL OR is_marketing = ?6)",
        )
        .bind(&filter.first_name)
        .bind(&filter.email)
        .bind(&filter.phone)
        .bind(&filter.address)
        .bind(&filter.created_at)
        .bind(filter.marketing)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, uuid, first_name, last_name, email, password, avatar, address, phone_number, is_admin, is_marketing, created_at, updated_at
             FROM users
             WHERE is_admin = 0
               AND (?1 IS NULL OR first_name LIKE '%' || ?1 || '%')
               AND (?2 IS NULL OR email LIKE '%' || ?2 || '%')
               AND (?3 IS NULL OR phone_number LIKE '%' || ?3 || '%')
               AND (?4 IS NULL OR address LIKE '%' || ?4 || '%')
               AND (?5 IS NULL OR created_at LIKE ?5 || '%')
               AND (?6 IS NULL OR is_marketing = ?6)
             ORDER BY
               CASE WHEN ?8 = 0 THEN CASE ?7 WHEN 'first_name' THEN first_name WHEN 'last_name' THEN last_name WHEN 'email' THEN email ELSE created_at END END ASC,
               CASE WHEN ?8 = 1 THEN CASE ?7 WHEN 'first_name' THEN first_name WHEN 'last_name' THEN last_name WHEN 'email' THEN email ELSE created_at END END DESC,
               CASE WHEN ?8 = 0 THEN id END ASC,
               CASE WHEN ?8 = 1 THEN id END DESC
             LIMIT ?9 OFFSET ?10",
        )
        .bind(&filter.first_name)
        .bind(&filter.email)
        .bind(&filter.phone)
        .bind(&filter.address)
        .bind(&filter.created_at)
        .bind(filter.marketing)
        .bind(sort.column())
        .bind(descending)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(User::from).collect(),
            page,
            total.0,
        ))
    }

    /// Delete a user by ID. Their tokens stay behind with no owner.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
