//! Reference data that orders point at: statuses, payments and products.

use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderStatus {
    pub id: i64,
    pub uuid: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub uuid: String,
    /// Payment method, e.g. `credit_card` or `cash_on_delivery`.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub price: f64,
}

#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_status(&self, title: &str) -> Result<OrderStatus, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query("INSERT INTO order_statuses (uuid, title) VALUES (?, ?)")
            .bind(&uuid)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(OrderStatus {
            id: result.last_insert_rowid(),
            uuid,
            title: title.to_string(),
        })
    }

    pub async fn create_payment(&self, kind: &str) -> Result<Payment, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query("INSERT INTO payments (uuid, type) VALUES (?, ?)")
            .bind(&uuid)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(Payment {
            id: result.last_insert_rowid(),
            uuid,
            kind: kind.to_string(),
        })
    }

    pub async fn create_product(&self, title: &str, price: f64) -> Result<Product, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query("INSERT INTO products (uuid, title, price) VALUES (?, ?, ?)")
            .bind(&uuid)
            .bind(title)
            .bind(price)
            .execute(&self.pool)
            .await?;
        Ok(Product {
            id: result.last_insert_rowid(),
            uuid,
            title: title.to_string(),
            price,
        })
    }

    pub async fn status_by_uuid(&self, uuid: &str) -> Result<Option<OrderStatus>, sqlx::Error> {
        sqlx::query_as("SELECT id, uuid, title FROM order_statuses WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn payment_by_uuid(&self, uuid: &str) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as("SELECT id, uuid, type AS kind FROM payments WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
    }

    /// Fetch every product whose UUID is in `uuids`. Unknown UUIDs are skipped.
    pub async fn products_by_uuids(&self, uuids: &[String]) -> Result<Vec<Product>, sqlx::Error> {
        let uuids = serde_json::to_string(uuids).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query_as(
            "SELECT id, uuid, title, price FROM products
             WHERE uuid IN (SELECT value FROM json_each(?))",
        )
        .bind(uuids)
        .fetch_all(&self.pool)
        .await
    }
}
