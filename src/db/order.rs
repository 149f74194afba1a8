//! Order storage.
//!
//! Line items and addresses are kept as JSON text. The amount and delivery
//! fee are computed once from catalog prices when an order is written and
//! are not recomputed when prices change later.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::catalog::{OrderStatus, Payment, Product};
use super::page::{Page, PageRequest};

/// Flat delivery fee charged on small orders.
const DELIVERY_FEE: f64 = 15.0;
/// Orders worth more than this ship for free.
const FREE_DELIVERY_ABOVE: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product UUID.
    pub uuid: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddress {
    pub billing: String,
    pub shipping: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub amount: f64,
    pub delivery_fee: f64,
}

impl OrderTotals {
    /// Price `lines` against `products`. Returns `None` if a line names a
    /// product that is not in `products`.
    pub fn compute(lines: &[OrderLine], products: &[Product]) -> Option<Self> {
        let mut amount = 0.0;
        for line in lines {
            let product = products.iter().find(|p| p.uuid == line.uuid)?;
            amount += product.price * f64::from(line.quantity);
        }
        let amount = (amount * 100.0).round() / 100.0;

        let delivery_fee = if amount > FREE_DELIVERY_ABOVE {
            0.0
        } else {
            DELIVERY_FEE
        };

        Some(Self {
            amount,
            delivery_fee,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub user_uuid: String,
    pub status: OrderStatus,
    pub payment: Payment,
    pub products: Vec<OrderLine>,
    pub address: OrderAddress,
    pub delivery_fee: f64,
    pub amount: f64,
    pub created_at: String,
    pub updated_at: String,
    pub shipped_at: Option<String>,
}

/// Everything needed to write an order, already validated and priced.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub status_id: i64,
    pub payment_id: i64,
    pub products: Vec<OrderLine>,
    pub address: OrderAddress,
    pub totals: OrderTotals,
}

/// Sortable columns of order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderSort {
    #[default]
    CreatedAt,
    ShippedAt,
    Amount,
}

impl OrderSort {
    pub fn parse(column: &str) -> Option<Self> {
        match column {
            "created_at" => Some(Self::CreatedAt),
            "shipped_at" => Some(Self::ShippedAt),
            "amount" => Some(Self::Amount),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::ShippedAt => "shipped_at",
            Self::Amount => "amount",
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    uuid: String,
    user_id: i64,
    user_uuid: String,
    status_id: i64,
    status_uuid: String,
    status_title: String,
    payment_id: i64,
    payment_uuid: String,
    payment_type: String,
    products: String,
    address: String,
    delivery_fee: f64,
    amount: f64,
    created_at: String,
    updated_at: String,
    shipped_at: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = sqlx::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let products =
            serde_json::from_str(&row.products).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let address =
            serde_json::from_str(&row.address).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            user_uuid: row.user_uuid,
            status: OrderStatus {
                id: row.status_id,
                uuid: row.status_uuid,
                title: row.status_title,
            },
            payment: Payment {
                id: row.payment_id,
                uuid: row.payment_uuid,
                kind: row.payment_type,
            },
            products,
            address,
            delivery_fee: row.delivery_fee,
            amount: row.amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
            shipped_at: row.shipped_at,
        })
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

#[derive(Clone)]
pub struct OrderStore {
    pool: SqlitePool,
}

impl OrderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an order for `user_id` with a fresh UUID.
    pub async fn create(&self, user_id: i64, order: &NewOrder) -> Result<Order, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO orders (uuid, user_id, order_status_id, payment_id, products, address, delivery_fee, amount)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(order.status_id)
        .bind(order.payment_id)
        .bind(encode_json(&order.products)?)
        .bind(encode_json(&order.address)?)
        .bind(order.totals.delivery_fee)
        .bind(order.totals.amount)
        .execute(&self.pool)
        .await?;

        self.get_by_uuid(&uuid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get an order by UUID regardless of owner. Callers check access.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Order>, sqlx::Error> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT o.id, o.uuid, o.user_id, u.uuid AS user_uuid,
                    s.id AS status_id, s.uuid AS status_uuid, s.title AS status_title,
                    p.id AS payment_id, p.uuid AS payment_uuid, p.type AS payment_type,
                    o.products, o.address, o.delivery_fee, o.amount, o.created_at, o.updated_at, o.shipped_at
             FROM orders o
             JOIN users u ON u.id = o.user_id
             JOIN order_statuses s ON s.id = o.order_status_id
             JOIN payments p ON p.id = o.payment_id
             WHERE o.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Replace an order's contents. The owner never changes.
    pub async fn update(&self, id: i64, order: &NewOrder) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders SET order_status_id = ?, payment_id = ?, products = ?, address = ?, delivery_fee = ?, amount = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(order.status_id)
        .bind(order.payment_id)
        .bind(encode_json(&order.products)?)
        .bind(encode_json(&order.address)?)
        .bind(order.totals.delivery_fee)
        .bind(order.totals.amount)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List orders one page at a time. `owner` restricts the list to one
    /// user's orders; `None` lists everyone's.
    pub async fn list(
        &self,
        owner: Option<i64>,
        sort: OrderSort,
        descending: bool,
        page: PageRequest,
    ) -> Result<Page<Order>, sqlx::Error> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE (?1 IS NULL OR user_id = ?1)")
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT o.id, o.uuid, o.user_id, u.uuid AS user_uuid,
                    s.id AS status_id, s.uuid AS status_uuid, s.title AS status_title,
                    p.id AS payment_id, p.uuid AS payment_uuid, p.type AS payment_type,
                    o.products, o.address, o.delivery_fee, o.amount, o.created_at, o.updated_at, o.shipped_at
             FROM orders o
             JOIN users u ON u.id = o.user_id
             JOIN order_statuses s ON s.id = o.order_status_id
             JOIN payments p ON p.id = o.payment_id
             WHERE (?1 IS NULL OR o.user_id = ?1)
             ORDER BY
               CASE WHEN ?3 = 0 THEN CASE ?2 WHEN 'shipped_at' THEN o.shipped_at WHEN 'amount' THEN o.amount ELSE o.created_at END END ASC,
               CASE WHEN ?3 = 1 THEN CASE ?2 WHEN 'shipped_at' THEN o.shipped_at WHEN 'amount' THEN o.amount ELSE o.created_at END END DESC,
               CASE WHEN ?3 = 0 THEN o.id END ASC,
               CASE WHEN ?3 = 1 THEN o.id END DESC
             LIMIT ?4 OFFSET ?5",
        )
        .bind(owner)
        .bind(sort.column())
        .bind(descending)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(orders, page, total.0))
    }
}
