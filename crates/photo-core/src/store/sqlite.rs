//! SQLite entitlement store
//!
//! Purchases and their line items live in two tables (see `migrations/`).
//!
//! * `create_if_absent` inserts the purchase row with `ON CONFLICT DO NOTHING`
//!   and only writes line items when that insert affected a row, all inside
//!   one transaction.
//! * `mark_item_fully_downloaded` is a single conditional `UPDATE` on the line
//!   item row; `rows_affected` decides who consumed it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

use super::{ConsumeOutcome, CreateOutcome, EntitlementStore};
use crate::error::{Result, StoreError};
use crate::model::{LineItem, PaymentStatus, PurchaseRecord, storage_key};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type PurchaseRow = (String, Option<String>, String, DateTime<Utc>);
type LineItemRow = (String, String, String, String, i64, i64);

#[derive(Debug, Clone)]
pub struct SqliteEntitlementStore {
    pool: SqlitePool,
}

impl SqliteEntitlementStore {
    /// Open (and create if needed) the database at `url`, e.g.
    /// `sqlite://data/entitlements.db`
    pub async fn open(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // One long-lived connection: writes are serialized without SQLITE_BUSY
        // and `sqlite::memory:` keeps its data for the life of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        tracing::debug!(url, "Opened SQLite entitlement store");

        Ok(Self { pool })
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }
}

#[async_trait]
impl EntitlementStore for SqliteEntitlementStore {
    async fn get(&self, session_id: &str) -> Result<Option<PurchaseRecord>> {
        let key = storage_key(session_id);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PurchaseRow>(
            "SELECT session_id, customer_email, payment_status, created_at
             FROM purchases WHERE storage_key = ?",
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((session_id, customer_email, payment_status, created_at)) = row else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, LineItemRow>(
            "SELECT product_id, title, file_name, asset_path, quantity_purchased, quantity_downloaded
             FROM line_items WHERE storage_key = ? ORDER BY position",
        )
        .bind(&key)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let payment_status = PaymentStatus::from_str(&payment_status)
            .map_err(|reason| StoreError::Corrupt { key: key.clone(), reason })?;

        let items = rows
            .into_iter()
            .map(|row| line_item(&key, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(PurchaseRecord {
            session_id,
            customer_email,
            payment_status,
            created_at,
            items,
        }))
    }

    async fn create_if_absent(&self, record: &PurchaseRecord) -> Result<CreateOutcome> {
        let key = record.key();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO purchases (storage_key, session_id, customer_email, payment_status, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (storage_key) DO NOTHING",
        )
        .bind(&key)
        .bind(&record.session_id)
        .bind(record.customer_email.as_deref())
        .bind(record.payment_status.as_str())
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CreateOutcome::AlreadyExists);
        }

        for (position, item) in (0_i64..).zip(&record.items) {
            sqlx::query(
                "INSERT INTO line_items
                 (storage_key, position, product_id, title, file_name, asset_path,
                  quantity_purchased, quantity_downloaded)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&key)
            .bind(position)
            .bind(&item.product_id)
            .bind(&item.title)
            .bind(&item.file_name)
            .bind(&item.asset_path)
            .bind(i64::from(item.quantity_purchased))
            .bind(i64::from(item.quantity_downloaded))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(CreateOutcome::Created)
    }

    async fn mark_item_fully_downloaded(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> Result<ConsumeOutcome> {
        let key = storage_key(session_id);

        let updated = sqlx::query(
            "UPDATE line_items SET quantity_downloaded = quantity_purchased
             WHERE storage_key = ? AND product_id = ? AND quantity_downloaded < quantity_purchased",
        )
        .bind(&key)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(ConsumeOutcome::Consumed);
        }

        // Rows are never deleted, so an existing item here was consumed by
        // someone else.
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM line_items WHERE storage_key = ? AND product_id = ?",
        )
        .bind(&key)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists > 0 {
            ConsumeOutcome::AlreadyConsumed
        } else {
            ConsumeOutcome::NotFound
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn line_item(key: &str, row: LineItemRow) -> Result<LineItem> {
    let (product_id, title, file_name, asset_path, purchased, downloaded) = row;

    let quantity = |value: i64| {
        u32::try_from(value).map_err(|_| StoreError::Corrupt {
            key: key.to_owned(),
            reason: format!("quantity {value} out of range for {product_id}"),
        })
    };

    Ok(LineItem {
        quantity_purchased: quantity(purchased)?,
        quantity_downloaded: quantity(downloaded)?,
        product_id,
        title,
        file_name,
        asset_path,
    })
}
