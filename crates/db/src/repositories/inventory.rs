use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use vendi_core::domain::article::ArticleId;
use vendi_core::domain::inventory::{InventoryItem, InventoryStore, LockOutcome, VendorId};
use vendi_core::StoreError;

use crate::DbPool;

pub struct SqlInventoryStore {
    pool: DbPool,
}

impl SqlInventoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        vendor_id: &VendorId,
        item: &InventoryItem,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());

        sqlx::query(
            "INSERT INTO inventory_item (
                vendor_id,
                article_id,
                name,
                description,
                price_cents,
                locked_at,
                locked_until,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(vendor_id, article_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price_cents = excluded.price_cents,
                locked_at = excluded.locked_at,
                locked_until = excluded.locked_until,
                updated_at = excluded.updated_at",
        )
        .bind(&vendor_id.0)
        .bind(item.article_id.as_str())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price_cents)
        .bind(item.locked_at.map(fmt_ts))
        .bind(item.locked_until.map(fmt_ts))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl InventoryStore for SqlInventoryStore {
    async fn list(&self, vendor_id: &VendorId) -> Result<Vec<InventoryItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT article_id, name, description, price_cents, locked_at, locked_until
             FROM inventory_item
             WHERE vendor_id = ?
             ORDER BY rowid ASC",
        )
        .bind(&vendor_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(item_from_row).collect()
    }

    async fn find(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let row = sqlx::query(
            "SELECT article_id, name, description, price_cents, locked_at, locked_until
             FROM inventory_item
             WHERE vendor_id = ? AND article_id = ?",
        )
        .bind(&vendor_id.0)
        .bind(article_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(item_from_row).transpose()
    }

    async fn acquire_lock(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
        ttl: Duration,
    ) -> Result<LockOutcome, StoreError> {
        let now = Utc::now();
        let now_text = fmt_ts(now);

        // Single conditional write; the predicate carries the whole
        // check-then-act decision so concurrent callers contend on the
        // store, not on an in-process read.
        let result = sqlx::query(
            "UPDATE inventory_item
                SET locked_until = ?, locked_at = ?, updated_at = ?
              WHERE vendor_id = ? AND article_id = ?
                AND (locked_until IS NULL OR locked_until <= ?)",
        )
        .bind(fmt_ts(now + ttl))
        .bind(&now_text)
        .bind(&now_text)
        .bind(&vendor_id.0)
        .bind(article_id.as_str())
        .bind(&now_text)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() > 0 {
            return Ok(LockOutcome::Locked);
        }

        // The winner was already decided by the conditional write; this
        // probe only splits "no such product" from "lock still held".
        let matched: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_item WHERE vendor_id = ? AND article_id = ?",
        )
        .bind(&vendor_id.0)
        .bind(article_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(if matched == 0 { LockOutcome::NotFound } else { LockOutcome::Contended })
    }
}

fn unavailable(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

/// Timestamps are stored as RFC 3339 UTC with fixed millisecond precision;
/// with one uniform format, SQL string comparison matches time order.
fn fmt_ts(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn item_from_row(row: SqliteRow) -> Result<InventoryItem, StoreError> {
    let article_raw: String = row.try_get("article_id").map_err(unavailable)?;
    let article_id = ArticleId::parse(&article_raw)
        .map_err(|error| StoreError::Decode(error.to_string()))?;

    Ok(InventoryItem {
        article_id,
        name: row.try_get("name").map_err(unavailable)?,
        description: row.try_get("description").map_err(unavailable)?,
        price_cents: row.try_get("price_cents").map_err(unavailable)?,
        locked_at: parse_optional_ts("locked_at", row.try_get("locked_at").map_err(unavailable)?)?,
        locked_until: parse_optional_ts(
            "locked_until",
            row.try_get("locked_until").map_err(unavailable)?,
        )?,
    })
}

fn parse_optional_ts(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| {
                    StoreError::Decode(format!("invalid timestamp in `{column}`: `{raw}` ({error})"))
                })
        })
        .transpose()
}
