use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::article::ArticleId;
use crate::errors::StoreError;

/// Tenant scope under which inventory and locks are partitioned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub article_id: ArticleId,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl InventoryItem {
    /// Price rendered for chat output, e.g. `$12.50`.
    pub fn display_price(&self) -> String {
        format!("${}", Decimal::new(self.price_cents, 2))
    }

    /// A lock is live only until its deadline; expired locks are inert and
    /// stay in place until the next successful acquisition overwrites them.
    pub fn locked_now(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Result of one conditional lock acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The conditional write applied; the caller holds the lock until the
    /// deadline it set.
    Locked,
    /// The row exists but another live lock is in place.
    Contended,
    /// No row for the `(vendor, article)` key.
    NotFound,
}

/// Port to the vendor-scoped inventory/lock store.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Vendor's items in store order. An empty vendor is a valid empty list,
    /// not missing data.
    async fn list(&self, vendor_id: &VendorId) -> Result<Vec<InventoryItem>, StoreError>;

    async fn find(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
    ) -> Result<Option<InventoryItem>, StoreError>;

    /// Acquire the product lock for `ttl` via a single atomic conditional
    /// write: the row must exist and carry no live lock. Expiry is evaluated
    /// lazily by this predicate; there is no background cleanup.
    async fn acquire_lock(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
        ttl: Duration,
    ) -> Result<LockOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::article::ArticleId;

    use super::InventoryItem;

    fn item(price_cents: i64) -> InventoryItem {
        InventoryItem {
            article_id: ArticleId::parse("21may25-1").expect("valid id"),
            name: "Blue Shirt".to_owned(),
            description: "cotton".to_owned(),
            price_cents,
            locked_at: None,
            locked_until: None,
        }
    }

    #[test]
    fn display_price_renders_two_decimal_places() {
        assert_eq!(item(1250).display_price(), "$12.50");
        assert_eq!(item(500).display_price(), "$5.00");
        assert_eq!(item(99).display_price(), "$0.99");
    }

    #[test]
    fn expired_lock_is_not_live() {
        let now = Utc::now();
        let mut locked = item(1000);
        locked.locked_until = Some(now - Duration::minutes(1));
        assert!(!locked.locked_now(now));

        locked.locked_until = Some(now + Duration::minutes(1));
        assert!(locked.locked_now(now));
    }
}
