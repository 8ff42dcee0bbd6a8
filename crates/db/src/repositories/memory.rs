use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use vendi_core::domain::article::ArticleId;
use vendi_core::domain::inventory::{InventoryItem, InventoryStore, LockOutcome, VendorId};
use vendi_core::StoreError;

/// In-memory twin of the SQL store for tests and offline development.
/// Items are kept per vendor in insertion order; lock acquisition is atomic
/// under the write lock.
#[derive(Default)]
pub struct MemoryInventoryStore {
    items: RwLock<HashMap<String, Vec<InventoryItem>>>,
}

impl MemoryInventoryStore {
    pub async fn insert(&self, vendor_id: &VendorId, item: InventoryItem) {
        let mut items = self.items.write().await;
        items.entry(vendor_id.0.clone()).or_default().push(item);
    }
}

#[async_trait::async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn list(&self, vendor_id: &VendorId) -> Result<Vec<InventoryItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.get(&vendor_id.0).cloned().unwrap_or_default())
    }

    async fn find(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .get(&vendor_id.0)
            .and_then(|entries| entries.iter().find(|entry| &entry.article_id == article_id))
            .cloned())
    }

    async fn acquire_lock(
        &self,
        vendor_id: &VendorId,
        article_id: &ArticleId,
        ttl: Duration,
    ) -> Result<LockOutcome, StoreError> {
        let mut items = self.items.write().await;
        let Some(entry) = items
            .get_mut(&vendor_id.0)
            .and_then(|entries| entries.iter_mut().find(|entry| &entry.article_id == article_id))
        else {
            return Ok(LockOutcome::NotFound);
        };

        let now = Utc::now();
        if entry.locked_now(now) {
            return Ok(LockOutcome::Contended);
        }

        entry.locked_at = Some(now);
        entry.locked_until = Some(now + ttl);
        Ok(LockOutcome::Locked)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use vendi_core::domain::article::ArticleId;
    use vendi_core::domain::inventory::{InventoryItem, InventoryStore, LockOutcome, VendorId};

    use super::MemoryInventoryStore;

    fn item(raw_id: &str, name: &str) -> InventoryItem {
        InventoryItem {
            article_id: ArticleId::parse(raw_id).expect("valid article id"),
            name: name.to_owned(),
            description: String::new(),
            price_cents: 750,
            locked_at: None,
            locked_until: None,
        }
    }

    #[tokio::test]
    async fn list_returns_items_in_insertion_order() {
        let store = MemoryInventoryStore::default();
        let vendor = VendorId("V-1".to_owned());
        store.insert(&vendor, item("21may25-1", "Blue Shirt")).await;
        store.insert(&vendor, item("21may25-2", "Red Hat")).await;

        let listed = store.list(&vendor).await.expect("list");
        assert_eq!(
            listed.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
            vec!["Blue Shirt", "Red Hat"],
        );
    }

    #[tokio::test]
    async fn lock_lifecycle_matches_sql_store_semantics() {
        let store = MemoryInventoryStore::default();
        let vendor = VendorId("V-1".to_owned());
        let target = ArticleId::parse("21may25-1").expect("valid article id");
        store.insert(&vendor, item("21may25-1", "Blue Shirt")).await;

        let ttl = Duration::minutes(15);
        assert_eq!(store.acquire_lock(&vendor, &target, ttl).await.expect("acquire"), LockOutcome::Locked);
        assert_eq!(
            store.acquire_lock(&vendor, &target, ttl).await.expect("acquire"),
            LockOutcome::Contended,
        );

        let missing = ArticleId::parse("22may25-9").expect("valid article id");
        assert_eq!(
            store.acquire_lock(&vendor, &missing, ttl).await.expect("acquire"),
            LockOutcome::NotFound,
        );

        let locked = store.find(&vendor, &target).await.expect("find").expect("present");
        assert!(locked.locked_now(Utc::now()));
    }
}
