use crate::db::{Store, DEFAULT_NOTIFICATION_LIMIT};
use crate::domain::models::{NewNotification, Notification};
use crate::error::{DataError, DataResult};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-user view of the notification list as shown in the header badge.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// Read-through cache of [`NotificationSnapshot`]s keyed by user id.
///
/// Every mutation goes to the store first, then the user's entry is
/// invalidated and refetched so the next read reflects storage. A fetch only
/// lands in the cache if no invalidation happened while it was in flight.
#[derive(Default)]
pub struct NotificationCache {
    entries: RwLock<HashMap<Uuid, Slot>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    snapshot: Option<NotificationSnapshot>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, store: &dyn Store, user_id: Uuid) -> DataResult<NotificationSnapshot> {
        if let Some(hit) = self
            .entries
            .read()
            .await
            .get(&user_id)
            .and_then(|slot| slot.snapshot.clone())
        {
            return Ok(hit);
        }
        self.refresh(store, user_id).await
    }

    pub async fn refresh(
        &self,
        store: &dyn Store,
        user_id: Uuid,
    ) -> DataResult<NotificationSnapshot> {
        let started_at = self.generation(user_id).await;
        let notifications = store
            .get_user_notifications(user_id, DEFAULT_NOTIFICATION_LIMIT)
            .await?;
        let unread_count = store.unread_notification_count(user_id).await?;
        let snapshot = NotificationSnapshot {
            notifications,
            unread_count,
        };

        let mut entries = self.entries.write().await;
        let slot = entries.entry(user_id).or_default();
        if slot.generation == started_at {
            slot.snapshot = Some(snapshot.clone());
        } else {
            tracing::debug!("Discarding superseded notification snapshot for {}", user_id);
        }
        Ok(snapshot)
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        let mut entries = self.entries.write().await;
        let slot = entries.entry(user_id).or_default();
        slot.generation = slot.generation.wrapping_add(1);
        slot.snapshot = None;
    }

    async fn generation(&self, user_id: Uuid) -> u64 {
        self.entries
            .read()
            .await
            .get(&user_id)
            .map_or(0, |slot| slot.generation)
    }

    pub async fn add(&self, store: &dyn Store, new: NewNotification) -> DataResult<Notification> {
        let user_id = new.user_id;
        let created = store.create_notification(new).await?;
        self.sync(store, user_id).await;
        Ok(created)
    }

    pub async fn mark_read(&self, store: &dyn Store, user_id: Uuid, id: Uuid) -> DataResult<()> {
        owned(store, user_id, id).await?;
        store.mark_notification_read(id).await?;
        self.sync(store, user_id).await;
        Ok(())
    }

    pub async fn mark_all_read(&self, store: &dyn Store, user_id: Uuid) -> DataResult<u64> {
        let updated = store.mark_all_notifications_read(user_id).await?;
        self.sync(store, user_id).await;
        Ok(updated)
    }

    pub async fn delete(&self, store: &dyn Store, user_id: Uuid, id: Uuid) -> DataResult<()> {
        owned(store, user_id, id).await?;
        store.delete_notification(id).await?;
        self.sync(store, user_id).await;
        Ok(())
    }

    pub async fn clear(&self, store: &dyn Store, user_id: Uuid) -> DataResult<u64> {
        let removed = store.clear_notifications(user_id).await?;
        self.sync(store, user_id).await;
        Ok(removed)
    }

    async fn sync(&self, store: &dyn Store, user_id: Uuid) {
        self.invalidate(user_id).await;
        if let Err(e) = self.refresh(store, user_id).await {
            tracing::warn!("Failed to refresh notifications for {}: {}", user_id, e);
        }
    }
}

/// Another user's notification is reported as missing.
async fn owned(store: &dyn Store, user_id: Uuid, id: Uuid) -> DataResult<Notification> {
    match store.get_notification(id).await? {
        Some(n) if n.user_id == user_id => Ok(n),
        _ => Err(DataError::not_found("Notification", id)),
    }
}
