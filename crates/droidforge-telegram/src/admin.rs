//! Chat administrator resolution with a short-lived cache.
//!
//! Group admin lists rarely change and `getChatAdministrators` is a
//! costly call, so results are cached for a bounded TTL. The cache is an
//! explicit value owned by the shared bot state, passed into every check.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use teloxide::prelude::*;
use teloxide::types::UserId;
use tokio::sync::Mutex;
use tracing::warn;

/// Default time-to-live for a cached admin list.
const ADMIN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Caches per-chat administrator lists.
pub struct AdminCache {
    ttl: Duration,
    entries: Mutex<HashMap<i64, (Instant, Vec<UserId>)>>,
}

impl Default for AdminCache {
    fn default() -> Self {
        Self::with_ttl(ADMIN_CACHE_TTL)
    }
}

impl AdminCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the sender of `msg` may run admin-gated commands.
    ///
    /// Private chats are always authorized; in groups the sender must be
    /// in the chat's administrator list.
    pub async fn is_admin(&self, bot: &Bot, msg: &Message) -> bool {
        if msg.chat.is_private() {
            return true;
        }
        let Some(user) = msg.from.as_ref() else {
            return false;
        };
        self.is_admin_user(bot, msg.chat.id, user.id).await
    }

    /// Whether a specific user is an administrator of a group chat.
    pub async fn is_admin_user(&self, bot: &Bot, chat_id: ChatId, user_id: UserId) -> bool {
        self.admin_ids(bot, chat_id).await.contains(&user_id)
    }

    /// Administrator ids of a chat, served from cache within the TTL.
    ///
    /// A failed query yields an empty list (nobody is authorized) and is
    /// not cached, so a transient error doesn't lock admins out for a
    /// full TTL.
    pub async fn admin_ids(&self, bot: &Bot, chat_id: ChatId) -> Vec<UserId> {
        if let Some(cached) = self.lookup(chat_id.0).await {
            return cached;
        }

        match bot.get_chat_administrators(chat_id).await {
            Ok(admins) => {
                let ids: Vec<UserId> = admins.iter().map(|m| m.user.id).collect();
                self.store(chat_id.0, ids.clone()).await;
                ids
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to fetch chat administrators");
                Vec::new()
            }
        }
    }

    async fn lookup(&self, chat_id: i64) -> Option<Vec<UserId>> {
        let entries = self.entries.lock().await;
        let (fetched_at, ids) = entries.get(&chat_id)?;
        if fetched_at.elapsed() > self.ttl {
            return None;
        }
        Some(ids.clone())
    }

    async fn store(&self, chat_id: i64, ids: Vec<UserId>) {
        self.entries
            .lock()
            .await
            .insert(chat_id, (Instant::now(), ids));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cached_entry_is_served_within_ttl() {
        let cache = AdminCache::with_ttl(Duration::from_secs(60));
        cache.store(-100, vec![UserId(7)]).await;

        assert_eq!(cache.lookup(-100).await, Some(vec![UserId(7)]));
    }

    #[tokio::test]
    async fn expired_entry_is_not_served() {
        let cache = AdminCache::with_ttl(Duration::from_millis(10));
        cache.store(-100, vec![UserId(7)]).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.lookup(-100).await, None);
    }

    #[tokio::test]
    async fn unknown_chat_is_a_miss() {
        let cache = AdminCache::default();
        assert_eq!(cache.lookup(-42).await, None);
    }
}
