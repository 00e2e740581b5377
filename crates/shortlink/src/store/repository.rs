//! Link and membership repository.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::StoreError;
use super::models::Link;

/// Ownership-checked access to links plus the `users` and `admins` sets.
///
/// Every mutation runs inside a SQLite transaction while holding the writer
/// gate, so read-check-write sequences on the same key never interleave.
/// Readers go straight to the pool and only ever see committed state.
#[derive(Debug, Clone)]
pub struct LinkStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl LinkStore {
    /// Create a new store on top of a migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Get the link stored under `key`.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<Link>, StoreError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM links WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(data,)| decode_link(key, &data)).transpose()
    }

    /// Store `value` under `key` on behalf of `actor`.
    ///
    /// A new key is created with `actor` as owner. An existing key is only
    /// overwritten when `actor` owns it or `override_owner` is set; the
    /// overwrite makes `actor` the new owner.
    #[instrument(skip(self, value))]
    pub async fn put(
        &self,
        key: &str,
        value: &str,
        actor: &str,
        override_owner: bool,
    ) -> Result<(), StoreError> {
        let data = Link {
            key: key.to_string(),
            value: value.to_string(),
            owner: actor.to_string(),
        }
        .to_bytes()
        .map_err(StoreError::Encode)?;

        let _gate = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM links WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some((bytes,)) = current {
            let existing = decode_link(key, &bytes)?;
            if !override_owner && existing.owner != actor {
                return Err(StoreError::Ownership {
                    key: key.to_string(),
                });
            }
            if existing.owner != actor {
                info!(previous_owner = %existing.owner, "overriding link owner");
            }
        }

        sqlx::query(
            r#"
            INSERT INTO links (key, data) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(key)
        .bind(&data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("link stored");
        Ok(())
    }

    /// Delete the link under `key`. Same ownership rule as [`LinkStore::put`];
    /// deleting a missing key succeeds.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        key: &str,
        actor: &str,
        override_owner: bool,
    ) -> Result<(), StoreError> {
        let _gate = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM links WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((bytes,)) = current else {
            return Ok(());
        };

        let existing = decode_link(key, &bytes)?;
        if !override_owner && existing.owner != actor {
            return Err(StoreError::Ownership {
                key: key.to_string(),
            });
        }

        sqlx::query("DELETE FROM links WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("link deleted");
        Ok(())
    }

    /// List links owned by `actor`, or every link when `all` is set.
    ///
    /// Results are ordered by key. A malformed row is logged and skipped so
    /// one bad entry does not hide the rest of the listing.
    #[instrument(skip(self))]
    pub async fn list(&self, actor: &str, all: bool) -> Result<Vec<Link>, StoreError> {
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT key, data FROM links ORDER BY key")
                .fetch_all(&self.pool)
                .await?;

        let links = rows
            .into_iter()
            .filter_map(|(key, data)| match Link::from_bytes(&data) {
                Ok(link) => Some(link),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping malformed link");
                    None
                }
            })
            .filter(|link| all || link.owner == actor)
            .collect();

        Ok(links)
    }

    /// Add `identity` to the user set. Adding an existing user is a no-op.
    #[instrument(skip(self))]
    pub async fn add_user(&self, identity: &str) -> Result<(), StoreError> {
        let _gate = self.writer.lock().await;
        sqlx::query("INSERT OR IGNORE INTO users (identity) VALUES (?)")
            .bind(identity)
            .execute(&self.pool)
            .await?;
        info!("user added");
        Ok(())
    }

    /// Check whether `identity` is a registered user.
    #[instrument(skip(self))]
    pub async fn is_user(&self, identity: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE identity = ? LIMIT 1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All registered users, sorted.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT identity FROM users ORDER BY identity")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(identity,)| identity).collect())
    }

    /// Remove `identity` from the user set.
    ///
    /// With `keep_links == false` every link owned by `identity` is removed
    /// in the same transaction as the membership row.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, identity: &str, keep_links: bool) -> Result<(), StoreError> {
        let _gate = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM users WHERE identity = ?")
            .bind(identity)
            .execute(&mut *tx)
            .await?;

        let mut removed = 0usize;
        if !keep_links {
            let rows: Vec<(String, Vec<u8>)> = sqlx::query_as("SELECT key, data FROM links")
                .fetch_all(&mut *tx)
                .await?;

            for (key, data) in rows {
                let link = match Link::from_bytes(&data) {
                    Ok(link) => link,
                    Err(e) => {
                        warn!(key = %key, error = %e, "skipping malformed link during user cleanup");
                        continue;
                    }
                };
                if link.owner != identity {
                    continue;
                }
                sqlx::query("DELETE FROM links WHERE key = ?")
                    .bind(&key)
                    .execute(&mut *tx)
                    .await?;
                removed += 1;
            }
        }

        tx.commit().await?;
        info!(links_removed = removed, "user deleted");
        Ok(())
    }

    /// Check whether `identity` is an administrator.
    #[instrument(skip(self))]
    pub async fn is_admin(&self, identity: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM admins WHERE identity = ? LIMIT 1")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// All administrators, sorted.
    #[instrument(skip(self))]
    pub async fn list_admins(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT identity FROM admins ORDER BY identity")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(identity,)| identity).collect())
    }

    /// Replace the administrator set with `identities`.
    ///
    /// The clear and repopulate happen in one transaction: concurrent readers
    /// see either the previous set or the new one, never an empty gap.
    #[instrument(skip(self, identities))]
    pub async fn replace_admins<I, S>(&self, identities: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _gate = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM admins").execute(&mut *tx).await?;

        let mut count = 0usize;
        for identity in identities {
            sqlx::query("INSERT OR IGNORE INTO admins (identity) VALUES (?)")
                .bind(identity.as_ref())
                .execute(&mut *tx)
                .await?;
            count += 1;
        }

        tx.commit().await?;
        info!(admins = count, "admin list replaced");
        Ok(())
    }
}

fn decode_link(key: &str, data: &[u8]) -> Result<Link, StoreError> {
    Link::from_bytes(data).map_err(|source| {
        error!(key = %key, error = %source, "malformed link");
        StoreError::Corruption {
            key: key.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_store() -> (Database, LinkStore) {
        let db = Database::in_memory().await.unwrap();
        let store = LinkStore::new(db.pool().clone());
        (db, store)
    }

    async fn insert_raw(db: &Database, key: &str, data: &[u8]) {
        sqlx::query("INSERT INTO links (key, data) VALUES (?, ?)")
            .bind(key)
            .bind(data)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_new_key_sets_owner() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();

        let link = store.get("a").await.unwrap().unwrap();
        assert_eq!(link.key, "a");
        assert_eq!(link.value, "http://e.com");
        assert_eq!(link.owner, "alice");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_db, store) = setup_store().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_can_update_own_link() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();
        store.put("a", "http://f.com", "alice", false).await.unwrap();

        let link = store.get("a").await.unwrap().unwrap();
        assert_eq!(link.value, "http://f.com");
        assert_eq!(link.owner, "alice");
    }

    #[tokio::test]
    async fn test_foreign_put_is_rejected() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();
        let err = store
            .put("a", "http://f.com", "bob", false)
            .await
            .unwrap_err();
        assert!(err.is_ownership());

        let link = store.get("a").await.unwrap().unwrap();
        assert_eq!(link.value, "http://e.com");
        assert_eq!(link.owner, "alice");
    }

    #[tokio::test]
    async fn test_override_put_reassigns_owner() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();
        store.put("a", "http://f.com", "bob", true).await.unwrap();

        let link = store.get("a").await.unwrap().unwrap();
        assert_eq!(link.value, "http://f.com");
        assert_eq!(link.owner, "bob");

        // alice no longer owns it
        let err = store
            .put("a", "http://g.com", "alice", false)
            .await
            .unwrap_err();
        assert!(err.is_ownership());
    }

    #[tokio::test]
    async fn test_foreign_delete_is_rejected() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();
        let err = store.delete("a", "bob", false).await.unwrap_err();
        assert!(err.is_ownership());
        assert!(store.get("a").await.unwrap().is_some());

        store.delete("a", "bob", true).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_delete() {
        let (_db, store) = setup_store().await;

        store.put("a", "http://e.com", "alice", false).await.unwrap();
        store.delete("a", "alice", false).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let (_db, store) = setup_store().await;

        for (actor, override_owner) in [("alice", false), ("bob", true), ("", false)] {
            store.delete("missing", actor, override_owner).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_by_owner_and_all() {
        let (_db, store) = setup_store().await;

        store.put("c", "http://c.com", "alice", false).await.unwrap();
        store.put("a", "http://a.com", "alice", false).await.unwrap();
        store.put("b", "http://b.com", "bob", false).await.unwrap();

        let mine: Vec<_> = store
            .list("alice", false)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(mine, vec!["a", "c"]);

        let all: Vec<_> = store
            .list("alice", true)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(all, vec!["a", "b", "c"]);

        // Stable across calls
        let again: Vec<_> = store
            .list("nobody", true)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(all, again);
    }

    #[tokio::test]
    async fn test_corrupt_link_is_surfaced_by_get() {
        let (db, store) = setup_store().await;
        insert_raw(&db, "bad", b"not json at all").await;

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Corruption { ref key, .. } if key == "bad"));

        // Writes against a corrupt row are refused too
        let err = store.put("bad", "http://x.com", "alice", true).await.unwrap_err();
        assert!(matches!(err, StoreError::Corruption { .. }));
        let err = store.delete("bad", "alice", true).await.unwrap_err();
        assert!(matches!(err, StoreError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_link_is_skipped_by_list() {
        let (db, store) = setup_store().await;
        store.put("good", "http://g.com", "alice", false).await.unwrap();
        insert_raw(&db, "bad", b"{").await;

        let links = store.list("alice", true).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].key, "good");
    }

    #[tokio::test]
    async fn test_user_membership() {
        let (_db, store) = setup_store().await;

        assert!(!store.is_user("alice").await.unwrap());
        store.add_user("bob").await.unwrap();
        store.add_user("alice").await.unwrap();
        store.add_user("alice").await.unwrap();

        assert!(store.is_user("alice").await.unwrap());
        assert_eq!(store.list_users().await.unwrap(), vec!["alice", "bob"]);

        store.delete_user("alice", true).await.unwrap();
        assert!(!store.is_user("alice").await.unwrap());

        // Removing a non-member is a no-op
        store.delete_user("carol", true).await.unwrap();
        store.delete_user("carol", false).await.unwrap();
        assert_eq!(store.list_users().await.unwrap(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_delete_user_keeps_or_removes_links() {
        let (db, store) = setup_store().await;
        store.add_user("alice").await.unwrap();
        store.add_user("bob").await.unwrap();
        store.put("a1", "http://a1.com", "alice", false).await.unwrap();
        store.put("a2", "http://a2.com", "alice", false).await.unwrap();
        store.put("b1", "http://b1.com", "bob", false).await.unwrap();
        insert_raw(&db, "junk", b"???").await;

        store.delete_user("bob", true).await.unwrap();
        assert!(store.get("b1").await.unwrap().is_some());

        store.delete_user("alice", false).await.unwrap();
        assert!(store.get("a1").await.unwrap().is_none());
        assert!(store.get("a2").await.unwrap().is_none());
        assert!(store.get("b1").await.unwrap().is_some());
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_admins() {
        let (_db, store) = setup_store().await;

        store.replace_admins(["alice", "bob"]).await.unwrap();
        assert!(store.is_admin("alice").await.unwrap());
        assert!(store.is_admin("bob").await.unwrap());

        store.replace_admins(vec!["carol".to_string()]).await.unwrap();
        assert!(!store.is_admin("alice").await.unwrap());
        assert!(store.is_admin("carol").await.unwrap());
        assert_eq!(store.list_admins().await.unwrap(), vec!["carol"]);

        store.replace_admins(Vec::<String>::new()).await.unwrap();
        assert!(store.list_admins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_and_user_sets_are_independent() {
        let (_db, store) = setup_store().await;

        store.replace_admins(["alice"]).await.unwrap();
        store.add_user("alice").await.unwrap();
        store.delete_user("alice", true).await.unwrap();

        assert!(store.is_admin("alice").await.unwrap());
        assert!(!store.is_user("alice").await.unwrap());
    }
}
