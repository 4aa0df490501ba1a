use std::sync::Arc;

use crate::{
    ids::generate_id,
    store::{BlacklistFilter, RecordStore, StoreError},
    types::{now, BlacklistEntry, BlacklistPatch, NewBlacklistEntry, Transition},
};

/// How many times a freshly generated ID is retried if it turns out to be taken.
pub(crate) const ID_ATTEMPTS: usize = 3;

/// Registry of flagged individuals, keyed by passport ID.
#[derive(Clone)]
pub struct BlacklistLedger {
    store: Arc<dyn RecordStore>,
}

impl BlacklistLedger {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        BlacklistLedger { store }
    }

    /// Registers a new active entry with a fresh ID and the current time.
    pub async fn add_entry(&self, mut new: NewBlacklistEntry) -> Result<BlacklistEntry, StoreError> {
        new.passport_id = new.passport_id.trim().to_string();

        let mut attempt = 1;
        loop {
            let entry = BlacklistEntry::new(generate_id(), new.clone(), now());
            match self.store.insert_blacklist(&entry).await {
                Ok(()) => {
                    log::info!(
                        "Blacklist entry {} added for passport {:?} by {}",
                        entry.id,
                        entry.passport_id,
                        entry.author_id
                    );
                    return Ok(entry);
                }
                Err(StoreError::DuplicateId(id)) if attempt < ID_ATTEMPTS => {
                    log::warn!("Generated blacklist ID {id} was taken, trying another");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Soft-removes an active entry.
    ///
    /// An entry that was already removed is left alone and comes back as
    /// [`Transition::InvalidTransition`].
    pub async fn mark_removed(
        &self,
        id: &str,
        removed_by: &str,
        reason: &str,
    ) -> Result<Transition<BlacklistEntry>, StoreError> {
        let patch = BlacklistPatch::Remove {
            by: removed_by.to_string(),
            at: now(),
            reason: reason.to_string(),
        };

        let result = self.store.update_blacklist(id, &patch).await?;
        match &result {
            Transition::Applied(entry) => log::info!(
                "Blacklist entry {id} (passport {:?}) removed by {removed_by}: {reason}",
                entry.passport_id
            ),
            Transition::InvalidTransition(_) => {
                log::warn!("{removed_by} tried to remove blacklist entry {id} a second time");
            }
            Transition::NotFound => log::debug!("No blacklist entry {id} to remove"),
        }
        Ok(result)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        self.store.get_blacklist(id).await
    }

    /// The active entry for this passport ID, if there is one.
    /// With several, the most recently created one wins.
    pub async fn get_active_by_passport(
        &self,
        passport_id: &str,
    ) -> Result<Option<BlacklistEntry>, StoreError> {
        let filter = BlacklistFilter {
            passport_id: Some(passport_id.trim().to_string()),
            include_removed: false,
        };
        Ok(self.store.list_blacklist(&filter).await?.into_iter().next())
    }

    /// Every entry, newest first.
    pub async fn list(&self, include_removed: bool) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.store
            .list_blacklist(&BlacklistFilter {
                passport_id: None,
                include_removed,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashSet;

    use super::*;
    use crate::{
        store::{suite, FileStore},
        types::OriginRefs,
    };

    async fn ledger() -> (tempfile::TempDir, BlacklistLedger) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, BlacklistLedger::new(Arc::new(store)))
    }

    fn new_entry(passport: &str, reason: &str) -> NewBlacklistEntry {
        NewBlacklistEntry {
            passport_id: passport.to_string(),
            display_name: String::from("Sicrano"),
            reason: reason.to_string(),
            author_id: String::from("mod0"),
            origin: OriginRefs {
                guild_id: String::from("-1001"),
                channel_id: String::from("-1002"),
                message_id: String::from("10"),
            },
        }
    }

    #[tokio::test]
    async fn removal_scenario() {
        let (_dir, ledger) = ledger().await;

        let entry = ledger
            .add_entry(new_entry("ABC123", "cheating"))
            .await
            .unwrap();
        assert!(!entry.id.is_empty());
        assert!(!entry.removed);

        let active = ledger.get_active_by_passport("ABC123").await.unwrap();
        assert_eq!(active, Some(entry.clone()));

        let removed = ledger
            .mark_removed(&entry.id, "mod1", "appeal accepted")
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert!(removed.removed);
        assert_eq!(removed.removed_by.as_deref(), Some("mod1"));
        assert_eq!(removed.remove_reason.as_deref(), Some("appeal accepted"));
        assert!(removed.removed_at.is_some());

        assert_eq!(ledger.get_active_by_passport("ABC123").await.unwrap(), None);
        assert_eq!(ledger.get_by_id(&entry.id).await.unwrap(), Some(removed.clone()));

        // A second removal is refused, and the first one's details stay.
        assert_eq!(
            ledger
                .mark_removed(&entry.id, "mod2", "again")
                .await
                .unwrap(),
            Transition::InvalidTransition(removed)
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (_dir, ledger) = ledger().await;
        assert_eq!(ledger.get_by_id("nope").await.unwrap(), None);
        assert_eq!(
            ledger.mark_removed("nope", "mod1", "whatever").await.unwrap(),
            Transition::NotFound
        );
    }

    #[tokio::test]
    async fn most_recent_active_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let ledger = BlacklistLedger::new(store.clone());

        store
            .insert_blacklist(&suite::entry("b-old", "ABC123", 0))
            .await
            .unwrap();
        store
            .insert_blacklist(&suite::entry("b-new", "ABC123", 30))
            .await
            .unwrap();
        store
            .insert_blacklist(&suite::entry("b-other", "XYZ999", 60))
            .await
            .unwrap();

        let found = ledger.get_active_by_passport(" ABC123 ").await.unwrap();
        assert_eq!(found.unwrap().id, "b-new");

        ledger.mark_removed("b-new", "mod1", "done").await.unwrap();
        let found = ledger.get_active_by_passport("ABC123").await.unwrap();
        assert_eq!(found.unwrap().id, "b-old");

        // Same creation time: the greater ID wins.
        store
            .insert_blacklist(&suite::entry("b-same-a", "TIE1", 5))
            .await
            .unwrap();
        store
            .insert_blacklist(&suite::entry("b-same-b", "TIE1", 5))
            .await
            .unwrap();
        let found = ledger.get_active_by_passport("TIE1").await.unwrap();
        assert_eq!(found.unwrap().id, "b-same-b");

        // Only exact matches count.
        assert_eq!(ledger.get_active_by_passport("abc123").await.unwrap(), None);
        assert_eq!(ledger.get_active_by_passport("ABC12").await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_and_unique_ids() {
        let (_dir, ledger) = ledger().await;

        let mut ids = HashSet::new();
        for i in 0..20 {
            let entry = ledger
                .add_entry(new_entry(&format!("P{i}"), "spam"))
                .await
                .unwrap();
            assert!(ids.insert(entry.id));
        }

        let first = ledger.list(false).await.unwrap().pop().unwrap();
        ledger.mark_removed(&first.id, "mod1", "ok").await.unwrap();

        assert_eq!(ledger.list(false).await.unwrap().len(), 19);
        let everything = ledger.list(true).await.unwrap();
        assert_eq!(everything.len(), 20);
        assert!(everything
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }
}
