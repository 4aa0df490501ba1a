use std::{
    collections::HashMap,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlacklistFilter, RecordStore, RecruitFilter, StoreError};
use crate::types::{
    BlacklistEntry, BlacklistPatch, RankingEntry, Record, RecruitPatch, RecruitRequest,
    RecruitStatus, Transition,
};

/// One kind of record, kept as a JSON array in a single file.
///
/// Every mutation rewrites the whole file. Mutations within this process are
/// serialized by a mutex, so a check-then-write can't interleave with another.
/// Nothing coordinates with other processes.
struct JsonCollection<R> {
    path: PathBuf,
    lock: Mutex<()>,
    _records: PhantomData<fn() -> R>,
}

impl<R: Record> JsonCollection<R> {
    fn new(path: PathBuf) -> Self {
        JsonCollection {
            path,
            lock: Mutex::new(()),
            _records: PhantomData,
        }
    }

    /// Reads the whole collection. A missing or empty file is an empty
    /// collection. Anything else that can't be read is an error.
    async fn read(&self) -> Result<Vec<R>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&raw)?)
    }

    /// Like [`Self::read`], but an unreadable or corrupt file reads as empty,
    /// with a warning.
    async fn load(&self) -> Vec<R> {
        match self.read().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "Could not read {} as a list of {}s, treating it as empty: {e}",
                    self.path.display(),
                    R::KIND
                );
                Vec::new()
            }
        }
    }

    /// Reads the collection for a rewrite. A file that can't be read is left
    /// alone, since rewriting it would drop every record in it.
    async fn load_for_write(&self) -> Result<Vec<R>, StoreError> {
        self.read().await.map_err(|e| {
            log::error!(
                "Refusing to rewrite {} while it can't be read: {e}",
                self.path.display()
            );
            e
        })
    }

    async fn save(&self, records: &[R]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(records)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(|e| StoreError::Unavailable(format!("file writer task died: {e}")))?
    }

    async fn insert(&self, record: &R) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let mut all = self.load_for_write().await?;
        if all.iter().any(|r| r.id() == record.id()) {
            return Err(StoreError::DuplicateId(record.id().to_string()));
        }
        all.push(record.clone());

        self.save(&all).await
    }

    async fn get(&self, id: &str) -> Option<R> {
        self.load().await.into_iter().find(|r| r.id() == id)
    }

    /// Runs `apply` on the record with this ID and saves the result, if
    /// `apply` says it changed anything.
    async fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut R) -> bool + Send,
    ) -> Result<Transition<R>, StoreError> {
        let _guard = self.lock.lock().await;

        let mut all = self.load_for_write().await?;
        let Some(record) = all.iter_mut().find(|r| r.id() == id) else {
            return Ok(Transition::NotFound);
        };

        if !apply(record) {
            return Ok(Transition::InvalidTransition(record.clone()));
        }
        let updated = record.clone();

        self.save(&all).await?;
        Ok(Transition::Applied(updated))
    }
}

/// Writes into a temporary file next to `path`, then renames it over `path`,
/// so readers see either the old contents or the new ones.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(data).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(path).map_err(|e| io_error(e.error))?;

    Ok(())
}

/// Record store backed by two JSON files in one directory.
pub struct FileStore {
    blacklist: JsonCollection<BlacklistEntry>,
    recruits: JsonCollection<RecruitRequest>,
}

impl FileStore {
    pub const BLACKLIST_FILE: &'static str = "blacklist-data.json";
    pub const RECRUITS_FILE: &'static str = "recruits-data.json";

    /// Uses the files in `dir`, creating the directory if needed.
    /// The files themselves are created on first write.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(FileStore {
            blacklist: JsonCollection::new(dir.join(Self::BLACKLIST_FILE)),
            recruits: JsonCollection::new(dir.join(Self::RECRUITS_FILE)),
        })
    }
}

#[async_trait]
impl RecordStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "JSON file"
    }

    async fn insert_blacklist(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        self.blacklist.insert(entry).await
    }

    async fn get_blacklist(&self, id: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        Ok(self.blacklist.get(id).await)
    }

    async fn list_blacklist(
        &self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError> {
        let mut entries: Vec<BlacklistEntry> = self
            .blacklist
            .load()
            .await
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(entries)
    }

    async fn update_blacklist(
        &self,
        id: &str,
        patch: &BlacklistPatch,
    ) -> Result<Transition<BlacklistEntry>, StoreError> {
        self.blacklist.update(id, |entry| entry.apply(patch)).await
    }

    async fn insert_recruit(&self, request: &RecruitRequest) -> Result<(), StoreError> {
        self.recruits.insert(request).await
    }

    async fn get_recruit(&self, id: &str) -> Result<Option<RecruitRequest>, StoreError> {
        Ok(self.recruits.get(id).await)
    }

    async fn list_recruits(
        &self,
        filter: &RecruitFilter,
    ) -> Result<Vec<RecruitRequest>, StoreError> {
        let mut requests: Vec<RecruitRequest> = self
            .recruits
            .load()
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        requests.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(requests)
    }

    async fn update_recruit(
        &self,
        id: &str,
        patch: &RecruitPatch,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        self.recruits.update(id, |request| request.apply(patch)).await
    }

    async fn approved_counts(&self) -> Result<Vec<RankingEntry>, StoreError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for request in self.recruits.load().await {
            if request.status == RecruitStatus::Approved {
                *counts.entry(request.recruiter_id).or_default() += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(recruiter_id, total)| RankingEntry {
                recruiter_id,
                total,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use super::*;
    use crate::store::suite;

    async fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn blacklist_round_trip() {
        let (_dir, store) = store().await;
        suite::blacklist_round_trip(&store).await;
    }

    #[tokio::test]
    async fn blacklist_listing() {
        let (_dir, store) = store().await;
        suite::blacklist_listing(&store).await;
    }

    #[tokio::test]
    async fn recruit_round_trip() {
        let (_dir, store) = store().await;
        suite::recruit_round_trip(&store).await;
    }

    #[tokio::test]
    async fn recruit_transitions_are_single_shot() {
        let (_dir, store) = store().await;
        suite::recruit_transitions_are_single_shot(&store).await;
    }

    #[tokio::test]
    async fn racing_approvals_only_one_wins() {
        let (_dir, store) = store().await;
        suite::racing_approvals_only_one_wins(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn duplicate_ids_are_refused() {
        let (_dir, store) = store().await;
        suite::duplicate_ids_are_refused(&store).await;
    }

    #[tokio::test]
    async fn filtering_and_counting() {
        let (_dir, store) = store().await;
        suite::filtering_and_counting(&store).await;
    }

    #[tokio::test]
    async fn ranking_adjustment_is_unsupported() {
        let (_dir, store) = store().await;
        let result = store
            .adjust_ranking(&crate::types::RankingAdjustment {
                recruiter_id: String::from("A"),
                delta: 3,
                adjusted_by: String::from("admin"),
                at: crate::types::now(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[tokio::test]
    async fn missing_empty_and_corrupt_files_read_as_empty() {
        let (dir, store) = store().await;
        let path = dir.path().join(FileStore::BLACKLIST_FILE);

        assert!(!path.exists());
        assert_eq!(store.get_blacklist("b1").await.unwrap(), None);

        std::fs::write(&path, "  \n").unwrap();
        assert!(store
            .list_blacklist(&BlacklistFilter::default())
            .await
            .unwrap()
            .is_empty());

        std::fs::write(&path, "[{\"id\": \"b1\", \"passp").unwrap();
        assert!(store
            .list_blacklist(&BlacklistFilter::default())
            .await
            .unwrap()
            .is_empty());

        // Writes refuse to replace a file they can't read.
        let corrupt = "[{\"id\": \"b1\", \"passp";
        assert!(store
            .insert_blacklist(&suite::entry("b2", "ABC123", 0))
            .await
            .is_err());
        assert!(matches!(
            store
                .update_blacklist(
                    "b1",
                    &BlacklistPatch::Remove {
                        by: String::from("admin"),
                        at: crate::types::now(),
                        reason: String::from("appeal"),
                    }
                )
                .await,
            Err(StoreError::Serialize(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), corrupt);
    }

    #[tokio::test]
    async fn corrupt_file_keeps_its_records() {
        let (dir, store) = store().await;
        for (i, id) in ["b1", "b2", "b3", "b4", "b5"].into_iter().enumerate() {
            store
                .insert_blacklist(&suite::entry(id, "ABC123", i as i64))
                .await
                .unwrap();
        }

        let path = dir.path().join(FileStore::BLACKLIST_FILE);
        let saved = std::fs::read_to_string(&path).unwrap();
        let damaged = saved.trim_end().trim_end_matches(']').to_string();
        std::fs::write(&path, &damaged).unwrap();

        let result = store
            .insert_blacklist(&suite::entry("new", "XYZ789", 9))
            .await;
        assert!(matches!(result, Err(StoreError::Serialize(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), damaged);

        // Fixing the file by hand brings everything back.
        std::fs::write(&path, &saved).unwrap();
        let entries = store
            .list_blacklist(&BlacklistFilter {
                include_removed: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[tokio::test]
    async fn file_layout_is_a_camel_case_array() {
        let (dir, store) = store().await;
        store
            .insert_recruit(&suite::recruit("r1", "A", 0))
            .await
            .unwrap();
        store
            .insert_recruit(&suite::recruit("r2", "B", 1))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join(FileStore::RECRUITS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["id"], "r1");
        assert_eq!(array[0]["recruiterId"], "A");
        assert_eq!(array[0]["status"], "pending");
        assert_eq!(array[0]["blacklistFlag"], true);
        assert_eq!(array[0]["kitDelivered"], false);
        assert!(array[0]["approvedBy"].is_null());

        // Just the recruits file, no leftover temporaries.
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn older_records_without_newer_fields_still_load() {
        let (dir, store) = store().await;
        std::fs::write(
            dir.path().join(FileStore::RECRUITS_FILE),
            r#"[{
                "id": "old1",
                "recruiterId": "A",
                "candidateId": "C",
                "candidateName": "Old Timer",
                "phone": "1",
                "passport": "2",
                "status": "approved",
                "createdAt": "2025-11-20T12:00:00.000Z",
                "approvedBy": "M",
                "approvedAt": "2025-11-21T12:00:00.000Z",
                "rejectedBy": null,
                "rejectedAt": null,
                "rejectReason": null,
                "blacklistFlag": false,
                "blacklistReason": null,
                "approvalChannelId": "10",
                "approvalMessageId": "20"
            }]"#,
        )
        .unwrap();

        let old = store.get_recruit("old1").await.unwrap().unwrap();
        assert_eq!(old.status, RecruitStatus::Approved);
        assert!(!old.kit_delivered);
        assert_eq!(old.first_race, None);
    }
}
