//! Durable keyed storage for blacklist entries and recruit requests.
//!
//! Two backends implement [`RecordStore`]: a pair of JSON files rewritten on
//! every mutation ([`file::FileStore`]), and a SQLite database through `sqlx`
//! ([`sqlite::SqliteStore`]). Which one is used is decided once, in [`open`].

mod file;
mod sqlite;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use crate::{
    config::StorageConfig,
    types::{
        BlacklistEntry, BlacklistPatch, RankingAdjustment, RankingEntry, RecruitPatch,
        RecruitRequest, RecruitStatus, Transition,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("a record with ID {0} already exists")]
    DuplicateId(String),
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Which blacklist entries to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlacklistFilter {
    /// Only entries for this exact passport ID.
    pub passport_id: Option<String>,
    /// Also list entries that were removed.
    pub include_removed: bool,
}

impl BlacklistFilter {
    #[must_use]
    pub fn matches(&self, entry: &BlacklistEntry) -> bool {
        (self.include_removed || entry.is_active())
            && self
                .passport_id
                .as_ref()
                .map_or(true, |passport| *passport == entry.passport_id)
    }
}

/// Which recruit requests to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecruitFilter {
    pub recruiter_id: Option<String>,
    pub status: Option<RecruitStatus>,
}

impl RecruitFilter {
    #[must_use]
    pub fn matches(&self, request: &RecruitRequest) -> bool {
        self.recruiter_id
            .as_ref()
            .map_or(true, |recruiter| *recruiter == request.recruiter_id)
            && self.status.map_or(true, |status| status == request.status)
    }
}

/// Storage for both kinds of records.
///
/// Updates are conditional: each patch carries its own precondition, and the
/// backend checks it and writes in one step, so two racing transitions can't
/// both succeed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Fails with [`StoreError::DuplicateId`] if the ID is taken.
    async fn insert_blacklist(&self, entry: &BlacklistEntry) -> Result<(), StoreError>;
    async fn get_blacklist(&self, id: &str) -> Result<Option<BlacklistEntry>, StoreError>;
    /// Newest first: by creation time, then by ID, descending.
    async fn list_blacklist(
        &self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError>;
    async fn update_blacklist(
        &self,
        id: &str,
        patch: &BlacklistPatch,
    ) -> Result<Transition<BlacklistEntry>, StoreError>;

    /// Fails with [`StoreError::DuplicateId`] if the ID is taken.
    async fn insert_recruit(&self, request: &RecruitRequest) -> Result<(), StoreError>;
    async fn get_recruit(&self, id: &str) -> Result<Option<RecruitRequest>, StoreError>;
    /// Oldest first: by creation time, then by ID, ascending.
    async fn list_recruits(
        &self,
        filter: &RecruitFilter,
    ) -> Result<Vec<RecruitRequest>, StoreError>;
    async fn update_recruit(
        &self,
        id: &str,
        patch: &RecruitPatch,
    ) -> Result<Transition<RecruitRequest>, StoreError>;

    /// Count of approved recruit requests per recruiter, in no particular order.
    async fn approved_counts(&self) -> Result<Vec<RankingEntry>, StoreError>;

    /// Inserts or reverses synthetic approved records for a recruiter.
    /// Returns how many records were inserted or reversed.
    ///
    /// Backends without aggregate query support don't implement this.
    async fn adjust_ranking(&self, _adjustment: &RankingAdjustment) -> Result<u64, StoreError> {
        Err(StoreError::Unsupported(
            "Manual ranking adjustments need the database backend.",
        ))
    }
}

/// Opens the backend chosen by the configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match config {
        StorageConfig::Sqlite { url } => Arc::new(SqliteStore::connect(url).await?),
        StorageConfig::JsonFiles { dir } => Arc::new(FileStore::open(dir).await?),
    };
    log::info!("Using the {} record store.", store.backend_name());
    Ok(store)
}
