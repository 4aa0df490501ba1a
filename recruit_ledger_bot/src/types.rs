use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Candidate ID placed on synthetic records created by manual ranking adjustments.
pub const MANUAL_ADJUSTMENT_CANDIDATE: &str = "manual_adjustment";

/// Current time, truncated to milliseconds so that it survives a round trip
/// through either backend unchanged.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Something the record store can keep, keyed by an opaque string ID.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of this kind of record, for logs.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Where a record was originally posted, so the messaging side can find it again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginRefs {
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
}

/// Input for [`BlacklistLedger::add_entry`].
///
/// [`BlacklistLedger::add_entry`]: crate::blacklist::BlacklistLedger::add_entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlacklistEntry {
    pub passport_id: String,
    pub display_name: String,
    pub reason: String,
    pub author_id: String,
    pub origin: OriginRefs,
}

/// A flagged individual, identified by their passport ID.
///
/// Entries are never deleted. Removal is a one-time soft delete that fills
/// `removed_by`, `removed_at` and `remove_reason` together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub id: String,
    pub passport_id: String,
    pub display_name: String,
    pub reason: String,
    pub author_id: String,
    pub origin_guild_id: String,
    pub origin_channel_id: String,
    pub origin_message_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub removed_by: Option<String>,
    #[serde(default)]
    pub removed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remove_reason: Option<String>,
}

impl BlacklistEntry {
    #[must_use]
    pub fn new(id: String, new: NewBlacklistEntry, created_at: DateTime<Utc>) -> Self {
        BlacklistEntry {
            id,
            passport_id: new.passport_id,
            display_name: new.display_name,
            reason: new.reason,
            author_id: new.author_id,
            origin_guild_id: new.origin.guild_id,
            origin_channel_id: new.origin.channel_id,
            origin_message_id: new.origin.message_id,
            created_at,
            removed: false,
            removed_by: None,
            removed_at: None,
            remove_reason: None,
        }
    }

    /// True if this entry was not removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// Applies the patch if its precondition holds for this entry.
    /// Returns `false`, leaving the entry untouched, if it doesn't.
    pub fn apply(&mut self, patch: &BlacklistPatch) -> bool {
        if !patch.allows(self) {
            return false;
        }
        match patch {
            BlacklistPatch::Remove { by, at, reason } => {
                self.removed = true;
                self.removed_by = Some(by.clone());
                self.removed_at = Some(*at);
                self.remove_reason = Some(reason.clone());
            }
        }
        true
    }
}

impl Record for BlacklistEntry {
    const KIND: &'static str = "blacklist entry";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A conditional change to a [`BlacklistEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlacklistPatch {
    /// Soft-remove the entry. Only allowed while it is still active.
    Remove {
        by: String,
        at: DateTime<Utc>,
        reason: String,
    },
}

impl BlacklistPatch {
    #[must_use]
    pub fn allows(&self, entry: &BlacklistEntry) -> bool {
        match self {
            BlacklistPatch::Remove { .. } => !entry.removed,
        }
    }
}

/// State of a [`RecruitRequest`]. Both non-pending states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecruitStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecruitStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecruitStatus::Pending => "pending",
            RecruitStatus::Approved => "approved",
            RecruitStatus::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != RecruitStatus::Pending
    }
}

impl Display for RecruitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recruit status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for RecruitStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecruitStatus::Pending),
            "approved" => Ok(RecruitStatus::Approved),
            "rejected" => Ok(RecruitStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Blacklist status of a candidate's passport, frozen at intake time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlacklistSnapshot {
    pub flagged: bool,
    pub reason: Option<String>,
}

impl BlacklistSnapshot {
    #[must_use]
    pub fn from_entry(entry: Option<&BlacklistEntry>) -> Self {
        match entry {
            Some(entry) => BlacklistSnapshot {
                flagged: true,
                reason: Some(entry.reason.clone()),
            },
            None => BlacklistSnapshot::default(),
        }
    }
}

/// Answers about the recruit's first in-game activities, given on approval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstActivities {
    pub race: Option<String>,
    pub farm: Option<String>,
    pub dismantle: Option<String>,
}

/// Input for [`RecruitPipeline::create`].
///
/// [`RecruitPipeline::create`]: crate::recruits::RecruitPipeline::create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecruit {
    /// Pre-generated ID, if the caller needed one before the record exists.
    pub id: Option<String>,
    pub recruiter_id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub phone: String,
    pub passport: String,
    pub approval_channel_id: Option<String>,
    pub approval_message_id: Option<String>,
}

/// A candidate's request to join, sponsored by a recruiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitRequest {
    pub id: String,
    pub recruiter_id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub phone: String,
    pub passport: String,
    pub status: RecruitStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<String>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reject_reason: Option<String>,
    #[serde(default)]
    pub blacklist_flag: bool,
    #[serde(default)]
    pub blacklist_reason: Option<String>,
    #[serde(default)]
    pub approval_channel_id: Option<String>,
    #[serde(default)]
    pub approval_message_id: Option<String>,
    #[serde(default)]
    pub first_race: Option<String>,
    #[serde(default)]
    pub first_farm: Option<String>,
    #[serde(default)]
    pub first_dismantle: Option<String>,
    #[serde(default)]
    pub kit_delivered: bool,
    #[serde(default)]
    pub kit_delivered_by: Option<String>,
    #[serde(default)]
    pub kit_delivered_at: Option<DateTime<Utc>>,
}

impl RecruitRequest {
    /// A fresh pending request.
    #[must_use]
    pub fn new(
        id: String,
        new: NewRecruit,
        snapshot: BlacklistSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        RecruitRequest {
            id,
            recruiter_id: new.recruiter_id,
            candidate_id: new.candidate_id,
            candidate_name: new.candidate_name,
            phone: new.phone,
            passport: new.passport,
            status: RecruitStatus::Pending,
            created_at,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            reject_reason: None,
            blacklist_flag: snapshot.flagged,
            blacklist_reason: snapshot.reason,
            approval_channel_id: new.approval_channel_id,
            approval_message_id: new.approval_message_id,
            first_race: None,
            first_farm: None,
            first_dismantle: None,
            kit_delivered: false,
            kit_delivered_by: None,
            kit_delivered_at: None,
        }
    }

    /// Applies the patch if its precondition holds for this request.
    /// Returns `false`, leaving the request untouched, if it doesn't.
    pub fn apply(&mut self, patch: &RecruitPatch) -> bool {
        if !patch.allows(self) {
            return false;
        }
        match patch {
            RecruitPatch::Approve { by, at, first } => {
                self.status = RecruitStatus::Approved;
                self.approved_by = Some(by.clone());
                self.approved_at = Some(*at);
                self.first_race.clone_from(&first.race);
                self.first_farm.clone_from(&first.farm);
                self.first_dismantle.clone_from(&first.dismantle);
            }
            RecruitPatch::Reject { by, at, reason } => {
                self.status = RecruitStatus::Rejected;
                self.rejected_by = Some(by.clone());
                self.rejected_at = Some(*at);
                self.reject_reason.clone_from(reason);
            }
            RecruitPatch::DeliverKit { by, at } => {
                self.kit_delivered = true;
                self.kit_delivered_by = Some(by.clone());
                self.kit_delivered_at = Some(*at);
            }
            RecruitPatch::AttachApprovalPost {
                channel_id,
                message_id,
            } => {
                self.approval_channel_id = Some(channel_id.clone());
                self.approval_message_id = Some(message_id.clone());
            }
        }
        true
    }
}

impl Record for RecruitRequest {
    const KIND: &'static str = "recruit request";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A conditional change to a [`RecruitRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecruitPatch {
    /// `pending -> approved`.
    Approve {
        by: String,
        at: DateTime<Utc>,
        first: FirstActivities,
    },
    /// `pending -> rejected`.
    Reject {
        by: String,
        at: DateTime<Utc>,
        reason: Option<String>,
    },
    /// Onboarding kit handed out. Approved requests only, once.
    DeliverKit { by: String, at: DateTime<Utc> },
    /// Remember where the approval post is. Always allowed.
    AttachApprovalPost {
        channel_id: String,
        message_id: String,
    },
}

impl RecruitPatch {
    #[must_use]
    pub fn allows(&self, request: &RecruitRequest) -> bool {
        match self {
            RecruitPatch::Approve { .. } | RecruitPatch::Reject { .. } => {
                request.status == RecruitStatus::Pending
            }
            RecruitPatch::DeliverKit { .. } => {
                request.status == RecruitStatus::Approved && !request.kit_delivered
            }
            RecruitPatch::AttachApprovalPost { .. } => true,
        }
    }
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<R> {
    /// The change was made. Contains the record as it is now.
    Applied(R),
    /// There is no record with this ID.
    NotFound,
    /// The record is in a state that doesn't allow this change.
    /// Contains the record as it is now, unchanged.
    InvalidTransition(R),
}

impl<R> Transition<R> {
    /// The updated record, if the change was made.
    pub fn applied(self) -> Option<R> {
        match self {
            Transition::Applied(r) => Some(r),
            _ => None,
        }
    }

    /// The record as it is now, whether or not it was changed.
    pub fn current(&self) -> Option<&R> {
        match self {
            Transition::Applied(r) | Transition::InvalidTransition(r) => Some(r),
            Transition::NotFound => None,
        }
    }
}

/// One line of the recruiter leaderboard. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RankingEntry {
    pub recruiter_id: String,
    pub total: u64,
}

/// A request to shift a recruiter's leaderboard total by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingAdjustment {
    pub recruiter_id: String,
    pub delta: i64,
    pub adjusted_by: String,
    pub at: DateTime<Utc>,
}

/// Result of a manual ranking adjustment, ready to be shown to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustResult {
    pub success: bool,
    pub message: String,
    /// How many records were inserted or reversed.
    pub changed: u64,
}

impl AdjustResult {
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        AdjustResult {
            success: false,
            message: message.into(),
            changed: 0,
        }
    }
}
