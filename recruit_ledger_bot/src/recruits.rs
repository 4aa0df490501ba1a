use std::sync::Arc;

use crate::{
    blacklist::ID_ATTEMPTS,
    ids::generate_id,
    store::{RecordStore, StoreError},
    types::{
        now, AdjustResult, BlacklistSnapshot, FirstActivities, NewRecruit, RankingAdjustment,
        RecruitPatch, RecruitRequest, Transition,
    },
};

/// Largest number of points one manual adjustment may add or remove.
pub const MAX_ADJUSTMENT: u64 = 1000;

/// Lifecycle of recruit requests: `pending`, then once `approved` or
/// `rejected`, plus the one-time kit delivery after approval.
#[derive(Clone)]
pub struct RecruitPipeline {
    store: Arc<dyn RecordStore>,
}

impl RecruitPipeline {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        RecruitPipeline { store }
    }

    /// An ID for a request that doesn't exist yet, so that the approval post
    /// can reference it before [`Self::create`] is called.
    #[must_use]
    pub fn new_id(&self) -> String {
        generate_id()
    }

    /// The request as it would be stored, without storing it. Lets the
    /// approval post go out first, carrying the ID that [`Self::create`] is
    /// then given.
    #[must_use]
    pub fn draft(&self, new: NewRecruit, snapshot: BlacklistSnapshot) -> RecruitRequest {
        let id = new.id.clone().unwrap_or_else(|| self.new_id());
        RecruitRequest::new(id, new, snapshot, now())
    }

    /// Stores a new pending request.
    ///
    /// `snapshot` is the candidate's blacklist status right now; it is kept
    /// as is and never looked at again. If `new.id` is set it is used as the
    /// ID, and fails with [`StoreError::DuplicateId`] if taken.
    pub async fn create(
        &self,
        new: NewRecruit,
        snapshot: BlacklistSnapshot,
    ) -> Result<RecruitRequest, StoreError> {
        let fixed_id = new.id.clone();
        let mut attempt = 1;
        loop {
            let id = fixed_id.clone().unwrap_or_else(generate_id);
            let request = RecruitRequest::new(id, new.clone(), snapshot.clone(), now());

            match self.store.insert_recruit(&request).await {
                Ok(()) => {
                    log::info!(
                        "Recruit request {} for {:?} created by recruiter {}{}",
                        request.id,
                        request.candidate_name,
                        request.recruiter_id,
                        if request.blacklist_flag {
                            " (blacklisted passport)"
                        } else {
                            ""
                        }
                    );
                    return Ok(request);
                }
                Err(StoreError::DuplicateId(id)) if fixed_id.is_none() && attempt < ID_ATTEMPTS => {
                    log::warn!("Generated recruit ID {id} was taken, trying another");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `pending -> approved`, with the answers about first activities.
    pub async fn approve(
        &self,
        id: &str,
        approved_by: &str,
        first: FirstActivities,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        let patch = RecruitPatch::Approve {
            by: approved_by.to_string(),
            at: now(),
            first,
        };
        self.transition(id, approved_by, "approve", &patch).await
    }

    /// `pending -> rejected`. A blank reason is stored as no reason.
    pub async fn reject(
        &self,
        id: &str,
        rejected_by: &str,
        reason: Option<&str>,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        let patch = RecruitPatch::Reject {
            by: rejected_by.to_string(),
            at: now(),
            reason: reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        };
        self.transition(id, rejected_by, "reject", &patch).await
    }

    /// Records the onboarding kit as handed out. Approved requests only, once.
    pub async fn mark_kit_delivered(
        &self,
        id: &str,
        delivered_by: &str,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        let patch = RecruitPatch::DeliverKit {
            by: delivered_by.to_string(),
            at: now(),
        };
        self.transition(id, delivered_by, "deliver the kit for", &patch)
            .await
    }

    /// Remembers where the approval post for this request lives.
    pub async fn attach_approval_post(
        &self,
        id: &str,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<RecruitRequest>, StoreError> {
        let patch = RecruitPatch::AttachApprovalPost {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        };
        Ok(self.store.update_recruit(id, &patch).await?.applied())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<RecruitRequest>, StoreError> {
        self.store.get_recruit(id).await
    }

    async fn transition(
        &self,
        id: &str,
        actor: &str,
        action: &str,
        patch: &RecruitPatch,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        let result = self.store.update_recruit(id, patch).await?;
        match &result {
            Transition::Applied(request) => log::info!(
                "Recruit request {id} updated by {actor} ({action}), status is now {}",
                request.status
            ),
            Transition::InvalidTransition(request) => log::warn!(
                "{actor} tried to {action} recruit request {id}, but it is {}{}",
                request.status,
                if request.kit_delivered {
                    " with the kit delivered"
                } else {
                    ""
                }
            ),
            Transition::NotFound => log::debug!("No recruit request {id} to {action}"),
        }
        Ok(result)
    }

    /// Shifts a recruiter's leaderboard total by `delta` by inserting or
    /// reversing synthetic approved records. Never fails with an error;
    /// problems come back as an unsuccessful [`AdjustResult`].
    pub async fn adjust_ranking_points(
        &self,
        recruiter_id: &str,
        delta: i64,
        adjusted_by: &str,
    ) -> AdjustResult {
        if delta == 0 {
            return AdjustResult::failure("Quantity must be non-zero.");
        }
        let requested = delta.unsigned_abs();
        if requested > MAX_ADJUSTMENT {
            return AdjustResult::failure(format!(
                "Quantity can be at most {MAX_ADJUSTMENT} at a time."
            ));
        }

        let adjustment = RankingAdjustment {
            recruiter_id: recruiter_id.to_string(),
            delta,
            adjusted_by: adjusted_by.to_string(),
            at: now(),
        };

        let changed = match self.store.adjust_ranking(&adjustment).await {
            Ok(changed) => changed,
            Err(StoreError::Unsupported(message)) => return AdjustResult::failure(message),
            Err(e) => {
                log::error!("Failed to adjust ranking of {recruiter_id} by {delta}: {e}");
                return AdjustResult::failure(format!("Could not adjust the ranking: {e}"));
            }
        };

        log::info!(
            "{adjusted_by} adjusted ranking of {recruiter_id} by {delta}, {changed} records changed"
        );

        let message = if delta > 0 {
            format!("Added {changed} point(s) to the recruiter.")
        } else if changed == 0 {
            return AdjustResult::failure("The recruiter has no approved recruits to remove.");
        } else if changed < requested {
            format!(
                "Only {changed} of {requested} point(s) could be removed, the recruiter had no more."
            )
        } else {
            format!("Removed {changed} point(s) from the recruiter.")
        };

        AdjustResult {
            success: true,
            message,
            changed,
        }
    }
}
