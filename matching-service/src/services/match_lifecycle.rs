//! Match upsert and status transitions
//!
//! Accepting a match feeds back into the interaction ledger as a top-rated
//! "like", so accepted pairs show up in collaborative filtering.

use matching_common::models::{InteractionType, MatchStatus, MatchType, UserInteraction, UserMatch, MAX_RATING};
use matching_common::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{MatchRepository, MatchStats};
use crate::services::InteractionLedger;

/// Context recorded on the interaction written when a match is accepted
pub const ACCEPTED_MATCH_CONTEXT: &str = "match accepted";

const MAX_NOTES_CHARS: usize = 500;

#[derive(Clone)]
pub struct MatchLifecycleManager {
    matches: MatchRepository,
    ledger: InteractionLedger,
}

impl MatchLifecycleManager {
    pub fn new(matches: MatchRepository, ledger: InteractionLedger) -> Self {
        Self { matches, ledger }
    }

    /// Create a pending match, or refresh the score of an existing one
    pub async fn process_match(
        &self,
        user_id: Uuid,
        matched_user_id: Uuid,
        score: f32,
        match_type: MatchType,
    ) -> Result<UserMatch> {
        if user_id == matched_user_id {
            return Err(Error::validation("matched_user_id", "cannot match a user with themselves"));
        }

        let user_match = self.matches.upsert(user_id, matched_user_id, score, match_type).await?;
        debug!(
            "Processed match {} -> {} (score {}, {})",
            user_id,
            matched_user_id,
            user_match.score,
            user_match.status.as_str()
        );
        Ok(user_match)
    }

    /// Move the (user, matched user) match to `status`
    pub async fn update_status(&self, user_id: Uuid, matched_user_id: Uuid, status: MatchStatus) -> Result<UserMatch> {
        let user_match = self
            .matches
            .get_by_pair(user_id, matched_user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("match {} -> {}", user_id, matched_user_id)))?;

        self.apply_status(user_match, status, None).await
    }

    /// Move a match to `status` on behalf of `caller`, who must own it
    pub async fn update_status_by_id(
        &self,
        caller: Uuid,
        match_id: Uuid,
        status: MatchStatus,
        notes: Option<String>,
    ) -> Result<UserMatch> {
        let user_match = self
            .matches
            .get(match_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("match {}", match_id)))?;

        if user_match.user_id != caller {
            return Err(Error::Forbidden(format!("match {} belongs to another user", match_id)));
        }

        self.apply_status(user_match, status, notes).await
    }

    async fn apply_status(
        &self,
        mut user_match: UserMatch,
        status: MatchStatus,
        notes: Option<String>,
    ) -> Result<UserMatch> {
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
            return Err(Error::validation("notes", format!("must be at most {} characters", MAX_NOTES_CHARS)));
        }

        loop {
            let expected = user_match.status;
            let changed = user_match.transition(status)?;
            let notes_changed = notes.is_some() && notes != user_match.notes;
            if notes_changed {
                user_match.notes = notes.clone();
            }
            if !changed && !notes_changed {
                return Ok(user_match);
            }

            let feedback = (changed && status == MatchStatus::Accepted).then(|| {
                UserInteraction::new(user_match.user_id, user_match.matched_user_id, InteractionType::Like, MAX_RATING)
                    .with_context(Some(ACCEPTED_MATCH_CONTEXT.to_string()))
            });

            if self.matches.update_status(&user_match, expected, feedback.as_ref()).await? {
                if changed {
                    info!(
                        "Match {} ({} -> {}) is now {}",
                        user_match.id,
                        user_match.user_id,
                        user_match.matched_user_id,
                        status.as_str()
                    );
                }
                if let Some(interaction) = &feedback {
                    self.ledger.after_commit(interaction).await?;
                }
                return Ok(user_match);
            }

            // Lost the race: decide again against the stored state
            debug!("Match {} changed concurrently, reloading", user_match.id);
            user_match = self
                .matches
                .get(user_match.id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("match {}", user_match.id)))?;
        }
    }

    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<UserMatch>> {
        self.matches.get(match_id).await
    }

    pub async fn match_for_pair(&self, user_id: Uuid, matched_user_id: Uuid) -> Result<Option<UserMatch>> {
        self.matches.get_by_pair(user_id, matched_user_id).await
    }

    pub async fn match_exists(&self, user_id: Uuid, matched_user_id: Uuid) -> Result<bool> {
        self.matches.exists_by_pair(user_id, matched_user_id).await
    }

    pub async fn matches_for_user(&self, user_id: Uuid) -> Result<Vec<UserMatch>> {
        self.matches.by_user(user_id).await
    }

    pub async fn matches_by_status(&self, user_id: Uuid, status: MatchStatus) -> Result<Vec<UserMatch>> {
        self.matches.by_user_and_status(user_id, status).await
    }

    pub async fn pending_matches(&self, user_id: Uuid, count: usize) -> Result<Vec<UserMatch>> {
        self.matches.pending(user_id, count).await
    }

    pub async fn high_score_matches(&self, user_id: Uuid, min_score: f32, count: usize) -> Result<Vec<UserMatch>> {
        if !(0.0..=1.0).contains(&min_score) {
            return Err(Error::validation("min_score", "must be within [0, 1]"));
        }
        self.matches.high_score(user_id, min_score, count).await
    }

    pub async fn match_stats(&self, user_id: Uuid) -> Result<MatchStats> {
        self.matches.stats(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InteractionRepository;
    use crate::services::recommendation_cache::CacheTtls;
    use crate::services::RecommendationCache;
    use matching_common::cache::MemoryCache;
    use matching_common::db::init::init_memory_database;
    use std::sync::Arc;

    async fn manager() -> (MatchLifecycleManager, InteractionLedger) {
        let pool = init_memory_database().await.expect("in-memory database");
        let cache = RecommendationCache::new(Arc::new(MemoryCache::new()), CacheTtls::default());
        let ledger = InteractionLedger::new(InteractionRepository::new(pool.clone()), cache);
        (MatchLifecycleManager::new(MatchRepository::new(pool), ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_process_match_twice_updates_score_only() {
        let (manager, _) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = manager.process_match(a, b, 0.3, MatchType::TagBased).await.unwrap();
        let second = manager.process_match(a, b, 0.8, MatchType::TagBased).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.score, 0.8);
        assert_eq!(manager.matches_for_user(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_match_rejected() {
        let (manager, _) = manager().await;
        let a = Uuid::new_v4();
        assert!(matches!(
            manager.process_match(a, a, 0.5, MatchType::Random).await,
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_records_like_feedback() {
        let (manager, ledger) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        let accepted = manager.update_status(a, b, MatchStatus::Accepted).await.unwrap();
        assert_eq!(accepted.status, MatchStatus::Accepted);
        assert!(accepted.last_interaction_at.is_some());

        let ratings = ledger.user_ratings(a).await.unwrap();
        assert_eq!(ratings.get(&b), Some(&5.0));

        let likes = ledger.interactions_by_type(a, InteractionType::Like).await.unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].context.as_deref(), Some(ACCEPTED_MATCH_CONTEXT));
    }

    #[tokio::test]
    async fn test_repeat_accept_is_noop() {
        let (manager, ledger) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        manager.update_status(a, b, MatchStatus::Accepted).await.unwrap();
        manager.update_status(a, b, MatchStatus::Accepted).await.unwrap();

        assert_eq!(ledger.interactions_for_pair(a, b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reject_writes_no_interaction() {
        let (manager, ledger) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        let rejected = manager.update_status(a, b, MatchStatus::Rejected).await.unwrap();
        assert!(rejected.last_interaction_at.is_some());
        assert!(ledger.interactions_for_user(a).await.unwrap().is_empty());

        let err = manager.update_status(a, b, MatchStatus::Accepted).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_pair_is_not_found() {
        let (manager, _) = manager().await;
        let err = manager
            .update_status(Uuid::new_v4(), Uuid::new_v4(), MatchStatus::Expired)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_by_id_checks_owner_and_stores_notes() {
        let (manager, _) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        let err = manager
            .update_status_by_id(b, m.id, MatchStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let cancelled = manager
            .update_status_by_id(a, m.id, MatchStatus::Cancelled, Some("moved away".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.notes.as_deref(), Some("moved away"));
        let stored = manager.get_match(m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Cancelled);
        assert_eq!(stored.notes.as_deref(), Some("moved away"));
    }

    #[tokio::test]
    async fn test_high_score_range_checked() {
        let (manager, _) = manager().await;
        assert!(manager.high_score_matches(Uuid::new_v4(), 1.5, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_accept_and_reject_settle_once() {
        let (manager, ledger) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        let (accept, reject) = tokio::join!(
            manager.update_status(a, b, MatchStatus::Accepted),
            manager.update_status(a, b, MatchStatus::Rejected)
        );

        let stored = manager.match_for_pair(a, b).await.unwrap().unwrap();
        let likes = ledger.interactions_for_pair(a, b).await.unwrap().len();
        match stored.status {
            MatchStatus::Accepted => {
                assert!(accept.is_ok());
                assert!(matches!(reject, Err(Error::Conflict(_))));
                assert_eq!(likes, 1);
            }
            MatchStatus::Rejected => {
                assert!(reject.is_ok());
                assert!(matches!(accept, Err(Error::Conflict(_))));
                assert_eq!(likes, 0, "a rejected match carries no accept feedback");
            }
            other => panic!("unexpected final status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_accepts_record_one_like() {
        let (manager, ledger) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.6, MatchType::Hybrid).await.unwrap();

        let (first, second) = tokio::join!(
            manager.update_status(a, b, MatchStatus::Accepted),
            manager.update_status(a, b, MatchStatus::Accepted)
        );

        assert_eq!(first.unwrap().status, MatchStatus::Accepted);
        assert_eq!(second.unwrap().status, MatchStatus::Accepted);
        assert_eq!(ledger.interactions_for_pair(a, b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_keeps_concurrent_score_refresh() {
        let (manager, _) = manager().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        manager.process_match(a, b, 0.2, MatchType::Hybrid).await.unwrap();

        let (accepted, refreshed) = tokio::join!(
            manager.update_status(a, b, MatchStatus::Accepted),
            manager.process_match(a, b, 0.9, MatchType::Hybrid)
        );
        accepted.unwrap();
        assert_eq!(refreshed.unwrap().score, 0.9);

        let stored = manager.match_for_pair(a, b).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Accepted);
        assert_eq!(stored.score, 0.9);
    }
}
