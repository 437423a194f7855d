//! Citizen reward tips.
//!
//! Tips about a suspect flow PENDING -> FORWARDED -> APPROVED -> PAID, with
//! rejection possible at either review stage. The payout amount is frozen
//! from the suspect's cached ranking score at the moment of approval, so
//! later score changes never move an approved bounty.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{parse_timestamp, parse_timestamp_opt};
use crate::ranking::RankingEngine;
use crate::roles::{Action, RoleAuthority};

/// Review state of a reward tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipStatus {
    Pending,
    Forwarded,
    Approved,
    Rejected,
    Paid,
}

impl TipStatus {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "FORWARDED" => Self::Forwarded,
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            "PAID" => Self::Paid,
            _ => Self::Pending,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Forwarded => "FORWARDED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Paid => "PAID",
        }
    }
}

/// A citizen's tip about a suspect.
#[derive(Debug, Clone, Serialize)]
pub struct RewardTip {
    pub id: String,
    pub suspect_id: i64,
    pub submitted_by: i64,
    pub description: String,
    pub status: TipStatus,
    pub amount: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RewardTip {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            suspect_id: row.get("suspect_id"),
            submitted_by: row.get("submitted_by"),
            description: row.get("description"),
            status: TipStatus::parse(row.get("status")),
            amount: row.get("amount"),
            reviewed_by: row.get("reviewed_by"),
            payout_reference: row.get("payout_reference"),
            created_at: parse_timestamp(row.get("created_at")),
            resolved_at: parse_timestamp_opt(row.get("resolved_at")),
        }
    }
}

/// Reward tip intake and review service.
pub struct RewardSystem {
    db: Arc<Database>,
    roles: Arc<RoleAuthority>,
}

impl RewardSystem {
    /// Create a new reward service.
    pub fn new(db: Arc<Database>, roles: Arc<RoleAuthority>) -> Self {
        Self { db, roles }
    }

    /// Any principal submits a tip about a known suspect.
    pub async fn submit_tip(
        &self,
        suspect_id: i64,
        informant_id: i64,
        description: &str,
    ) -> Result<RewardTip> {
        self.roles.require(informant_id, Action::SubmitTip).await?;
        if description.trim().is_empty() {
            return Err(PrecinctError::Validation(
                "tip description is required".to_string(),
            ));
        }
        self.db.require_suspect(suspect_id).await?;

        let tip_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO reward_tips (id, suspect_id, submitted_by, description, status,
                                      created_at)
             VALUES (?, ?, ?, ?, 'PENDING', ?)",
        )
        .bind(&tip_id)
        .bind(suspect_id)
        .bind(informant_id)
        .bind(description.trim())
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to submit tip: {}", e)))?;

        tracing::info!(tip_id = %tip_id, suspect_id = suspect_id, "Reward tip submitted");

        Ok(RewardTip {
            id: tip_id,
            suspect_id,
            submitted_by: informant_id,
            description: description.trim().to_string(),
            status: TipStatus::Pending,
            amount: None,
            reviewed_by: None,
            payout_reference: None,
            created_at: now,
            resolved_at: None,
        })
    }

    /// An officer forwards a pending tip to the detective tier.
    pub async fn forward_tip(&self, tip_id: &str, actor_id: i64) -> Result<RewardTip> {
        self.roles.require(actor_id, Action::ForwardTip).await?;
        let mut tip = self.require_tip(tip_id).await?;

        if tip.status != TipStatus::Pending {
            return Err(PrecinctError::PreconditionFailed(
                "tip has already been reviewed".to_string(),
            ));
        }

        let result =
            sqlx::query("UPDATE reward_tips SET status = 'FORWARDED' WHERE id = ? AND status = 'PENDING'")
                .bind(tip_id)
                .execute(self.db.pool())
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to forward tip: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(PrecinctError::PreconditionFailed(
                "tip has already been reviewed".to_string(),
            ));
        }

        tracing::info!(tip_id = %tip_id, actor_id = actor_id, "Tip forwarded");
        tip.status = TipStatus::Forwarded;
        Ok(tip)
    }

    /// A detective approves a forwarded tip, freezing the payout at the
    /// suspect's current reward.
    pub async fn approve_tip(&self, tip_id: &str, actor_id: i64) -> Result<RewardTip> {
        self.roles.require(actor_id, Action::ApproveTip).await?;
        let mut tip = self.require_tip(tip_id).await?;

        if tip.status != TipStatus::Forwarded {
            return Err(PrecinctError::PreconditionFailed(
                "tip must be forwarded before approval".to_string(),
            ));
        }

        let suspect = self.db.require_suspect(tip.suspect_id).await?;
        let amount = RankingEngine::reward_amount(suspect.cached_ranking_score);
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE reward_tips SET status = 'APPROVED', amount = ?, reviewed_by = ?,
                    resolved_at = ?
             WHERE id = ? AND status = 'FORWARDED'",
        )
        .bind(amount)
        .bind(actor_id)
        .bind(now.to_rfc3339())
        .bind(tip_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to approve tip: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(PrecinctError::PreconditionFailed(
                "tip has already been processed".to_string(),
            ));
        }

        tracing::info!(
            tip_id = %tip_id,
            suspect_id = tip.suspect_id,
            amount = amount,
            "Tip approved"
        );

        tip.status = TipStatus::Approved;
        tip.amount = Some(amount);
        tip.reviewed_by = Some(actor_id);
        tip.resolved_at = Some(now);
        Ok(tip)
    }

    /// Reject a tip at whichever review stage it stands in. Officers decide
    /// pending tips, detectives decide forwarded ones.
    pub async fn reject_tip(&self, tip_id: &str, actor_id: i64) -> Result<RewardTip> {
        let mut tip = self.require_tip(tip_id).await?;

        match tip.status {
            TipStatus::Pending => {
                self.roles.require(actor_id, Action::ForwardTip).await?;
            }
            TipStatus::Forwarded => {
                self.roles.require(actor_id, Action::ApproveTip).await?;
            }
            _ => {
                return Err(PrecinctError::PreconditionFailed(
                    "tip has already been resolved".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE reward_tips SET status = 'REJECTED', reviewed_by = ?, resolved_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(actor_id)
        .bind(now.to_rfc3339())
        .bind(tip_id)
        .bind(tip.status.as_str())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to reject tip: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(PrecinctError::PreconditionFailed(
                "tip has already been processed".to_string(),
            ));
        }

        tracing::info!(tip_id = %tip_id, actor_id = actor_id, "Tip rejected");

        tip.status = TipStatus::Rejected;
        tip.reviewed_by = Some(actor_id);
        tip.resolved_at = Some(now);
        Ok(tip)
    }

    /// Payment-provider callback confirming the bounty was paid out. Not
    /// role-gated.
    pub async fn confirm_payout(&self, tip_id: &str, payout_reference: &str) -> Result<RewardTip> {
        if payout_reference.trim().is_empty() {
            return Err(PrecinctError::Validation(
                "payout reference is required".to_string(),
            ));
        }
        let mut tip = self.require_tip(tip_id).await?;

        if tip.status != TipStatus::Approved {
            return Err(PrecinctError::PreconditionFailed(
                "tip is not approved for payout".to_string(),
            ));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE reward_tips SET status = 'PAID', payout_reference = ?, resolved_at = ?
             WHERE id = ? AND status = 'APPROVED'",
        )
        .bind(payout_reference.trim())
        .bind(now.to_rfc3339())
        .bind(tip_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to record payout: {}", e)))?;
        if result.rows_affected() == 0 {
            return Err(PrecinctError::PreconditionFailed(
                "tip has already been processed".to_string(),
            ));
        }

        tracing::info!(
            tip_id = %tip_id,
            reference = payout_reference.trim(),
            "Tip payout confirmed"
        );

        tip.status = TipStatus::Paid;
        tip.payout_reference = Some(payout_reference.trim().to_string());
        tip.resolved_at = Some(now);
        Ok(tip)
    }

    // ========== Reads ==========

    /// Get a tip by id.
    pub async fn get_tip(&self, tip_id: &str) -> Result<Option<RewardTip>> {
        let row = sqlx::query(
            "SELECT id, suspect_id, submitted_by, description, status, amount, reviewed_by,
                    payout_reference, created_at, resolved_at
             FROM reward_tips WHERE id = ?",
        )
        .bind(tip_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get tip: {}", e)))?;

        Ok(row.as_ref().map(RewardTip::from_row))
    }

    /// All tips submitted about one suspect, oldest first.
    pub async fn tips_for_suspect(&self, suspect_id: i64) -> Result<Vec<RewardTip>> {
        let rows = sqlx::query(
            "SELECT id, suspect_id, submitted_by, description, status, amount, reviewed_by,
                    payout_reference, created_at, resolved_at
             FROM reward_tips WHERE suspect_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(suspect_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to list tips: {}", e)))?;

        Ok(rows.iter().map(RewardTip::from_row).collect())
    }

    async fn require_tip(&self, tip_id: &str) -> Result<RewardTip> {
        self.get_tip(tip_id)
            .await?
            .ok_or_else(|| PrecinctError::NotFound {
                entity: "reward tip",
                id: tip_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cases::tests::{seed_roles, CITIZEN, DETECTIVE, OFFICER};
    use crate::database::Database;
    use crate::error::PrecinctError;
    use crate::rewards::{RewardSystem, TipStatus};
    use crate::roles::RoleAuthority;

    async fn test_rewards() -> (RewardSystem, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.expect("should create db"));
        let roles = Arc::new(RoleAuthority::new(db.clone()));
        seed_roles(&roles).await;
        (RewardSystem::new(db.clone(), roles), db)
    }

    async fn suspect_with_score(db: &Database, score: i64) -> i64 {
        let suspect = db.create_suspect("Target", None).await.expect("suspect");
        sqlx::query("UPDATE suspects SET cached_ranking_score = ? WHERE id = ?")
            .bind(score)
            .bind(suspect.id)
            .execute(db.pool())
            .await
            .expect("should set score");
        suspect.id
    }

    #[tokio::test]
    async fn tip_lifecycle_reaches_payout() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 3).await;

        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "Seen near the rail yard.")
            .await
            .expect("should submit");
        assert_eq!(tip.status, TipStatus::Pending);
        assert_eq!(tip.amount, None);

        let tip = rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect("should forward");
        assert_eq!(tip.status, TipStatus::Forwarded);

        let tip = rewards
            .approve_tip(&tip.id, DETECTIVE)
            .await
            .expect("should approve");
        assert_eq!(tip.status, TipStatus::Approved);
        assert_eq!(tip.amount, Some(60_000_000));
        assert_eq!(tip.reviewed_by, Some(DETECTIVE));

        let tip = rewards
            .confirm_payout(&tip.id, "PAY-88213")
            .await
            .expect("payment lands");
        assert_eq!(tip.status, TipStatus::Paid);
        assert_eq!(tip.payout_reference.as_deref(), Some("PAY-88213"));
    }

    #[tokio::test]
    async fn approved_amount_is_frozen() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 2).await;

        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "Works the night shift.")
            .await
            .expect("should submit");
        rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect("should forward");
        let approved = rewards
            .approve_tip(&tip.id, DETECTIVE)
            .await
            .expect("should approve");
        assert_eq!(approved.amount, Some(40_000_000));

        // The ranking moves on; the approved bounty does not
        sqlx::query("UPDATE suspects SET cached_ranking_score = 500 WHERE id = ?")
            .bind(suspect_id)
            .execute(db.pool())
            .await
            .expect("should bump score");

        let stored = rewards
            .get_tip(&tip.id)
            .await
            .expect("should read")
            .expect("tip exists");
        assert_eq!(stored.amount, Some(40_000_000));
    }

    #[tokio::test]
    async fn submission_requires_substance() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 1).await;

        let err = rewards
            .submit_tip(suspect_id, CITIZEN, "   ")
            .await
            .expect_err("blank description");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let err = rewards
            .submit_tip(9999, CITIZEN, "Ghost suspect.")
            .await
            .expect_err("unknown suspect");
        assert!(matches!(err, PrecinctError::NotFound { .. }));
    }

    #[tokio::test]
    async fn review_stages_are_ordered() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 1).await;
        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "Tip.")
            .await
            .expect("should submit");

        let err = rewards
            .approve_tip(&tip.id, DETECTIVE)
            .await
            .expect_err("not forwarded yet");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));

        let err = rewards
            .confirm_payout(&tip.id, "PAY-1")
            .await
            .expect_err("not approved yet");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));

        rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect("should forward");
        let err = rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect_err("already forwarded");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn rejection_respects_stage_ownership() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 1).await;

        // A pending tip belongs to the officer tier
        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "First tip.")
            .await
            .expect("should submit");
        let err = rewards
            .reject_tip(&tip.id, DETECTIVE)
            .await
            .expect_err("detective cannot reject pending");
        assert!(matches!(err, PrecinctError::Unauthorized { .. }));
        let rejected = rewards
            .reject_tip(&tip.id, OFFICER)
            .await
            .expect("officer rejects");
        assert_eq!(rejected.status, TipStatus::Rejected);
        assert_eq!(rejected.reviewed_by, Some(OFFICER));

        // A forwarded tip belongs to the detective tier
        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "Second tip.")
            .await
            .expect("should submit");
        rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect("should forward");
        let err = rewards
            .reject_tip(&tip.id, OFFICER)
            .await
            .expect_err("officer cannot reject forwarded");
        assert!(matches!(err, PrecinctError::Unauthorized { .. }));
        let rejected = rewards
            .reject_tip(&tip.id, DETECTIVE)
            .await
            .expect("detective rejects");
        assert_eq!(rejected.status, TipStatus::Rejected);

        // Resolved tips are settled
        let err = rewards
            .reject_tip(&tip.id, DETECTIVE)
            .await
            .expect_err("already resolved");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn payout_needs_a_reference() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 1).await;
        let tip = rewards
            .submit_tip(suspect_id, CITIZEN, "Tip.")
            .await
            .expect("should submit");
        rewards
            .forward_tip(&tip.id, OFFICER)
            .await
            .expect("should forward");
        rewards
            .approve_tip(&tip.id, DETECTIVE)
            .await
            .expect("should approve");

        let err = rewards
            .confirm_payout(&tip.id, "  ")
            .await
            .expect_err("blank reference");
        assert!(matches!(err, PrecinctError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_tips_are_not_found() {
        let (rewards, _db) = test_rewards().await;

        let err = rewards
            .forward_tip("no-such-tip", OFFICER)
            .await
            .expect_err("unknown tip");
        assert!(matches!(
            err,
            PrecinctError::NotFound {
                entity: "reward tip",
                ..
            }
        ));

        let missing = rewards.get_tip("no-such-tip").await.expect("should read");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn tips_are_listed_per_suspect() {
        let (rewards, db) = test_rewards().await;
        let suspect_id = suspect_with_score(&db, 1).await;
        let other_id = suspect_with_score(&db, 1).await;

        rewards
            .submit_tip(suspect_id, CITIZEN, "First.")
            .await
            .expect("should submit");
        rewards
            .submit_tip(suspect_id, CITIZEN, "Second.")
            .await
            .expect("should submit");
        rewards
            .submit_tip(other_id, CITIZEN, "Unrelated.")
            .await
            .expect("should submit");

        let tips = rewards
            .tips_for_suspect(suspect_id)
            .await
            .expect("should list");
        assert_eq!(tips.len(), 2);
        assert!(tips.iter().all(|t| t.suspect_id == suspect_id));
    }
}
