//! Interrogation escalation chain.
//!
//! Opening suspects on a case, the two-score assessment, the
//! sergeant/captain/chief verdict tiers and bail handling. The case and its
//! interrogation move in lock-step, and every transition recomputes the
//! suspect's ranking once committed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::audit;
use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{CaseStatus, Interrogation, InterrogationStatus, ReviewAction, SuspectStatus};
use crate::ranking::RankingEngine;
use crate::roles::{Action, Role, RoleAuthority};

/// Lowest admissible assessment score.
pub const MIN_SCORE: i64 = 1;

/// Highest admissible assessment score.
pub const MAX_SCORE: i64 = 10;

/// Suspect reference when opening an interrogation: an already-known
/// suspect, or a new one registered on the spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspectTarget {
    Existing { suspect_id: i64 },
    New { alias: String, person_id: Option<i64> },
}

/// Interrogation workflow service.
pub struct InterrogationSystem {
    db: Arc<Database>,
    roles: Arc<RoleAuthority>,
    ranking: Arc<RankingEngine>,
}

impl InterrogationSystem {
    /// Create a new interrogation workflow service.
    pub fn new(db: Arc<Database>, roles: Arc<RoleAuthority>, ranking: Arc<RankingEngine>) -> Self {
        Self { db, roles, ranking }
    }

    // ========== Opening ==========

    /// The assigned detective opens an interrogation on a case under
    /// investigation. Each suspect appears at most once per case.
    pub async fn open_interrogation(
        &self,
        case_id: i64,
        actor_id: i64,
        target: &SuspectTarget,
    ) -> Result<Interrogation> {
        self.roles
            .require(actor_id, Action::OpenInterrogation)
            .await?;
        let case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::Investigation {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::OpenInterrogation.as_str().to_string(),
            });
        }
        if case.assigned_detective != Some(actor_id) {
            return Err(PrecinctError::PreconditionFailed(
                "case is assigned to another detective".to_string(),
            ));
        }

        let suspect = match target {
            SuspectTarget::Existing { suspect_id } => self.db.require_suspect(*suspect_id).await?,
            SuspectTarget::New { alias, person_id } => {
                if alias.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "suspect alias is required".to_string(),
                    ));
                }
                self.db.create_suspect(alias.trim(), *person_id).await?
            }
        };

        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM interrogations WHERE case_id = ? AND suspect_id = ?",
        )
        .bind(case_id)
        .bind(suspect.id)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to check interrogations: {}", e)))?;
        let existing: i64 = row.get("count");
        if existing > 0 {
            return Err(PrecinctError::PreconditionFailed(
                "suspect is already under interrogation for this case".to_string(),
            ));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO interrogations (case_id, suspect_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(case_id)
        .bind(suspect.id)
        .bind(InterrogationStatus::WaitingForSergeant.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to open interrogation: {}", e)))?;

        let interrogation_id = result.last_insert_rowid();
        tracing::info!(
            case_id = case_id,
            suspect_id = suspect.id,
            interrogation_id = interrogation_id,
            "Interrogation opened"
        );

        self.ranking.recompute(suspect.id).await?;

        Ok(Interrogation {
            id: interrogation_id,
            case_id,
            suspect_id: suspect.id,
            status: InterrogationStatus::WaitingForSergeant,
            detective_score: None,
            sergeant_score: None,
            sergeant_notes: None,
            captain_approved: None,
            captain_notes: None,
            chief_approved: None,
            chief_notes: None,
            bail_amount: None,
            released_on_bail: false,
            created_at: now,
            updated_at: now,
        })
    }

    // ========== Scoring ==========

    /// Record the detective's or sergeant's assessment score.
    ///
    /// Scores may be submitted while waiting for the sergeant or during the
    /// interrogation itself; re-submission overwrites the submitter's own
    /// prior score. When the second score lands during INTERROGATION, both
    /// the interrogation and its case advance to WAITING_FOR_CAPTAIN.
    pub async fn submit_score(
        &self,
        interrogation_id: i64,
        actor_id: i64,
        score: i64,
    ) -> Result<Interrogation> {
        let role = self.roles.require(actor_id, Action::SubmitScore).await?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(PrecinctError::Validation(format!(
                "score must be between {} and {}",
                MIN_SCORE, MAX_SCORE
            )));
        }

        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;
        if !matches!(
            interrogation.status,
            InterrogationStatus::WaitingForSergeant | InterrogationStatus::Interrogation
        ) {
            return Err(PrecinctError::InvalidTransition {
                current: interrogation.status.as_str().to_string(),
                attempted: Action::SubmitScore.as_str().to_string(),
            });
        }

        let case = self.db.require_case(interrogation.case_id).await?;
        if case.status.is_terminal() {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::SubmitScore.as_str().to_string(),
            });
        }
        let is_detective = role == Role::Detective;

        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let query = if is_detective {
            "UPDATE interrogations SET detective_score = ?, updated_at = ? WHERE id = ? AND status = ?"
        } else {
            "UPDATE interrogations SET sergeant_score = ?, updated_at = ? WHERE id = ? AND status = ?"
        };
        let result = sqlx::query(query)
            .bind(score)
            .bind(now.to_rfc3339())
            .bind(interrogation_id)
            .bind(interrogation.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to record score: {}", e)))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "interrogation",
                id: interrogation_id,
            });
        }

        if is_detective {
            interrogation.detective_score = Some(score);
        } else {
            interrogation.sergeant_score = Some(score);
        }
        interrogation.updated_at = now;

        // Second score during the interrogation escalates to the captain
        let advance = interrogation.status == InterrogationStatus::Interrogation
            && interrogation.has_both_scores();
        if advance {
            let result = sqlx::query(
                "UPDATE interrogations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(InterrogationStatus::WaitingForCaptain.as_str())
            .bind(now.to_rfc3339())
            .bind(interrogation_id)
            .bind(interrogation.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PrecinctError::Database(format!("Failed to update interrogation: {}", e))
            })?;
            if result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
                return Err(PrecinctError::ConcurrencyConflict {
                    entity: "interrogation",
                    id: interrogation_id,
                });
            }

            let result = sqlx::query(
                "UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(CaseStatus::WaitingForCaptain.as_str())
            .bind(now.to_rfc3339())
            .bind(case.id)
            .bind(case.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to update case: {}", e)))?;
            if result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
                return Err(PrecinctError::ConcurrencyConflict {
                    entity: "case",
                    id: case.id,
                });
            }

            audit::record(
                &mut tx,
                case.id,
                Some(case.status),
                CaseStatus::WaitingForCaptain,
                actor_id,
                "Both scores recorded. Escalated to captain.",
            )
            .await?;

            interrogation.status = InterrogationStatus::WaitingForCaptain;
        }

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit score: {}", e)))?;

        tracing::info!(
            interrogation_id = interrogation_id,
            by_detective = is_detective,
            score = score,
            escalated = advance,
            "Assessment score recorded"
        );

        Ok(interrogation)
    }

    // ========== Verdict tiers ==========

    /// Sergeant review of a submitted suspect file.
    ///
    /// Approval opens the interrogation proper and arrests the suspect.
    /// Rejection sends the case back to investigation for revision while the
    /// interrogation record stays queued for the sergeant.
    pub async fn sergeant_verdict(
        &self,
        interrogation_id: i64,
        actor_id: i64,
        action: ReviewAction,
        notes: &str,
    ) -> Result<Interrogation> {
        self.roles
            .require(actor_id, Action::SergeantVerdict)
            .await?;
        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;

        if interrogation.status != InterrogationStatus::WaitingForSergeant {
            return Err(PrecinctError::InvalidTransition {
                current: interrogation.status.as_str().to_string(),
                attempted: Action::SergeantVerdict.as_str().to_string(),
            });
        }

        let case = self.db.require_case(interrogation.case_id).await?;
        if case.status.is_terminal() {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::SergeantVerdict.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let stored_notes = Some(notes.trim()).filter(|n| !n.is_empty());

        match action {
            ReviewAction::Approve => {
                let mut tx = self.db.pool().begin().await.map_err(|e| {
                    PrecinctError::Database(format!("Failed to begin transaction: {}", e))
                })?;

                let result = sqlx::query(
                    "UPDATE interrogations SET status = ?, sergeant_notes = ?, updated_at = ?
                     WHERE id = ? AND status = ?",
                )
                .bind(InterrogationStatus::Interrogation.as_str())
                .bind(stored_notes)
                .bind(now.to_rfc3339())
                .bind(interrogation_id)
                .bind(interrogation.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    PrecinctError::Database(format!("Failed to update interrogation: {}", e))
                })?;
                if result.rows_affected() == 0 {
                    tx.rollback().await.map_err(|e| {
                        PrecinctError::Database(format!("Failed to roll back: {}", e))
                    })?;
                    return Err(PrecinctError::ConcurrencyConflict {
                        entity: "interrogation",
                        id: interrogation_id,
                    });
                }

                let result = sqlx::query(
                    "UPDATE cases SET status = ?, assigned_sergeant = ?, updated_at = ?
                     WHERE id = ? AND status = ?",
                )
                .bind(CaseStatus::Interrogation.as_str())
                .bind(actor_id)
                .bind(now.to_rfc3339())
                .bind(case.id)
                .bind(case.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to update case: {}", e)))?;
                if result.rows_affected() == 0 {
                    tx.rollback().await.map_err(|e| {
                        PrecinctError::Database(format!("Failed to roll back: {}", e))
                    })?;
                    return Err(PrecinctError::ConcurrencyConflict {
                        entity: "case",
                        id: case.id,
                    });
                }

                // Custody follows approval unless a court already decided
                sqlx::query(
                    "UPDATE suspects SET status = 'ARRESTED'
                     WHERE id = ? AND status NOT IN ('CONVICTED', 'ACQUITTED')",
                )
                .bind(interrogation.suspect_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to arrest suspect: {}", e)))?;

                audit::record(
                    &mut tx,
                    case.id,
                    Some(case.status),
                    CaseStatus::Interrogation,
                    actor_id,
                    "Sergeant approved. Interrogation opened; suspect arrested.",
                )
                .await?;

                tx.commit().await.map_err(|e| {
                    PrecinctError::Database(format!("Failed to commit verdict: {}", e))
                })?;

                interrogation.status = InterrogationStatus::Interrogation;
                interrogation.sergeant_notes = stored_notes.map(str::to_string);
                interrogation.updated_at = now;

                tracing::info!(
                    interrogation_id = interrogation_id,
                    case_id = case.id,
                    suspect_id = interrogation.suspect_id,
                    "Sergeant approved suspect file"
                );
            }
            ReviewAction::Reject => {
                if stored_notes.is_none() {
                    return Err(PrecinctError::Validation(
                        "rejection notes are required".to_string(),
                    ));
                }

                let mut tx = self.db.pool().begin().await.map_err(|e| {
                    PrecinctError::Database(format!("Failed to begin transaction: {}", e))
                })?;

                sqlx::query(
                    "UPDATE interrogations SET sergeant_notes = ?, updated_at = ? WHERE id = ?",
                )
                .bind(stored_notes)
                .bind(now.to_rfc3339())
                .bind(interrogation_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    PrecinctError::Database(format!("Failed to update interrogation: {}", e))
                })?;

                let result = sqlx::query(
                    "UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                )
                .bind(CaseStatus::Investigation.as_str())
                .bind(now.to_rfc3339())
                .bind(case.id)
                .bind(case.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to update case: {}", e)))?;
                if result.rows_affected() == 0 {
                    tx.rollback().await.map_err(|e| {
                        PrecinctError::Database(format!("Failed to roll back: {}", e))
                    })?;
                    return Err(PrecinctError::ConcurrencyConflict {
                        entity: "case",
                        id: case.id,
                    });
                }

                let audit_message = format!(
                    "Sergeant rejected: {}. Case returned to investigation.",
                    notes.trim()
                );
                audit::record(
                    &mut tx,
                    case.id,
                    Some(case.status),
                    CaseStatus::Investigation,
                    actor_id,
                    &audit_message,
                )
                .await?;

                tx.commit().await.map_err(|e| {
                    PrecinctError::Database(format!("Failed to commit verdict: {}", e))
                })?;

                interrogation.sergeant_notes = stored_notes.map(str::to_string);
                interrogation.updated_at = now;

                tracing::info!(
                    interrogation_id = interrogation_id,
                    case_id = case.id,
                    "Sergeant rejected suspect file"
                );
            }
        }

        self.ranking.recompute(interrogation.suspect_id).await?;
        Ok(interrogation)
    }

    /// Captain review after both scores are in. Approval routes critical
    /// cases to the chief and everything else straight to court; rejection
    /// closes both the interrogation and the case.
    pub async fn captain_verdict(
        &self,
        interrogation_id: i64,
        actor_id: i64,
        action: ReviewAction,
        notes: &str,
    ) -> Result<Interrogation> {
        self.roles.require(actor_id, Action::CaptainVerdict).await?;
        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;

        if interrogation.status != InterrogationStatus::WaitingForCaptain {
            return Err(PrecinctError::InvalidTransition {
                current: interrogation.status.as_str().to_string(),
                attempted: Action::CaptainVerdict.as_str().to_string(),
            });
        }

        let case = self.db.require_case(interrogation.case_id).await?;
        if case.status.is_terminal() {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::CaptainVerdict.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let stored_notes = Some(notes.trim()).filter(|n| !n.is_empty());

        let (next_interrogation, next_case, approved, audit_message) = match action {
            ReviewAction::Approve => {
                if case.is_critical() {
                    (
                        InterrogationStatus::WaitingForChief,
                        CaseStatus::WaitingForChief,
                        true,
                        "Captain approved. Escalated to chief.".to_string(),
                    )
                } else {
                    (
                        InterrogationStatus::InCourt,
                        CaseStatus::InCourt,
                        true,
                        "Captain approved. Sent to court.".to_string(),
                    )
                }
            }
            ReviewAction::Reject => {
                if stored_notes.is_none() {
                    return Err(PrecinctError::Validation(
                        "rejection notes are required".to_string(),
                    ));
                }
                (
                    InterrogationStatus::ClosedRejected,
                    CaseStatus::ClosedRejected,
                    false,
                    format!("Captain rejected: {}. Case closed.", notes.trim()),
                )
            }
        };

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "UPDATE interrogations SET status = ?, captain_approved = ?, captain_notes = ?,
                    updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next_interrogation.as_str())
        .bind(approved as i64)
        .bind(stored_notes)
        .bind(now.to_rfc3339())
        .bind(interrogation_id)
        .bind(interrogation.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to update interrogation: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "interrogation",
                id: interrogation_id,
            });
        }

        let result =
            sqlx::query("UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(next_case.as_str())
                .bind(now.to_rfc3339())
                .bind(case.id)
                .bind(case.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to update case: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "case",
                id: case.id,
            });
        }

        audit::record(
            &mut tx,
            case.id,
            Some(case.status),
            next_case,
            actor_id,
            &audit_message,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit verdict: {}", e)))?;

        interrogation.status = next_interrogation;
        interrogation.captain_approved = Some(approved);
        interrogation.captain_notes = stored_notes.map(str::to_string);
        interrogation.updated_at = now;

        tracing::info!(
            interrogation_id = interrogation_id,
            case_id = case.id,
            approved = approved,
            next = next_interrogation.as_str(),
            "Captain verdict recorded"
        );

        self.ranking.recompute(interrogation.suspect_id).await?;
        Ok(interrogation)
    }

    /// Chief review, required for critical cases only. Approval sends the
    /// interrogation to court; rejection closes both entities.
    pub async fn chief_verdict(
        &self,
        interrogation_id: i64,
        actor_id: i64,
        action: ReviewAction,
        notes: &str,
    ) -> Result<Interrogation> {
        self.roles.require(actor_id, Action::ChiefVerdict).await?;
        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;
        let case = self.db.require_case(interrogation.case_id).await?;

        if case.status.is_terminal() {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::ChiefVerdict.as_str().to_string(),
            });
        }
        if !case.is_critical() {
            return Err(PrecinctError::PreconditionFailed(
                "only critical cases require a chief verdict".to_string(),
            ));
        }
        if interrogation.status != InterrogationStatus::WaitingForChief {
            return Err(PrecinctError::InvalidTransition {
                current: interrogation.status.as_str().to_string(),
                attempted: Action::ChiefVerdict.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let stored_notes = Some(notes.trim()).filter(|n| !n.is_empty());

        let (next_interrogation, next_case, approved, audit_message) = match action {
            ReviewAction::Approve => (
                InterrogationStatus::InCourt,
                CaseStatus::InCourt,
                true,
                "Chief approved. Sent to court.".to_string(),
            ),
            ReviewAction::Reject => {
                if stored_notes.is_none() {
                    return Err(PrecinctError::Validation(
                        "rejection notes are required".to_string(),
                    ));
                }
                (
                    InterrogationStatus::ClosedRejected,
                    CaseStatus::ClosedRejected,
                    false,
                    format!("Chief rejected: {}. Case closed.", notes.trim()),
                )
            }
        };

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "UPDATE interrogations SET status = ?, chief_approved = ?, chief_notes = ?,
                    updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next_interrogation.as_str())
        .bind(approved as i64)
        .bind(stored_notes)
        .bind(now.to_rfc3339())
        .bind(interrogation_id)
        .bind(interrogation.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to update interrogation: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "interrogation",
                id: interrogation_id,
            });
        }

        let result =
            sqlx::query("UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(next_case.as_str())
                .bind(now.to_rfc3339())
                .bind(case.id)
                .bind(case.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to update case: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "case",
                id: case.id,
            });
        }

        audit::record(
            &mut tx,
            case.id,
            Some(case.status),
            next_case,
            actor_id,
            &audit_message,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit verdict: {}", e)))?;

        interrogation.status = next_interrogation;
        interrogation.chief_approved = Some(approved);
        interrogation.chief_notes = stored_notes.map(str::to_string);
        interrogation.updated_at = now;

        tracing::info!(
            interrogation_id = interrogation_id,
            case_id = case.id,
            approved = approved,
            "Chief verdict recorded"
        );

        self.ranking.recompute(interrogation.suspect_id).await?;
        Ok(interrogation)
    }

    // ========== Bail ==========

    /// The sergeant sets a bail amount for an arrested suspect while the
    /// interrogation is in progress.
    pub async fn grant_bail(
        &self,
        interrogation_id: i64,
        actor_id: i64,
        amount: i64,
    ) -> Result<Interrogation> {
        self.roles.require(actor_id, Action::GrantBail).await?;
        if amount <= 0 {
            return Err(PrecinctError::Validation(
                "bail amount must be positive".to_string(),
            ));
        }

        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;
        if interrogation.status != InterrogationStatus::Interrogation {
            return Err(PrecinctError::PreconditionFailed(
                "bail can only be granted during an interrogation".to_string(),
            ));
        }
        if interrogation.released_on_bail {
            return Err(PrecinctError::PreconditionFailed(
                "suspect has already been released on bail".to_string(),
            ));
        }

        let suspect = self.db.require_suspect(interrogation.suspect_id).await?;
        if suspect.status != SuspectStatus::Arrested {
            return Err(PrecinctError::PreconditionFailed(
                "suspect is not in custody".to_string(),
            ));
        }

        let now = Utc::now();
        sqlx::query("UPDATE interrogations SET bail_amount = ?, updated_at = ? WHERE id = ?")
            .bind(amount)
            .bind(now.to_rfc3339())
            .bind(interrogation_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to grant bail: {}", e)))?;

        tracing::info!(
            interrogation_id = interrogation_id,
            suspect_id = suspect.id,
            amount = amount,
            "Bail granted"
        );

        interrogation.bail_amount = Some(amount);
        interrogation.updated_at = now;
        Ok(interrogation)
    }

    /// Payment-provider callback confirming a bail payment against an
    /// external reference. Releases the suspect from custody. Not role-gated.
    pub async fn confirm_bail_payment(
        &self,
        interrogation_id: i64,
        reference: &str,
    ) -> Result<Interrogation> {
        if reference.trim().is_empty() {
            return Err(PrecinctError::Validation(
                "payment reference is required".to_string(),
            ));
        }
        let mut interrogation = self.db.require_interrogation(interrogation_id).await?;

        if interrogation.bail_amount.is_none() {
            return Err(PrecinctError::PreconditionFailed(
                "no bail has been granted".to_string(),
            ));
        }
        if interrogation.released_on_bail {
            return Err(PrecinctError::PreconditionFailed(
                "bail has already been paid".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "UPDATE interrogations SET released_on_bail = 1, updated_at = ?
             WHERE id = ? AND released_on_bail = 0",
        )
        .bind(now.to_rfc3339())
        .bind(interrogation_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to record payment: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "interrogation",
                id: interrogation_id,
            });
        }

        let result = sqlx::query(
            "UPDATE suspects SET status = 'RELEASED_ON_BAIL' WHERE id = ? AND status = 'ARRESTED'",
        )
        .bind(interrogation.suspect_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to release suspect: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "suspect",
                id: interrogation.suspect_id,
            });
        }

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit payment: {}", e)))?;

        tracing::info!(
            interrogation_id = interrogation_id,
            suspect_id = interrogation.suspect_id,
            reference = reference.trim(),
            "Bail paid, suspect released"
        );

        interrogation.released_on_bail = true;
        interrogation.updated_at = now;
        Ok(interrogation)
    }

    // ========== Reads ==========

    /// Get an interrogation by id, failing with NotFound when absent.
    pub async fn get_interrogation(&self, interrogation_id: i64) -> Result<Interrogation> {
        self.db.require_interrogation(interrogation_id).await
    }

    /// All interrogations opened on a case.
    pub async fn for_case(&self, case_id: i64) -> Result<Vec<Interrogation>> {
        let rows = sqlx::query(
            "SELECT id, case_id, suspect_id, status, detective_score, sergeant_score,
                    sergeant_notes, captain_approved, captain_notes, chief_approved, chief_notes,
                    bail_amount, released_on_bail, created_at, updated_at
             FROM interrogations WHERE case_id = ? ORDER BY id ASC",
        )
        .bind(case_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to load interrogations: {}", e)))?;

        Ok(rows.iter().map(Interrogation::from_row).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use crate::cases::tests::{seed_roles, CAPTAIN, CHIEF, DETECTIVE, SERGEANT};
    use crate::cases::CaseSystem;
    use crate::database::Database;
    use crate::error::PrecinctError;
    use crate::interrogation::{InterrogationSystem, SuspectTarget};
    use crate::models::{
        CaseDraft, CaseStatus, FormationType, Interrogation, InterrogationStatus, ReviewAction,
        SuspectStatus,
    };
    use crate::ranking::RankingEngine;
    use crate::roles::{Role, RoleAuthority};

    pub(crate) struct Precinct {
        pub cases: CaseSystem,
        pub interrogations: InterrogationSystem,
        pub db: Arc<Database>,
    }

    pub(crate) async fn test_precinct() -> Precinct {
        let db = Arc::new(Database::in_memory().await.expect("should create db"));
        let roles = Arc::new(RoleAuthority::new(db.clone()));
        seed_roles(&roles).await;
        let ranking = Arc::new(RankingEngine::new(db.clone()));
        Precinct {
            cases: CaseSystem::new(db.clone(), roles.clone()).expect("should build cases"),
            interrogations: InterrogationSystem::new(db.clone(), roles, ranking),
            db,
        }
    }

    fn scene_draft(crime_level: i64) -> CaseDraft {
        CaseDraft {
            title: "Armored car heist".to_string(),
            description: "Crew of three, armed.".to_string(),
            crime_level,
            formation_type: FormationType::CrimeScene,
            crime_occurred_at: Some(chrono::Utc::now()),
            crime_scene_location: Some("Route 9 underpass".to_string()),
            witnesses: Vec::new(),
        }
    }

    pub(crate) async fn case_under_investigation(precinct: &Precinct, crime_level: i64) -> i64 {
        let case = precinct
            .cases
            .file_case(CHIEF, &scene_draft(crime_level))
            .await
            .expect("should file");
        precinct
            .cases
            .begin_investigation(case.id, DETECTIVE)
            .await
            .expect("should investigate");
        case.id
    }

    pub(crate) async fn interrogation_waiting_for_sergeant(
        precinct: &Precinct,
        crime_level: i64,
    ) -> Interrogation {
        let case_id = case_under_investigation(precinct, crime_level).await;
        let interrogation = precinct
            .interrogations
            .open_interrogation(
                case_id,
                DETECTIVE,
                &SuspectTarget::New {
                    alias: "Cutter".to_string(),
                    person_id: None,
                },
            )
            .await
            .expect("should open");
        precinct
            .cases
            .submit_to_sergeant(case_id, DETECTIVE)
            .await
            .expect("should submit");
        interrogation
    }

    pub(crate) async fn interrogation_in_progress(
        precinct: &Precinct,
        crime_level: i64,
    ) -> Interrogation {
        let interrogation = interrogation_waiting_for_sergeant(precinct, crime_level).await;
        precinct
            .interrogations
            .sergeant_verdict(interrogation.id, SERGEANT, ReviewAction::Approve, "")
            .await
            .expect("should approve")
    }

    pub(crate) async fn interrogation_before_captain(
        precinct: &Precinct,
        crime_level: i64,
    ) -> Interrogation {
        let interrogation = interrogation_in_progress(precinct, crime_level).await;
        precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 7)
            .await
            .expect("detective scores");
        precinct
            .interrogations
            .submit_score(interrogation.id, SERGEANT, 5)
            .await
            .expect("sergeant scores")
    }

    #[tokio::test]
    async fn opening_requires_investigation_status() {
        let precinct = test_precinct().await;
        let case = precinct
            .cases
            .file_case(CHIEF, &scene_draft(2))
            .await
            .expect("should file");

        // Case is OPEN, not yet under investigation
        let err = precinct
            .interrogations
            .open_interrogation(
                case.id,
                DETECTIVE,
                &SuspectTarget::New {
                    alias: "Early".to_string(),
                    person_id: None,
                },
            )
            .await
            .expect_err("should refuse");
        assert!(matches!(err, PrecinctError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn opening_links_suspect_once_per_case() {
        let precinct = test_precinct().await;
        let case_id = case_under_investigation(&precinct, 2).await;

        let interrogation = precinct
            .interrogations
            .open_interrogation(
                case_id,
                DETECTIVE,
                &SuspectTarget::New {
                    alias: "Fenn".to_string(),
                    person_id: Some(300),
                },
            )
            .await
            .expect("should open");
        assert_eq!(interrogation.status, InterrogationStatus::WaitingForSergeant);

        let err = precinct
            .interrogations
            .open_interrogation(
                case_id,
                DETECTIVE,
                &SuspectTarget::Existing {
                    suspect_id: interrogation.suspect_id,
                },
            )
            .await
            .expect_err("duplicate pair");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn opening_is_reserved_for_the_assigned_detective() {
        let precinct = test_precinct().await;
        let case_id = case_under_investigation(&precinct, 2).await;

        let other_detective = 77;
        let roles = RoleAuthority::new(precinct.db.clone());
        roles
            .assign_role(other_detective, Role::Detective, 0)
            .await
            .expect("should assign");

        let err = precinct
            .interrogations
            .open_interrogation(
                case_id,
                other_detective,
                &SuspectTarget::New {
                    alias: "Poach".to_string(),
                    person_id: None,
                },
            )
            .await
            .expect_err("not the assigned detective");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn sergeant_approval_arrests_and_advances() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_waiting_for_sergeant(&precinct, 2).await;

        let updated = precinct
            .interrogations
            .sergeant_verdict(interrogation.id, SERGEANT, ReviewAction::Approve, "solid file")
            .await
            .expect("should approve");

        assert_eq!(updated.status, InterrogationStatus::Interrogation);
        assert_eq!(updated.sergeant_notes.as_deref(), Some("solid file"));

        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::Interrogation);
        assert_eq!(case.assigned_sergeant, Some(SERGEANT));

        let suspect = precinct
            .db
            .require_suspect(interrogation.suspect_id)
            .await
            .expect("should read");
        assert_eq!(suspect.status, SuspectStatus::Arrested);
    }

    #[tokio::test]
    async fn sergeant_rejection_reverts_case_only() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_waiting_for_sergeant(&precinct, 2).await;

        let err = precinct
            .interrogations
            .sergeant_verdict(interrogation.id, SERGEANT, ReviewAction::Reject, "  ")
            .await
            .expect_err("notes required");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let updated = precinct
            .interrogations
            .sergeant_verdict(interrogation.id, SERGEANT, ReviewAction::Reject, "too thin")
            .await
            .expect("should reject");

        // The interrogation stays queued while the case goes back for
        // more investigative work.
        assert_eq!(updated.status, InterrogationStatus::WaitingForSergeant);
        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::Investigation);

        // The detective can resubmit the same file
        let resubmitted = precinct
            .cases
            .submit_to_sergeant(interrogation.case_id, DETECTIVE)
            .await
            .expect("should resubmit");
        assert_eq!(resubmitted.status, CaseStatus::WaitingForSergeant);
    }

    #[tokio::test]
    async fn scores_are_validated_and_filled_by_role() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_in_progress(&precinct, 2).await;

        for bad in [0, 11, -3] {
            let err = precinct
                .interrogations
                .submit_score(interrogation.id, DETECTIVE, bad)
                .await
                .expect_err("out of range");
            assert!(matches!(err, PrecinctError::Validation(_)));
        }

        let updated = precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 8)
            .await
            .expect("detective scores");
        assert_eq!(updated.detective_score, Some(8));
        assert_eq!(updated.sergeant_score, None);
        assert_eq!(updated.status, InterrogationStatus::Interrogation);

        let updated = precinct
            .interrogations
            .submit_score(interrogation.id, SERGEANT, 3)
            .await
            .expect("sergeant scores");
        assert_eq!(updated.sergeant_score, Some(3));
        assert_eq!(updated.status, InterrogationStatus::WaitingForCaptain);

        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::WaitingForCaptain);
    }

    #[tokio::test]
    async fn early_scores_do_not_escalate() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_waiting_for_sergeant(&precinct, 2).await;

        precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 6)
            .await
            .expect("detective scores early");
        let updated = precinct
            .interrogations
            .submit_score(interrogation.id, SERGEANT, 6)
            .await
            .expect("sergeant scores early");

        // Both scores are in but escalation waits for the interrogation
        // to actually open
        assert!(updated.has_both_scores());
        assert_eq!(updated.status, InterrogationStatus::WaitingForSergeant);
    }

    #[tokio::test]
    async fn resubmitted_score_overwrites_own_prior() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_waiting_for_sergeant(&precinct, 2).await;

        precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 2)
            .await
            .expect("first score");
        let updated = precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 9)
            .await
            .expect("revised score");
        assert_eq!(updated.detective_score, Some(9));
        assert_eq!(updated.sergeant_score, None);
    }

    #[tokio::test]
    async fn captain_routes_by_crime_level() {
        let precinct = test_precinct().await;

        // Non-critical case goes straight to court
        let interrogation = interrogation_before_captain(&precinct, 3).await;
        let updated = precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Approve, "")
            .await
            .expect("should approve");
        assert_eq!(updated.status, InterrogationStatus::InCourt);
        assert_eq!(updated.captain_approved, Some(true));
        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::InCourt);

        // Critical case takes the chief detour
        let interrogation = interrogation_before_captain(&precinct, 4).await;
        let updated = precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Approve, "")
            .await
            .expect("should approve");
        assert_eq!(updated.status, InterrogationStatus::WaitingForChief);
        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::WaitingForChief);
    }

    #[tokio::test]
    async fn captain_rejection_closes_both() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_before_captain(&precinct, 2).await;

        let updated = precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Reject, "weak evidence")
            .await
            .expect("should reject");
        assert_eq!(updated.status, InterrogationStatus::ClosedRejected);
        assert_eq!(updated.captain_approved, Some(false));

        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::ClosedRejected);

        // Case closure drops the suspect's score to zero
        let suspect = precinct
            .db
            .require_suspect(interrogation.suspect_id)
            .await
            .expect("should read");
        assert_eq!(suspect.cached_ranking_score, 0);
    }

    #[tokio::test]
    async fn chief_verdict_is_for_critical_cases_only() {
        let precinct = test_precinct().await;

        let interrogation = interrogation_before_captain(&precinct, 2).await;
        let err = precinct
            .interrogations
            .chief_verdict(interrogation.id, CHIEF, ReviewAction::Approve, "")
            .await
            .expect_err("not critical");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));

        let interrogation = interrogation_before_captain(&precinct, 4).await;
        precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Approve, "")
            .await
            .expect("captain approves");
        let updated = precinct
            .interrogations
            .chief_verdict(interrogation.id, CHIEF, ReviewAction::Approve, "")
            .await
            .expect("chief approves");
        assert_eq!(updated.status, InterrogationStatus::InCourt);
        assert_eq!(updated.chief_approved, Some(true));
    }

    #[tokio::test]
    async fn chief_rejection_closes_both() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_before_captain(&precinct, 4).await;
        precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Approve, "")
            .await
            .expect("captain approves");

        let updated = precinct
            .interrogations
            .chief_verdict(interrogation.id, CHIEF, ReviewAction::Reject, "entrapment risk")
            .await
            .expect("chief rejects");
        assert_eq!(updated.status, InterrogationStatus::ClosedRejected);

        let case = precinct
            .db
            .require_case(interrogation.case_id)
            .await
            .expect("should read");
        assert_eq!(case.status, CaseStatus::ClosedRejected);
    }

    #[tokio::test]
    async fn bail_grant_and_payment_release_the_suspect() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_in_progress(&precinct, 2).await;

        let err = precinct
            .interrogations
            .grant_bail(interrogation.id, SERGEANT, 0)
            .await
            .expect_err("zero bail");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let err = precinct
            .interrogations
            .confirm_bail_payment(interrogation.id, "BAIL-7741")
            .await
            .expect_err("nothing granted yet");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));

        let updated = precinct
            .interrogations
            .grant_bail(interrogation.id, SERGEANT, 250_000)
            .await
            .expect("should grant");
        assert_eq!(updated.bail_amount, Some(250_000));
        assert!(!updated.released_on_bail);

        let err = precinct
            .interrogations
            .confirm_bail_payment(interrogation.id, "  ")
            .await
            .expect_err("blank reference");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let updated = precinct
            .interrogations
            .confirm_bail_payment(interrogation.id, "BAIL-7741")
            .await
            .expect("payment lands");
        assert!(updated.released_on_bail);

        let suspect = precinct
            .db
            .require_suspect(interrogation.suspect_id)
            .await
            .expect("should read");
        assert_eq!(suspect.status, SuspectStatus::ReleasedOnBail);

        let err = precinct
            .interrogations
            .confirm_bail_payment(interrogation.id, "BAIL-7742")
            .await
            .expect_err("double payment");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn bail_waits_for_custody() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_waiting_for_sergeant(&precinct, 2).await;

        let err = precinct
            .interrogations
            .grant_bail(interrogation.id, SERGEANT, 100_000)
            .await
            .expect_err("no interrogation in progress");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn closed_interrogation_admits_nothing() {
        let precinct = test_precinct().await;
        let interrogation = interrogation_before_captain(&precinct, 2).await;
        precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Reject, "closing")
            .await
            .expect("should reject");

        let err = precinct
            .interrogations
            .submit_score(interrogation.id, DETECTIVE, 5)
            .await
            .expect_err("closed");
        assert!(matches!(err, PrecinctError::InvalidTransition { .. }));

        let err = precinct
            .interrogations
            .sergeant_verdict(interrogation.id, SERGEANT, ReviewAction::Approve, "")
            .await
            .expect_err("closed");
        assert!(matches!(err, PrecinctError::InvalidTransition { .. }));

        let err = precinct
            .interrogations
            .captain_verdict(interrogation.id, CAPTAIN, ReviewAction::Approve, "")
            .await
            .expect_err("closed");
        assert!(matches!(err, PrecinctError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn interrogations_are_listed_per_case() {
        let precinct = test_precinct().await;
        let case_id = case_under_investigation(&precinct, 2).await;

        for alias in ["Driver", "Lookout"] {
            precinct
                .interrogations
                .open_interrogation(
                    case_id,
                    DETECTIVE,
                    &SuspectTarget::New {
                        alias: alias.to_string(),
                        person_id: None,
                    },
                )
                .await
                .expect("should open");
        }

        let listed = precinct
            .interrogations
            .for_case(case_id)
            .await
            .expect("should list");
        assert_eq!(listed.len(), 2);
        assert!(listed
            .iter()
            .all(|i| i.status == InterrogationStatus::WaitingForSergeant));
    }
}
