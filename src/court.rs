//! Court verdicts.
//!
//! A judge closes an interrogation that reached IN_COURT with a single
//! irrevocable verdict. The verdict row, the suspect's final status and the
//! closure of both workflow entities land in one transaction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::audit;
use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{
    CaseStatus, CourtVerdict, InterrogationStatus, SentenceType, SuspectStatus, Verdict,
};
use crate::ranking::RankingEngine;
use crate::roles::{Action, RoleAuthority};

/// Payload for issuing a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictDraft {
    pub verdict: Verdict,
    pub sentence_type: SentenceType,
    pub prison_months: i64,
    pub fine_amount: i64,
    pub title: String,
    pub description: String,
}

/// Verdict service.
pub struct CourtSystem {
    db: Arc<Database>,
    roles: Arc<RoleAuthority>,
    ranking: Arc<RankingEngine>,
}

impl CourtSystem {
    /// Create a new verdict service.
    pub fn new(db: Arc<Database>, roles: Arc<RoleAuthority>, ranking: Arc<RankingEngine>) -> Self {
        Self { db, roles, ranking }
    }

    /// Issue the final verdict on an interrogation standing in court.
    ///
    /// GUILTY requires a sentence and convicts the suspect; INNOCENT forbids
    /// one, zeroes the punishments and acquits. Both close the interrogation
    /// and its case for good.
    pub async fn issue_verdict(
        &self,
        interrogation_id: i64,
        judge_id: i64,
        draft: &VerdictDraft,
    ) -> Result<CourtVerdict> {
        self.roles.require(judge_id, Action::IssueVerdict).await?;
        let interrogation = self.db.require_interrogation(interrogation_id).await?;

        if interrogation.status != InterrogationStatus::InCourt {
            return Err(PrecinctError::InvalidTransition {
                current: interrogation.status.as_str().to_string(),
                attempted: Action::IssueVerdict.as_str().to_string(),
            });
        }

        let row =
            sqlx::query("SELECT COUNT(*) as count FROM court_verdicts WHERE interrogation_id = ?")
                .bind(interrogation_id)
                .fetch_one(self.db.pool())
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to check verdicts: {}", e)))?;
        let existing: i64 = row.get("count");
        if existing > 0 {
            return Err(PrecinctError::AlreadyDecided { interrogation_id });
        }

        if draft.title.trim().is_empty() {
            return Err(PrecinctError::Validation(
                "verdict title is required".to_string(),
            ));
        }
        if draft.prison_months < 0 || draft.fine_amount < 0 {
            return Err(PrecinctError::Validation(
                "punishments cannot be negative".to_string(),
            ));
        }

        let (prison_months, fine_amount) = match draft.verdict {
            Verdict::Innocent => {
                if draft.sentence_type != SentenceType::None {
                    return Err(PrecinctError::Validation(
                        "an innocent verdict cannot carry a sentence".to_string(),
                    ));
                }
                (0, 0)
            }
            Verdict::Guilty => {
                if draft.sentence_type == SentenceType::None {
                    return Err(PrecinctError::Validation(
                        "a guilty verdict requires a sentence".to_string(),
                    ));
                }
                (draft.prison_months, draft.fine_amount)
            }
        };

        let suspect_status = match draft.verdict {
            Verdict::Guilty => SuspectStatus::Convicted,
            Verdict::Innocent => SuspectStatus::Acquitted,
        };

        let case = self.db.require_case(interrogation.case_id).await?;
        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO court_verdicts (interrogation_id, judge_id, verdict, sentence_type,
                                         prison_months, fine_amount, title, description,
                                         issued_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(interrogation_id)
        .bind(judge_id)
        .bind(draft.verdict.as_str())
        .bind(draft.sentence_type.as_str())
        .bind(prison_months)
        .bind(fine_amount)
        .bind(draft.title.trim())
        .bind(&draft.description)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to record verdict: {}", e)))?;
        let verdict_id = result.last_insert_rowid();

        let result = sqlx::query(
            "UPDATE interrogations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(InterrogationStatus::ClosedVerdict.as_str())
        .bind(now.to_rfc3339())
        .bind(interrogation_id)
        .bind(interrogation.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to close interrogation: {}", e)))?;
        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
            return Err(PrecinctError::ConcurrencyConflict {
                entity: "interrogation",
                id: interrogation_id,
            });
        }

        if !case.status.is_terminal() {
            let result = sqlx::query(
                "UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(CaseStatus::ClosedVerdict.as_str())
            .bind(now.to_rfc3339())
            .bind(case.id)
            .bind(case.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to close case: {}", e)))?;
            if result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| PrecinctError::Database(format!("Failed to roll back: {}", e)))?;
                return Err(PrecinctError::ConcurrencyConflict {
                    entity: "case",
                    id: case.id,
                });
            }

            let audit_message = format!(
                "Verdict issued: {}. Case closed.",
                draft.verdict.as_str()
            );
            audit::record(
                &mut tx,
                case.id,
                Some(case.status),
                CaseStatus::ClosedVerdict,
                judge_id,
                &audit_message,
            )
            .await?;
        }

        sqlx::query("UPDATE suspects SET status = ? WHERE id = ?")
            .bind(suspect_status.as_str())
            .bind(interrogation.suspect_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to update suspect: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit verdict: {}", e)))?;

        tracing::info!(
            interrogation_id = interrogation_id,
            case_id = case.id,
            suspect_id = interrogation.suspect_id,
            verdict = draft.verdict.as_str(),
            sentence = draft.sentence_type.as_str(),
            "Verdict issued"
        );

        self.ranking.recompute(interrogation.suspect_id).await?;

        Ok(CourtVerdict {
            id: verdict_id,
            interrogation_id,
            judge_id,
            verdict: draft.verdict,
            sentence_type: draft.sentence_type,
            prison_months,
            fine_amount,
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            issued_at: now,
        })
    }

    /// The verdict issued on an interrogation, if any.
    pub async fn get_verdict(&self, interrogation_id: i64) -> Result<Option<CourtVerdict>> {
        let row = sqlx::query(
            "SELECT id, interrogation_id, judge_id, verdict, sentence_type, prison_months,
                    fine_amount, title, description, issued_at
             FROM court_verdicts WHERE interrogation_id = ?",
        )
        .bind(interrogation_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get verdict: {}", e)))?;

        Ok(row.as_ref().map(CourtVerdict::from_row))
    }
}
