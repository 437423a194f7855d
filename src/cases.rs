//! Case lifecycle state machine.
//!
//! Filing, the multi-tier review chain, and the hand-off into
//! investigation. Every transition runs as one transaction: a CAS-guarded
//! status update plus its audit record, so partial application cannot be
//! observed.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use sqlx::Row;

use crate::audit;
use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{
    Case, CaseComplainant, CaseDraft, CaseStatus, CaseWitness, CrimeLevel, FormationType,
    ReviewAction, VerificationStatus, parse_timestamp,
};
use crate::roles::{Action, Role, RoleAuthority};

/// The third cadet rejection voids a complaint permanently.
pub const MAX_COMPLAINANT_REJECTIONS: i64 = 3;

/// Case workflow service.
pub struct CaseSystem {
    db: Arc<Database>,
    roles: Arc<RoleAuthority>,
    national_id_format: Regex,
    phone_format: Regex,
}

impl CaseSystem {
    /// Create a new case workflow service.
    pub fn new(db: Arc<Database>, roles: Arc<RoleAuthority>) -> Result<Self> {
        Ok(Self {
            db,
            roles,
            national_id_format: Regex::new(r"^[0-9]{10}$")?,
            phone_format: Regex::new(r"^\+?[0-9]{7,15}$")?,
        })
    }

    // ========== Filing ==========

    /// File a new case.
    ///
    /// Complaints start in PENDING_CADET_REVIEW with the filer as primary
    /// complainant. Crime scene reports are filed by police ranks above
    /// cadet; the chief opens them directly, everyone else goes through
    /// superior approval.
    pub async fn file_case(&self, actor_id: i64, draft: &CaseDraft) -> Result<Case> {
        if draft.title.trim().is_empty() {
            return Err(PrecinctError::Validation("title is required".to_string()));
        }
        let crime_level = CrimeLevel::from_i64(draft.crime_level).ok_or_else(|| {
            PrecinctError::Validation("crime_level must be between 1 and 4".to_string())
        })?;
        for witness in &draft.witnesses {
            if !self.national_id_format.is_match(&witness.national_id) {
                return Err(PrecinctError::Validation(
                    "witness national id must be exactly 10 digits".to_string(),
                ));
            }
            if !self.phone_format.is_match(&witness.phone_number) {
                return Err(PrecinctError::Validation(
                    "witness phone number must be 7 to 15 digits".to_string(),
                ));
            }
        }

        let (status, primary_complainant, reported_by, filing_message) = match draft.formation_type
        {
            FormationType::Complaint => {
                self.roles.require(actor_id, Action::FileComplaint).await?;
                (
                    CaseStatus::PendingCadetReview,
                    Some(actor_id),
                    None,
                    "Complaint filed.",
                )
            }
            FormationType::CrimeScene => {
                let role = self
                    .roles
                    .require(actor_id, Action::FileCrimeSceneReport)
                    .await?;
                if draft.crime_occurred_at.is_none()
                    || draft
                        .crime_scene_location
                        .as_deref()
                        .map_or(true, |loc| loc.trim().is_empty())
                {
                    return Err(PrecinctError::Validation(
                        "crime scene reports require occurrence time and location".to_string(),
                    ));
                }
                if role == Role::Chief {
                    (
                        CaseStatus::Open,
                        None,
                        Some(actor_id),
                        "Crime scene report filed. Opened directly by the chief.",
                    )
                } else {
                    (
                        CaseStatus::PendingSuperiorApproval,
                        None,
                        Some(actor_id),
                        "Crime scene report filed. Awaiting superior approval.",
                    )
                }
            }
        };

        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO cases (title, description, crime_level, formation_type, status,
                                complainant_rejection_count, crime_occurred_at,
                                crime_scene_location, primary_complainant, reported_by,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.title.trim())
        .bind(&draft.description)
        .bind(crime_level.as_i64())
        .bind(draft.formation_type.as_str())
        .bind(status.as_str())
        .bind(draft.crime_occurred_at.map(|t| t.to_rfc3339()))
        .bind(&draft.crime_scene_location)
        .bind(primary_complainant)
        .bind(reported_by)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to create case: {}", e)))?;

        let case_id = result.last_insert_rowid();

        for witness in &draft.witnesses {
            sqlx::query(
                "INSERT INTO case_witnesses (case_id, national_id, phone_number, full_name, notes,
                                             registered_by, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(case_id)
            .bind(&witness.national_id)
            .bind(&witness.phone_number)
            .bind(&witness.full_name)
            .bind(&witness.notes)
            .bind(actor_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to record witness: {}", e)))?;
        }

        audit::record(&mut tx, case_id, None, status, actor_id, filing_message).await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit filing: {}", e)))?;

        tracing::info!(
            case_id = case_id,
            status = status.as_str(),
            formation = draft.formation_type.as_str(),
            "Case filed"
        );

        Ok(Case {
            id: case_id,
            title: draft.title.trim().to_string(),
            description: draft.description.clone(),
            crime_level,
            formation_type: draft.formation_type,
            status,
            complainant_rejection_count: 0,
            crime_occurred_at: draft.crime_occurred_at,
            crime_scene_location: draft.crime_scene_location.clone(),
            primary_complainant,
            reported_by,
            assigned_detective: None,
            assigned_sergeant: None,
            created_at: now,
            updated_at: now,
        })
    }

    // ========== Review chain ==========

    /// First review tier for complaints.
    ///
    /// Approval forwards to the officer tier. Each rejection returns the
    /// case to the complainant and increments the rejection counter; the
    /// third rejection voids the case permanently.
    pub async fn cadet_review(
        &self,
        case_id: i64,
        actor_id: i64,
        action: ReviewAction,
        message: &str,
    ) -> Result<Case> {
        self.roles.require(actor_id, Action::CadetReview).await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::PendingCadetReview {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::CadetReview.as_str().to_string(),
            });
        }

        match action {
            ReviewAction::Approve => {
                let to = CaseStatus::PendingOfficerReview;
                self.transition_case(&mut case, to, actor_id, "Cadet approved. Sent to officer.")
                    .await?;
            }
            ReviewAction::Reject => {
                if message.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "a rejection message is required".to_string(),
                    ));
                }
                let new_count = case.complainant_rejection_count + 1;
                let (to, audit_message) = if new_count >= MAX_COMPLAINANT_REJECTIONS {
                    (
                        CaseStatus::Voided,
                        format!(
                            "Cadet rejected: {}. Case voided after {} rejections.",
                            message.trim(),
                            MAX_COMPLAINANT_REJECTIONS
                        ),
                    )
                } else {
                    (
                        CaseStatus::ReturnedToComplainant,
                        format!("Cadet rejected: {}. Returned to complainant.", message.trim()),
                    )
                };
                self.reject_complaint(&mut case, to, new_count, actor_id, &audit_message)
                    .await?;
            }
        }

        Ok(case)
    }

    /// Second review tier for complaints. Approval opens the case; rejection
    /// returns it to the cadet, never straight to the complainant.
    pub async fn officer_review(
        &self,
        case_id: i64,
        actor_id: i64,
        action: ReviewAction,
        message: &str,
    ) -> Result<Case> {
        self.roles.require(actor_id, Action::OfficerReview).await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::PendingOfficerReview {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::OfficerReview.as_str().to_string(),
            });
        }

        match action {
            ReviewAction::Approve => {
                self.transition_case(
                    &mut case,
                    CaseStatus::Open,
                    actor_id,
                    "Officer approved. Case opened.",
                )
                .await?;
            }
            ReviewAction::Reject => {
                if message.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "a rejection message is required".to_string(),
                    ));
                }
                let audit_message =
                    format!("Officer rejected: {}. Returned to cadet.", message.trim());
                self.transition_case(
                    &mut case,
                    CaseStatus::ReturnedToCadet,
                    actor_id,
                    &audit_message,
                )
                .await?;
            }
        }

        Ok(case)
    }

    /// Superior review of a crime scene report filed below chief rank.
    pub async fn superior_approval(
        &self,
        case_id: i64,
        actor_id: i64,
        action: ReviewAction,
        message: &str,
    ) -> Result<Case> {
        self.roles
            .require(actor_id, Action::SuperiorApproval)
            .await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::PendingSuperiorApproval {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::SuperiorApproval.as_str().to_string(),
            });
        }

        match action {
            ReviewAction::Approve => {
                self.transition_case(
                    &mut case,
                    CaseStatus::Open,
                    actor_id,
                    "Crime scene report approved by superior.",
                )
                .await?;
            }
            ReviewAction::Reject => {
                if message.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "a rejection message is required".to_string(),
                    ));
                }
                let audit_message =
                    format!("Superior rejected: {}. Case voided.", message.trim());
                self.transition_case(&mut case, CaseStatus::Voided, actor_id, &audit_message)
                    .await?;
            }
        }

        Ok(case)
    }

    /// The primary complainant resubmits a returned complaint for review.
    pub async fn resubmit(&self, case_id: i64, actor_id: i64) -> Result<Case> {
        self.roles
            .require(actor_id, Action::ResubmitComplaint)
            .await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.primary_complainant != Some(actor_id) {
            return Err(PrecinctError::PreconditionFailed(
                "only the primary complainant may resubmit".to_string(),
            ));
        }
        if case.status != CaseStatus::ReturnedToComplainant {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::ResubmitComplaint.as_str().to_string(),
            });
        }

        self.transition_case(
            &mut case,
            CaseStatus::PendingCadetReview,
            actor_id,
            "Complaint revised and resubmitted.",
        )
        .await?;

        Ok(case)
    }

    /// A cadet reopens review of a case the officer tier sent back.
    pub async fn reclaim(&self, case_id: i64, actor_id: i64) -> Result<Case> {
        self.roles
            .require(actor_id, Action::ReclaimReturnedCase)
            .await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::ReturnedToCadet {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::ReclaimReturnedCase.as_str().to_string(),
            });
        }

        self.transition_case(
            &mut case,
            CaseStatus::PendingCadetReview,
            actor_id,
            "Cadet reopened review.",
        )
        .await?;

        Ok(case)
    }

    // ========== Investigation hand-off ==========

    /// The detective takes an open case into investigation.
    pub async fn begin_investigation(&self, case_id: i64, actor_id: i64) -> Result<Case> {
        self.roles
            .require(actor_id, Action::BeginInvestigation)
            .await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::Open {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::BeginInvestigation.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "UPDATE cases SET status = ?, assigned_detective = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(CaseStatus::Investigation.as_str())
        .bind(actor_id)
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
            CaseStatus::Investigation,
            actor_id,
            "Investigation started.",
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit transition: {}", e)))?;

        tracing::info!(case_id = case.id, detective = actor_id, "Investigation started");

        case.status = CaseStatus::Investigation;
        case.assigned_detective = Some(actor_id);
        case.updated_at = now;
        Ok(case)
    }

    /// The assigned detective submits the suspect file for sergeant review.
    /// Requires at least one interrogation opened on the case.
    pub async fn submit_to_sergeant(&self, case_id: i64, actor_id: i64) -> Result<Case> {
        self.roles
            .require(actor_id, Action::SubmitToSergeant)
            .await?;
        let mut case = self.db.require_case(case_id).await?;

        if case.status != CaseStatus::Investigation {
            return Err(PrecinctError::InvalidTransition {
                current: case.status.as_str().to_string(),
                attempted: Action::SubmitToSergeant.as_str().to_string(),
            });
        }
        if case.assigned_detective != Some(actor_id) {
            return Err(PrecinctError::PreconditionFailed(
                "case is assigned to another detective".to_string(),
            ));
        }

        let row = sqlx::query("SELECT COUNT(*) as count FROM interrogations WHERE case_id = ?")
            .bind(case_id)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to count suspects: {}", e)))?;
        let linked: i64 = row.get("count");
        if linked == 0 {
            return Err(PrecinctError::PreconditionFailed(
                "at least one suspect must be linked before sergeant review".to_string(),
            ));
        }

        self.transition_case(
            &mut case,
            CaseStatus::WaitingForSergeant,
            actor_id,
            "Suspect file submitted to sergeant.",
        )
        .await?;

        Ok(case)
    }

    // ========== Complainant verification ==========

    /// A citizen joins a complaint case as an additional complainant.
    pub async fn join_as_complainant(&self, case_id: i64, actor_id: i64) -> Result<CaseComplainant> {
        self.roles
            .require(actor_id, Action::JoinAsComplainant)
            .await?;
        let case = self.db.require_case(case_id).await?;

        if case.formation_type != FormationType::Complaint {
            return Err(PrecinctError::PreconditionFailed(
                "only complaint cases accept additional complainants".to_string(),
            ));
        }
        if case.status.is_terminal() {
            return Err(PrecinctError::PreconditionFailed(
                "case is closed".to_string(),
            ));
        }
        if case.primary_complainant == Some(actor_id) {
            return Err(PrecinctError::PreconditionFailed(
                "already the primary complainant".to_string(),
            ));
        }

        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM case_complainants WHERE case_id = ? AND user_id = ?",
        )
        .bind(case_id)
        .bind(actor_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to check complainants: {}", e)))?;
        let existing: i64 = row.get("count");
        if existing > 0 {
            return Err(PrecinctError::PreconditionFailed(
                "already a complainant on this case".to_string(),
            ));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO case_complainants (case_id, user_id, status, created_at)
             VALUES (?, ?, 'PENDING', ?)",
        )
        .bind(case_id)
        .bind(actor_id)
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to add complainant: {}", e)))?;

        Ok(CaseComplainant {
            id: result.last_insert_rowid(),
            case_id,
            user_id: actor_id,
            status: VerificationStatus::Pending,
            note: None,
            verified_by: None,
            created_at: now,
        })
    }

    /// A cadet verifies or rejects an additional complainant. Rejection
    /// requires a note.
    pub async fn verify_complainant(
        &self,
        case_id: i64,
        actor_id: i64,
        user_id: i64,
        action: ReviewAction,
        note: Option<&str>,
    ) -> Result<CaseComplainant> {
        self.roles
            .require(actor_id, Action::VerifyComplainant)
            .await?;

        let row = sqlx::query(
            "SELECT id, case_id, user_id, status, note, verified_by, created_at
             FROM case_complainants WHERE case_id = ? AND user_id = ?",
        )
        .bind(case_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get complainant: {}", e)))?
        .ok_or_else(|| PrecinctError::NotFound {
            entity: "case complainant",
            id: user_id.to_string(),
        })?;

        let current = VerificationStatus::parse(row.get("status"));
        if current != VerificationStatus::Pending {
            return Err(PrecinctError::PreconditionFailed(
                "complainant has already been verified or rejected".to_string(),
            ));
        }

        let status = match action {
            ReviewAction::Approve => VerificationStatus::Verified,
            ReviewAction::Reject => {
                if note.map_or(true, |n| n.trim().is_empty()) {
                    return Err(PrecinctError::Validation(
                        "a rejection note is required".to_string(),
                    ));
                }
                VerificationStatus::Rejected
            }
        };

        sqlx::query(
            "UPDATE case_complainants SET status = ?, note = ?, verified_by = ?
             WHERE case_id = ? AND user_id = ?",
        )
        .bind(status.as_str())
        .bind(note.map(str::trim))
        .bind(actor_id)
        .bind(case_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to verify complainant: {}", e)))?;

        Ok(CaseComplainant {
            id: row.get("id"),
            case_id,
            user_id,
            status,
            note: note.map(|n| n.trim().to_string()),
            verified_by: Some(actor_id),
            created_at: parse_timestamp(row.get("created_at")),
        })
    }

    // ========== Reads ==========

    /// Get a case by id, failing with NotFound when absent.
    pub async fn get_case(&self, case_id: i64) -> Result<Case> {
        self.db.require_case(case_id).await
    }

    /// Witnesses recorded on a case.
    pub async fn witnesses(&self, case_id: i64) -> Result<Vec<CaseWitness>> {
        let rows = sqlx::query(
            "SELECT id, case_id, national_id, phone_number, full_name, notes, registered_by,
                    created_at
             FROM case_witnesses WHERE case_id = ? ORDER BY id ASC",
        )
        .bind(case_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get witnesses: {}", e)))?;

        let mut witnesses = Vec::with_capacity(rows.len());
        for row in rows {
            witnesses.push(CaseWitness {
                id: row.get("id"),
                case_id: row.get("case_id"),
                national_id: row.get("national_id"),
                phone_number: row.get("phone_number"),
                full_name: row.get("full_name"),
                notes: row.get("notes"),
                registered_by: row.get("registered_by"),
                created_at: parse_timestamp(row.get("created_at")),
            });
        }

        Ok(witnesses)
    }

    // ========== Internals ==========

    /// Apply a plain status transition with its audit record.
    ///
    /// The UPDATE is guarded on the status the caller read; a lost race
    /// surfaces as ConcurrencyConflict and nothing is written.
    async fn transition_case(
        &self,
        case: &mut Case,
        to: CaseStatus,
        actor_id: i64,
        audit_message: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query("UPDATE cases SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
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

        audit::record(&mut tx, case.id, Some(case.status), to, actor_id, audit_message).await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit transition: {}", e)))?;

        tracing::info!(
            case_id = case.id,
            from = case.status.as_str(),
            to = to.as_str(),
            actor_id = actor_id,
            "Case transition"
        );

        case.status = to;
        case.updated_at = now;
        Ok(())
    }

    /// Apply a cadet rejection: status change and counter increment in one
    /// guarded UPDATE so two racing rejections cannot both count.
    async fn reject_complaint(
        &self,
        case: &mut Case,
        to: CaseStatus,
        new_count: i64,
        actor_id: i64,
        audit_message: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            "UPDATE cases SET status = ?, complainant_rejection_count = ?, updated_at = ?
             WHERE id = ? AND status = ? AND complainant_rejection_count = ?",
        )
        .bind(to.as_str())
        .bind(new_count)
        .bind(now.to_rfc3339())
        .bind(case.id)
        .bind(case.status.as_str())
        .bind(case.complainant_rejection_count)
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

        audit::record(&mut tx, case.id, Some(case.status), to, actor_id, audit_message).await?;

        tx.commit()
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to commit rejection: {}", e)))?;

        tracing::info!(
            case_id = case.id,
            rejection_count = new_count,
            voided = to == CaseStatus::Voided,
            "Complaint rejected by cadet"
        );

        case.status = to;
        case.complainant_rejection_count = new_count;
        case.updated_at = now;
        Ok(())
    }
}
