//! Role-gated access for workflow operations.
//!
//! Maps an acting principal to one role from the fixed hierarchy and checks
//! it against a role to allowed-actions capability table before any
//! transition runs. Roles are a tagged union; there is no inheritance
//! between ranks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::database::Database;
use crate::error::{PrecinctError, Result};

// ========== Role Enum ==========

/// Role codenames for database storage and capability checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Citizen,
    Cadet,
    Officer,
    Detective,
    Sergeant,
    Captain,
    Chief,
    Judge,
}

impl Role {
    /// Convert from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CITIZEN" => Some(Role::Citizen),
            "CADET" => Some(Role::Cadet),
            "OFFICER" => Some(Role::Officer),
            "DETECTIVE" => Some(Role::Detective),
            "SERGEANT" => Some(Role::Sergeant),
            "CAPTAIN" => Some(Role::Captain),
            "CHIEF" => Some(Role::Chief),
            "JUDGE" => Some(Role::Judge),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "CITIZEN",
            Role::Cadet => "CADET",
            Role::Officer => "OFFICER",
            Role::Detective => "DETECTIVE",
            Role::Sergeant => "SERGEANT",
            Role::Captain => "CAPTAIN",
            Role::Chief => "CHIEF",
            Role::Judge => "JUDGE",
        }
    }

    /// Human-readable rank name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Citizen => "Citizen",
            Role::Cadet => "Police Cadet",
            Role::Officer => "Police Officer",
            Role::Detective => "Detective",
            Role::Sergeant => "Sergeant",
            Role::Captain => "Captain",
            Role::Chief => "Chief of Police",
            Role::Judge => "Judge",
        }
    }

    /// Police personnel, cadet through chief.
    pub fn is_police(&self) -> bool {
        matches!(
            self,
            Role::Cadet | Role::Officer | Role::Detective | Role::Sergeant | Role::Captain | Role::Chief
        )
    }

    /// Check if this role may perform a workflow action.
    pub fn may(&self, action: Action) -> bool {
        match action {
            // Any authenticated principal can act as a complainant or tipster;
            // ownership rules are enforced by the operations themselves.
            Action::FileComplaint
            | Action::ResubmitComplaint
            | Action::JoinAsComplainant
            | Action::SubmitTip => true,
            Action::FileCrimeSceneReport => matches!(
                self,
                Role::Officer | Role::Detective | Role::Sergeant | Role::Captain | Role::Chief
            ),
            Action::CadetReview | Action::ReclaimReturnedCase | Action::VerifyComplainant => {
                matches!(self, Role::Cadet)
            }
            Action::OfficerReview => matches!(self, Role::Officer),
            Action::SuperiorApproval => {
                matches!(self, Role::Sergeant | Role::Captain | Role::Chief)
            }
            Action::BeginInvestigation | Action::SubmitToSergeant | Action::OpenInterrogation => {
                matches!(self, Role::Detective)
            }
            Action::SubmitScore => matches!(self, Role::Detective | Role::Sergeant),
            Action::SergeantVerdict | Action::GrantBail => matches!(self, Role::Sergeant),
            Action::CaptainVerdict => matches!(self, Role::Captain),
            Action::ChiefVerdict => matches!(self, Role::Chief),
            Action::IssueVerdict => matches!(self, Role::Judge),
            Action::RecordEvidence => self.is_police(),
            Action::ForwardTip => matches!(self, Role::Officer),
            Action::ApproveTip => matches!(self, Role::Detective),
        }
    }
}

// ========== Action Enum ==========

/// All role-gated workflow operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    FileComplaint,
    FileCrimeSceneReport,
    ResubmitComplaint,
    CadetReview,
    ReclaimReturnedCase,
    OfficerReview,
    SuperiorApproval,
    BeginInvestigation,
    SubmitToSergeant,
    JoinAsComplainant,
    VerifyComplainant,
    OpenInterrogation,
    SubmitScore,
    SergeantVerdict,
    CaptainVerdict,
    ChiefVerdict,
    GrantBail,
    IssueVerdict,
    RecordEvidence,
    SubmitTip,
    ForwardTip,
    ApproveTip,
}

impl Action {
    /// Codename used in denial errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FileComplaint => "file_complaint",
            Action::FileCrimeSceneReport => "file_crime_scene_report",
            Action::ResubmitComplaint => "resubmit_complaint",
            Action::CadetReview => "cadet_review",
            Action::ReclaimReturnedCase => "reclaim_returned_case",
            Action::OfficerReview => "officer_review",
            Action::SuperiorApproval => "superior_approval",
            Action::BeginInvestigation => "begin_investigation",
            Action::SubmitToSergeant => "submit_to_sergeant",
            Action::JoinAsComplainant => "join_as_complainant",
            Action::VerifyComplainant => "verify_complainant",
            Action::OpenInterrogation => "open_interrogation",
            Action::SubmitScore => "submit_score",
            Action::SergeantVerdict => "sergeant_verdict",
            Action::CaptainVerdict => "captain_verdict",
            Action::ChiefVerdict => "chief_verdict",
            Action::GrantBail => "grant_bail",
            Action::IssueVerdict => "issue_verdict",
            Action::RecordEvidence => "record_evidence",
            Action::SubmitTip => "submit_tip",
            Action::ForwardTip => "forward_tip",
            Action::ApproveTip => "approve_tip",
        }
    }
}

// ========== Role Authority ==========

/// Resolves acting principals to roles and gates workflow actions.
///
/// Identity storage is external; this service only reads the seeded
/// assignment table and defaults unknown principals to Citizen.
pub struct RoleAuthority {
    db: Arc<Database>,
}

impl RoleAuthority {
    /// Create a new role authority.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Assign or replace a principal's role.
    pub async fn assign_role(&self, user_id: i64, role: Role, assigned_by: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_assignments (user_id, role, assigned_by, assigned_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                role = excluded.role,
                assigned_by = excluded.assigned_by,
                assigned_at = excluded.assigned_at",
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(assigned_by)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to assign role: {}", e)))?;

        Ok(())
    }

    /// Resolve a principal's role, defaulting to Citizen when unassigned.
    pub async fn role_of(&self, user_id: i64) -> Result<Role> {
        let row = sqlx::query("SELECT role FROM role_assignments WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to get role: {}", e)))?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                Ok(Role::from_str(&role_str).unwrap_or(Role::Citizen))
            }
            None => Ok(Role::Citizen),
        }
    }

    /// Resolve the actor's role and check it against the capability table.
    ///
    /// Returns the role on success so operations can branch on it without
    /// a second lookup.
    pub async fn require(&self, user_id: i64, action: Action) -> Result<Role> {
        let role = self.role_of(user_id).await?;

        if role.may(action) {
            Ok(role)
        } else {
            tracing::warn!(
                actor_id = user_id,
                role = role.as_str(),
                action = action.as_str(),
                "Action denied by capability table"
            );
            Err(PrecinctError::Unauthorized {
                role: role.as_str().to_string(),
                action: action.as_str().to_string(),
            })
        }
    }
}
