//! Core data models for the precinct workflow engine.
//!
//! Status enums store their domain codenames (UPPER_SNAKE) in the database;
//! entity structs map rows from the services that load them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Case workflow status.
///
/// Complaint path:
///   PENDING_CADET_REVIEW -> PENDING_OFFICER_REVIEW -> OPEN,
///   cadet reject -> RETURNED_TO_COMPLAINANT (3rd rejection voids),
///   officer reject -> RETURNED_TO_CADET.
///
/// Crime-scene path: chief files straight to OPEN, other ranks through
/// PENDING_SUPERIOR_APPROVAL (approve -> OPEN, reject -> VOIDED).
///
/// Shared path once open:
///   OPEN -> INVESTIGATION -> WAITING_FOR_SERGEANT -> INTERROGATION
///   -> WAITING_FOR_CAPTAIN -> [WAITING_FOR_CHIEF] -> IN_COURT
///   -> CLOSED_VERDICT, with CLOSED_REJECTED on captain/chief rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    PendingCadetReview,
    ReturnedToComplainant,
    ReturnedToCadet,
    PendingOfficerReview,
    PendingSuperiorApproval,
    Voided,
    Open,
    Investigation,
    WaitingForSergeant,
    Interrogation,
    WaitingForCaptain,
    WaitingForChief,
    InCourt,
    ClosedVerdict,
    ClosedRejected,
}

impl CaseStatus {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "RETURNED_TO_COMPLAINANT" => Self::ReturnedToComplainant,
            "RETURNED_TO_CADET" => Self::ReturnedToCadet,
            "PENDING_OFFICER_REVIEW" => Self::PendingOfficerReview,
            "PENDING_SUPERIOR_APPROVAL" => Self::PendingSuperiorApproval,
            "VOIDED" => Self::Voided,
            "OPEN" => Self::Open,
            "INVESTIGATION" => Self::Investigation,
            "WAITING_FOR_SERGEANT" => Self::WaitingForSergeant,
            "INTERROGATION" => Self::Interrogation,
            "WAITING_FOR_CAPTAIN" => Self::WaitingForCaptain,
            "WAITING_FOR_CHIEF" => Self::WaitingForChief,
            "IN_COURT" => Self::InCourt,
            "CLOSED_VERDICT" => Self::ClosedVerdict,
            "CLOSED_REJECTED" => Self::ClosedRejected,
            _ => Self::PendingCadetReview,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingCadetReview => "PENDING_CADET_REVIEW",
            Self::ReturnedToComplainant => "RETURNED_TO_COMPLAINANT",
            Self::ReturnedToCadet => "RETURNED_TO_CADET",
            Self::PendingOfficerReview => "PENDING_OFFICER_REVIEW",
            Self::PendingSuperiorApproval => "PENDING_SUPERIOR_APPROVAL",
            Self::Voided => "VOIDED",
            Self::Open => "OPEN",
            Self::Investigation => "INVESTIGATION",
            Self::WaitingForSergeant => "WAITING_FOR_SERGEANT",
            Self::Interrogation => "INTERROGATION",
            Self::WaitingForCaptain => "WAITING_FOR_CAPTAIN",
            Self::WaitingForChief => "WAITING_FOR_CHIEF",
            Self::InCourt => "IN_COURT",
            Self::ClosedVerdict => "CLOSED_VERDICT",
            Self::ClosedRejected => "CLOSED_REJECTED",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Voided | Self::ClosedVerdict | Self::ClosedRejected)
    }
}

/// Interrogation escalation status.
///
/// WAITING_FOR_SERGEANT -> INTERROGATION -> WAITING_FOR_CAPTAIN
/// -> [WAITING_FOR_CHIEF] -> IN_COURT -> CLOSED_VERDICT, with
/// CLOSED_REJECTED on captain/chief rejection. A sergeant rejection keeps
/// the record in WAITING_FOR_SERGEANT while the case reverts to
/// INVESTIGATION for revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterrogationStatus {
    WaitingForSergeant,
    Interrogation,
    WaitingForCaptain,
    WaitingForChief,
    InCourt,
    ClosedVerdict,
    ClosedRejected,
}

impl InterrogationStatus {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "INTERROGATION" => Self::Interrogation,
            "WAITING_FOR_CAPTAIN" => Self::WaitingForCaptain,
            "WAITING_FOR_CHIEF" => Self::WaitingForChief,
            "IN_COURT" => Self::InCourt,
            "CLOSED_VERDICT" => Self::ClosedVerdict,
            "CLOSED_REJECTED" => Self::ClosedRejected,
            _ => Self::WaitingForSergeant,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForSergeant => "WAITING_FOR_SERGEANT",
            Self::Interrogation => "INTERROGATION",
            Self::WaitingForCaptain => "WAITING_FOR_CAPTAIN",
            Self::WaitingForChief => "WAITING_FOR_CHIEF",
            Self::InCourt => "IN_COURT",
            Self::ClosedVerdict => "CLOSED_VERDICT",
            Self::ClosedRejected => "CLOSED_REJECTED",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ClosedVerdict | Self::ClosedRejected)
    }
}

/// Suspect disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspectStatus {
    UnderSurveillance,
    MostWanted,
    Arrested,
    ReleasedOnBail,
    Convicted,
    Acquitted,
}

impl SuspectStatus {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "MOST_WANTED" => Self::MostWanted,
            "ARRESTED" => Self::Arrested,
            "RELEASED_ON_BAIL" => Self::ReleasedOnBail,
            "CONVICTED" => Self::Convicted,
            "ACQUITTED" => Self::Acquitted,
            _ => Self::UnderSurveillance,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnderSurveillance => "UNDER_SURVEILLANCE",
            Self::MostWanted => "MOST_WANTED",
            Self::Arrested => "ARRESTED",
            Self::ReleasedOnBail => "RELEASED_ON_BAIL",
            Self::Convicted => "CONVICTED",
            Self::Acquitted => "ACQUITTED",
        }
    }

    /// Statuses decided by a court verdict.
    pub fn is_court_decided(&self) -> bool {
        matches!(self, Self::Convicted | Self::Acquitted)
    }
}

/// How a case came into existence, determining its pre-open review path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationType {
    Complaint,
    CrimeScene,
}

impl FormationType {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "CRIME_SCENE" => Self::CrimeScene,
            _ => Self::Complaint,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complaint => "COMPLAINT",
            Self::CrimeScene => "CRIME_SCENE",
        }
    }
}

/// Ordinal crime severity. Level 4 cases require the chief approval tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CrimeLevel {
    Minor,
    Major,
    Serious,
    Critical,
}

impl CrimeLevel {
    /// Parse a severity level from its ordinal value.
    ///
    /// ```
    /// use precinct::models::CrimeLevel;
    ///
    /// assert_eq!(CrimeLevel::from_i64(1), Some(CrimeLevel::Minor));
    /// assert_eq!(CrimeLevel::from_i64(4), Some(CrimeLevel::Critical));
    /// assert_eq!(CrimeLevel::from_i64(5), None);
    /// ```
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Minor),
            2 => Some(Self::Major),
            3 => Some(Self::Serious),
            4 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Ordinal value used by the ranking formula.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Minor => 1,
            Self::Major => 2,
            Self::Serious => 3,
            Self::Critical => 4,
        }
    }

    /// Critical cases require the chief verdict tier before court.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

/// Approve/reject decision in a review operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    /// Codename for audit messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }
}

/// Verification sub-state of an additional complainant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "VERIFIED" => Self::Verified,
            "REJECTED" => Self::Rejected,
            _ => Self::Pending,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Judge's finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Guilty,
    Innocent,
}

impl Verdict {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "INNOCENT" => Self::Innocent,
            _ => Self::Guilty,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guilty => "GUILTY",
            Self::Innocent => "INNOCENT",
        }
    }
}

/// Sentence attached to a verdict. INNOCENT verdicts always carry None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceType {
    None,
    Prison,
    Fine,
    PrisonAndFine,
    CommunityService,
    Execution,
}

impl SentenceType {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "PRISON" => Self::Prison,
            "FINE" => Self::Fine,
            "PRISON_AND_FINE" => Self::PrisonAndFine,
            "COMMUNITY_SERVICE" => Self::CommunityService,
            "EXECUTION" => Self::Execution,
            _ => Self::None,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Prison => "PRISON",
            Self::Fine => "FINE",
            Self::PrisonAndFine => "PRISON_AND_FINE",
            Self::CommunityService => "COMMUNITY_SERVICE",
            Self::Execution => "EXECUTION",
        }
    }
}

// ========== Entities ==========

/// Central workflow entity. Never deleted; mutated only through the
/// transition operations.
#[derive(Debug, Clone, Serialize)]
pub struct Case {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub crime_level: CrimeLevel,
    pub formation_type: FormationType,
    pub status: CaseStatus,
    pub complainant_rejection_count: i64,
    pub crime_occurred_at: Option<DateTime<Utc>>,
    pub crime_scene_location: Option<String>,
    pub primary_complainant: Option<i64>,
    pub reported_by: Option<i64>,
    pub assigned_detective: Option<i64>,
    pub assigned_sergeant: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Critical cases require the chief verdict tier.
    pub fn is_critical(&self) -> bool {
        self.crime_level.is_critical()
    }

    /// Map a full `cases` row.
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            crime_level: CrimeLevel::from_i64(row.get::<i64, _>("crime_level"))
                .unwrap_or(CrimeLevel::Minor),
            formation_type: FormationType::parse(row.get("formation_type")),
            status: CaseStatus::parse(row.get("status")),
            complainant_rejection_count: row.get("complainant_rejection_count"),
            crime_occurred_at: parse_timestamp_opt(row.get("crime_occurred_at")),
            crime_scene_location: row.get("crime_scene_location"),
            primary_complainant: row.get("primary_complainant"),
            reported_by: row.get("reported_by"),
            assigned_detective: row.get("assigned_detective"),
            assigned_sergeant: row.get("assigned_sergeant"),
            created_at: parse_timestamp(row.get("created_at")),
            updated_at: parse_timestamp(row.get("updated_at")),
        }
    }
}

/// Payload for filing a new case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDraft {
    pub title: String,
    pub description: String,
    pub crime_level: i64,
    pub formation_type: FormationType,
    pub crime_occurred_at: Option<DateTime<Utc>>,
    pub crime_scene_location: Option<String>,
    #[serde(default)]
    pub witnesses: Vec<WitnessDraft>,
}

/// Witness contact details captured at crime-scene filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessDraft {
    pub national_id: String,
    pub phone_number: String,
    pub full_name: Option<String>,
    pub notes: Option<String>,
}

/// Witness record attached to a case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseWitness {
    pub id: i64,
    pub case_id: i64,
    pub national_id: String,
    pub phone_number: String,
    pub full_name: Option<String>,
    pub notes: Option<String>,
    pub registered_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Additional complainant on a complaint case, unique per (case, user).
#[derive(Debug, Clone, Serialize)]
pub struct CaseComplainant {
    pub id: i64,
    pub case_id: i64,
    pub user_id: i64,
    pub status: VerificationStatus,
    pub note: Option<String>,
    pub verified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Person of interest, possibly unregistered (alias only). Never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Suspect {
    pub id: i64,
    pub alias: String,
    pub person_id: Option<i64>,
    pub status: SuspectStatus,
    pub cached_ranking_score: i64,
    pub created_at: DateTime<Utc>,
}

impl Suspect {
    /// Map a full `suspects` row.
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            alias: row.get("alias"),
            person_id: row.get("person_id"),
            status: SuspectStatus::parse(row.get("status")),
            cached_ranking_score: row.get("cached_ranking_score"),
            created_at: parse_timestamp(row.get("created_at")),
        }
    }
}

/// Scoring/verdict chain of one suspect within one case, unique per pair.
#[derive(Debug, Clone, Serialize)]
pub struct Interrogation {
    pub id: i64,
    pub case_id: i64,
    pub suspect_id: i64,
    pub status: InterrogationStatus,
    pub detective_score: Option<i64>,
    pub sergeant_score: Option<i64>,
    pub sergeant_notes: Option<String>,
    pub captain_approved: Option<bool>,
    pub captain_notes: Option<String>,
    pub chief_approved: Option<bool>,
    pub chief_notes: Option<String>,
    pub bail_amount: Option<i64>,
    pub released_on_bail: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interrogation {
    /// The captain tier only opens once both scores are recorded.
    pub fn has_both_scores(&self) -> bool {
        self.detective_score.is_some() && self.sergeant_score.is_some()
    }

    /// Map a full `interrogations` row.
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            case_id: row.get("case_id"),
            suspect_id: row.get("suspect_id"),
            status: InterrogationStatus::parse(row.get("status")),
            detective_score: row.get("detective_score"),
            sergeant_score: row.get("sergeant_score"),
            sergeant_notes: row.get("sergeant_notes"),
            captain_approved: row
                .get::<Option<i64>, _>("captain_approved")
                .map(|v| v != 0),
            captain_notes: row.get("captain_notes"),
            chief_approved: row.get::<Option<i64>, _>("chief_approved").map(|v| v != 0),
            chief_notes: row.get("chief_notes"),
            bail_amount: row.get("bail_amount"),
            released_on_bail: row.get::<i64, _>("released_on_bail") != 0,
            created_at: parse_timestamp(row.get("created_at")),
            updated_at: parse_timestamp(row.get("updated_at")),
        }
    }
}

/// Terminal record of a judge's decision, one-to-one with an interrogation.
#[derive(Debug, Clone, Serialize)]
pub struct CourtVerdict {
    pub id: i64,
    pub interrogation_id: i64,
    pub judge_id: i64,
    pub verdict: Verdict,
    pub sentence_type: SentenceType,
    pub prison_months: i64,
    pub fine_amount: i64,
    pub title: String,
    pub description: String,
    pub issued_at: DateTime<Utc>,
}

impl CourtVerdict {
    /// Map a full `court_verdicts` row.
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            interrogation_id: row.get("interrogation_id"),
            judge_id: row.get("judge_id"),
            verdict: Verdict::parse(row.get("verdict")),
            sentence_type: SentenceType::parse(row.get("sentence_type")),
            prison_months: row.get("prison_months"),
            fine_amount: row.get("fine_amount"),
            title: row.get("title"),
            description: row.get("description"),
            issued_at: parse_timestamp(row.get("issued_at")),
        }
    }
}

/// Parse an rfc3339 TEXT column, falling back to now on corrupt data.
pub(crate) fn parse_timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a nullable rfc3339 TEXT column.
pub(crate) fn parse_timestamp_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
