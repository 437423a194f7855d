//! Evidence locker.
//!
//! Append-only evidence records attached to cases. Each record carries one
//! typed payload, stored as JSON, with per-kind validation at intake.
//! Records are never edited or removed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::parse_timestamp;
use crate::roles::{Action, RoleAuthority};

/// Evidence categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceKind {
    Witness,
    Biological,
    Vehicle,
    IdDocument,
    Misc,
}

impl EvidenceKind {
    /// Convert from database codename.
    pub fn parse(s: &str) -> Self {
        match s {
            "WITNESS" => Self::Witness,
            "BIOLOGICAL" => Self::Biological,
            "VEHICLE" => Self::Vehicle,
            "ID_DOCUMENT" => Self::IdDocument,
            _ => Self::Misc,
        }
    }

    /// Convert to database codename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Witness => "WITNESS",
            Self::Biological => "BIOLOGICAL",
            Self::Vehicle => "VEHICLE",
            Self::IdDocument => "ID_DOCUMENT",
            Self::Misc => "MISC",
        }
    }
}

/// Typed evidence payload, one shape per kind.
///
/// Vehicle evidence is identified by exactly one of a plate number or a
/// serial number. Verified biological material names its verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidencePayload {
    Witness {
        transcript: String,
        media_url: Option<String>,
        witness_national_id: Option<String>,
    },
    Biological {
        material: String,
        verified: bool,
        verified_by: Option<i64>,
    },
    Vehicle {
        model: Option<String>,
        color: Option<String>,
        plate_number: Option<String>,
        serial_number: Option<String>,
    },
    IdDocument {
        owner_name: String,
        document: serde_json::Value,
    },
    Misc {
        notes: String,
    },
}

impl EvidencePayload {
    /// The category this payload belongs to.
    pub fn kind(&self) -> EvidenceKind {
        match self {
            Self::Witness { .. } => EvidenceKind::Witness,
            Self::Biological { .. } => EvidenceKind::Biological,
            Self::Vehicle { .. } => EvidenceKind::Vehicle,
            Self::IdDocument { .. } => EvidenceKind::IdDocument,
            Self::Misc { .. } => EvidenceKind::Misc,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Witness { transcript, .. } => {
                if transcript.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "witness evidence requires a transcript".to_string(),
                    ));
                }
            }
            Self::Biological {
                material,
                verified,
                verified_by,
            } => {
                if material.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "biological evidence requires the material".to_string(),
                    ));
                }
                if *verified && verified_by.is_none() {
                    return Err(PrecinctError::Validation(
                        "verified biological evidence requires the verifier".to_string(),
                    ));
                }
            }
            Self::Vehicle {
                plate_number,
                serial_number,
                ..
            } => {
                if plate_number.is_some() == serial_number.is_some() {
                    return Err(PrecinctError::Validation(
                        "vehicle evidence requires exactly one of plate or serial number"
                            .to_string(),
                    ));
                }
            }
            Self::IdDocument { owner_name, .. } => {
                if owner_name.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "identity document evidence requires the owner name".to_string(),
                    ));
                }
            }
            Self::Misc { notes } => {
                if notes.trim().is_empty() {
                    return Err(PrecinctError::Validation(
                        "misc evidence requires notes".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One evidence record in the locker.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub id: i64,
    pub case_id: i64,
    pub recorded_by: i64,
    pub kind: EvidenceKind,
    pub title: String,
    pub description: String,
    pub payload: EvidencePayload,
    pub created_at: DateTime<Utc>,
}

/// Evidence intake and retrieval service.
pub struct EvidenceLocker {
    db: Arc<Database>,
    roles: Arc<RoleAuthority>,
}

impl EvidenceLocker {
    /// Create a new evidence locker.
    pub fn new(db: Arc<Database>, roles: Arc<RoleAuthority>) -> Self {
        Self { db, roles }
    }

    /// Record evidence on a case that is still moving through the workflow.
    /// Police ranks only.
    pub async fn record_evidence(
        &self,
        case_id: i64,
        actor_id: i64,
        title: &str,
        description: &str,
        payload: &EvidencePayload,
    ) -> Result<Evidence> {
        self.roles.require(actor_id, Action::RecordEvidence).await?;
        let case = self.db.require_case(case_id).await?;

        if case.status.is_terminal() {
            return Err(PrecinctError::PreconditionFailed(
                "case is closed".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(PrecinctError::Validation(
                "evidence title is required".to_string(),
            ));
        }
        payload.validate()?;

        let kind = payload.kind();
        let serialized = serde_json::to_string(payload)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO evidence (case_id, recorded_by, kind, title, description, payload,
                                   created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(case_id)
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(title.trim())
        .bind(description)
        .bind(&serialized)
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to record evidence: {}", e)))?;

        let evidence_id = result.last_insert_rowid();
        tracing::info!(
            case_id = case_id,
            evidence_id = evidence_id,
            kind = kind.as_str(),
            "Evidence recorded"
        );

        Ok(Evidence {
            id: evidence_id,
            case_id,
            recorded_by: actor_id,
            kind,
            title: title.trim().to_string(),
            description: description.to_string(),
            payload: payload.clone(),
            created_at: now,
        })
    }

    /// Everything recorded on a case, in intake order.
    pub async fn evidence_for_case(&self, case_id: i64) -> Result<Vec<Evidence>> {
        let rows = sqlx::query(
            "SELECT id, case_id, recorded_by, kind, title, description, payload, created_at
             FROM evidence WHERE case_id = ? ORDER BY id ASC",
        )
        .bind(case_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to load evidence: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: EvidencePayload = serde_json::from_str(row.get("payload"))?;
            records.push(Evidence {
                id: row.get("id"),
                case_id: row.get("case_id"),
                recorded_by: row.get("recorded_by"),
                kind: EvidenceKind::parse(row.get("kind")),
                title: row.get("title"),
                description: row.get("description"),
                payload,
                created_at: parse_timestamp(row.get("created_at")),
            });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cases::tests::{seed_roles, CITIZEN, DETECTIVE, JUDGE, OFFICER};
    use crate::database::Database;
    use crate::error::PrecinctError;
    use crate::evidence::{EvidenceKind, EvidenceLocker, EvidencePayload};
    use crate::ranking::tests::insert_case;
    use crate::roles::RoleAuthority;

    async fn test_locker() -> (EvidenceLocker, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.expect("should create db"));
        let roles = Arc::new(RoleAuthority::new(db.clone()));
        seed_roles(&roles).await;
        (EvidenceLocker::new(db.clone(), roles), db)
    }

    fn witness_payload() -> EvidencePayload {
        EvidencePayload::Witness {
            transcript: "Saw two men at the dock around midnight.".to_string(),
            media_url: None,
            witness_national_id: Some("1234567890".to_string()),
        }
    }

    #[tokio::test]
    async fn police_record_and_citizens_do_not() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "OPEN", 0).await;

        let recorded = locker
            .record_evidence(case_id, OFFICER, "Dock statement", "", &witness_payload())
            .await
            .expect("officer records");
        assert_eq!(recorded.kind, EvidenceKind::Witness);
        assert_eq!(recorded.recorded_by, OFFICER);

        let err = locker
            .record_evidence(case_id, CITIZEN, "Tip", "", &witness_payload())
            .await
            .expect_err("citizen denied");
        assert!(matches!(err, PrecinctError::Unauthorized { .. }));

        let err = locker
            .record_evidence(case_id, JUDGE, "Ruling", "", &witness_payload())
            .await
            .expect_err("judge denied");
        assert!(matches!(err, PrecinctError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn closed_cases_accept_nothing() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "VOIDED", 0).await;

        let err = locker
            .record_evidence(case_id, OFFICER, "Late find", "", &witness_payload())
            .await
            .expect_err("case closed");
        assert!(matches!(err, PrecinctError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn vehicle_identifier_is_exactly_one() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "OPEN", 0).await;

        let neither = EvidencePayload::Vehicle {
            model: Some("sedan".to_string()),
            color: Some("grey".to_string()),
            plate_number: None,
            serial_number: None,
        };
        let err = locker
            .record_evidence(case_id, OFFICER, "Vehicle", "", &neither)
            .await
            .expect_err("no identifier");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let both = EvidencePayload::Vehicle {
            model: None,
            color: None,
            plate_number: Some("XJ-4471".to_string()),
            serial_number: Some("5150-A".to_string()),
        };
        let err = locker
            .record_evidence(case_id, OFFICER, "Vehicle", "", &both)
            .await
            .expect_err("two identifiers");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let plate_only = EvidencePayload::Vehicle {
            model: Some("van".to_string()),
            color: None,
            plate_number: Some("XJ-4471".to_string()),
            serial_number: None,
        };
        locker
            .record_evidence(case_id, OFFICER, "Vehicle", "", &plate_only)
            .await
            .expect("plate only passes");
    }

    #[tokio::test]
    async fn verified_biological_names_its_verifier() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "OPEN", 0).await;

        let unverified_claim = EvidencePayload::Biological {
            material: "blood sample".to_string(),
            verified: true,
            verified_by: None,
        };
        let err = locker
            .record_evidence(case_id, DETECTIVE, "Sample", "", &unverified_claim)
            .await
            .expect_err("verifier missing");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let verified = EvidencePayload::Biological {
            material: "blood sample".to_string(),
            verified: true,
            verified_by: Some(DETECTIVE),
        };
        locker
            .record_evidence(case_id, DETECTIVE, "Sample", "lab run 2", &verified)
            .await
            .expect("should record");
    }

    #[tokio::test]
    async fn payloads_survive_storage() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "OPEN", 0).await;

        let document = EvidencePayload::IdDocument {
            owner_name: "R. Calloway".to_string(),
            document: serde_json::json!({
                "type": "passport",
                "number": "K8817712",
                "expires": "2031-05-01"
            }),
        };
        locker
            .record_evidence(case_id, OFFICER, "Recovered passport", "", &document)
            .await
            .expect("should record");
        locker
            .record_evidence(case_id, OFFICER, "Dock statement", "", &witness_payload())
            .await
            .expect("should record");

        let records = locker
            .evidence_for_case(case_id)
            .await
            .expect("should list");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, document);
        assert_eq!(records[0].kind, EvidenceKind::IdDocument);
        assert_eq!(records[1].payload, witness_payload());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected_per_kind() {
        let (locker, db) = test_locker().await;
        let case_id = insert_case(&db, 2, "OPEN", 0).await;

        let blank_transcript = EvidencePayload::Witness {
            transcript: "  ".to_string(),
            media_url: None,
            witness_national_id: None,
        };
        let err = locker
            .record_evidence(case_id, OFFICER, "Statement", "", &blank_transcript)
            .await
            .expect_err("blank transcript");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let blank_notes = EvidencePayload::Misc {
            notes: String::new(),
        };
        let err = locker
            .record_evidence(case_id, OFFICER, "Misc", "", &blank_notes)
            .await
            .expect_err("blank notes");
        assert!(matches!(err, PrecinctError::Validation(_)));

        let err = locker
            .record_evidence(case_id, OFFICER, "   ", "", &witness_payload())
            .await
            .expect_err("blank title");
        assert!(matches!(err, PrecinctError::Validation(_)));
    }
}
