//! SQLite database for persistent storage.
//!
//! Holds cases, suspects, interrogations, verdicts, evidence, reward tips,
//! the append-only case status log, and role assignments.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{PrecinctError, Result};
use crate::models::{Case, Interrogation, Suspect, SuspectStatus};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection.
    ///
    /// Creates the database file and initializes schema if needed.
    pub async fn new(path: &str) -> Result<Self> {
        let db_path = Path::new(path);

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PrecinctError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to create in-memory db: {}", e)))?;

        let db = Self { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Initialize database schema.
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if the database is healthy.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PrecinctError::Database(format!("Health check failed: {}", e)))?;

        Ok(())
    }

    // ========== Shared entity lookups ==========

    /// Get a case by id.
    pub async fn get_case(&self, case_id: i64) -> Result<Option<Case>> {
        let row = sqlx::query(
            "SELECT id, title, description, crime_level, formation_type, status,
                    complainant_rejection_count, crime_occurred_at, crime_scene_location,
                    primary_complainant, reported_by, assigned_detective, assigned_sergeant,
                    created_at, updated_at
             FROM cases WHERE id = ?",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get case: {}", e)))?;

        Ok(row.map(|row| Case::from_row(&row)))
    }

    /// Get a case by id, or fail with NotFound.
    pub async fn require_case(&self, case_id: i64) -> Result<Case> {
        self.get_case(case_id)
            .await?
            .ok_or_else(|| PrecinctError::NotFound {
                entity: "case",
                id: case_id.to_string(),
            })
    }

    /// Get a suspect by id.
    pub async fn get_suspect(&self, suspect_id: i64) -> Result<Option<Suspect>> {
        let row = sqlx::query(
            "SELECT id, alias, person_id, status, cached_ranking_score, created_at
             FROM suspects WHERE id = ?",
        )
        .bind(suspect_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get suspect: {}", e)))?;

        Ok(row.map(|row| Suspect::from_row(&row)))
    }

    /// Get a suspect by id, or fail with NotFound.
    pub async fn require_suspect(&self, suspect_id: i64) -> Result<Suspect> {
        self.get_suspect(suspect_id)
            .await?
            .ok_or_else(|| PrecinctError::NotFound {
                entity: "suspect",
                id: suspect_id.to_string(),
            })
    }

    /// Get an interrogation by id.
    pub async fn get_interrogation(&self, interrogation_id: i64) -> Result<Option<Interrogation>> {
        let row = sqlx::query(
            "SELECT id, case_id, suspect_id, status, detective_score, sergeant_score,
                    sergeant_notes, captain_approved, captain_notes, chief_approved,
                    chief_notes, bail_amount, released_on_bail, created_at, updated_at
             FROM interrogations WHERE id = ?",
        )
        .bind(interrogation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get interrogation: {}", e)))?;

        Ok(row.map(|row| Interrogation::from_row(&row)))
    }

    /// Get an interrogation by id, or fail with NotFound.
    pub async fn require_interrogation(&self, interrogation_id: i64) -> Result<Interrogation> {
        self.get_interrogation(interrogation_id)
            .await?
            .ok_or_else(|| PrecinctError::NotFound {
                entity: "interrogation",
                id: interrogation_id.to_string(),
            })
    }

    /// Register a new suspect under surveillance.
    pub async fn create_suspect(&self, alias: &str, person_id: Option<i64>) -> Result<Suspect> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "INSERT INTO suspects (alias, person_id, status, cached_ranking_score, created_at)
             VALUES (?, ?, 'UNDER_SURVEILLANCE', 0, ?)",
        )
        .bind(alias)
        .bind(person_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to create suspect: {}", e)))?;

        Ok(Suspect {
            id: result.last_insert_rowid(),
            alias: alias.to_string(),
            person_id,
            status: SuspectStatus::UnderSurveillance,
            cached_ranking_score: 0,
            created_at: now,
        })
    }
}

const SCHEMA: &str = r#"
-- Cases
CREATE TABLE IF NOT EXISTS cases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    crime_level INTEGER NOT NULL CHECK(crime_level BETWEEN 1 AND 4),
    formation_type TEXT NOT NULL CHECK(formation_type IN ('COMPLAINT', 'CRIME_SCENE')),
    status TEXT NOT NULL DEFAULT 'PENDING_CADET_REVIEW',
    complainant_rejection_count INTEGER NOT NULL DEFAULT 0,
    crime_occurred_at TEXT,
    crime_scene_location TEXT,
    primary_complainant INTEGER,
    reported_by INTEGER,
    assigned_detective INTEGER,
    assigned_sergeant INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Additional complainants on a complaint case
CREATE TABLE IF NOT EXISTS case_complainants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'VERIFIED', 'REJECTED')),
    note TEXT,
    verified_by INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(case_id, user_id),
    FOREIGN KEY (case_id) REFERENCES cases(id)
);

-- Witness contacts captured at crime-scene filing
CREATE TABLE IF NOT EXISTS case_witnesses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    national_id TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    full_name TEXT,
    notes TEXT,
    registered_by INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (case_id) REFERENCES cases(id)
);

-- Append-only status transition log
CREATE TABLE IF NOT EXISTS case_status_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    from_status TEXT,
    to_status TEXT NOT NULL,
    actor_id INTEGER NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (case_id) REFERENCES cases(id)
);

-- Suspects
CREATE TABLE IF NOT EXISTS suspects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alias TEXT NOT NULL,
    person_id INTEGER,
    status TEXT NOT NULL DEFAULT 'UNDER_SURVEILLANCE' CHECK(status IN ('UNDER_SURVEILLANCE', 'MOST_WANTED', 'ARRESTED', 'RELEASED_ON_BAIL', 'CONVICTED', 'ACQUITTED')),
    cached_ranking_score INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Interrogations, unique per (case, suspect)
CREATE TABLE IF NOT EXISTS interrogations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    suspect_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'WAITING_FOR_SERGEANT',
    detective_score INTEGER CHECK(detective_score BETWEEN 1 AND 10),
    sergeant_score INTEGER CHECK(sergeant_score BETWEEN 1 AND 10),
    sergeant_notes TEXT,
    captain_approved INTEGER,
    captain_notes TEXT,
    chief_approved INTEGER,
    chief_notes TEXT,
    bail_amount INTEGER,
    released_on_bail INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(case_id, suspect_id),
    FOREIGN KEY (case_id) REFERENCES cases(id),
    FOREIGN KEY (suspect_id) REFERENCES suspects(id)
);

-- Court verdicts, one-to-one with interrogations
CREATE TABLE IF NOT EXISTS court_verdicts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    interrogation_id INTEGER NOT NULL UNIQUE,
    judge_id INTEGER NOT NULL,
    verdict TEXT NOT NULL CHECK(verdict IN ('GUILTY', 'INNOCENT')),
    sentence_type TEXT NOT NULL CHECK(sentence_type IN ('NONE', 'PRISON', 'FINE', 'PRISON_AND_FINE', 'COMMUNITY_SERVICE', 'EXECUTION')),
    prison_months INTEGER NOT NULL DEFAULT 0,
    fine_amount INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    issued_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (interrogation_id) REFERENCES interrogations(id)
);

-- Evidence records, append-only
CREATE TABLE IF NOT EXISTS evidence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER NOT NULL,
    recorded_by INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('WITNESS', 'BIOLOGICAL', 'VEHICLE', 'ID_DOCUMENT', 'MISC')),
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (case_id) REFERENCES cases(id)
);

-- Citizen reward tips
CREATE TABLE IF NOT EXISTS reward_tips (
    id TEXT PRIMARY KEY,
    suspect_id INTEGER NOT NULL,
    submitted_by INTEGER NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'FORWARDED', 'APPROVED', 'REJECTED', 'PAID')),
    amount INTEGER,
    reviewed_by INTEGER,
    payout_reference TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    resolved_at TEXT,
    FOREIGN KEY (suspect_id) REFERENCES suspects(id)
);

-- Role assignments
CREATE TABLE IF NOT EXISTS role_assignments (
    user_id INTEGER PRIMARY KEY,
    role TEXT NOT NULL CHECK(role IN ('CITIZEN', 'CADET', 'OFFICER', 'DETECTIVE', 'SERGEANT', 'CAPTAIN', 'CHIEF', 'JUDGE')),
    assigned_by INTEGER NOT NULL,
    assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_cases_status ON cases(status);
CREATE INDEX IF NOT EXISTS idx_cases_formation_status ON cases(formation_type, status);
CREATE INDEX IF NOT EXISTS idx_status_log_case ON case_status_log(case_id, id);
CREATE INDEX IF NOT EXISTS idx_complainants_case ON case_complainants(case_id);
CREATE INDEX IF NOT EXISTS idx_witnesses_case ON case_witnesses(case_id);
CREATE INDEX IF NOT EXISTS idx_suspects_score ON suspects(cached_ranking_score DESC);
CREATE INDEX IF NOT EXISTS idx_interrogations_case ON interrogations(case_id);
CREATE INDEX IF NOT EXISTS idx_interrogations_suspect ON interrogations(suspect_id);
CREATE INDEX IF NOT EXISTS idx_evidence_case ON evidence(case_id);
CREATE INDEX IF NOT EXISTS idx_tips_suspect ON reward_tips(suspect_id);
CREATE INDEX IF NOT EXISTS idx_tips_status ON reward_tips(status);
"#;


#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::database::Database;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// **Feature: case-workflow, Property: Suspect Alias Fidelity**
        ///
        /// Any alias string, including quotes and unicode, must survive a
        /// store/load cycle unchanged (bind parameters, never interpolation).
        #[test]
        fn prop_suspect_alias_roundtrip(alias in "\\PC{1,64}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let db = Database::in_memory().await.expect("should create db");

                let suspect = db
                    .create_suspect(&alias, None)
                    .await
                    .expect("should create suspect");

                let retrieved = db
                    .get_suspect(suspect.id)
                    .await
                    .expect("should get")
                    .expect("should exist");

                assert_eq!(retrieved.alias, alias);
            });
        }
    }
}
