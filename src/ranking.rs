//! Suspect ranking and reward engine.
//!
//! A suspect's score is the product of the highest crime level across every
//! linked case and the age in days of the oldest still-active linked case
//! (minimum one day, zero when nothing is active). Rewards are a fixed
//! multiple of the score. Crossing the age threshold promotes a surveilled
//! suspect to MOST_WANTED; the engine never demotes and never touches
//! custody or court statuses.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;

use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{parse_timestamp, CaseStatus, Suspect, SuspectStatus};

/// Days the oldest active case must exceed before promotion to MOST_WANTED.
pub const MOST_WANTED_THRESHOLD_DAYS: i64 = 30;

/// Bounty per ranking point.
pub const REWARD_MULTIPLIER: i64 = 20_000_000;

/// Computed ranking snapshot for one suspect.
#[derive(Debug, Clone, Serialize)]
pub struct SuspectRanking {
    pub suspect_id: i64,
    pub score: i64,
    pub reward_amount: i64,
    pub status: SuspectStatus,
}

/// Ranking computation service.
pub struct RankingEngine {
    db: Arc<Database>,
}

impl RankingEngine {
    /// Create a new ranking engine.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Reward owed for a given score.
    pub fn reward_amount(score: i64) -> i64 {
        score * REWARD_MULTIPLIER
    }

    /// Recompute and persist one suspect's score, applying the MOST_WANTED
    /// promotion when earned.
    ///
    /// The promotion UPDATE is guarded on UNDER_SURVEILLANCE so a racing
    /// arrest or verdict always wins; a lost race just skips the promotion.
    pub async fn recompute(&self, suspect_id: i64) -> Result<SuspectRanking> {
        let suspect = self.db.require_suspect(suspect_id).await?;

        let rows = sqlx::query(
            "SELECT c.crime_level, c.status, c.created_at
             FROM cases c
             JOIN interrogations i ON i.case_id = c.id
             WHERE i.suspect_id = ?",
        )
        .bind(suspect_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to load linked cases: {}", e)))?;

        let now = Utc::now();
        let mut max_crime_level: i64 = 0;
        let mut oldest_active: Option<DateTime<Utc>> = None;
        for row in &rows {
            let level: i64 = row.get("crime_level");
            max_crime_level = max_crime_level.max(level);

            let status = CaseStatus::parse(row.get("status"));
            if !status.is_terminal() {
                let created = parse_timestamp(row.get("created_at"));
                oldest_active = Some(match oldest_active {
                    Some(current) if current <= created => current,
                    _ => created,
                });
            }
        }

        let max_days_open = match oldest_active {
            Some(created) => (now - created).num_days().max(1),
            None => 0,
        };
        let score = max_crime_level * max_days_open;

        sqlx::query("UPDATE suspects SET cached_ranking_score = ? WHERE id = ?")
            .bind(score)
            .bind(suspect_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to store score: {}", e)))?;

        let mut status = suspect.status;
        if status == SuspectStatus::UnderSurveillance
            && max_days_open > MOST_WANTED_THRESHOLD_DAYS
        {
            let result = sqlx::query(
                "UPDATE suspects SET status = 'MOST_WANTED'
                 WHERE id = ? AND status = 'UNDER_SURVEILLANCE'",
            )
            .bind(suspect_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| PrecinctError::Database(format!("Failed to promote suspect: {}", e)))?;

            if result.rows_affected() > 0 {
                status = SuspectStatus::MostWanted;
                tracing::info!(
                    suspect_id = suspect_id,
                    days_open = max_days_open,
                    "Suspect promoted to MOST_WANTED"
                );
            }
        }

        tracing::debug!(
            suspect_id = suspect_id,
            score = score,
            max_crime_level = max_crime_level,
            max_days_open = max_days_open,
            "Ranking recomputed"
        );

        Ok(SuspectRanking {
            suspect_id,
            score,
            reward_amount: Self::reward_amount(score),
            status,
        })
    }

    /// Read the cached ranking without recomputing.
    pub async fn suspect_ranking(&self, suspect_id: i64) -> Result<SuspectRanking> {
        let suspect = self.db.require_suspect(suspect_id).await?;
        Ok(SuspectRanking {
            suspect_id,
            score: suspect.cached_ranking_score,
            reward_amount: Self::reward_amount(suspect.cached_ranking_score),
            status: suspect.status,
        })
    }

    /// The MOST_WANTED board, highest score first.
    pub async fn most_wanted(&self, limit: i64) -> Result<Vec<Suspect>> {
        let limit = limit.clamp(1, 100);
        let rows = sqlx::query(
            "SELECT id, alias, person_id, status, cached_ranking_score, created_at
             FROM suspects WHERE status = 'MOST_WANTED'
             ORDER BY cached_ranking_score DESC, id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to load most wanted: {}", e)))?;

        Ok(rows.iter().map(Suspect::from_row).collect())
    }

    /// Recompute every suspect not yet decided by a court. Used by the
    /// periodic refresh task to catch day-boundary promotions.
    pub async fn refresh_all(&self) -> Result<usize> {
        let rows = sqlx::query(
            "SELECT id FROM suspects
             WHERE status NOT IN ('CONVICTED', 'ACQUITTED') ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to list suspects: {}", e)))?;

        let mut refreshed = 0;
        for row in rows {
            let suspect_id: i64 = row.get("id");
            self.recompute(suspect_id).await?;
            refreshed += 1;
        }

        if refreshed > 0 {
            tracing::debug!(refreshed = refreshed, "Ranking refresh pass complete");
        }
        Ok(refreshed)
    }
}


#[cfg(test)]
mod property_tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::database::Database;
    use crate::models::SuspectStatus;
    use crate::ranking::{RankingEngine, MOST_WANTED_THRESHOLD_DAYS, REWARD_MULTIPLIER};

    use super::tests::{insert_case, link_suspect};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// **Feature: suspect-ranking, Property: Score Formula**
        ///
        /// For one active case of any level and age, the score is
        /// level * max(1, age_days), the reward is score * multiplier, and
        /// promotion happens exactly when the age exceeds the threshold.
        #[test]
        fn prop_single_case_score(level in 1i64..=4, days in 0i64..60) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let db = Arc::new(Database::in_memory().await.expect("should create db"));
                let engine = RankingEngine::new(db.clone());

                let suspect = db.create_suspect("subject", None).await.expect("suspect");
                let case_id = insert_case(&db, level, "OPEN", days).await;
                link_suspect(&db, case_id, suspect.id).await;

                let ranking = engine.recompute(suspect.id).await.expect("should rank");

                let expected_days = days.max(1);
                assert_eq!(ranking.score, level * expected_days);
                assert_eq!(ranking.reward_amount, ranking.score * REWARD_MULTIPLIER);

                if days > MOST_WANTED_THRESHOLD_DAYS {
                    assert_eq!(ranking.status, SuspectStatus::MostWanted);
                } else {
                    assert_eq!(ranking.status, SuspectStatus::UnderSurveillance);
                }
            });
        }
    }
}
