//! Precinct case workflow service entry point.
//!
//! Wires the case, interrogation, court, evidence, and reward services over a
//! shared SQLite database, serves health probes, and keeps suspect rankings
//! fresh in the background until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use precinct::audit::AuditTrail;
use precinct::cases::CaseSystem;
use precinct::config::PrecinctConfig;
use precinct::court::CourtSystem;
use precinct::database::Database;
use precinct::error::{PrecinctError, Result};
use precinct::evidence::EvidenceLocker;
use precinct::health::spawn_health_server;
use precinct::interrogation::InterrogationSystem;
use precinct::ranking::RankingEngine;
use precinct::rewards::RewardSystem;
use precinct::roles::RoleAuthority;

/// Shared services held for the lifetime of the process.
#[allow(dead_code)]
struct PrecinctServices {
    cases: Arc<CaseSystem>,
    interrogations: Arc<InterrogationSystem>,
    court: Arc<CourtSystem>,
    evidence: Arc<EvidenceLocker>,
    rewards: Arc<RewardSystem>,
    audit: Arc<AuditTrail>,
}

/// Spawn the periodic ranking refresh task.
fn spawn_ranking_refresh(ranking: Arc<RankingEngine>, refresh_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs));
        loop {
            interval.tick().await;
            match ranking.refresh_all().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count = count, "Refreshed suspect rankings");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to refresh suspect rankings");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // RUST_LOG controls verbosity, defaulting to info
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Precinct service starting...");

    let config = PrecinctConfig::from_env()?;
    tracing::info!("Configuration loaded");

    let db = Arc::new(Database::new(&config.database_path).await?);
    tracing::info!(path = %config.database_path, "Database initialized");

    let roles = Arc::new(RoleAuthority::new(db.clone()));
    tracing::info!("Role authority initialized");

    let ranking = Arc::new(RankingEngine::new(db.clone()));
    tracing::info!("Ranking engine initialized");

    let cases = Arc::new(CaseSystem::new(db.clone(), roles.clone())?);
    tracing::info!("Case system initialized");

    let interrogations = Arc::new(InterrogationSystem::new(
        db.clone(),
        roles.clone(),
        ranking.clone(),
    ));
    tracing::info!("Interrogation system initialized");

    let court = Arc::new(CourtSystem::new(db.clone(), roles.clone(), ranking.clone()));
    tracing::info!("Court system initialized");

    let evidence = Arc::new(EvidenceLocker::new(db.clone(), roles.clone()));
    tracing::info!("Evidence locker initialized");

    let rewards = Arc::new(RewardSystem::new(db.clone(), roles.clone()));
    tracing::info!("Reward system initialized");

    let audit = Arc::new(AuditTrail::new(db.clone()));

    let _services = PrecinctServices {
        cases,
        interrogations,
        court,
        evidence,
        rewards,
        audit,
    };

    spawn_ranking_refresh(ranking.clone(), config.ranking_refresh_secs);
    tracing::info!(
        refresh_secs = config.ranking_refresh_secs,
        "Ranking refresh task spawned"
    );

    spawn_health_server(db.clone(), config.health_port);

    tracing::info!("Precinct service ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| PrecinctError::Io(e.to_string()))?;
    tracing::info!("Shutdown signal received, stopping");

    Ok(())
}
