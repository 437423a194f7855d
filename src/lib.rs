//! Precinct case workflow engine.
//!
//! Models the lifecycle of a criminal case through a police and judicial
//! hierarchy: filing, multi-tier review, investigation, interrogation,
//! verdict, and closure. Transitions are role-gated and audited, and closed
//! work feeds a derived most-wanted ranking with cash rewards.

pub mod audit;
pub mod cases;
pub mod config;
pub mod court;
pub mod database;
pub mod error;
pub mod evidence;
pub mod health;
pub mod interrogation;
pub mod models;
pub mod ranking;
pub mod rewards;
pub mod roles;

pub use error::{PrecinctError, Result};
