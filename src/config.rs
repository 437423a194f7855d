//! Configuration loading from environment.
//!
//! Reads runtime settings from environment variables, falling back to
//! defaults suitable for local development. A variable that is present but
//! unparseable fails startup instead of being silently ignored.

use std::env;

use crate::error::{PrecinctError, Result};

/// Default SQLite database path.
pub const DEFAULT_DATABASE_PATH: &str = "precinct.db";
/// Default port for the health endpoints.
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
/// Default interval between background ranking refreshes.
pub const DEFAULT_RANKING_REFRESH_SECS: u64 = 3600;

/// Main configuration for the precinct service.
#[derive(Debug, Clone)]
pub struct PrecinctConfig {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Port the health server listens on.
    pub health_port: u16,
    /// Seconds between background ranking refreshes.
    pub ranking_refresh_secs: u64,
}

impl PrecinctConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `DATABASE_PATH`: SQLite file path (default: `precinct.db`)
    /// - `HEALTH_PORT`: health endpoint port (default: 8080)
    /// - `RANKING_REFRESH_SECS`: seconds between ranking refreshes
    ///   (default: 3600)
    pub fn from_env() -> Result<Self> {
        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

        let health_port = parse_var("HEALTH_PORT", DEFAULT_HEALTH_PORT)?;
        let ranking_refresh_secs = parse_var("RANKING_REFRESH_SECS", DEFAULT_RANKING_REFRESH_SECS)?;

        if ranking_refresh_secs == 0 {
            return Err(PrecinctError::Config(
                "RANKING_REFRESH_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_path,
            health_port,
            ranking_refresh_secs,
        })
    }
}

/// Parse an optional environment variable, failing loudly on junk values.
fn parse_var<T: std::str::FromStr>(var_name: &str, default: T) -> Result<T> {
    match env::var(var_name) {
        Ok(raw) => raw.parse().map_err(|_| {
            PrecinctError::Config(format!("{} has an invalid value: {}", var_name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use crate::config::{parse_var, DEFAULT_HEALTH_PORT, DEFAULT_RANKING_REFRESH_SECS};
    use crate::error::PrecinctError;

    #[test]
    fn parse_var_uses_default_when_unset() {
        let var_name = format!("TEST_PARSE_UNSET_{}", rand::random::<u32>());
        env::remove_var(&var_name);
        let value = parse_var(&var_name, DEFAULT_HEALTH_PORT).expect("should fall back");
        assert_eq!(value, DEFAULT_HEALTH_PORT);
    }

    #[test]
    fn parse_var_reads_valid_value() {
        let var_name = format!("TEST_PARSE_VALID_{}", rand::random::<u32>());
        env::set_var(&var_name, "9100");
        let value: u16 = parse_var(&var_name, DEFAULT_HEALTH_PORT).expect("should parse");
        env::remove_var(&var_name);
        assert_eq!(value, 9100);
    }

    #[test]
    fn parse_var_rejects_junk() {
        let var_name = format!("TEST_PARSE_JUNK_{}", rand::random::<u32>());
        env::set_var(&var_name, "not-a-number");
        let err = parse_var(&var_name, DEFAULT_RANKING_REFRESH_SECS).expect_err("junk value");
        env::remove_var(&var_name);
        assert!(matches!(err, PrecinctError::Config(_)));
        assert!(err.to_string().contains(&var_name));
    }

    #[test]
    fn defaults_are_sane() {
        assert!(DEFAULT_HEALTH_PORT > 1024);
        assert!(DEFAULT_RANKING_REFRESH_SECS > 0);
    }
}
