//! Application state management.
//!
//! The state is cloned into the readiness probe and the shutdown cleanup:
//! - Configuration
//! - PostgreSQL connection pool
//! - JWT issuer/verifier shared by the account routes

use axum_helpers::JwtAuth;
use database::DatabaseConnection;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// PostgreSQL database connection pool
    pub db: DatabaseConnection,
    pub jwt: JwtAuth,
}

impl AppState {
    pub fn new(config: crate::config::Config, db: DatabaseConnection) -> Self {
        let jwt = JwtAuth::new(&config.jwt);
        Self { config, db, jwt }
    }
}
