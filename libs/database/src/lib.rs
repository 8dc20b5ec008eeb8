//! PostgreSQL connectivity for the workspace services.
//!
//! ```ignore
//! use database::{postgres, RetryConfig};
//!
//! let db = postgres::connect_with_retry(&config.database, RetryConfig::default()).await?;
//! postgres::run_migrations::<migration::Migrator>(&db, "superman_api").await?;
//! ```

pub mod error;
pub mod postgres;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use retry::{RetryConfig, retry_with_backoff};

pub use sea_orm::{DatabaseConnection, DbErr};
