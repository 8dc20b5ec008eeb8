//! Accounts Domain
//!
//! User accounts administered with per-owner scoping.
//!
//! # Features
//!
//! - Admin-created users with usernames generated from first and last name
//! - Ownership-scoped view/change/delete for non-superuser staff
//! - IBAN validation and uniqueness
//! - Password login with Argon2 and short-lived JWTs
//! - Federated login resolved to existing accounts by email
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, audit events
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Workflows, access rules, password hashing
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (in-memory and PostgreSQL)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum_helpers::{JwtAuth, JwtConfig};
//! use domain_accounts::{AccountService, InMemoryUserRepository, handlers};
//!
//! let jwt = JwtAuth::new(&JwtConfig::new("a-secret-of-at-least-thirty-two-bytes"));
//! let service = AccountService::new(InMemoryUserRepository::new(), jwt);
//!
//! let router = handlers::router(service);
//! ```

pub mod access;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod iban;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod social;
pub mod username;
pub mod validation;

// Re-export commonly used types
pub use error::{AccountError, AccountResult};
pub use handlers::ApiDoc;
pub use models::{
    CreateUser, LoginRequest, ModelPermission, NewUser, RegisterUser, TokenResponse, UpdateUser,
    User, UserFilter, UserResponse,
};
pub use postgres::PgUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::AccountService;
pub use validation::AccountValidator;
