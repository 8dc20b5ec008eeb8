use axum::Router;
use domain_accounts::{AccountService, PgUserRepository, RegisterUser, handlers};

use crate::config::SuperuserConfig;
use crate::state::AppState;

pub fn service(state: &AppState) -> AccountService<PgUserRepository> {
    AccountService::new(PgUserRepository::new(state.db.clone()), state.jwt.clone())
        .with_username_max_length(state.config.username_max_length)
        .with_social_auth(state.config.social.enabled)
}

pub fn router(state: &AppState) -> Router {
    handlers::router(service(state))
}

/// Creates the configured superuser unless the username is taken.
pub async fn bootstrap_superuser(state: &AppState, superuser: SuperuserConfig) -> eyre::Result<()> {
    let created = service(state)
        .ensure_superuser(RegisterUser {
            username: superuser.username.clone(),
            email: superuser.email,
            password1: superuser.password.clone(),
            password2: superuser.password,
        })
        .await
        .map_err(|e| eyre::eyre!("Failed to create superuser '{}': {}", superuser.username, e))?;

    if created.is_none() {
        tracing::info!(username = %superuser.username, "Superuser already exists");
    }
    Ok(())
}
