use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

/// Message returned when a federated login has no matching local account
pub const SOCIAL_ACCOUNT_NOT_FOUND: &str = "User account does not exist.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("User with username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("User with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("User with IBAN '{0}' already exists")]
    DuplicateIban(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{}", SOCIAL_ACCOUNT_NOT_FOUND)]
    SocialAccountNotFound,

    #[error("No free username within {max_length} characters")]
    UsernameSpaceExhausted { max_length: usize },

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AccountResult<T> = Result<T, AccountError>;

impl AccountError {
    /// True for store-level uniqueness violations on the username
    pub fn is_username_conflict(&self) -> bool {
        matches!(self, AccountError::DuplicateUsername(_))
    }
}

/// Convert AccountError to AppError for standardized error responses
impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            AccountError::DuplicateUsername(username) => {
                AppError::Conflict(format!("A user with username '{}' already exists", username))
            }
            AccountError::DuplicateEmail(email) => {
                AppError::Conflict(format!("A user with email '{}' already exists", email))
            }
            AccountError::DuplicateIban(iban) => {
                AppError::Conflict(format!("A user with IBAN '{}' already exists", iban))
            }
            AccountError::Validation(errors) => AppError::ValidationError(errors),
            AccountError::Forbidden(msg) => AppError::Forbidden(msg),
            AccountError::Unauthorized(msg) => AppError::Unauthorized(msg),
            AccountError::InvalidCredentials => {
                AppError::Unauthorized("Invalid username or password".to_string())
            }
            AccountError::SocialAccountNotFound => {
                AppError::Unauthorized(SOCIAL_ACCOUNT_NOT_FOUND.to_string())
            }
            AccountError::UsernameSpaceExhausted { max_length } => {
                tracing::error!(max_length, "Cannot allocate a unique username");
                AppError::InternalServerError("Unable to allocate a unique username".to_string())
            }
            AccountError::PasswordHash(msg) | AccountError::Internal(msg) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        // Convert to AppError for standardized error response format
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
