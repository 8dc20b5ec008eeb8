use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AccountError, AccountResult};
use crate::models::{NewUser, User, UserFilter};

/// Repository trait for User persistence
///
/// Implementations enforce case-insensitive uniqueness of username, email
/// and IBAN, reporting violations as the matching `Duplicate*` error.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, input: NewUser) -> AccountResult<User>;

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>>;

    /// Case-insensitive username lookup
    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>>;

    /// Case-insensitive email lookup
    async fn get_by_email(&self, email: &str) -> AccountResult<Option<User>>;

    /// Page of users matching `filter`, newest first
    async fn list(&self, filter: &UserFilter) -> AccountResult<Vec<User>>;

    /// Number of users matching `filter`, ignoring limit and offset
    async fn count(&self, filter: &UserFilter) -> AccountResult<u64>;

    /// Persist every mutable field of `user`
    async fn update(&self, user: User) -> AccountResult<User>;

    /// Delete a user; users it created keep existing with `created_by` cleared
    async fn delete(&self, id: Uuid) -> AccountResult<bool>;

    async fn username_exists(&self, username: &str, exclude: Option<Uuid>) -> AccountResult<bool>;

    async fn email_exists(&self, email: &str, exclude: Option<Uuid>) -> AccountResult<bool>;

    async fn iban_exists(&self, iban: &str, exclude: Option<Uuid>) -> AccountResult<bool>;

    /// Stamp a successful login
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AccountResult<()>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn same_optional(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| same_text(a, b))
}

/// Finds the first uniqueness violation of `candidate` against `users`
fn find_conflict<'a>(
    users: impl Iterator<Item = &'a User>,
    id: Option<Uuid>,
    username: &str,
    email: Option<&str>,
    iban: Option<&str>,
) -> Option<AccountError> {
    for other in users.filter(|u| Some(u.id) != id) {
        if same_text(&other.username, username) {
            return Some(AccountError::DuplicateUsername(username.to_string()));
        }
        if let Some(email) = email {
            if same_optional(other.email.as_deref(), email) {
                return Some(AccountError::DuplicateEmail(email.to_string()));
            }
        }
        if let Some(iban) = iban {
            if same_optional(other.iban.as_deref(), iban) {
                return Some(AccountError::DuplicateIban(iban.to_string()));
            }
        }
    }
    None
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, input: NewUser) -> AccountResult<User> {
        let mut users = self.users.write().await;

        if let Some(err) = find_conflict(
            users.values(),
            None,
            &input.username,
            input.email.as_deref(),
            input.iban.as_deref(),
        ) {
            return Err(err);
        }

        let user = User::new(input);
        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| same_text(&u.username, username))
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| same_optional(u.email.as_deref(), email))
            .cloned())
    }

    async fn list(&self, filter: &UserFilter) -> AccountResult<Vec<User>> {
        let users = self.users.read().await;

        let mut result: Vec<User> = users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        // Sort by date_joined descending (newest first)
        result.sort_by(|a, b| b.date_joined.cmp(&a.date_joined).then(b.id.cmp(&a.id)));

        Ok(result
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn count(&self, filter: &UserFilter) -> AccountResult<u64> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| filter.matches(u)).count() as u64)
    }

    async fn update(&self, user: User) -> AccountResult<User> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(AccountError::NotFound(user.id));
        }

        if let Some(err) = find_conflict(
            users.values(),
            Some(user.id),
            &user.username,
            user.email.as_deref(),
            user.iban.as_deref(),
        ) {
            return Err(err);
        }

        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AccountResult<bool> {
        let mut users = self.users.write().await;

        if users.remove(&id).is_none() {
            return Ok(false);
        }

        for owned in users.values_mut().filter(|u| u.created_by == Some(id)) {
            owned.created_by = None;
        }

        tracing::info!(user_id = %id, "Deleted user");
        Ok(true)
    }

    async fn username_exists(&self, username: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| Some(u.id) != exclude && same_text(&u.username, username)))
    }

    async fn email_exists(&self, email: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| Some(u.id) != exclude && same_optional(u.email.as_deref(), email)))
    }

    async fn iban_exists(&self, iban: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| Some(u.id) != exclude && same_optional(u.iban.as_deref(), iban)))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AccountResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        user.last_login = Some(at);
        Ok(())
    }
}
