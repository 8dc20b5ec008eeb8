use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum_helpers::{JwtAuth, JwtClaims};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::error::{AccountError, AccountResult};
use crate::models::{
    AuthContext, CreateUser, FormLayout, ListLayout, NAME_MAX_LENGTH, NewUser, RegisterUser,
    SocialResponse, TokenResponse, UpdateUser, User, UserFilter, UserListResponse,
};
use crate::repository::UserRepository;
use crate::social;
use crate::username;
use crate::validation::AccountValidator;

/// Insert attempts when a generated username is taken concurrently
pub const CREATE_ATTEMPTS: usize = 5;

/// Upper bound on the admin list page size
pub const MAX_PAGE_SIZE: u64 = 500;

/// Largest offset the store accepts (Postgres `OFFSET` is a signed bigint)
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Service layer for account business logic
#[derive(Clone)]
pub struct AccountService<R: UserRepository> {
    repository: Arc<R>,
    jwt: JwtAuth,
    hasher: Argon2<'static>,
    username_max_length: usize,
    social_auth_enabled: bool,
}

impl<R: UserRepository> AccountService<R> {
    pub fn new(repository: R, jwt: JwtAuth) -> Self {
        Self {
            repository: Arc::new(repository),
            jwt,
            hasher: Argon2::default(),
            username_max_length: NAME_MAX_LENGTH,
            social_auth_enabled: true,
        }
    }

    /// Clamped to `1..=NAME_MAX_LENGTH` so generated usernames fit the column
    pub fn with_username_max_length(mut self, max_length: usize) -> Self {
        self.username_max_length = max_length.clamp(1, NAME_MAX_LENGTH);
        self
    }

    pub fn with_social_auth(mut self, enabled: bool) -> Self {
        self.social_auth_enabled = enabled;
        self
    }

    /// Replace the password hasher, e.g. with cheaper parameters in tests
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn jwt(&self) -> &JwtAuth {
        &self.jwt
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn social_auth_enabled(&self) -> bool {
        self.social_auth_enabled
    }

    pub fn auth_context(&self) -> AuthContext {
        AuthContext {
            social_auth_enabled: self.social_auth_enabled,
        }
    }

    /// Reload the acting user named by a verified token
    pub async fn actor_from_claims(&self, claims: &JwtClaims) -> AccountResult<User> {
        let id = claims
            .user_id()
            .ok_or_else(|| AccountError::Unauthorized("Invalid token subject".to_string()))?;

        let user = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| AccountError::Unauthorized("User no longer exists".to_string()))?;

        if !user.is_active {
            return Err(AccountError::Unauthorized("User account is disabled".to_string()));
        }
        Ok(user)
    }

    /// Admin "add user" workflow; the username is generated from the names
    pub async fn create_user(&self, actor: &User, input: CreateUser) -> AccountResult<User> {
        if !access::can_add(actor) {
            return Err(denied(actor, "add users"));
        }

        let cleaned = AccountValidator::new(self.repository.as_ref())
            .validate_creation(actor, &input)
            .await?;
        let password_hash = self.hash_password(&input.password1)?;

        let first_name = input.first_name.trim();
        let last_name = input.last_name.trim();
        let repository = self.repository.as_ref();

        for attempt in 1..=CREATE_ATTEMPTS {
            let username = username::generate(
                [first_name, last_name],
                self.username_max_length,
                |candidate| async move { repository.username_exists(&candidate, None).await },
            )
            .await?;

            let new_user = NewUser {
                username,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: cleaned.email.clone(),
                iban: cleaned.iban.clone(),
                password_hash: password_hash.clone(),
                is_active: true,
                is_staff: false,
                is_superuser: false,
                groups: Vec::new(),
                permissions: Vec::new(),
                created_by: Some(actor.id),
            };

            match self.repository.create(new_user).await {
                Err(e) if e.is_username_conflict() => {
                    tracing::warn!(attempt, error = %e, "Generated username taken concurrently, retrying");
                }
                result => return result,
            }
        }

        Err(AccountError::DuplicateUsername(format!(
            "{} {}",
            first_name, last_name
        )))
    }

    /// First-party sign-up; the account has no creator and no privileges
    pub async fn register(&self, input: RegisterUser) -> AccountResult<User> {
        let cleaned = AccountValidator::new(self.repository.as_ref())
            .validate_registration(&input)
            .await?;
        let password_hash = self.hash_password(&input.password1)?;

        self.repository
            .create(NewUser {
                username: input.username.trim().to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: cleaned.email,
                iban: None,
                password_hash,
                is_active: true,
                is_staff: false,
                is_superuser: false,
                groups: Vec::new(),
                permissions: Vec::new(),
                created_by: None,
            })
            .await
    }

    /// Create a superuser unless the username is already taken.
    ///
    /// Returns `None` when an account with that username exists.
    pub async fn ensure_superuser(&self, input: RegisterUser) -> AccountResult<Option<User>> {
        if self
            .repository
            .get_by_username(input.username.trim())
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let mut user = self.register(input).await?;
        user.is_staff = true;
        user.is_superuser = true;
        let user = self.repository.update(user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Superuser created");
        Ok(Some(user))
    }

    pub async fn get_user(&self, actor: &User, id: Uuid) -> AccountResult<User> {
        let target = self.load(id).await?;
        if !access::can_view(actor, Some(&target)) {
            return Err(denied(actor, "view this user"));
        }
        Ok(target)
    }

    /// Scoped list: non-superusers only see the users they created
    pub async fn list_users(&self, actor: &User, filter: UserFilter) -> AccountResult<UserListResponse> {
        if !access::can_view(actor, None) {
            return Err(denied(actor, "view users"));
        }

        let mut filter = access::scope_filter(actor, filter);
        filter.limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        filter.offset = filter.offset.min(MAX_OFFSET);

        let users = self.repository.list(&filter).await?;
        let total = self.repository.count(&filter).await?;

        Ok(UserListResponse {
            items: users.into_iter().map(Into::into).collect(),
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// Admin change workflow
    pub async fn update_user(&self, actor: &User, id: Uuid, input: UpdateUser) -> AccountResult<User> {
        let mut target = self.load(id).await?;
        if !access::can_change(actor, Some(&target)) {
            return Err(denied(actor, "change this user"));
        }

        let update = access::sanitize_update(actor, input);
        let cleaned = AccountValidator::new(self.repository.as_ref())
            .validate_change(actor, &target, &update)
            .await?;

        target.apply_update(UpdateUser {
            username: update.username.trim().to_string(),
            first_name: update.first_name.trim().to_string(),
            last_name: update.last_name.trim().to_string(),
            email: cleaned.email,
            iban: cleaned.iban,
            ..update
        });

        self.repository.update(target).await
    }

    pub async fn delete_user(&self, actor: &User, id: Uuid) -> AccountResult<User> {
        let target = self.load(id).await?;
        if !access::can_delete(actor, Some(&target)) {
            return Err(denied(actor, "delete this user"));
        }

        if !self.repository.delete(id).await? {
            return Err(AccountError::NotFound(id));
        }
        Ok(target)
    }

    pub async fn list_layout(&self, actor: &User) -> AccountResult<ListLayout> {
        if !access::can_view(actor, None) {
            return Err(denied(actor, "view users"));
        }

        Ok(ListLayout {
            list_display: to_strings(access::list_display(actor)),
            list_filters: to_strings(access::list_filters(actor)),
        })
    }

    pub async fn creation_form(&self, actor: &User) -> AccountResult<FormLayout> {
        if !access::can_add(actor) {
            return Err(denied(actor, "add users"));
        }
        Ok(FormLayout {
            fieldsets: access::creation_fieldsets(),
        })
    }

    pub async fn change_form(&self, actor: &User, id: Uuid) -> AccountResult<FormLayout> {
        let target = self.load(id).await?;
        if !access::can_change(actor, Some(&target)) {
            return Err(denied(actor, "change this user"));
        }
        Ok(FormLayout {
            fieldsets: access::change_fieldsets(actor),
        })
    }

    /// Password login with a case-insensitive username
    pub async fn authenticate(&self, username: &str, password: &str) -> AccountResult<TokenResponse> {
        let user = self
            .repository
            .get_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        // Inactive accounts are indistinguishable from bad credentials
        if !user.is_active {
            return Err(AccountError::InvalidCredentials);
        }

        self.issue_token(user).await
    }

    /// Completes a federated login for an existing account
    pub async fn social_login(&self, response: Option<SocialResponse>) -> AccountResult<TokenResponse> {
        if !self.social_auth_enabled {
            return Err(AccountError::Forbidden("Social login is disabled".to_string()));
        }

        let resolution = social::resolve_social_user(self.repository.as_ref(), response.as_ref()).await?;
        let user = resolution.user.ok_or_else(|| {
            AccountError::Unauthorized("No account email in provider response".to_string())
        })?;

        if !user.is_active {
            return Err(AccountError::InvalidCredentials);
        }

        self.issue_token(user).await
    }

    async fn issue_token(&self, mut user: User) -> AccountResult<TokenResponse> {
        let now = Utc::now();
        self.repository.record_login(user.id, now).await?;
        user.last_login = Some(now);

        let access_token = self
            .jwt
            .create_access_token(user.id, &user.username, user.is_staff, user.is_superuser)
            .map_err(|e| AccountError::Internal(format!("Token error: {}", e)))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_ttl_secs(),
            user: user.into(),
        })
    }

    async fn load(&self, id: Uuid) -> AccountResult<User> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    // Password helpers

    pub fn hash_password(&self, password: &str) -> AccountResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::PasswordHash(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AccountResult<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AccountError::PasswordHash(e.to_string()))?;

        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

fn denied(actor: &User, action: &str) -> AccountError {
    tracing::info!(actor_id = %actor.id, action, "Permission denied");
    AccountError::Forbidden(format!("You do not have permission to {}", action))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailClaim, ModelPermission};
    use crate::repository::InMemoryUserRepository;
    use argon2::{Algorithm, Params, Version};
    use async_trait::async_trait;
    use axum_helpers::JwtConfig;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_utils::fixtures::{JWT_SECRET, PASSWORD, VALID_IBANS};

    fn service() -> AccountService<InMemoryUserRepository> {
        let params = Params::new(8, 1, 1, None).unwrap();
        AccountService::new(
            InMemoryUserRepository::new(),
            JwtAuth::new(&JwtConfig::new(JWT_SECRET)),
        )
        .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    async fn seed(
        service: &AccountService<InMemoryUserRepository>,
        username: &str,
        is_superuser: bool,
        created_by: Option<Uuid>,
    ) -> User {
        service
            .repository()
            .create(NewUser {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: Some(format!("{}@example.com", username)),
                iban: None,
                password_hash: service.hash_password(PASSWORD).unwrap(),
                is_active: true,
                is_staff: true,
                is_superuser,
                groups: vec![],
                permissions: vec![
                    ModelPermission::AddUser,
                    ModelPermission::ChangeUser,
                    ModelPermission::DeleteUser,
                    ModelPermission::ViewUser,
                ],
                created_by,
            })
            .await
            .unwrap()
    }

    /// Answers the first `stale` username lookups with "free", as when a
    /// concurrent request inserts the same name between lookup and insert
    struct StaleLookupRepository {
        inner: InMemoryUserRepository,
        stale: AtomicUsize,
    }

    #[async_trait]
    impl UserRepository for StaleLookupRepository {
        async fn create(&self, input: NewUser) -> AccountResult<User> {
            self.inner.create(input).await
        }

        async fn get_by_id(&self, id: Uuid) -> AccountResult<Option<User>> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_username(&self, username: &str) -> AccountResult<Option<User>> {
            self.inner.get_by_username(username).await
        }

        async fn get_by_email(&self, email: &str) -> AccountResult<Option<User>> {
            self.inner.get_by_email(email).await
        }

        async fn list(&self, filter: &UserFilter) -> AccountResult<Vec<User>> {
            self.inner.list(filter).await
        }

        async fn count(&self, filter: &UserFilter) -> AccountResult<u64> {
            self.inner.count(filter).await
        }

        async fn update(&self, user: User) -> AccountResult<User> {
            self.inner.update(user).await
        }

        async fn delete(&self, id: Uuid) -> AccountResult<bool> {
            self.inner.delete(id).await
        }

        async fn username_exists(&self, username: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
            let stale = self
                .stale
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(false);
            }
            self.inner.username_exists(username, exclude).await
        }

        async fn email_exists(&self, email: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
            self.inner.email_exists(email, exclude).await
        }

        async fn iban_exists(&self, iban: &str, exclude: Option<Uuid>) -> AccountResult<bool> {
            self.inner.iban_exists(iban, exclude).await
        }

        async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AccountResult<()> {
            self.inner.record_login(id, at).await
        }
    }

    /// Service whose store already holds a staff member and "john"
    async fn racing_service(stale: usize) -> (AccountService<StaleLookupRepository>, User) {
        let inner = InMemoryUserRepository::new();
        let staff = inner
            .create(NewUser {
                username: "staff".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: Some("staff@example.com".to_string()),
                iban: None,
                password_hash: "unused".to_string(),
                is_active: true,
                is_staff: true,
                is_superuser: false,
                groups: vec![],
                permissions: vec![ModelPermission::AddUser, ModelPermission::ViewUser],
                created_by: None,
            })
            .await
            .unwrap();
        inner
            .create(NewUser {
                username: "john".to_string(),
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                email: None,
                iban: None,
                password_hash: "unused".to_string(),
                is_active: true,
                is_staff: false,
                is_superuser: false,
                groups: vec![],
                permissions: vec![],
                created_by: Some(staff.id),
            })
            .await
            .unwrap();

        let params = Params::new(8, 1, 1, None).unwrap();
        let service = AccountService::new(
            StaleLookupRepository {
                inner,
                stale: AtomicUsize::new(stale),
            },
            JwtAuth::new(&JwtConfig::new(JWT_SECRET)),
        )
        .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params));
        (service, staff)
    }

    fn create_input(iban: Option<&str>) -> CreateUser {
        CreateUser {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: None,
            iban: iban.map(str::to_string),
            password1: PASSWORD.to_string(),
            password2: PASSWORD.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_generates_username_and_owner() {
        let service = service();
        let staff = seed(&service, "staff", false, None).await;

        let first = service
            .create_user(&staff, create_input(Some(VALID_IBANS[0])))
            .await
            .unwrap();
        assert_eq!(first.username, "john");
        assert_eq!(first.created_by, Some(staff.id));
        assert!(!first.is_staff);
        assert_ne!(first.password_hash, PASSWORD);

        let second = service
            .create_user(&staff, create_input(Some(VALID_IBANS[1])))
            .await
            .unwrap();
        assert_eq!(second.username, "john2");
    }

    #[tokio::test]
    async fn test_create_user_retries_after_username_conflict() {
        let (service, staff) = racing_service(1).await;

        let user = service
            .create_user(&staff, create_input(Some(VALID_IBANS[0])))
            .await
            .unwrap();
        assert_eq!(user.username, "john2");
        assert_eq!(user.created_by, Some(staff.id));
    }

    #[tokio::test]
    async fn test_create_user_gives_up_after_repeated_conflicts() {
        let (service, staff) = racing_service(usize::MAX).await;

        let err = service
            .create_user(&staff, create_input(Some(VALID_IBANS[0])))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername(_)));
        assert_eq!(
            service.repository().count(&UserFilter::default()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_username_max_length_is_clamped() {
        let wide = service().with_username_max_length(200);
        let admin = seed(&wide, "admin", true, None).await;

        let input = CreateUser {
            first_name: "北京".to_string(),
            last_name: "東京".to_string(),
            ..create_input(None)
        };
        let user = wide.create_user(&admin, input).await.unwrap();
        assert_eq!(user.username.len(), NAME_MAX_LENGTH);

        let tiny = service().with_username_max_length(0);
        let admin = seed(&tiny, "admin", true, None).await;
        let user = tiny.create_user(&admin, create_input(None)).await.unwrap();
        assert_eq!(user.username, "j");
    }

    #[tokio::test]
    async fn test_create_user_writes_nothing_on_validation_failure() {
        let service = service();
        let staff = seed(&service, "staff", false, None).await;

        let err = service.create_user(&staff, create_input(None)).await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
        assert_eq!(service.repository().count(&UserFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_user_requires_add_permission() {
        let service = service();
        let mut staff = seed(&service, "staff", false, None).await;
        staff.permissions = vec![ModelPermission::ViewUser];

        let err = service
            .create_user(&staff, create_input(Some(VALID_IBANS[0])))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_scoped_listing() {
        let service = service();
        let admin = seed(&service, "admin", true, None).await;
        let staff = seed(&service, "staff", false, Some(admin.id)).await;
        seed(&service, "mine", false, Some(staff.id)).await;
        seed(&service, "theirs", false, Some(admin.id)).await;

        let page = service.list_users(&staff, UserFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "mine");

        let page = service.list_users(&admin, UserFilter::default()).await.unwrap();
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn test_list_clamps_page_bounds() {
        let service = service();
        let admin = seed(&service, "admin", true, None).await;

        let filter = UserFilter {
            limit: 10_000,
            offset: u64::MAX,
            ..Default::default()
        };
        let page = service.list_users(&admin, filter).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.offset, MAX_OFFSET);
    }

    #[tokio::test]
    async fn test_ownership_enforced_on_detail_routes() {
        let service = service();
        let admin = seed(&service, "admin", true, None).await;
        let staff = seed(&service, "staff", false, None).await;
        let foreign = seed(&service, "foreign", false, Some(admin.id)).await;

        assert!(matches!(
            service.get_user(&staff, foreign.id).await,
            Err(AccountError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_user(&staff, foreign.id).await,
            Err(AccountError::Forbidden(_))
        ));
        assert!(service.get_user(&admin, foreign.id).await.is_ok());
        assert!(matches!(
            service.get_user(&admin, Uuid::now_v7()).await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_staff_change_cannot_grant_privileges() {
        let service = service();
        let staff = seed(&service, "staff", false, None).await;
        let target = service
            .create_user(&staff, create_input(Some(VALID_IBANS[0])))
            .await
            .unwrap();

        let updated = service
            .update_user(
                &staff,
                target.id,
                UpdateUser {
                    username: "johnny".to_string(),
                    first_name: "Johnny".to_string(),
                    last_name: "Doe".to_string(),
                    iban: Some(VALID_IBANS[0].to_string()),
                    is_staff: Some(true),
                    is_superuser: Some(true),
                    permissions: Some(vec![ModelPermission::DeleteUser]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "johnny");
        assert!(!updated.is_staff);
        assert!(!updated.is_superuser);
        assert!(updated.permissions.is_empty());
        assert_eq!(updated.created_by, Some(staff.id));
    }

    #[tokio::test]
    async fn test_delete_keeps_created_users() {
        let service = service();
        let admin = seed(&service, "admin", true, None).await;
        let staff = seed(&service, "staff", false, Some(admin.id)).await;
        let child = seed(&service, "child", false, Some(staff.id)).await;

        service.delete_user(&admin, staff.id).await.unwrap();

        let child = service.get_user(&admin, child.id).await.unwrap();
        assert_eq!(child.created_by, None);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = service();
        let staff = seed(&service, "staff", false, None).await;

        let token = service.authenticate("STAFF", PASSWORD).await.unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.user.last_login.is_some());

        let claims = service.jwt().verify_token(&token.access_token).unwrap();
        let actor = service.actor_from_claims(&claims).await.unwrap();
        assert_eq!(actor.id, staff.id);

        assert!(matches!(
            service.authenticate("staff", "wrong-password").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate("nobody", PASSWORD).await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let service = service();
        let mut user = seed(&service, "sleepy", false, None).await;
        user.is_active = false;
        service.repository().update(user).await.unwrap();

        assert!(matches!(
            service.authenticate("sleepy", PASSWORD).await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_social_login() {
        let service = service();
        seed(&service, "social", false, None).await;

        let response = SocialResponse {
            emails: vec![EmailClaim {
                kind: "account".to_string(),
                value: "Social@example.com".to_string(),
            }],
        };
        let token = service.social_login(Some(response)).await.unwrap();
        assert_eq!(token.user.username, "social");

        let ghost = SocialResponse {
            emails: vec![EmailClaim {
                kind: "account".to_string(),
                value: "ghost@example.com".to_string(),
            }],
        };
        assert!(matches!(
            service.social_login(Some(ghost)).await,
            Err(AccountError::SocialAccountNotFound)
        ));

        match service.social_login(None).await {
            Err(AccountError::Unauthorized(msg)) => {
                assert_eq!(msg, "No account email in provider response")
            }
            other => panic!("expected Unauthorized, got {:?}", other.map(|t| t.user.username)),
        }

        let personal_only = SocialResponse {
            emails: vec![EmailClaim {
                kind: "personal".to_string(),
                value: "social@example.com".to_string(),
            }],
        };
        assert!(matches!(
            service.social_login(Some(personal_only)).await,
            Err(AccountError::Unauthorized(_))
        ));

        let disabled = service.clone().with_social_auth(false);
        assert!(matches!(
            disabled.social_login(None).await,
            Err(AccountError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_register_and_ensure_superuser() {
        let service = service();
        let input = RegisterUser {
            username: "clark".to_string(),
            email: "clark@example.com".to_string(),
            password1: PASSWORD.to_string(),
            password2: PASSWORD.to_string(),
        };

        let admin = service.ensure_superuser(input.clone()).await.unwrap().unwrap();
        assert!(admin.is_superuser);
        assert!(admin.is_staff);
        assert_eq!(admin.created_by, None);

        assert!(service.ensure_superuser(input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_layouts_follow_actor() {
        let service = service();
        let admin = seed(&service, "admin", true, None).await;
        let staff = seed(&service, "staff", false, None).await;

        let layout = service.list_layout(&staff).await.unwrap();
        assert_eq!(layout.list_filters, vec!["is_active", "date_joined"]);

        let layout = service.list_layout(&admin).await.unwrap();
        assert_eq!(layout.list_display.len(), 8);

        let form = service.creation_form(&staff).await.unwrap();
        assert_eq!(
            form.fieldsets[0].fields,
            vec!["first_name", "last_name", "iban", "password1", "password2"]
        );
    }
}
