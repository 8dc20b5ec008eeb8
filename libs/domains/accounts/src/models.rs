use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

/// Maximum length of username, first name and last name columns
pub const NAME_MAX_LENGTH: usize = 150;

/// Email format check that leaves blank values to the required-field rules
fn validate_email_if_present(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("invalid_email").with_message("Enter a valid email address.".into()))
}

/// Model-level permissions on user records
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelPermission {
    AddUser,
    ChangeUser,
    DeleteUser,
    ViewUser,
}

/// User entity - matches the `accounts_users` table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Login name, unique case-insensitively
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// Compact upper-case IBAN
    pub iban: Option<String>,
    /// Argon2 password hash (never exposed in API responses)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    /// May enter the admin surface
    pub is_staff: bool,
    /// Bypasses ownership and model permission checks
    pub is_superuser: bool,
    pub groups: Vec<String>,
    pub permissions: Vec<ModelPermission>,
    /// User that created this account through the admin surface
    pub created_by: Option<Uuid>,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Create a new user record from a validated [`NewUser`]
    pub fn new(input: NewUser) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: input.username,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            iban: input.iban,
            password_hash: input.password_hash,
            is_active: input.is_active,
            is_staff: input.is_staff,
            is_superuser: input.is_superuser,
            groups: input.groups,
            permissions: input.permissions,
            created_by: input.created_by,
            last_login: None,
            date_joined: Utc::now(),
        }
    }

    /// `first_name last_name` when set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_string()
        }
    }

    /// Active superusers hold every permission; inactive users hold none.
    pub fn has_perm(&self, permission: ModelPermission) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(&permission)
    }

    /// Active staff members may use the admin surface.
    pub fn is_admin_member(&self) -> bool {
        self.is_active && self.is_staff
    }

    /// Apply a sanitized change set. `created_by` is never touched.
    pub fn apply_update(&mut self, update: UpdateUser) {
        self.username = update.username;
        self.first_name = update.first_name;
        self.last_name = update.last_name;
        self.email = update.email;
        self.iban = update.iban;
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(is_staff) = update.is_staff {
            self.is_staff = is_staff;
        }
        if let Some(is_superuser) = update.is_superuser {
            self.is_superuser = is_superuser;
        }
        if let Some(groups) = update.groups {
            self.groups = groups;
        }
        if let Some(permissions) = update.permissions {
            self.permissions = permissions;
        }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Fully validated insert payload handed to the repository
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub iban: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
    pub permissions: Vec<ModelPermission>,
    pub created_by: Option<Uuid>,
}

/// User response DTO (without password_hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub iban: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
    pub permissions: Vec<ModelPermission>,
    pub created_by: Option<Uuid>,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name(),
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            iban: user.iban,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            groups: user.groups,
            permissions: user.permissions,
            created_by: user.created_by,
            last_login: user.last_login,
            date_joined: user.date_joined,
        }
    }
}

/// Admin "add user" form. The username is generated from the names.
///
/// Missing fields deserialize as empty so required-field errors are reported
/// per field alongside every other rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CreateUser {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[validate(custom(function = "validate_email_if_present"))]
    pub email: Option<String>,
    #[validate(length(max = 64, message = "Enter a valid IBAN."))]
    pub iban: Option<String>,
    pub password1: String,
    pub password2: String,
}

/// First-party sign-up form
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterUser {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,
    #[validate(custom(function = "validate_email_if_present"))]
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// Admin change form.
///
/// Text fields replace the stored values; privilege fields are kept when
/// absent. There is no way to change `created_by`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct UpdateUser {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[validate(custom(function = "validate_email_if_present"))]
    pub email: Option<String>,
    #[validate(length(max = 64, message = "Enter a valid IBAN."))]
    pub iban: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub groups: Option<Vec<String>>,
    pub permissions: Option<Vec<ModelPermission>>,
}

/// Query filters for the admin user list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct UserFilter {
    /// Creator of the listed users; forced to the actor for non-superusers
    pub created_by: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    /// Users who joined at or after this instant
    pub joined_after: Option<DateTime<Utc>>,
    /// Users who joined before this instant
    pub joined_before: Option<DateTime<Utc>>,
    /// Case-insensitive match on username, names and email
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            created_by: None,
            is_active: None,
            is_staff: None,
            is_superuser: None,
            joined_after: None,
            joined_before: None,
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl UserFilter {
    /// In-memory predicate equivalent to the SQL `WHERE` clause
    pub fn matches(&self, user: &User) -> bool {
        if let Some(created_by) = self.created_by {
            if user.created_by != Some(created_by) {
                return false;
            }
        }
        if let Some(is_active) = self.is_active {
            if user.is_active != is_active {
                return false;
            }
        }
        if let Some(is_staff) = self.is_staff {
            if user.is_staff != is_staff {
                return false;
            }
        }
        if let Some(is_superuser) = self.is_superuser {
            if user.is_superuser != is_superuser {
                return false;
            }
        }
        if let Some(after) = self.joined_after {
            if user.date_joined < after {
                return false;
            }
        }
        if let Some(before) = self.joined_before {
            if user.date_joined >= before {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let haystacks = [
                Some(user.username.as_str()),
                Some(user.first_name.as_str()),
                Some(user.last_name.as_str()),
                user.email.as_deref(),
            ];
            if !haystacks
                .into_iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}

/// Page of users plus the total matching the filter
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Email assertion received from a federated identity provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailClaim {
    /// Claim type, e.g. `account` or `personal`
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Normalized provider response
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SocialResponse {
    #[serde(default)]
    pub emails: Vec<EmailClaim>,
}

/// Body of the social completion route
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SocialCompleteRequest {
    #[serde(default)]
    pub response: Option<SocialResponse>,
}

/// Outcome of resolving a federated response to a local account
#[derive(Debug, Clone, Default)]
pub struct SocialResolution {
    pub user: Option<User>,
    pub uid: Option<Uuid>,
}

/// Public authentication settings for front-ends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct AuthContext {
    pub social_auth_enabled: bool,
}

/// Columns and filters of the admin list for the acting user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListLayout {
    pub list_display: Vec<String>,
    pub list_filters: Vec<String>,
}

/// Named group of form fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Fieldset {
    /// `None` for the untitled leading section
    pub name: Option<String>,
    pub fields: Vec<String>,
}

impl Fieldset {
    pub fn new(name: Option<&str>, fields: &[&str]) -> Self {
        Self {
            name: name.map(str::to_string),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Form layout for the acting user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormLayout {
    pub fieldsets: Vec<Fieldset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User::new(NewUser {
            username: "jdoe".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: None,
            iban: None,
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            groups: vec![],
            permissions: vec![ModelPermission::ViewUser],
            created_by: None,
        })
    }

    #[test]
    fn test_display_name_uses_full_name() {
        assert_eq!(user("John", "Doe").display_name(), "John Doe");
        assert_eq!(user("John", "").display_name(), "John");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(user("", "").display_name(), "jdoe");
        assert_eq!(user("  ", " ").to_string(), "jdoe");
    }

    #[test]
    fn test_has_perm() {
        let mut u = user("John", "Doe");
        assert!(u.has_perm(ModelPermission::ViewUser));
        assert!(!u.has_perm(ModelPermission::DeleteUser));

        u.is_superuser = true;
        assert!(u.has_perm(ModelPermission::DeleteUser));

        u.is_active = false;
        assert!(!u.has_perm(ModelPermission::ViewUser));
    }

    #[test]
    fn test_apply_update_keeps_absent_flags_and_creator() {
        let creator = Uuid::now_v7();
        let mut u = user("John", "Doe");
        u.created_by = Some(creator);
        u.is_staff = true;

        u.apply_update(UpdateUser {
            username: "johnny".to_string(),
            first_name: "Johnny".to_string(),
            last_name: "Doe".to_string(),
            is_active: Some(false),
            ..Default::default()
        });

        assert_eq!(u.username, "johnny");
        assert!(!u.is_active);
        assert!(u.is_staff);
        assert_eq!(u.created_by, Some(creator));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let u = user("John", "Doe");
        let filter = UserFilter {
            search: Some("JOH".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&u));

        let filter = UserFilter {
            search: Some("smith".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&u));
    }

    #[test]
    fn test_filter_deserializes_default_limit() {
        let filter: UserFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.limit, 50);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let mut u = user("John", "Doe");
        u.password_hash = "$argon2id$secret".to_string();
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
