//! Form validation shared by the account workflows.
//!
//! Every rule reports into a single [`ValidationErrors`] keyed by field so a
//! client sees all problems of a submission at once. Nothing is written when
//! any rule fails.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use validator::{ValidationError, ValidationErrors};

use crate::error::{AccountError, AccountResult};
use crate::iban;
use crate::models::{CreateUser, RegisterUser, UpdateUser, User};
use crate::repository::UserRepository;

pub const REQUIRED: &str = "This field is required.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const DUPLICATE_IBAN: &str = "User with this IBAN already exists.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const DUPLICATE_EMAIL: &str = "User with this Email address already exists.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Minimum attribute length considered by the similarity rule
const SIMILARITY_MIN_LENGTH: usize = 3;

static USERNAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("static regex"));

/// Frequently used passwords, compared case-insensitively
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "111111", "000000", "11111111",
    "12341234", "87654321", "password", "password1", "password123", "passw0rd", "qwerty",
    "qwerty123", "qwertyuiop", "abc123", "abcd1234", "letmein", "welcome", "welcome1",
    "iloveyou", "admin", "administrator", "monkey", "dragon", "football", "baseball",
    "basketball", "superman", "batman", "sunshine", "princess", "shadow", "master",
    "michael", "jennifer", "trustno1", "starwars", "whatever", "computer", "internet",
    "freedom", "charlie", "zaq12wsx", "1q2w3e4r", "1qaz2wsx", "asdfghjkl", "changeme",
    "secret", "login", "hello123", "mustang", "access", "liverpool", "chelsea",
];

/// Cleaned values produced by a successful validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedFields {
    pub email: Option<String>,
    /// Compact upper-case IBAN
    pub iban: Option<String>,
}

/// Builder around [`ValidationErrors`] with form-style messages
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: ValidationErrors,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, code: &'static str, message: impl Into<Cow<'static, str>>) {
        let mut error = ValidationError::new(code);
        error.message = Some(message.into());
        self.errors.add(field, error);
    }

    pub fn add_error(&mut self, field: &'static str, error: ValidationError) {
        self.errors.add(field, error);
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.field_errors().contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> AccountResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AccountError::Validation(self.errors))
        }
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// `None` for absent or blank values, trimmed otherwise
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lower-cases the domain part of an email address
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn too_similar(password: &str, attribute: &str) -> bool {
    let attribute = attribute.trim().to_lowercase();
    attribute.chars().count() >= SIMILARITY_MIN_LENGTH && password.contains(&attribute)
}

/// Password policy violations for `password`.
///
/// `attributes` are `(name, value)` pairs of the account, e.g.
/// `("username", "john")`; email values are compared by their local part.
pub fn password_policy_errors(password: &str, attributes: &[(&str, &str)]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let lowered = password.to_lowercase();

    let mut push = |code: &'static str, message: String| {
        let mut error = ValidationError::new(code);
        error.message = Some(message.into());
        errors.push(error);
    };

    for &(name, value) in attributes {
        let value = if name == "email" {
            value.split('@').next().unwrap_or_default()
        } else {
            value
        };
        if too_similar(&lowered, value) {
            push(
                "password_too_similar",
                format!("The password is too similar to the {}.", name.replace('_', " ")),
            );
            break;
        }
    }

    if password.chars().count() < PASSWORD_MIN_LENGTH {
        push(
            "password_too_short",
            format!(
                "This password is too short. It must contain at least {} characters.",
                PASSWORD_MIN_LENGTH
            ),
        );
    }

    if COMMON_PASSWORDS.iter().any(|common| *common == lowered.trim()) {
        push("password_too_common", "This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        push("password_entirely_numeric", "This password is entirely numeric.".to_string());
    }

    errors
}

/// Validation rules shared by the creation, change and registration workflows
pub struct AccountValidator<'a, R: UserRepository + ?Sized> {
    repository: &'a R,
}

impl<'a, R: UserRepository + ?Sized> AccountValidator<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    fn require(errors: &mut FieldErrors, field: &'static str, value: &str) {
        if blank(value) {
            errors.add(field, "required", REQUIRED);
        }
    }

    /// Both passwords present, equal and compliant with the policy.
    fn check_passwords(
        errors: &mut FieldErrors,
        password1: &str,
        password2: &str,
        attributes: &[(&str, &str)],
    ) {
        Self::require(errors, "password1", password1);
        Self::require(errors, "password2", password2);
        if errors.has("password1") || errors.has("password2") {
            return;
        }

        if password1 != password2 {
            errors.add("password2", "password_mismatch", PASSWORD_MISMATCH);
            return;
        }

        for error in password_policy_errors(password2, attributes) {
            errors.add_error("password2", error);
        }
    }

    /// Format check plus uniqueness; `current` is skipped when unchanged.
    async fn check_iban(
        &self,
        errors: &mut FieldErrors,
        actor: &User,
        value: Option<&str>,
        current: Option<&User>,
    ) -> AccountResult<Option<String>> {
        let Some(value) = non_blank(value) else {
            if !actor.is_superuser {
                // Non-superusers may not create or keep accounts without an IBAN
                errors.add("iban", "required", REQUIRED);
            }
            return Ok(None);
        };

        let normalized = match iban::validate(&value) {
            Ok(normalized) => normalized,
            Err(e) => {
                errors.add("iban", e.code(), e.to_string());
                return Ok(None);
            }
        };

        let unchanged = current
            .and_then(|u| u.iban.as_deref())
            .is_some_and(|old| old.to_lowercase() == normalized.to_lowercase());

        if !unchanged
            && self
                .repository
                .iban_exists(&normalized, current.map(|u| u.id))
                .await?
        {
            errors.add("iban", "unique", DUPLICATE_IBAN);
        }

        Ok(Some(normalized))
    }

    async fn check_email(
        &self,
        errors: &mut FieldErrors,
        value: Option<&str>,
        required: bool,
        exclude: Option<uuid::Uuid>,
    ) -> AccountResult<Option<String>> {
        let Some(email) = non_blank(value).map(|e| normalize_email(&e)) else {
            if required {
                errors.add("email", "required", REQUIRED);
            }
            return Ok(None);
        };

        if self.repository.email_exists(&email, exclude).await? {
            errors.add("email", "unique", DUPLICATE_EMAIL);
        }
        Ok(Some(email))
    }

    async fn check_username(
        &self,
        errors: &mut FieldErrors,
        value: &str,
        exclude: Option<uuid::Uuid>,
    ) -> AccountResult<()> {
        let username = value.trim();
        if username.is_empty() {
            errors.add("username", "required", REQUIRED);
            return Ok(());
        }
        if !USERNAME_CHARS.is_match(username) {
            errors.add("username", "invalid", INVALID_USERNAME);
            return Ok(());
        }
        if self.repository.username_exists(username, exclude).await? {
            errors.add("username", "unique", DUPLICATE_USERNAME);
        }
        Ok(())
    }

    /// Admin "add user" workflow
    pub async fn validate_creation(&self, actor: &User, input: &CreateUser) -> AccountResult<CleanedFields> {
        let mut errors = FieldErrors::new();

        Self::require(&mut errors, "first_name", &input.first_name);
        Self::require(&mut errors, "last_name", &input.last_name);

        let iban = self.check_iban(&mut errors, actor, input.iban.as_deref(), None).await?;
        let email = self
            .check_email(&mut errors, input.email.as_deref(), false, None)
            .await?;

        Self::check_passwords(
            &mut errors,
            &input.password1,
            &input.password2,
            &[
                ("first_name", input.first_name.as_str()),
                ("last_name", input.last_name.as_str()),
                ("email", input.email.as_deref().unwrap_or_default()),
            ],
        );

        errors.into_result()?;
        Ok(CleanedFields { email, iban })
    }

    /// Admin change workflow for `target`
    pub async fn validate_change(
        &self,
        actor: &User,
        target: &User,
        input: &UpdateUser,
    ) -> AccountResult<CleanedFields> {
        let mut errors = FieldErrors::new();

        self.check_username(&mut errors, &input.username, Some(target.id))
            .await?;
        Self::require(&mut errors, "first_name", &input.first_name);
        Self::require(&mut errors, "last_name", &input.last_name);

        let iban = self
            .check_iban(&mut errors, actor, input.iban.as_deref(), Some(target))
            .await?;
        let email = self
            .check_email(&mut errors, input.email.as_deref(), false, Some(target.id))
            .await?;

        errors.into_result()?;
        Ok(CleanedFields { email, iban })
    }

    /// First-party sign-up workflow
    pub async fn validate_registration(&self, input: &RegisterUser) -> AccountResult<CleanedFields> {
        let mut errors = FieldErrors::new();

        self.check_username(&mut errors, &input.username, None).await?;
        let email = self
            .check_email(&mut errors, Some(&input.email), true, None)
            .await?;

        Self::check_passwords(
            &mut errors,
            &input.password1,
            &input.password2,
            &[
                ("username", input.username.as_str()),
                ("email", input.email.as_str()),
            ],
        );

        errors.into_result()?;
        Ok(CleanedFields { email, iban: None })
    }
}
