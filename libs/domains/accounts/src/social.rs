//! Resolves a federated login to an existing local account.
//!
//! Accounts are never provisioned from a provider response: only `account`
//! email claims are considered and each must match a local user.

use crate::error::{AccountError, AccountResult};
use crate::models::{SocialResolution, SocialResponse};
use crate::repository::UserRepository;

/// Claim type naming the address of the local account
pub const ACCOUNT_CLAIM: &str = "account";

/// Maps the provider `response` to a local user.
///
/// Each `account` claim must match a user by case-insensitive email, otherwise
/// [`AccountError::SocialAccountNotFound`] is returned; when several match,
/// the last one wins. No response or no account claim yields an empty
/// resolution.
pub async fn resolve_social_user<R: UserRepository + ?Sized>(
    repository: &R,
    response: Option<&SocialResponse>,
) -> AccountResult<SocialResolution> {
    let Some(response) = response else {
        return Ok(SocialResolution::default());
    };

    let mut user = None;
    for claim in response.emails.iter().filter(|c| c.kind == ACCOUNT_CLAIM) {
        match repository.get_by_email(&claim.value).await? {
            Some(found) => user = Some(found),
            None => {
                tracing::info!(email = %claim.value, "Federated login for unknown account");
                return Err(AccountError::SocialAccountNotFound);
            }
        }
    }

    Ok(SocialResolution {
        uid: user.as_ref().map(|u| u.id),
        user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailClaim, NewUser};
    use crate::repository::InMemoryUserRepository;

    fn claim(kind: &str, value: &str) -> EmailClaim {
        EmailClaim {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }

    async fn repo_with(emails: &[&str]) -> InMemoryUserRepository {
        let repo = InMemoryUserRepository::new();
        for (i, email) in emails.iter().enumerate() {
            repo.create(NewUser {
                username: format!("user{}", i),
                first_name: String::new(),
                last_name: String::new(),
                email: Some(email.to_string()),
                iban: None,
                password_hash: String::new(),
                is_active: true,
                is_staff: false,
                is_superuser: false,
                groups: vec![],
                permissions: vec![],
                created_by: None,
            })
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_account_claim_resolves_user() {
        let repo = repo_with(&["john@example.com"]).await;
        let response = SocialResponse {
            emails: vec![claim("account", "JOHN@example.com")],
        };

        let resolution = resolve_social_user(&repo, Some(&response)).await.unwrap();
        let user = resolution.user.unwrap();
        assert_eq!(user.email.as_deref(), Some("john@example.com"));
        assert_eq!(resolution.uid, Some(user.id));
    }

    #[tokio::test]
    async fn test_unknown_account_fails() {
        let repo = repo_with(&[]).await;
        let response = SocialResponse {
            emails: vec![claim("account", "ghost@example.com")],
        };

        let err = resolve_social_user(&repo, Some(&response)).await.unwrap_err();
        assert!(matches!(err, AccountError::SocialAccountNotFound));
        assert_eq!(err.to_string(), "User account does not exist.");
    }

    #[tokio::test]
    async fn test_personal_claims_are_ignored() {
        let repo = repo_with(&["john@example.com"]).await;
        let response = SocialResponse {
            emails: vec![claim("personal", "john@example.com")],
        };

        let resolution = resolve_social_user(&repo, Some(&response)).await.unwrap();
        assert!(resolution.user.is_none());
        assert!(resolution.uid.is_none());
    }

    #[tokio::test]
    async fn test_empty_or_absent_response() {
        let repo = repo_with(&[]).await;

        let resolution = resolve_social_user(&repo, Some(&SocialResponse::default()))
            .await
            .unwrap();
        assert!(resolution.user.is_none());

        let resolution = resolve_social_user(&repo, None).await.unwrap();
        assert!(resolution.uid.is_none());
    }

    #[tokio::test]
    async fn test_last_account_claim_wins() {
        let repo = repo_with(&["first@example.com", "second@example.com"]).await;
        let response = SocialResponse {
            emails: vec![
                claim("account", "first@example.com"),
                claim("personal", "other@example.com"),
                claim("account", "second@example.com"),
            ],
        };

        let resolution = resolve_social_user(&repo, Some(&response)).await.unwrap();
        assert_eq!(
            resolution.user.unwrap().email.as_deref(),
            Some("second@example.com")
        );
    }
}
