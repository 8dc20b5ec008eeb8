use axum_helpers::JwtConfig;
use domain_accounts::models::NAME_MAX_LENGTH;
use core_config::{
    AppInfo, ConfigError, FromEnv, app_info, database::DatabaseConfig, env_bool, env_optional,
    env_parse, server::ServerConfig,
};

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Federated login settings.
///
/// - `SOCIAL_AUTH_ENABLED` (default true)
/// - `SOCIAL_AUTH_GOOGLE_OAUTH2_KEY`, `SOCIAL_AUTH_GOOGLE_OAUTH2_SECRET`
#[derive(Clone, Debug)]
pub struct SocialAuthConfig {
    pub enabled: bool,
    pub google_key: Option<String>,
    pub google_secret: Option<String>,
}

impl FromEnv for SocialAuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: env_bool("SOCIAL_AUTH_ENABLED", true)?,
            google_key: env_optional("SOCIAL_AUTH_GOOGLE_OAUTH2_KEY"),
            google_secret: env_optional("SOCIAL_AUTH_GOOGLE_OAUTH2_SECRET"),
        })
    }
}

impl SocialAuthConfig {
    /// Enabled but without a complete Google key/secret pair
    pub fn missing_credentials(&self) -> bool {
        self.enabled && (self.google_key.is_none() || self.google_secret.is_none())
    }
}

/// Superuser created at startup when `SUPERUSER_USERNAME` is set
#[derive(Clone, Debug)]
pub struct SuperuserConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SuperuserConfig {
    /// `None` unless `SUPERUSER_USERNAME` is set; email and password are then required.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(username) = env_optional("SUPERUSER_USERNAME") else {
            return Ok(None);
        };

        Ok(Some(Self {
            username,
            email: env_optional("SUPERUSER_EMAIL")
                .ok_or_else(|| ConfigError::MissingEnvVar("SUPERUSER_EMAIL".to_string()))?,
            password: env_optional("SUPERUSER_PASSWORD")
                .ok_or_else(|| ConfigError::MissingEnvVar("SUPERUSER_PASSWORD".to_string()))?,
        }))
    }
}

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub social: SocialAuthConfig,
    pub superuser: Option<SuperuserConfig>,
    /// `USERNAME_MAX_LENGTH` (default and upper bound 150)
    pub username_max_length: usize,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let database = DatabaseConfig::from_env()?; // Required - will fail if not set
        let jwt = JwtConfig::from_env()?; // Required - will fail if not set
        let social = SocialAuthConfig::from_env()?;
        let superuser = SuperuserConfig::from_env()?;
        let username_max_length = username_max_length_from_env()?;

        Ok(Self {
            app: app_info!(),
            environment,
            server,
            database,
            jwt,
            social,
            superuser,
            username_max_length,
        })
    }
}

/// Generated usernames must fit the username column
fn username_max_length_from_env() -> Result<usize, ConfigError> {
    let max_length = env_parse("USERNAME_MAX_LENGTH", NAME_MAX_LENGTH)?;
    if !(1..=NAME_MAX_LENGTH).contains(&max_length) {
        return Err(ConfigError::ParseError {
            key: "USERNAME_MAX_LENGTH".to_string(),
            details: format!("must be between 1 and {}, got {}", NAME_MAX_LENGTH, max_length),
        });
    }
    Ok(max_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "config-test-secret-that-is-long-enough";

    #[test]
    fn test_config_defaults() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/superman")),
                ("JWT_SECRET", Some(SECRET)),
                ("SOCIAL_AUTH_ENABLED", None),
                ("SUPERUSER_USERNAME", None),
                ("USERNAME_MAX_LENGTH", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.social.enabled);
                assert!(config.superuser.is_none());
                assert_eq!(config.username_max_length, 150);
                assert_eq!(config.jwt.access_ttl_secs, 900);
            },
        );
    }

    #[test]
    fn test_social_auth_can_be_disabled() {
        temp_env::with_var("SOCIAL_AUTH_ENABLED", Some("false"), || {
            let social = SocialAuthConfig::from_env().unwrap();
            assert!(!social.enabled);
        });
    }

    #[test]
    fn test_social_auth_missing_credentials() {
        temp_env::with_vars(
            [
                ("SOCIAL_AUTH_ENABLED", Some("true")),
                ("SOCIAL_AUTH_GOOGLE_OAUTH2_KEY", Some("key")),
                ("SOCIAL_AUTH_GOOGLE_OAUTH2_SECRET", None),
            ],
            || {
                let social = SocialAuthConfig::from_env().unwrap();
                assert!(social.missing_credentials());
            },
        );

        temp_env::with_vars(
            [
                ("SOCIAL_AUTH_ENABLED", Some("false")),
                ("SOCIAL_AUTH_GOOGLE_OAUTH2_KEY", None),
                ("SOCIAL_AUTH_GOOGLE_OAUTH2_SECRET", None),
            ],
            || {
                let social = SocialAuthConfig::from_env().unwrap();
                assert!(!social.missing_credentials());
            },
        );
    }

    #[test]
    fn test_username_max_length_bounds() {
        temp_env::with_var("USERNAME_MAX_LENGTH", Some("150"), || {
            assert_eq!(username_max_length_from_env().unwrap(), 150);
        });
        temp_env::with_var("USERNAME_MAX_LENGTH", Some("1"), || {
            assert_eq!(username_max_length_from_env().unwrap(), 1);
        });

        for value in ["0", "151", "200"] {
            temp_env::with_var("USERNAME_MAX_LENGTH", Some(value), || {
                let err = username_max_length_from_env().unwrap_err();
                assert!(err.to_string().contains("USERNAME_MAX_LENGTH"));
            });
        }
    }

    #[test]
    fn test_username_max_length_out_of_range_fails_config() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/superman")),
                ("JWT_SECRET", Some(SECRET)),
                ("USERNAME_MAX_LENGTH", Some("151")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_superuser_requires_password() {
        temp_env::with_vars(
            [
                ("SUPERUSER_USERNAME", Some("clark")),
                ("SUPERUSER_EMAIL", Some("clark@example.com")),
                ("SUPERUSER_PASSWORD", None),
            ],
            || {
                let err = SuperuserConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("SUPERUSER_PASSWORD"));
            },
        );
    }

    #[test]
    fn test_missing_jwt_secret_fails() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/superman")),
                ("JWT_SECRET", None),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
