use std::env;
use std::fmt;
use std::str::FromStr;

/// SMTP relay used for OTP mails. Absent when `SMTP_HOST`/`AUTH_EMAIL`/`AUTH_PASSWORD`
/// are not all set, in which case mails are only recorded and logged.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct AdminSeedConfig {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_name: String,

    pub access_token_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_secret: String,
    pub refresh_token_ttl_days: i64,
    pub jwt_issuer: String,
    pub jwt_audience: String,

    pub otp_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub app_name: String,

    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub admin_seed: Option<AdminSeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: None,
            database_name: "student_portal".to_string(),
            access_token_secret: "default-access-secret-change-me".to_string(),
            access_token_ttl_minutes: 60 * 24,
            refresh_token_secret: "default-refresh-secret-change-me".to_string(),
            refresh_token_ttl_days: 10,
            jwt_issuer: "student-portal".to_string(),
            jwt_audience: "student-portal-api".to_string(),
            otp_ttl_seconds: 300,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cookie_secure: true,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            max_upload_bytes: 10 * 1024 * 1024,
            app_name: "BITAcademia".to_string(),
            smtp: None,
            cloudinary: None,
            admin_seed: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { var, value } => {
                write!(f, "ConfigError: invalid value for {}: '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Builds the configuration from the process environment. Call `dotenv().ok()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let smtp = match (var("SMTP_HOST"), var("AUTH_EMAIL"), var("AUTH_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                host,
                username,
                password,
            }),
            _ => None,
        };

        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let admin_seed = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeedConfig {
                username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", var("PORT"), defaults.port)?,
            database_url: var("DATABASE_URL"),
            database_name: var("DATABASE_NAME").unwrap_or(defaults.database_name),
            access_token_secret: var("ACCESS_TOKEN_SECRET").unwrap_or(defaults.access_token_secret),
            access_token_ttl_minutes: parse_or(
                "ACCESS_TOKEN_EXPIRY_MINUTES",
                var("ACCESS_TOKEN_EXPIRY_MINUTES"),
                defaults.access_token_ttl_minutes,
            )?,
            refresh_token_secret: var("REFRESH_TOKEN_SECRET")
                .unwrap_or(defaults.refresh_token_secret),
            refresh_token_ttl_days: parse_or(
                "REFRESH_TOKEN_EXPIRY_DAYS",
                var("REFRESH_TOKEN_EXPIRY_DAYS"),
                defaults.refresh_token_ttl_days,
            )?,
            jwt_issuer: var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: var("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            otp_ttl_seconds: parse_or(
                "OTP_EXPIRY_SECONDS",
                var("OTP_EXPIRY_SECONDS"),
                defaults.otp_ttl_seconds,
            )?,
            bcrypt_cost: parse_or("BCRYPT_COST", var("BCRYPT_COST"), defaults.bcrypt_cost)?,
            cookie_secure: parse_or("COOKIE_SECURE", var("COOKIE_SECURE"), defaults.cookie_secure)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                var("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            )?,
            app_name: var("APP_NAME").unwrap_or(defaults.app_name),
            smtp,
            cloudinary,
            admin_seed,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            var: name,
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert!(config.database_url.is_none());
        assert!(config.smtp.is_none());
        assert!(config.cloudinary.is_none());
        assert!(config.admin_seed.is_none());
        assert!(config.cookie_secure);
    }

    #[test]
    fn test_overrides_and_lists() {
        let config = config_from(&[
            ("PORT", "9001"),
            ("DATABASE_URL", "mongodb://localhost:27017/portal"),
            ("COOKIE_SECURE", "false"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,,"),
            ("SMTP_HOST", "smtp.gmail.com"),
            ("AUTH_EMAIL", "noreply@example.com"),
            ("AUTH_PASSWORD", "app-password"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9001");
        assert_eq!(
            config.database_url.as_deref(),
            Some("mongodb://localhost:27017/portal")
        );
        assert!(!config.cookie_secure);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.smtp.unwrap().host, "smtp.gmail.com");
        assert_eq!(config.admin_seed.unwrap().username, "admin");
    }

    #[test]
    fn test_partial_cloudinary_credentials_are_ignored() {
        let config = config_from(&[("CLOUDINARY_CLOUD_NAME", "demo")]).unwrap();
        assert!(config.cloudinary.is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
