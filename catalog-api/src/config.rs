use serde::{Deserialize, Serialize};
use shared::database::DatabaseConfig;
use shared::observability::LogConfig;
use std::env;
use thiserror::Error;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub cors: CorsConfig,
    pub cache: CacheConfig,
    pub logging: LogConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Development,
            body_limit_mb: 50,
        }
    }
}

/// JWT and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub cookie_max_age_days: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: DEV_ACCESS_SECRET.to_string(),
            refresh_token_secret: DEV_REFRESH_SECRET.to_string(),
            access_token_expiry_minutes: 24 * 60,
            refresh_token_expiry_days: 7,
            cookie_max_age_days: 7,
            bcrypt_cost: 12,
        }
    }
}

/// S3-compatible object storage (DigitalOcean Spaces by default)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub upload_folder: String,
    pub public_base_url: Option<String>,
    pub image_width: u32,
    pub jpeg_quality: u8,
    pub max_gallery_images: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "catalog-assets".to_string(),
            region: "blr1".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            upload_folder: "uploads".to_string(),
            public_base_url: None,
            image_width: 800,
            jpeg_quality: 80,
            max_gallery_images: 10,
        }
    }
}

impl StorageConfig {
    /// Base URL under which uploaded objects are publicly reachable
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!(
                "https://{}.{}.digitaloceanspaces.com",
                self.bucket, self.region
            ),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            max_age_seconds: 3600,
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 300,
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
    Testing,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    /// Lenient parse used for `APP_ENV` / `NODE_ENV`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "test" | "testing" => Environment::Testing,
            _ => Environment::Development,
        }
    }
}

/// Split a comma separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Sources, lowest precedence first: built-in defaults, `config/default.toml`,
    /// `config/{environment}.toml`, `CATALOG__*` variables, then the plain variable
    /// names used by existing deployments (`DATABASE_URL`, `PORT`, `CORS_ORIGIN`, ...).
    pub fn load() -> ConfigResult<Self> {
        let environment = Environment::from_name(
            &env_opt("APP_ENV")
                .or_else(|| env_opt("NODE_ENV"))
                .unwrap_or_else(|| "development".to_string()),
        );

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/{}", environment.as_str()))
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("server.environment", environment.as_str())?
            .set_override_option("server.port", env_opt("PORT"))?
            .set_override_option("database.url", env_opt("DATABASE_URL"))?
            .set_override_option("auth.access_token_secret", env_opt("ACCESS_TOKEN_SECRET"))?
            .set_override_option("auth.refresh_token_secret", env_opt("REFRESH_TOKEN_SECRET"))?
            .set_override_option("storage.bucket", env_opt("SPACES_BUCKET"))?
            .set_override_option("storage.region", env_opt("SPACES_REGION"))?
            .set_override_option("storage.endpoint", env_opt("SPACES_ENDPOINT"))?
            .set_override_option("storage.access_key", env_opt("SPACES_KEY"))?
            .set_override_option("storage.secret_key", env_opt("SPACES_SECRET"))?
            .set_override_option("storage.upload_folder", env_opt("UPLOAD_FOLDER"))?
            .set_override_option(
                "cors.allowed_origins",
                env_opt("CORS_ORIGIN").map(|raw| parse_origins(&raw)),
            )?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations that cannot serve traffic safely
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue("server.port must not be 0".into()));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue("storage.bucket is required".into()));
        }

        if self.auth.access_token_secret.is_empty() || self.auth.refresh_token_secret.is_empty() {
            return Err(ConfigError::InvalidValue("token secrets must not be empty".into()));
        }

        if self.server.environment.is_production()
            && (self.auth.access_token_secret == DEV_ACCESS_SECRET
                || self.auth.refresh_token_secret == DEV_REFRESH_SECRET)
        {
            return Err(ConfigError::InvalidValue(
                "development token secrets cannot be used in production".into(),
            ));
        }

        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(ConfigError::InvalidValue(
                "storage.jpeg_quality must be between 1 and 100".into(),
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cache.default_ttl_seconds, 300);
    }

    #[test]
    fn test_production_rejects_dev_secrets() {
        let mut config = AppConfig::default();
        config.server.environment = Environment::Production;
        assert!(config.validate().is_err());

        config.auth.access_token_secret = "a-real-access-secret".into();
        config.auth.refresh_token_secret = "a-real-refresh-secret".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_public_base_url() {
        let mut storage = StorageConfig {
            bucket: "assets".into(),
            region: "nyc3".into(),
            ..Default::default()
        };
        assert_eq!(
            storage.public_base_url(),
            "https://assets.nyc3.digitaloceanspaces.com"
        );

        storage.public_base_url = Some("https://cdn.example.com/".into());
        assert_eq!(storage.public_base_url(), "https://cdn.example.com");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("http://a.com, https://b.com/ ,,"),
            vec!["http://a.com".to_string(), "https://b.com".to_string()]
        );
    }

    #[test]
    fn test_environment_from_name() {
        assert_eq!(Environment::from_name("production"), Environment::Production);
        assert_eq!(Environment::from_name("TEST"), Environment::Testing);
        assert_eq!(Environment::from_name("whatever"), Environment::Development);
    }
}
