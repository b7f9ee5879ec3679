use crate::error::ConfigError as SettingsError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub maintenance: MaintenanceSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Which store implementation backs users and sessions
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// In-process store; state is lost on restart
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StorageBackend,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "campus".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64, // seconds (900 = 15 minutes)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64, // seconds (604800 = 7 days)
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_access_token_expiry() -> i64 {
    900
}

fn default_refresh_token_expiry() -> i64 {
    604_800
}

fn default_issuer() -> String {
    "campus-auth".to_string()
}

/// Login throttling, per client IP
#[derive(serde::Deserialize, Clone)]
pub struct RateLimitSettings {
    pub login_max_requests: u32,
    pub login_window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            login_max_requests: 10,
            login_window_secs: 15 * 60,
        }
    }
}

/// Background refresh-token purge
#[derive(serde::Deserialize, Clone)]
pub struct MaintenanceSettings {
    pub purge_interval_secs: u64,
    pub revoked_retention_days: i64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            purge_interval_secs: 6 * 60 * 60,
            revoked_retention_days: 30,
        }
    }
}

impl Settings {
    /// Startup checks that must hold before anything is served.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("jwt.secret".to_string()));
        }
        if self.jwt.secret.len() < 32 {
            tracing::warn!("jwt.secret is shorter than 32 bytes");
        }
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(SettingsError::InvalidValue(
                "jwt token expiries must be positive".to_string(),
            ));
        }
        if self.rate_limit.login_max_requests == 0 || self.rate_limit.login_window_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "rate_limit values must be positive".to_string(),
            ));
        }
        if self.maintenance.purge_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "maintenance.purge_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) and
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
