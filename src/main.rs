use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use campus_auth::auth::SessionManager;
use campus_auth::configuration::{get_configuration, Settings, StorageBackend};
use campus_auth::jobs::spawn_purge_job;
use campus_auth::startup::run;
use campus_auth::store::{InMemoryStore, PgStore, RefreshTokenStore, UserStore};
use campus_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = configuration.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let (users, tokens) = build_stores(&configuration).await?;

    let purge = spawn_purge_job(
        tokens.clone(),
        Duration::from_secs(configuration.maintenance.purge_interval_secs),
        configuration.maintenance.revoked_retention_days,
    );

    let sessions = SessionManager::new(users, tokens, configuration.jwt.clone());

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, sessions, configuration.rate_limit.clone())?;
    let result = server.await;

    purge.abort();
    tracing::info!("Server stopped");

    result
}

async fn build_stores(
    configuration: &Settings,
) -> std::io::Result<(Arc<dyn UserStore>, Arc<dyn RefreshTokenStore>)> {
    match configuration.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; users and sessions are lost on restart");
            let store = Arc::new(InMemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let tokens: Arc<dyn RefreshTokenStore> = store;
            Ok((users, tokens))
        }
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(configuration.database.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
                })?;

            tracing::info!("Database connection pool created successfully");
            let store = Arc::new(PgStore::new(pool));
            let users: Arc<dyn UserStore> = store.clone();
            let tokens: Arc<dyn RefreshTokenStore> = store;
            Ok((users, tokens))
        }
    }
}
