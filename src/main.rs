use authkeeper::auth::SystemClock;
use authkeeper::configuration::{get_configuration, StoreBackend};
use authkeeper::identity::{IdentityStore, InMemoryIdentityStore, PgIdentityStore};
use authkeeper::startup::{run, Services};
use authkeeper::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

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

    let store: Arc<dyn IdentityStore> = match configuration.application.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory identity store; data is lost on restart");
            Arc::new(InMemoryIdentityStore::new())
        }
        StoreBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;

            tracing::info!("Database connection pool created successfully");
            Arc::new(PgIdentityStore::new(pool))
        }
    };

    let services = Services::build(
        store,
        &configuration.jwt,
        &configuration.credentials,
        Arc::new(SystemClock),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to initialise services: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Service initialisation error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, services)?.await
}
