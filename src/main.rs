use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;

use projecthub::blacklist::TokenBlacklist;
use projecthub::configuration::get_configuration;
use projecthub::email_client::EmailClient;
use projecthub::startup::run;
use projecthub::telemetry::init_telemetry;

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

    tracing::info!("Database connection pool created");

    let blacklist = TokenBlacklist::connect(&configuration.redis.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to Redis: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Revocation store connection error",
            )
        })?;

    tracing::info!("Revocation store connected");

    let email_client = EmailClient::new(&configuration.email);

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        pool,
        blacklist,
        email_client,
        configuration.jwt.clone(),
    )?;

    server.await
}
