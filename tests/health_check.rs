use projecthub::blacklist::TokenBlacklist;
use projecthub::configuration::get_configuration;
use projecthub::email_client::EmailClient;
use projecthub::startup::run;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

async fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();

    let mut connection =
        PgConnection::connect(&configuration.database.connection_string_without_db())
            .await
            .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(
            r#"CREATE DATABASE "{}";"#,
            configuration.database.database_name
        ))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&configuration.database.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");

    let blacklist = TokenBlacklist::connect(&configuration.redis.connection_string())
        .await
        .expect("Failed to connect to Redis");
    let email_client = EmailClient::new(&configuration.email);

    let server = run(
        listener,
        connection_pool,
        blacklist,
        email_client,
        configuration.jwt.clone(),
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    address
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/health_check", &address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
}
