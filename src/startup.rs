use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::blacklist::TokenBlacklist;
use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthMiddleware;
use crate::routes::{
    get_current_user, get_project, health_check, invite, leave, list_projects, login, logout,
    refresh, register, remove, respond, update, verify_email_route,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    blacklist: TokenBlacklist,
    email_client: EmailClient,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let blacklist_data = web::Data::new(blacklist.clone());
    let email_client_data = web::Data::new(email_client);
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(connection.clone())
            .app_data(blacklist_data.clone())
            .app_data(email_client_data.clone())
            .app_data(jwt_config_data.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/verify-email", web::post().to(verify_email_route))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected auth routes (require a valid, non-revoked access token)
            .service(
                web::scope("/auth")
                    .wrap(AuthMiddleware::new(jwt_config.clone(), blacklist.clone()))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(get_current_user)),
            )

            // Protected API routes
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(jwt_config.clone(), blacklist.clone()))
                    .route("/members", web::post().to(invite))
                    .route("/members/{membership_id}", web::patch().to(update))
                    .route("/members/{membership_id}", web::delete().to(remove))
                    .route("/members/{membership_id}/respond", web::post().to(respond))
                    .route("/members/{membership_id}/leave", web::post().to(leave))
                    .route("/projects", web::get().to(list_projects))
                    .route("/projects/{project_id}", web::get().to(get_project)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
