mod api;
mod config;
mod database;
mod middleware;
mod models;
mod seeds;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use database::{MemoryStore, MongoDB, Store};
use services::mail_service::{RecordingSender, SendEmail, SmtpSender};
use services::media_service::{CloudinaryClient, MediaStore, MemoryMediaStore};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("❌ {}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    log::info!("🚀 Starting {} student portal...", config.app_name);

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = MongoDB::new(url, &config.database_name)
                .await
                .map_err(|e| startup_error("Failed to connect to MongoDB", e))?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(db)
        }
        None => {
            log::warn!("⚠️  DATABASE_URL not set, using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let mailer: Arc<dyn SendEmail> = match &config.smtp {
        Some(smtp) => {
            let sender = SmtpSender::new(smtp, &config.app_name)
                .map_err(|e| startup_error("Failed to configure SMTP", e))?;
            log::info!("📧 SMTP relay: {}", smtp.host);
            Arc::new(sender)
        }
        None => {
            log::warn!("⚠️  SMTP not configured, OTP mails are only logged");
            Arc::new(RecordingSender::new())
        }
    };

    let media: Arc<dyn MediaStore> = match &config.cloudinary {
        Some(cloudinary) => {
            log::info!("☁️  Media host: cloud {}", cloudinary.cloud_name);
            Arc::new(
                CloudinaryClient::new(cloudinary.clone())
                    .map_err(|e| startup_error("Failed to configure media host", e))?,
            )
        }
        None => {
            log::warn!("⚠️  Cloudinary not configured, uploads are kept in memory");
            Arc::new(MemoryMediaStore::new())
        }
    };

    // 🌱 Bootstrap administrator
    seeds::admin_seed::seed_admin(store.as_ref(), &config).await;

    let bind_address = config.bind_address();
    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}/api-docs/openapi.json", bind_address);

    let cors_origins = config.cors_origins.clone();
    let config_data = web::Data::new(config);
    let store_data = web::Data::from(store);
    let mailer_data = web::Data::from(mailer);
    let media_data = web::Data::from(media);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::CACHE_CONTROL,
            ])
            .expose_headers(vec![header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(config_data.clone())
            .app_data(store_data.clone())
            .app_data(mailer_data.clone())
            .app_data(media_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi)
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // ==================== USERS / PLACEMENTS / ADMIN ====================
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
