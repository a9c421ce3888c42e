use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use session_auth::{health_check, AppState, AppError, Settings};
use session_auth::auth::handlers;
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn build_cors(config: &Settings) -> Cors {
    if !config.cors.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    config
        .cors
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT"])
        .allowed_headers(vec!["Content-Type"])
        .supports_credentials()
        .max_age(config.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> session_auth::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({} environment)", config.environment);
    if config.accounts.is_empty() {
        warn!("No accounts configured; every login will fail");
    }

    let state = AppState::new(config.clone())?;
    let state = web::Data::new(state);

    // Lockout and reset records expire lazily; this only reclaims memory.
    if config.auth.sweep_interval_secs > 0 {
        let sweep_state = state.clone();
        let interval = Duration::from_secs(config.auth.sweep_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let purged = sweep_state.purge_expired();
                if purged > 0 {
                    info!("Purged {} expired auth records", purged);
                }
            }
        });
    }

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);
    let workers = config.server.workers as usize;

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config))
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure)
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(())
}
