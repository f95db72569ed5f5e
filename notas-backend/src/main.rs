use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod accounts;
mod config;
mod controllers;
mod db;
mod error;
mod mailer;
mod models;
mod notes;
mod tokens;

use accounts::Accounts;
use config::Config;
use db::Database;
use mailer::Mailer;
use notes::NoteStore;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub accounts: Arc<Accounts>,
    pub notes: Arc<NoteStore>,
    /// Server start time for uptime calculation
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(db: Arc<Database>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        Self {
            accounts: Arc::new(Accounts::new(Arc::clone(&db), mailer, &config)),
            notes: Arc::new(NoteStore::new(Arc::clone(&db))),
            db,
            config,
            started_at: std::time::Instant::now(),
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Notas v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let port = config.port;

    log::info!("Opening database at {}", config.database_url);
    let db = Arc::new(Database::new(&config.database_url).map_err(|e| {
        log::error!("Failed to open database: {}", e);
        std::io::Error::other(e.to_string())
    })?);

    if let Err(e) = db.purge_expired_sessions() {
        log::warn!("Could not purge expired sessions: {}", e);
    }

    let mailer = mailer::from_config(&config);
    log::info!("Public URL: {}", config.public_url);

    let state = web::Data::new(AppState::new(db, mailer, config));

    log::info!("Starting server on port {}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .configure(controllers::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
