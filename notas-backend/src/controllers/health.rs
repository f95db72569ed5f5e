use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health_check)));
    cfg.service(web::resource("/api/version").route(web::get().to(get_version)));
    cfg.service(web::resource("/api/health/config").route(web::get().to(get_config_status)));
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    // A pooled connection proves the database file is reachable
    let database = match state.db.conn() {
        Ok(_) => "ok",
        Err(e) => {
            log::error!("[DB] Health check could not get a connection: {}", e);
            "unavailable"
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": VERSION,
        "database": database
    }))
}

async fn get_version() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "version": VERSION
    }))
}

async fn get_config_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "mail_backend": state.accounts.mailer_name(),
        "public_url": state.config.public_url,
        "secure_cookies": state.config.secure_cookies,
        "token_valid_hours": state.config.token_bucket_secs * state.config.token_valid_buckets / 3600,
        "session_ttl_hours": state.config.session_ttl_hours,
        "uptime_secs": state.started_at.elapsed().as_secs()
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::state;
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_endpoints() {
        let (state, _) = state();
        let app = test::init_service(App::new().app_data(state).configure(config_routes)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["version"], VERSION);

        let req = test::TestRequest::get().uri("/api/health/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mail_backend"], "memory");
        assert_eq!(body["token_valid_hours"], 72);
    }
}
