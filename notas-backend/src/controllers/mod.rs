//! HTTP layer.
//!
//! Pages answer with JSON page data; successful form posts answer with a 303
//! redirect. A one-shot flash message can ride along a redirect in the
//! `notas_flash` cookie and is handed out (and cleared) by the next page.

pub mod auth;
pub mod health;
pub mod notes;

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::Session;
use crate::AppState;

pub const SESSION_COOKIE: &str = "notas_session";
pub const FLASH_COOKIE: &str = "notas_flash";

pub fn config(cfg: &mut web::ServiceConfig) {
    health::config_routes(cfg);
    auth::config(cfg);
    notes::config(cfg);
}

/// Session token from the `Authorization: Bearer` header or the session cookie.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    bearer
        .or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

/// The session behind this request; anonymous when there is none.
pub fn current_session(state: &web::Data<AppState>, req: &HttpRequest) -> Result<Session, AppError> {
    let token = session_token(req);
    Ok(state.accounts.resolve_session(token.as_deref())?)
}

/// Like [`current_session`], but anonymous visitors are sent to log in first.
pub fn require_session(state: &web::Data<AppState>, req: &HttpRequest) -> Result<Session, AppError> {
    let session = current_session(state, req)?;
    if session.is_authenticated() {
        Ok(session)
    } else {
        Err(AppError::Unauthenticated { next: None }.with_next(req.path()))
    }
}

pub fn session_cookie(state: &AppState, token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies)
        .max_age(time::Duration::hours(state.config.session_ttl_hours))
        .finish()
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, urlencoding::encode(message).into_owned())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Start a `303 See Other` to `location`.
pub fn see_other(location: &str) -> HttpResponseBuilder {
    let mut builder = HttpResponse::SeeOther();
    builder.insert_header((header::LOCATION, location.to_string()));
    builder
}

/// Redirect and leave a message for the next page.
pub fn redirect_with_flash(location: &str, message: &str) -> HttpResponse {
    see_other(location).cookie(flash_cookie(message)).finish()
}

fn take_flash(req: &HttpRequest) -> Option<String> {
    let cookie = req.cookie(FLASH_COOKIE)?;
    urlencoding::decode(cookie.value())
        .ok()
        .map(|m| m.into_owned())
        .filter(|m| !m.is_empty())
}

/// Render page data as JSON. Any pending flash message is attached under
/// `"messages"` and its cookie cleared.
pub fn page(req: &HttpRequest, mut data: Value) -> HttpResponse {
    let flash = take_flash(req);
    let mut builder = HttpResponse::Ok();

    if let Value::Object(ref mut map) = data {
        let messages = match &flash {
            Some(message) => json!([message]),
            None => json!([]),
        };
        map.insert("messages".to_string(), messages);
    }
    if req.cookie(FLASH_COOKIE).is_some() {
        builder.cookie(removal_cookie(FLASH_COOKIE));
    }
    builder.json(data)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::accounts::Accounts;
    use crate::config::Config;
    use crate::db::Database;
    use crate::mailer::MemoryMailer;
    use actix_web::dev::ServiceResponse;
    use std::sync::Arc;

    pub fn state() -> (web::Data<AppState>, Arc<MemoryMailer>) {
        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::new(db, mailer.clone(), Config::for_tests());
        (web::Data::new(state), mailer)
    }

    pub fn location<B>(resp: &ServiceResponse<B>) -> String {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    pub fn cookie<B>(resp: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
        resp.response()
            .cookies()
            .find(|c| c.name() == name)
            .map(|c| c.into_owned())
    }

    /// Register, activate and log in a user directly through the workflows.
    pub async fn logged_in_user(state: &web::Data<AppState>, mailer: &MemoryMailer, username: &str) -> (i64, String) {
        let accounts: &Accounts = &state.accounts;
        let pending = accounts
            .register(&crate::accounts::test_support::registration(
                username,
                &format!("{}@example.com", username),
            ))
            .await
            .expect("registration succeeds");
        let (uid, token) =
            crate::accounts::test_support::link_parts(&mailer.last().expect("email sent").body, "/activar/");
        accounts.activate(&uid, &token).expect("activation succeeds");

        let logged_in = accounts
            .login(&crate::accounts::forms::LoginForm {
                username: username.to_string(),
                password: "segura-2024".to_string(),
                next: None,
            })
            .expect("login succeeds");
        (pending.user.id, logged_in.session.token)
    }
}
