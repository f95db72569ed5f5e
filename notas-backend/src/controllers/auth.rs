//! Landing page, login/logout, registration, activation and password reset.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{
    current_session, page, redirect_with_flash, removal_cookie, see_other, session_cookie,
    session_token, SESSION_COOKIE,
};
use crate::accounts::forms::{safe_next, EmailForm, LoginForm, RegistrationForm, SetPasswordForm};
use crate::accounts::AccountError;
use crate::error::{AppError, INVALID_LINK_MESSAGE, NON_FIELD_ERRORS};
use crate::AppState;

const FORM_HAS_ERRORS: &str = "Revisá los datos del formulario. Hay algunos errores que corregir.";
const ACTIVATION_SENT: &str =
    "¡Gracias por registrarte! Te enviamos un correo con el enlace para activar tu cuenta.";
const ACTIVATION_NOT_SENT: &str =
    "Tu cuenta se creó, pero no pudimos enviar el correo de activación. Pedí un nuevo enlace desde /activar/reenviar.";
const ACTIVATED: &str = "¡Tu cuenta fue activada! Ya podés iniciar sesión.";
const ACTIVATION_RESENT: &str =
    "Si hay una cuenta pendiente con ese correo, te enviamos un nuevo enlace de activación.";
const PASSWORD_RESET_SENT: &str =
    "Si hay una cuenta activa con ese correo, te enviamos instrucciones para restablecer la contraseña.";
const PASSWORD_RESET_DONE: &str = "Tu contraseña fue cambiada. Ya podés iniciar sesión.";
const LOGGED_OUT: &str = "Cerraste sesión.";

#[derive(Debug, Deserialize)]
struct IndexQuery {
    next: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/acerca").route(web::get().to(about)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(
            web::resource("/registro")
                .route(web::get().to(registration_page))
                .route(web::post().to(register)),
        )
        .service(web::resource("/activar/reenviar").route(web::post().to(resend_activation)))
        .service(web::resource("/activar/{uidb64}/{token}").route(web::get().to(activate)))
        .service(
            web::resource("/password-reset")
                .route(web::get().to(password_reset_page))
                .route(web::post().to(request_password_reset)),
        )
        .service(web::resource("/password-reset/enviado").route(web::get().to(password_reset_sent)))
        .service(
            web::resource("/password-reset/confirm/{uidb64}/{token}")
                .route(web::get().to(password_reset_confirm_page))
                .route(web::post().to(password_reset_confirm)),
        )
        .service(
            web::resource("/password-reset/completo").route(web::get().to(password_reset_complete)),
        );
}

/// Landing page: logged-in users go straight to their notes.
async fn index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<IndexQuery>,
) -> Result<HttpResponse, AppError> {
    if current_session(&state, &req)?.is_authenticated() {
        return Ok(see_other("/notas").finish());
    }
    Ok(page(
        &req,
        json!({
            "page": "inicio",
            "login_form": { "fields": ["username", "password"], "action": "/login" },
            "next": safe_next(query.next.as_deref()),
        }),
    ))
}

async fn about(req: HttpRequest) -> HttpResponse {
    page(
        &req,
        json!({
            "page": "acerca",
            "app": "notas",
            "version": super::health::VERSION,
        }),
    )
}

async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let logged_in = state.accounts.login(&form)?;
    let target = safe_next(form.next.as_deref()).unwrap_or_else(|| "/notas".to_string());

    Ok(see_other(&target)
        .cookie(session_cookie(&state, &logged_in.session.token))
        .finish())
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let session = current_session(&state, &req)?;
    state.accounts.logout(&session)?;

    Ok(see_other("/")
        .cookie(removal_cookie(SESSION_COOKIE))
        .cookie(super::flash_cookie(LOGGED_OUT))
        .finish())
}

async fn registration_page(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    if current_session(&state, &req)?.is_authenticated() {
        return Ok(see_other("/notas").finish());
    }
    Ok(page(
        &req,
        json!({
            "page": "registro",
            "fields": ["username", "email", "password1", "password2"],
        }),
    ))
}

async fn register(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<RegistrationForm>,
) -> Result<HttpResponse, AppError> {
    if current_session(&state, &req)?.is_authenticated() {
        return Ok(see_other("/notas").finish());
    }

    match state.accounts.register(&form).await {
        Ok(pending) if pending.activation_email_sent => Ok(redirect_with_flash("/", ACTIVATION_SENT)),
        Ok(_) => Ok(redirect_with_flash("/", ACTIVATION_NOT_SENT)),
        Err(AccountError::Validation(mut errors)) => {
            errors.add(NON_FIELD_ERRORS, FORM_HAS_ERRORS);
            Err(AppError::Validation(errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// Redeem an activation link. Whoever was logged in on this client is
/// logged out first, whatever the outcome.
async fn activate(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();

    if let Some(session_token) = session_token(&req) {
        state.db.delete_session(&session_token)?;
    }

    let mut resp = match state.accounts.activate(&uidb64, &token) {
        Ok(_) => redirect_with_flash("/", ACTIVATED),
        Err(AccountError::InvalidLink) => redirect_with_flash("/registro", INVALID_LINK_MESSAGE),
        Err(e) => return Err(e.into()),
    };
    resp.add_removal_cookie(&removal_cookie(SESSION_COOKIE))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(resp)
}

async fn resend_activation(
    state: web::Data<AppState>,
    form: web::Form<EmailForm>,
) -> Result<HttpResponse, AppError> {
    let email = form.clean()?;
    state.accounts.resend_activation(&email).await?;
    Ok(redirect_with_flash("/", ACTIVATION_RESENT))
}

async fn password_reset_page(req: HttpRequest) -> HttpResponse {
    page(&req, json!({ "page": "password_reset", "fields": ["email"] }))
}

async fn request_password_reset(
    state: web::Data<AppState>,
    form: web::Form<EmailForm>,
) -> Result<HttpResponse, AppError> {
    let email = form.clean()?;
    state.accounts.request_password_reset(&email).await?;
    Ok(see_other("/password-reset/enviado").finish())
}

async fn password_reset_sent(req: HttpRequest) -> HttpResponse {
    page(
        &req,
        json!({ "page": "password_reset_done", "message": PASSWORD_RESET_SENT }),
    )
}

async fn password_reset_confirm_page(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();
    let user = state.accounts.check_reset_link(&uidb64, &token)?;
    Ok(page(
        &req,
        json!({
            "page": "password_reset_confirm",
            "validlink": true,
            "username": user.username,
            "fields": ["new_password1", "new_password2"],
        }),
    ))
}

async fn password_reset_confirm(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    form: web::Form<SetPasswordForm>,
) -> Result<HttpResponse, AppError> {
    let (uidb64, token) = path.into_inner();
    state.accounts.confirm_password_reset(&uidb64, &token, &form)?;
    Ok(see_other("/password-reset/completo").finish())
}

async fn password_reset_complete(req: HttpRequest) -> HttpResponse {
    page(
        &req,
        json!({ "page": "password_reset_complete", "message": PASSWORD_RESET_DONE }),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{cookie, location, logged_in_user, state};
    use super::super::FLASH_COOKIE;
    use super::*;
    use crate::accounts::test_support::link_parts;
    use crate::models::Session;
    use actix_web::http::StatusCode;
    use actix_web::middleware::NormalizePath;
    use actix_web::{test, App};

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .wrap(NormalizePath::trim())
                    .configure(crate::controllers::config),
            )
            .await
        };
    }

    fn registration_body(username: &str, email: &str) -> String {
        format!(
            "username={}&email={}&password1=segura-2024&password2=segura-2024",
            username,
            urlencoding::encode(email)
        )
    }

    fn form_post(uri: &str, body: String) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header(("content-type", "application/x-www-form-urlencoded"))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_register_activate_login_flow() {
        let (state, mailer) = state();
        let app = app!(state);

        let resp = test::call_service(
            &app,
            form_post("/registro/", registration_body("ana", "ana@example.com")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
        assert!(cookie(&resp, FLASH_COOKIE).is_some());

        // Not active yet
        let resp = test::call_service(
            &app,
            form_post("/login", "username=ana&password=segura-2024".to_string()).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (uid, token) = link_parts(&mailer.last().unwrap().body, "/activar/");
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/activar/{}/{}/", uid, token))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");

        let resp = test::call_service(
            &app,
            form_post(
                "/login",
                "username=ana&password=segura-2024&next=%2Fnotas%2Fnueva".to_string(),
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/notas/nueva");
        let session = cookie(&resp, SESSION_COOKIE).expect("session cookie");
        assert_eq!(session.http_only(), Some(true));

        // Logged-in visitors skip the landing page
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/").cookie(session.clone()).to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/notas");
    }

    #[actix_web::test]
    async fn test_activation_link_reuse_redirects_to_registration() {
        let (state, mailer) = state();
        let app = app!(state);

        test::call_service(
            &app,
            form_post("/registro", registration_body("ana", "ana@example.com")).to_request(),
        )
        .await;
        let (uid, token) = link_parts(&mailer.last().unwrap().body, "/activar/");
        let uri = format!("/activar/{}/{}", uid, token);

        let first = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(location(&first), "/");

        let second = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(second.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&second), "/registro");
        let flash = cookie(&second, FLASH_COOKIE).unwrap();
        assert_eq!(urlencoding::decode(flash.value()).unwrap(), INVALID_LINK_MESSAGE);
    }

    #[actix_web::test]
    async fn test_activation_logs_out_current_session() {
        let (state, mailer) = state();
        let app = app!(state);
        let (_, ana_token) = logged_in_user(&state, &mailer, "ana").await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/activar/bogus/1-00")
                .insert_header(("Authorization", format!("Bearer {}", ana_token)))
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/registro");
        let removed = cookie(&resp, SESSION_COOKIE).expect("session cookie removed");
        assert_eq!(removed.value(), "");

        let session: Session = state.accounts.resolve_session(Some(&ana_token)).unwrap();
        assert!(!session.is_authenticated());
    }

    #[actix_web::test]
    async fn test_duplicate_email_shows_field_error() {
        let (state, _) = state();
        let app = app!(state);

        test::call_service(
            &app,
            form_post("/registro", registration_body("ana", "ana@example.com")).to_request(),
        )
        .await;
        let resp = test::call_service(
            &app,
            form_post("/registro", registration_body("beto", "ANA@EXAMPLE.COM")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["errors"]["email"][0],
            crate::accounts::DUPLICATE_EMAIL
        );
        assert_eq!(body["errors"][NON_FIELD_ERRORS][0], FORM_HAS_ERRORS);
    }

    #[actix_web::test]
    async fn test_failed_delivery_still_registers() {
        let (state, mailer) = state();
        mailer.set_failing(true);
        let app = app!(state);

        let resp = test::call_service(
            &app,
            form_post("/registro", registration_body("ana", "ana@example.com")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let flash = cookie(&resp, FLASH_COOKIE).unwrap();
        assert_eq!(urlencoding::decode(flash.value()).unwrap(), ACTIVATION_NOT_SENT);
        assert!(state.db.email_exists("ana@example.com").unwrap());

        mailer.set_failing(false);
        let resp = test::call_service(
            &app,
            form_post("/activar/reenviar", "email=ana%40example.com".to_string()).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[actix_web::test]
    async fn test_logout_clears_session() {
        let (state, mailer) = state();
        let app = app!(state);
        let (_, token) = logged_in_user(&state, &mailer, "ana").await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/logout")
                .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE, token.clone()))
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/");
        assert!(!state.accounts.resolve_session(Some(&token)).unwrap().is_authenticated());
    }

    #[actix_web::test]
    async fn test_open_redirect_is_ignored() {
        let (state, mailer) = state();
        let app = app!(state);
        logged_in_user(&state, &mailer, "ana").await;

        let resp = test::call_service(
            &app,
            form_post(
                "/login",
                "username=ana&password=segura-2024&next=%2F%2Fevil.example".to_string(),
            )
            .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/notas");
    }

    #[actix_web::test]
    async fn test_password_reset_over_http() {
        let (state, mailer) = state();
        let app = app!(state);
        logged_in_user(&state, &mailer, "ana").await;

        let resp = test::call_service(
            &app,
            form_post("/password-reset", "email=ana%40example.com".to_string()).to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/password-reset/enviado");

        let (uid, token) = link_parts(&mailer.last().unwrap().body, "/password-reset/confirm/");
        let uri = format!("/password-reset/confirm/{}/{}", uid, token);

        let req = test::TestRequest::get().uri(&uri).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["validlink"], true);
        assert_eq!(body["username"], "ana");

        let resp = test::call_service(
            &app,
            form_post(&uri, "new_password1=nueva-clave-99&new_password2=nueva-clave-99".to_string())
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/password-reset/completo");

        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
