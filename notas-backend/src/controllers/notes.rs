//! Note pages. Every handler starts by requiring a logged-in session.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::{page, redirect_with_flash, require_session};
use crate::error::AppError;
use crate::models::NoteForm;
use crate::AppState;

const NOTE_CREATED: &str = "Nota creada.";
const NOTE_UPDATED: &str = "Nota actualizada.";
const NOTE_DELETED: &str = "Nota eliminada.";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/notas").route(web::get().to(list_notes)))
        .service(
            web::resource("/notas/nueva")
                .route(web::get().to(new_note_page))
                .route(web::post().to(create_note)),
        )
        .service(
            web::resource("/notas/{id}/editar")
                .route(web::get().to(edit_note_page))
                .route(web::post().to(update_note)),
        )
        .service(
            web::resource("/notas/{id}/eliminar")
                .route(web::get().to(confirm_delete_page))
                .route(web::post().to(delete_note)),
        );
}

async fn list_notes(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    let user = state.accounts.current_user(&session)?.map(|u| u.to_info());
    let notes = state.notes.list(&session)?;

    Ok(page(
        &req,
        json!({
            "page": "lista_notas",
            "user": user,
            "notes": notes,
        }),
    ))
}

async fn new_note_page(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    require_session(&state, &req)?;
    Ok(page(
        &req,
        json!({
            "page": "crear_nota",
            "fields": ["title", "body"],
        }),
    ))
}

async fn create_note(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: Option<web::Form<NoteForm>>,
) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    state.notes.create(&session, &submitted(form))?;
    Ok(redirect_with_flash("/notas", NOTE_CREATED))
}

async fn edit_note_page(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    let note = state.notes.get(&session, note_id(&path)?)?;
    Ok(page(
        &req,
        json!({
            "page": "editar_nota",
            "note": note,
            "fields": ["title", "body"],
        }),
    ))
}

async fn update_note(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    form: Option<web::Form<NoteForm>>,
) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    state.notes.update(&session, note_id(&path)?, &submitted(form))?;
    Ok(redirect_with_flash("/notas", NOTE_UPDATED))
}

/// First half of a delete: show what would be removed, change nothing.
async fn confirm_delete_page(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    let note = state.notes.get(&session, note_id(&path)?)?;
    Ok(page(
        &req,
        json!({
            "page": "eliminar_nota",
            "question": format!("¿Seguro que querés eliminar la nota \"{}\"?", note.title),
            "note": note,
        }),
    ))
}

async fn delete_note(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session = require_session(&state, &req)?;
    state.notes.delete(&session, note_id(&path)?, true)?;
    Ok(redirect_with_flash("/notas", NOTE_DELETED))
}

/// Path and body are extracted leniently so the session check always runs
/// first. An id that is not a number names no note.
fn note_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// A missing or unreadable body counts as an empty form.
fn submitted(form: Option<web::Form<NoteForm>>) -> NoteForm {
    form.map(web::Form::into_inner).unwrap_or_default()
}
