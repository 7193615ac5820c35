use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::Config;
use crate::error::CmsResult;
use crate::helper::auth_helpers;
use crate::middleware::{end_session, start_session, AuthenticatedUser};
use crate::models::forms::{LoginForm, PasswordChange, ProfileUpdate, Registration};
use crate::routes::{created_json, message_json, ok_json};
use crate::DbPool;

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(handle_login))
            .route("/logout", web::post().to(handle_logout))
            .route("/register", web::post().to(handle_register))
            .route("/profile", web::get().to(show_profile))
            .route("/profile", web::post().to(update_profile))
            .route("/profile/password", web::post().to(change_password)),
    );
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    form: web::Json<LoginForm>,
) -> CmsResult<HttpResponse> {
    let form = form.into_inner();
    let user = auth_helpers::authenticate(&pool, &form.email, &form.password)?;
    start_session(&session, &user, config.session_ttl(form.remember))?;
    Ok(ok_json(json!({ "user": user, "identity": user.identity() })))
}

async fn handle_logout(session: Session) -> HttpResponse {
    end_session(&session);
    message_json("Logged out")
}

async fn handle_register(pool: web::Data<DbPool>, form: web::Json<Registration>) -> CmsResult<HttpResponse> {
    let user = auth_helpers::register(&pool, &form)?;
    Ok(created_json(user))
}

async fn show_profile(user: AuthenticatedUser) -> HttpResponse {
    ok_json(user.0)
}

async fn update_profile(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Json<ProfileUpdate>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(auth_helpers::update_profile(&pool, &user.identity(), &form)?))
}

async fn change_password(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Json<PasswordChange>,
) -> CmsResult<HttpResponse> {
    auth_helpers::change_password(&pool, &user.identity(), &form)?;
    Ok(message_json("Password changed"))
}
