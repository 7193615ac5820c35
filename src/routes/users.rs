use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::CmsResult;
use crate::helper::listing_helpers::{PageQuery, PageRequest};
use crate::helper::user_helpers;
use crate::middleware::AuthenticatedUser;
use crate::models::filters::UserFilter;
use crate::models::forms::{BulkUserRequest, NewUser, UserUpdate};
use crate::routes::{created_json, message_json, ok_json};
use crate::DbPool;

const USERS_PER_PAGE: i64 = 10;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    new_password: String,
}

/// User management routes, mounted inside the admin scope.
pub fn config_users(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::get().to(list_users))
        .route("/users", web::post().to(create_user))
        .route("/users/statistics", web::get().to(user_statistics))
        .route("/users/bulk", web::post().to(bulk_action))
        .route("/users/{id}", web::get().to(show_user))
        .route("/users/{id}", web::put().to(update_user))
        .route("/users/{id}", web::delete().to(delete_user))
        .route("/users/{id}/toggle-status", web::post().to(toggle_status))
        .route("/users/{id}/reset-password", web::post().to(reset_password));
}

async fn list_users(
    pool: web::Data<DbPool>,
    filter: web::Query<UserFilter>,
    page: web::Query<PageQuery>,
) -> CmsResult<HttpResponse> {
    let page = PageRequest::from_query(&page, USERS_PER_PAGE);
    Ok(ok_json(user_helpers::list_users(&pool, &filter, &page)?))
}

async fn user_statistics(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(user_helpers::user_statistics(&pool)?))
}

async fn show_user(pool: web::Data<DbPool>, user_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    Ok(ok_json(user_helpers::get_user(&pool, user_id.into_inner())?))
}

async fn create_user(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Json<NewUser>,
) -> CmsResult<HttpResponse> {
    Ok(created_json(user_helpers::create_user(&pool, &user.identity(), &form)?))
}

async fn update_user(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    user_id: web::Path<i64>,
    form: web::Json<UserUpdate>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(user_helpers::update_user(
        &pool,
        &user.identity(),
        user_id.into_inner(),
        &form,
    )?))
}

async fn delete_user(user: AuthenticatedUser, pool: web::Data<DbPool>, user_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    user_helpers::delete_user(&pool, &user.identity(), user_id.into_inner())?;
    Ok(message_json("User deleted"))
}

async fn toggle_status(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    user_id: web::Path<i64>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(user_helpers::toggle_user_status(
        &pool,
        &user.identity(),
        user_id.into_inner(),
    )?))
}

async fn reset_password(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    user_id: web::Path<i64>,
    body: web::Json<PasswordReset>,
) -> CmsResult<HttpResponse> {
    user_helpers::reset_user_password(&pool, &user.identity(), user_id.into_inner(), &body.new_password)?;
    Ok(message_json("Password reset"))
}

async fn bulk_action(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<BulkUserRequest>,
) -> CmsResult<HttpResponse> {
    let affected = user_helpers::bulk_user_action(&pool, &user.identity(), &body)?;
    Ok(ok_json(json!({ "affected": affected, "requested": body.user_ids.len() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::RequireCapability;
    use crate::models::Capability;
    use crate::routes::auth::config_auth;
    use crate::test_support::{self, session_cookie, test_config, TEST_PASSWORD};
    use actix_session::{storage::CookieSessionStore, SessionMiddleware};
    use actix_web::{cookie::Key, http::StatusCode, test, App};

    #[actix_web::test]
    async fn bulk_route_reports_affected_and_requested() {
        let fx = test_support::fixture();
        let app = test::init_service(
            App::new()
                .wrap(SessionMiddleware::new(CookieSessionStore::default(), Key::generate()))
                .app_data(web::Data::new(fx.pool.clone()))
                .app_data(web::Data::new(test_config()))
                .configure(config_auth)
                .service(
                    web::scope("/admin")
                        .wrap(RequireCapability(Capability::AccessAdmin))
                        .configure(config_users),
                ),
        )
        .await;
        let targets = json!({
            "action": "deactivate",
            "userIds": [fx.editor.user_id, fx.reader.user_id, fx.admin.user_id],
        });

        let login = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "email": "reader@example.com", "password": TEST_PASSWORD }))
            .to_request();
        let reader_cookie = session_cookie(&test::call_service(&app, login).await);
        let req = test::TestRequest::post()
            .uri("/admin/users/bulk")
            .cookie(reader_cookie)
            .set_json(&targets)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let login = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "email": "admin@example.com", "password": TEST_PASSWORD }))
            .to_request();
        let admin_cookie = session_cookie(&test::call_service(&app, login).await);
        let req = test::TestRequest::post()
            .uri("/admin/users/bulk")
            .cookie(admin_cookie)
            .set_json(&targets)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["affected"], 2);
        assert_eq!(body["data"]["requested"], 3);
    }
}
