use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::CmsResult;
use crate::helper::comment_helpers;
use crate::helper::listing_helpers::{PageQuery, PageRequest};
use crate::middleware::AuthenticatedUser;
use crate::models::filters::CommentFilter;
use crate::models::forms::BulkCommentRequest;
use crate::routes::{created_json, message_json, ok_json};
use crate::DbPool;

const COMMENTS_PER_PAGE: i64 = 10;

#[derive(Deserialize)]
pub struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
pub struct ReplyBody {
    content: String,
}

/// Moderation routes, mounted inside the admin scope.
pub fn config_comments(cfg: &mut web::ServiceConfig) {
    cfg.route("/comments", web::get().to(list_comments))
        .route("/comments/statistics", web::get().to(comment_statistics))
        .route("/comments/bulk", web::post().to(bulk_action))
        .route("/comments/{id}", web::get().to(show_comment))
        .route("/comments/{id}", web::delete().to(delete_comment))
        .route("/comments/{id}/status", web::put().to(set_status))
        .route("/comments/{id}/reply", web::post().to(reply));
}

async fn list_comments(
    pool: web::Data<DbPool>,
    filter: web::Query<CommentFilter>,
    page: web::Query<PageQuery>,
) -> CmsResult<HttpResponse> {
    let page = PageRequest::from_query(&page, COMMENTS_PER_PAGE);
    Ok(ok_json(comment_helpers::list(&pool, &filter, &page)?))
}

async fn comment_statistics(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(comment_helpers::statistics(&pool)?))
}

async fn show_comment(pool: web::Data<DbPool>, comment_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    Ok(ok_json(comment_helpers::get(&pool, comment_id.into_inner())?))
}

async fn set_status(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    comment_id: web::Path<i64>,
    body: web::Json<StatusBody>,
) -> CmsResult<HttpResponse> {
    let status = comment_helpers::parse_status(&body.status)?;
    Ok(ok_json(comment_helpers::set_status(
        &pool,
        &user.identity(),
        comment_id.into_inner(),
        status,
    )?))
}

async fn bulk_action(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<BulkCommentRequest>,
) -> CmsResult<HttpResponse> {
    let affected = comment_helpers::bulk_action(&pool, &user.identity(), &body)?;
    Ok(ok_json(json!({ "affected": affected, "requested": body.comment_ids.len() })))
}

async fn delete_comment(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    comment_id: web::Path<i64>,
) -> CmsResult<HttpResponse> {
    comment_helpers::delete(&pool, &user.identity(), comment_id.into_inner())?;
    Ok(message_json("Comment deleted"))
}

async fn reply(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    comment_id: web::Path<i64>,
    body: web::Json<ReplyBody>,
) -> CmsResult<HttpResponse> {
    Ok(created_json(comment_helpers::reply(
        &pool,
        &user.identity(),
        comment_id.into_inner(),
        &body.content,
    )?))
}
