use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::{CmsError, CmsResult};
use crate::helper::listing_helpers::{PageQuery, PageRequest};
use crate::helper::{
    category_helpers, comment_helpers, content_helpers, media_helpers, settings_helpers, user_helpers,
};
use crate::middleware::AuthenticatedUser;
use crate::models::filters::{CategoryFilter, PostFilter};
use crate::models::forms::{CategoryInput, PostInput, SettingUpdate};
use crate::models::SettingCategory;
use crate::routes::{created_json, message_json, ok_json};
use crate::DbPool;

const ADMIN_PAGE_SIZE: i64 = 10;
const DASHBOARD_RECENT: i64 = 5;

#[derive(Deserialize)]
pub struct TagsBody {
    tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct SettingValue {
    value: String,
}

/// Routes mounted under the admin scope, which is already gated on
/// `AccessAdmin`.
pub fn config_admin(cfg: &mut web::ServiceConfig) {
    cfg.route("/dashboard", web::get().to(show_dashboard))
        .route("/posts", web::get().to(list_posts))
        .route("/posts", web::post().to(create_post))
        .route("/posts/upload", web::post().to(upload_featured_image))
        .route("/posts/{id}", web::get().to(get_post))
        .route("/posts/{id}", web::put().to(update_post))
        .route("/posts/{id}", web::delete().to(delete_post))
        .route("/posts/{id}/tags", web::post().to(add_post_tags))
        .route("/categories", web::get().to(list_categories))
        .route("/categories", web::post().to(create_category))
        .route("/categories/{id}", web::get().to(get_category))
        .route("/categories/{id}", web::put().to(update_category))
        .route("/categories/{id}", web::delete().to(delete_category))
        .route("/tags", web::get().to(list_tags))
        .route("/tags/{id}", web::delete().to(delete_tag))
        .route("/settings", web::get().to(list_settings))
        .route("/settings", web::put().to(update_settings))
        .route("/settings/category/{category}", web::get().to(settings_by_category))
        .route("/settings/{key}", web::put().to(update_setting))
        .route("/settings/{key}", web::delete().to(delete_setting));
}

async fn show_dashboard(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    let recent_posts = content_helpers::list_posts(
        &pool,
        &PostFilter::default(),
        &PageRequest::new(None, Some(DASHBOARD_RECENT), DASHBOARD_RECENT),
    )?;
    Ok(ok_json(json!({
        "posts": content_helpers::post_statistics(&pool)?,
        "comments": comment_helpers::statistics(&pool)?,
        "users": user_helpers::user_statistics(&pool)?,
        "categories": category_helpers::category_statistics(&pool)?,
        "recentPosts": recent_posts.items,
        "recentComments": comment_helpers::recent(&pool, DASHBOARD_RECENT)?,
    })))
}

// --- Posts ---

async fn list_posts(
    pool: web::Data<DbPool>,
    filter: web::Query<PostFilter>,
    page: web::Query<PageQuery>,
) -> CmsResult<HttpResponse> {
    let page = PageRequest::from_query(&page, ADMIN_PAGE_SIZE);
    Ok(ok_json(content_helpers::list_posts(&pool, &filter, &page)?))
}

async fn create_post(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Json<PostInput>,
) -> CmsResult<HttpResponse> {
    Ok(created_json(content_helpers::create_post(&pool, &user.identity(), &form)?))
}

async fn get_post(pool: web::Data<DbPool>, post_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    Ok(ok_json(content_helpers::get_post(&pool, post_id.into_inner())?))
}

async fn update_post(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    post_id: web::Path<i64>,
    form: web::Json<PostInput>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(content_helpers::update_post(
        &pool,
        &user.identity(),
        post_id.into_inner(),
        &form,
    )?))
}

async fn delete_post(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    post_id: web::Path<i64>,
) -> CmsResult<HttpResponse> {
    content_helpers::delete_post(&pool, &user.identity(), post_id.into_inner())?;
    Ok(message_json("Post deleted"))
}

async fn add_post_tags(
    pool: web::Data<DbPool>,
    post_id: web::Path<i64>,
    body: web::Json<TagsBody>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(content_helpers::add_tags(&pool, post_id.into_inner(), &body.tags)?))
}

async fn upload_featured_image(
    user: AuthenticatedUser,
    config: web::Data<Config>,
    payload: Multipart,
) -> CmsResult<HttpResponse> {
    let url = media_helpers::save_featured_image(&user.identity(), &config.media_root(), payload).await?;
    Ok(created_json(json!({ "url": url })))
}

// --- Categories ---

async fn list_categories(
    pool: web::Data<DbPool>,
    filter: web::Query<CategoryFilter>,
    page: web::Query<PageQuery>,
) -> CmsResult<HttpResponse> {
    let page = PageRequest::from_query(&page, ADMIN_PAGE_SIZE);
    Ok(ok_json(category_helpers::list_categories(&pool, &filter, &page)?))
}

async fn create_category(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Json<CategoryInput>,
) -> CmsResult<HttpResponse> {
    Ok(created_json(category_helpers::create_category(&pool, &user.identity(), &form)?))
}

async fn get_category(pool: web::Data<DbPool>, category_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    Ok(ok_json(category_helpers::get_category(&pool, category_id.into_inner())?))
}

async fn update_category(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    category_id: web::Path<i64>,
    form: web::Json<CategoryInput>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(category_helpers::update_category(
        &pool,
        &user.identity(),
        category_id.into_inner(),
        &form,
    )?))
}

async fn delete_category(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    category_id: web::Path<i64>,
) -> CmsResult<HttpResponse> {
    category_helpers::delete_category(&pool, &user.identity(), category_id.into_inner())?;
    Ok(message_json("Category deleted"))
}

// --- Tags ---

async fn list_tags(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(content_helpers::list_tags(&pool)?))
}

async fn delete_tag(user: AuthenticatedUser, pool: web::Data<DbPool>, tag_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    content_helpers::delete_tag(&pool, &user.identity(), tag_id.into_inner())?;
    Ok(message_json("Tag deleted"))
}

// --- Settings ---

async fn list_settings(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(settings_helpers::get_all(&pool)?))
}

async fn settings_by_category(pool: web::Data<DbPool>, category: web::Path<String>) -> CmsResult<HttpResponse> {
    let category = category
        .parse::<SettingCategory>()
        .map_err(|unknown| CmsError::Validation(format!("Unknown settings category '{}'", unknown)))?;
    Ok(ok_json(settings_helpers::get_by_category(&pool, category)?))
}

async fn update_settings(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    updates: web::Json<BTreeMap<String, SettingUpdate>>,
) -> CmsResult<HttpResponse> {
    let updated = settings_helpers::update_multiple(&pool, &user.identity(), &updates)?;
    Ok(ok_json(json!({ "updated": updated })))
}

async fn update_setting(
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    key: web::Path<String>,
    body: web::Json<SettingValue>,
) -> CmsResult<HttpResponse> {
    Ok(ok_json(settings_helpers::set(&pool, &user.identity(), &key, &body.value)?))
}

async fn delete_setting(user: AuthenticatedUser, pool: web::Data<DbPool>, key: web::Path<String>) -> CmsResult<HttpResponse> {
    settings_helpers::delete(&pool, &user.identity(), &key)?;
    Ok(message_json("Setting deleted"))
}
