use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::{CmsError, CmsResult};
use crate::helper::listing_helpers::{PageQuery, PageRequest};
use crate::helper::{category_helpers, comment_helpers, content_helpers, settings_helpers};
use crate::middleware::{client_ip, MaybeUser};
use crate::models::filters::{CategoryFilter, PostFilter, PostSort};
use crate::models::forms::{CommentAuthor, GuestAuthor, NewComment, ViewInfo};
use crate::models::{CommentStatus, PostStatus};
use crate::routes::{created_json, ok_json};
use crate::DbPool;

const PUBLIC_POSTS_PER_PAGE: i64 = 6;
const CATEGORY_POSTS_PER_PAGE: i64 = 10;
const CATEGORIES_PER_PAGE: i64 = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    category_id: Option<i64>,
    featured: Option<bool>,
    search: Option<String>,
    #[serde(default)]
    sort: PostSort,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    q: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    featured: Option<bool>,
    search: Option<String>,
}

/// Body of `POST /api/comments`. Guest fields are ignored for logged-in
/// users.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSubmission {
    content: String,
    post_id: i64,
    parent_id: Option<i64>,
    author_name: Option<String>,
    author_email: Option<String>,
    author_website: Option<String>,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/posts", web::get().to(list_posts))
            .route("/posts/search", web::get().to(search_posts))
            .route("/posts/{slug}", web::get().to(get_post_by_slug))
            .route("/posts/{id}/comments", web::get().to(get_post_comments))
            .route("/categories", web::get().to(list_categories))
            .route("/categories/{slug}/posts", web::get().to(get_category_posts))
            .route("/tags", web::get().to(list_tags))
            .route("/comments", web::post().to(submit_comment))
            .route("/settings", web::get().to(get_public_settings)),
    );
}

fn header(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_posts(pool: web::Data<DbPool>, query: web::Query<PostListQuery>) -> CmsResult<HttpResponse> {
    let query = query.into_inner();
    let filter = PostFilter {
        category_id: query.category_id,
        is_featured: query.featured,
        search: query.search,
        sort: query.sort,
        ..PostFilter::published()
    };
    let page = PageRequest::new(query.page, query.page_size, PUBLIC_POSTS_PER_PAGE);
    Ok(ok_json(content_helpers::list_posts(&pool, &filter, &page)?))
}

async fn search_posts(pool: web::Data<DbPool>, query: web::Query<SearchQuery>) -> CmsResult<HttpResponse> {
    let keyword = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => {
            return Err(CmsError::Validation(
                "A non-empty 'q' query parameter is required for search.".to_string(),
            ))
        }
    };
    let per_page = settings_helpers::posts_per_page(&pool)?;
    let filter = PostFilter {
        search: Some(keyword.clone()),
        ..PostFilter::published()
    };
    let page = PageRequest::new(query.page, query.page_size, per_page);
    let results = content_helpers::list_posts(&pool, &filter, &page)?;
    Ok(ok_json(json!({ "query": keyword, "results": results })))
}

/// Every successful fetch counts as a view.
async fn get_post_by_slug(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    viewer: MaybeUser,
    slug: web::Path<String>,
) -> CmsResult<HttpResponse> {
    let detail = content_helpers::published_post_by_slug(&pool, &slug)?;
    let info = ViewInfo {
        user_id: viewer.0.as_ref().map(|user| user.id),
        ip_address: client_ip(&req),
        user_agent: header(&req, "User-Agent"),
        referer: header(&req, "Referer"),
        session_id: None,
    };
    content_helpers::record_view(&pool, detail.item.post.id, &info)?;
    Ok(ok_json(detail))
}

async fn get_post_comments(pool: web::Data<DbPool>, post_id: web::Path<i64>) -> CmsResult<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = content_helpers::get_post(&pool, post_id)?;
    if post.post.status != PostStatus::Published {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    Ok(ok_json(comment_helpers::fetch_thread(&pool, post_id, CommentStatus::Approved)?))
}

async fn list_categories(pool: web::Data<DbPool>, query: web::Query<CategoryListQuery>) -> CmsResult<HttpResponse> {
    let query = query.into_inner();
    let filter = CategoryFilter {
        is_featured: query.featured,
        search: query.search,
    };
    let page = PageRequest::new(query.page, query.page_size, CATEGORIES_PER_PAGE);
    Ok(ok_json(category_helpers::list_categories(&pool, &filter, &page)?))
}

async fn get_category_posts(
    pool: web::Data<DbPool>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> CmsResult<HttpResponse> {
    let page = PageRequest::from_query(&query, CATEGORY_POSTS_PER_PAGE);
    let (category, posts) = category_helpers::category_posts(&pool, &slug, &page)?;
    Ok(ok_json(json!({ "category": category, "posts": posts })))
}

async fn list_tags(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(content_helpers::list_tags(&pool)?))
}

async fn submit_comment(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    author: MaybeUser,
    body: web::Json<CommentSubmission>,
) -> CmsResult<HttpResponse> {
    let body = body.into_inner();
    let author = match author.0 {
        Some(user) => CommentAuthor::Member(user.identity()),
        None => CommentAuthor::Guest(GuestAuthor {
            name: body.author_name.unwrap_or_default(),
            email: body.author_email.unwrap_or_default(),
            website: body.author_website,
        }),
    };
    let comment = comment_helpers::submit_public(
        &pool,
        &NewComment {
            content: body.content,
            post_id: body.post_id,
            parent_id: body.parent_id,
            author,
            author_ip: client_ip(&req),
        },
    )?;
    Ok(created_json(comment))
}

async fn get_public_settings(pool: web::Data<DbPool>) -> CmsResult<HttpResponse> {
    Ok(ok_json(settings_helpers::public_settings(&pool)?))
}
