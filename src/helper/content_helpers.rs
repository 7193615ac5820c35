use chrono::Utc;
use rusqlite::Connection;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::require_capability;
use crate::helper::form_helpers::{non_blank, require_length, require_max_length, require_min_length};
use crate::helper::listing_helpers::{PageRequest, Paginated};
use crate::helper::sanitization_helpers::{sanitize_post_content, strip_all_html, strip_optional};
use crate::models::db_operations::posts_db_operations::{self, PostRecord};
use crate::models::db_operations::{categories_db_operations, comments_db_operations, to_db_time};
use crate::models::filters::PostFilter;
use crate::models::forms::{PostInput, ViewInfo};
use crate::models::{
    Capability, CommentStatus, Identity, Post, PostDetail, PostListItem, PostStatistics, PostStatus, Tag,
    TagWithCount,
};
use crate::DbPool;

const WORDS_PER_MINUTE: usize = 200;
pub const RELATED_POSTS_LIMIT: i64 = 3;

/// Lower-case, ASCII-folded, hyphen separated. Characters with no ASCII
/// form are dropped. Entities are read as the characters they encode.
pub fn slugify(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input);
    let mut slug = String::with_capacity(decoded.len());
    let mut pending_separator = false;
    for c in decoded.chars().flat_map(char::to_lowercase) {
        let folded = fold_char(c);
        if folded.is_empty() {
            if c.is_whitespace() || c == '-' || c == '_' {
                pending_separator = true;
            }
            continue;
        }
        if pending_separator && !slug.is_empty() {
            slug.push('-');
        }
        pending_separator = false;
        slug.push_str(folded);
    }
    slug
}

fn fold_char(c: char) -> &'static str {
    match c {
        'a'..='z' | '0'..='9' => {
            const ASCII: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
            let idx = if c.is_ascii_digit() {
                26 + (c as usize - '0' as usize)
            } else {
                c as usize - 'a' as usize
            };
            &ASCII[idx..idx + 1]
        }
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' | 'ạ' | 'ả' | 'ấ' | 'ầ' | 'ẩ' | 'ẫ' | 'ậ' | 'ắ'
        | 'ằ' | 'ẳ' | 'ẵ' | 'ặ' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'đ' | 'ď' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' | 'ẹ' | 'ẻ' | 'ẽ' | 'ế' | 'ề' | 'ể' | 'ễ' | 'ệ' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' | 'ỉ' | 'ị' | 'ĩ' => "i",
        'ł' | 'ľ' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' | 'ơ' | 'ọ' | 'ỏ' | 'ố' | 'ồ' | 'ổ' | 'ỗ' | 'ộ' | 'ớ'
        | 'ờ' | 'ở' | 'ỡ' | 'ợ' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' | 'ư' | 'ụ' | 'ủ' | 'ũ' | 'ứ' | 'ừ' | 'ử' | 'ữ' | 'ự' => {
            "u"
        }
        'ý' | 'ÿ' | 'ỳ' | 'ỵ' | 'ỷ' | 'ỹ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => "",
    }
}

pub(crate) fn require_slug(source: &str) -> CmsResult<String> {
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(CmsError::Validation(format!("Cannot derive a URL slug from '{}'", source)));
    }
    Ok(slug)
}

/// Minutes to read `content` at 200 words per minute, rounded up.
pub fn reading_time(content: &str) -> i64 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as i64
}


/// Input after sanitising, ready to become a `PostRecord`.
struct CleanPost {
    title: String,
    excerpt: String,
    content: String,
    featured_image: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    meta_keywords: Option<String>,
}

impl CleanPost {
    fn from_input(input: &PostInput) -> Self {
        CleanPost {
            title: strip_all_html(&input.title),
            excerpt: strip_all_html(&input.excerpt),
            content: sanitize_post_content(&input.content),
            featured_image: non_blank(input.featured_image.as_deref()).map(str::to_string),
            meta_title: strip_optional(input.meta_title.as_deref()),
            meta_description: strip_optional(input.meta_description.as_deref()),
            meta_keywords: strip_optional(input.meta_keywords.as_deref()),
        }
    }

    /// Limits are checked against what will be stored.
    fn validate(&self) -> CmsResult<()> {
        require_length("Title", &self.title, 5, 255)?;
        require_length("Excerpt", &self.excerpt, 10, 500)?;
        require_min_length("Content", &self.content, 50)?;
        if let Some(meta) = self.meta_description.as_deref() {
            require_max_length("Meta description", meta, 500)?;
        }
        Ok(())
    }

    fn record<'a>(&'a self, input: &PostInput, slug: &'a str) -> PostRecord<'a> {
        PostRecord {
            title: &self.title,
            slug,
            excerpt: &self.excerpt,
            content: &self.content,
            featured_image: self.featured_image.as_deref(),
            status: input.status,
            category_id: input.category_id,
            is_featured: input.is_featured,
            reading_time: reading_time(&self.content),
            meta_title: self.meta_title.as_deref(),
            meta_description: self.meta_description.as_deref(),
            meta_keywords: self.meta_keywords.as_deref(),
        }
    }
}

fn publish_stamp(status: PostStatus) -> Option<String> {
    (status == PostStatus::Published).then(|| to_db_time(&Utc::now()))
}

fn ensure_category(conn: &Connection, category_id: i64) -> CmsResult<()> {
    if !categories_db_operations::category_exists(conn, category_id)? {
        return Err(CmsError::Validation("Category does not exist".to_string()));
    }
    Ok(())
}

fn ensure_post_slug_free(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> CmsResult<()> {
    if posts_db_operations::slug_taken(conn, slug, exclude_id)? {
        return Err(CmsError::Conflict(format!("A post with slug '{}' already exists", slug)));
    }
    Ok(())
}

pub fn create_post(pool: &DbPool, actor: &Identity, input: &PostInput) -> CmsResult<PostListItem> {
    require_capability(actor, Capability::ManageContent)?;
    let clean = CleanPost::from_input(input);
    clean.validate()?;
    let slug = match non_blank(input.slug.as_deref()) {
        Some(supplied) => require_slug(supplied)?,
        None => require_slug(&clean.title)?,
    };

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    ensure_category(&tx, input.category_id)?;
    ensure_post_slug_free(&tx, &slug, None)?;
    let stamp = publish_stamp(input.status);
    let post_id = posts_db_operations::insert_post(&tx, &clean.record(input, &slug), actor.user_id, stamp.as_deref())?;
    if let Some(tags) = &input.tags {
        add_tags_in(&tx, post_id, tags)?;
    }
    tx.commit()?;

    log::info!("Post {} '{}' created by {}", post_id, slug, actor.email);
    get_post_with(&conn, post_id)
}

pub fn update_post(pool: &DbPool, actor: &Identity, post_id: i64, input: &PostInput) -> CmsResult<PostListItem> {
    require_capability(actor, Capability::ManageContent)?;
    let clean = CleanPost::from_input(input);
    clean.validate()?;

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let existing = posts_db_operations::find_post_by_id(&tx, post_id)?
        .ok_or_else(|| CmsError::NotFound("Post".to_string()))?;
    let slug = match non_blank(input.slug.as_deref()) {
        Some(supplied) => require_slug(supplied)?,
        None if clean.title != existing.title => require_slug(&clean.title)?,
        None => existing.slug.clone(),
    };
    ensure_category(&tx, input.category_id)?;
    ensure_post_slug_free(&tx, &slug, Some(post_id))?;

    let stamp = publish_stamp(input.status);
    posts_db_operations::update_post(&tx, post_id, &clean.record(input, &slug), stamp.as_deref())?;
    if let Some(tags) = &input.tags {
        posts_db_operations::clear_post_tags(&tx, post_id)?;
        add_tags_in(&tx, post_id, tags)?;
    }
    tx.commit()?;

    log::info!("Post {} updated by {}", post_id, actor.email);
    get_post_with(&conn, post_id)
}

pub fn delete_post(pool: &DbPool, actor: &Identity, post_id: i64) -> CmsResult<()> {
    require_capability(actor, Capability::ManageContent)?;
    let conn = pool.get()?;
    if posts_db_operations::delete_post(&conn, post_id)? == 0 {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    log::info!("Post {} deleted by {}", post_id, actor.email);
    Ok(())
}

fn get_post_with(conn: &Connection, post_id: i64) -> CmsResult<PostListItem> {
    posts_db_operations::find_list_item_by_id(conn, post_id)?.ok_or_else(|| CmsError::NotFound("Post".to_string()))
}

pub fn get_post(pool: &DbPool, post_id: i64) -> CmsResult<PostListItem> {
    let conn = pool.get()?;
    get_post_with(&conn, post_id)
}

pub fn list_posts(pool: &DbPool, filter: &PostFilter, page: &PageRequest) -> CmsResult<Paginated<PostListItem>> {
    let conn = pool.get()?;
    let total = posts_db_operations::count_posts(&conn, filter)?;
    let items = posts_db_operations::list_posts(&conn, filter, page.limit(), page.offset())?;
    Ok(Paginated::new(items, page, total))
}

/// A published post with its approved thread and related posts.
pub fn published_post_by_slug(pool: &DbPool, slug: &str) -> CmsResult<PostDetail> {
    let conn = pool.get()?;
    let item = posts_db_operations::find_list_item_by_slug(&conn, slug, PostStatus::Published)?
        .ok_or_else(|| CmsError::NotFound("Post".to_string()))?;
    let comments = comments_db_operations::thread_for_post(&conn, item.post.id, CommentStatus::Approved)?;
    let related_posts = posts_db_operations::related_posts(&conn, &item.post, RELATED_POSTS_LIMIT)?;
    Ok(PostDetail {
        item,
        comments,
        related_posts,
    })
}

pub fn related_posts(pool: &DbPool, post: &Post, limit: i64) -> CmsResult<Vec<Post>> {
    let conn = pool.get()?;
    Ok(posts_db_operations::related_posts(&conn, post, limit)?)
}

pub fn post_statistics(pool: &DbPool) -> CmsResult<PostStatistics> {
    let conn = pool.get()?;
    Ok(posts_db_operations::post_statistics(&conn)?)
}

// --- Tags ---

/// Find-or-create each named tag and link it to the post. Names that fold to
/// the same slug share one tag; repeating the call changes nothing.
pub fn add_tags(pool: &DbPool, post_id: i64, names: &[String]) -> CmsResult<Vec<Tag>> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    if !posts_db_operations::post_exists(&tx, post_id)? {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    add_tags_in(&tx, post_id, names)?;
    let tags = posts_db_operations::tags_for_post(&tx, post_id)?;
    tx.commit()?;
    Ok(tags)
}

fn add_tags_in(conn: &Connection, post_id: i64, names: &[String]) -> CmsResult<()> {
    for raw in names {
        let name = strip_all_html(raw);
        let slug = slugify(&name);
        if slug.is_empty() {
            continue;
        }
        let tag_id = posts_db_operations::find_or_create_tag(conn, &name, &slug)?;
        posts_db_operations::attach_tag(conn, post_id, tag_id)?;
    }
    Ok(())
}

pub fn list_tags(pool: &DbPool) -> CmsResult<Vec<TagWithCount>> {
    let conn = pool.get()?;
    Ok(posts_db_operations::list_tags_with_counts(&conn)?)
}

pub fn delete_tag(pool: &DbPool, actor: &Identity, tag_id: i64) -> CmsResult<()> {
    require_capability(actor, Capability::ManageContent)?;
    let conn = pool.get()?;
    if posts_db_operations::delete_tag(&conn, tag_id)? == 0 {
        return Err(CmsError::NotFound("Tag".to_string()));
    }
    Ok(())
}

// --- Views ---

/// Appends a view row when the client IP is known and always bumps the
/// post's view counter.
pub fn record_view(pool: &DbPool, post_id: i64, info: &ViewInfo) -> CmsResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    if !posts_db_operations::post_exists(&tx, post_id)? {
        return Err(CmsError::NotFound("Post".to_string()));
    }
    if let Some(ip) = non_blank(info.ip_address.as_deref()) {
        posts_db_operations::insert_view(&tx, post_id, ip, info)?;
    }
    posts_db_operations::increment_views(&tx, post_id)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, long_content};
    use pretty_assertions::assert_eq;

    fn input(title: &str, category_id: i64, status: PostStatus) -> PostInput {
        PostInput {
            title: title.to_string(),
            slug: None,
            excerpt: "A short excerpt for listings".to_string(),
            content: long_content(60),
            featured_image: None,
            status,
            category_id,
            is_featured: false,
            meta_title: None,
            meta_description: None,
            meta_keywords: None,
            tags: None,
        }
    }

    #[test]
    fn slugify_folds_and_hyphenates() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Đường đến Rust  "), "duong-den-rust");
        assert_eq!(slugify("Crème brûlée -- recipe"), "creme-brulee-recipe");
        assert_eq!(slugify("C++ & Rust_2024"), "c-rust-2024");
        assert_eq!(slugify("Fish &amp; Chips"), "fish-chips");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_time(""), 0);
        assert_eq!(reading_time(&long_content(1)), 1);
        assert_eq!(reading_time(&long_content(200)), 1);
        assert_eq!(reading_time(&long_content(201)), 2);
    }

    #[test]
    fn create_derives_slug_and_reading_time() {
        let fx = test_support::fixture();
        let post = create_post(&fx.pool, &fx.admin, &input("My First Post", fx.category_id, PostStatus::Draft)).unwrap();
        assert_eq!(post.post.slug, "my-first-post");
        assert_eq!(post.post.reading_time, 1);
        assert_eq!(post.post.published_at, None);
        assert_eq!(post.author.id, fx.admin.user_id);
        assert_eq!(post.category.id, fx.category_id);
    }

    #[test]
    fn duplicate_slug_is_conflict() {
        let fx = test_support::fixture();
        create_post(&fx.pool, &fx.admin, &input("Same Title", fx.category_id, PostStatus::Draft)).unwrap();
        let err = create_post(&fx.pool, &fx.admin, &input("Same Title", fx.category_id, PostStatus::Draft)).unwrap_err();
        assert!(matches!(err, CmsError::Conflict(_)));
    }

    #[test]
    fn readers_cannot_manage_content() {
        let fx = test_support::fixture();
        let err = create_post(&fx.pool, &fx.reader, &input("Reader Post", fx.category_id, PostStatus::Draft)).unwrap_err();
        assert!(matches!(err, CmsError::Unauthorized(_)));
    }

    #[test]
    fn unknown_category_is_validation_error() {
        let fx = test_support::fixture();
        let err = create_post(&fx.pool, &fx.admin, &input("Orphan Post", 999, PostStatus::Draft)).unwrap_err();
        assert!(matches!(err, CmsError::Validation(_)));
    }

    #[test]
    fn title_limits_apply_after_stripping_markup() {
        let fx = test_support::fixture();
        let padded = input("<b></b><i></i>Hi", fx.category_id, PostStatus::Draft);
        let err = create_post(&fx.pool, &fx.admin, &padded).unwrap_err();
        assert!(matches!(err, CmsError::Validation(_)));
    }

    #[test]
    fn published_at_is_set_once() {
        let fx = test_support::fixture();
        let draft = create_post(&fx.pool, &fx.admin, &input("Publishing Flow", fx.category_id, PostStatus::Draft)).unwrap();
        let id = draft.post.id;

        let published =
            update_post(&fx.pool, &fx.admin, id, &input("Publishing Flow", fx.category_id, PostStatus::Published)).unwrap();
        let first = published.post.published_at.expect("published_at set on publish");

        let again =
            update_post(&fx.pool, &fx.admin, id, &input("Publishing Flow", fx.category_id, PostStatus::Published)).unwrap();
        assert_eq!(again.post.published_at, Some(first));

        let archived =
            update_post(&fx.pool, &fx.admin, id, &input("Publishing Flow", fx.category_id, PostStatus::Archived)).unwrap();
        assert_eq!(archived.post.published_at, Some(first));
    }

    #[test]
    fn slug_follows_title_only_when_not_supplied() {
        let fx = test_support::fixture();
        let post = create_post(&fx.pool, &fx.admin, &input("Original Title", fx.category_id, PostStatus::Draft)).unwrap();
        let renamed = update_post(&fx.pool, &fx.admin, post.post.id, &input("Renamed Title", fx.category_id, PostStatus::Draft))
            .unwrap();
        assert_eq!(renamed.post.slug, "renamed-title");

        let mut pinned = input("Third Title", fx.category_id, PostStatus::Draft);
        pinned.slug = Some("Custom Slug".into());
        let pinned = update_post(&fx.pool, &fx.admin, post.post.id, &pinned).unwrap();
        assert_eq!(pinned.post.slug, "custom-slug");
    }

    #[test]
    fn update_recomputes_reading_time() {
        let fx = test_support::fixture();
        let post = create_post(&fx.pool, &fx.admin, &input("Growing Post", fx.category_id, PostStatus::Draft)).unwrap();
        let mut longer = input("Growing Post", fx.category_id, PostStatus::Draft);
        longer.content = long_content(450);
        let updated = update_post(&fx.pool, &fx.admin, post.post.id, &longer).unwrap();
        assert_eq!(updated.post.reading_time, 3);
    }

    #[test]
    fn add_tags_is_idempotent() {
        let fx = test_support::fixture();
        let post = create_post(&fx.pool, &fx.admin, &input("Tagged Post", fx.category_id, PostStatus::Draft)).unwrap();
        let names = vec!["A".to_string(), "B".to_string()];
        add_tags(&fx.pool, post.post.id, &names).unwrap();
        let tags = add_tags(&fx.pool, post.post.id, &names).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(list_tags(&fx.pool).unwrap().len(), 2);

        let same_slug = add_tags(&fx.pool, post.post.id, &["a".to_string()]).unwrap();
        assert_eq!(same_slug.len(), 2);
    }

    #[test]
    fn tag_list_replaces_on_update() {
        let fx = test_support::fixture();
        let mut tagged = input("Replace Tags", fx.category_id, PostStatus::Draft);
        tagged.tags = Some(vec!["rust".into(), "actix".into()]);
        let post = create_post(&fx.pool, &fx.admin, &tagged).unwrap();
        assert_eq!(post.tags.len(), 2);

        tagged.tags = Some(vec!["sqlite".into()]);
        let updated = update_post(&fx.pool, &fx.admin, post.post.id, &tagged).unwrap();
        let names: Vec<&str> = updated.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["sqlite"]);
    }

    #[test]
    fn record_view_counts_every_hit() {
        let fx = test_support::fixture();
        let post = create_post(&fx.pool, &fx.admin, &input("Viewed Post", fx.category_id, PostStatus::Published)).unwrap();
        let info = ViewInfo {
            ip_address: Some("10.0.0.1".into()),
            ..Default::default()
        };
        record_view(&fx.pool, post.post.id, &info).unwrap();
        record_view(&fx.pool, post.post.id, &info).unwrap();
        record_view(&fx.pool, post.post.id, &ViewInfo::default()).unwrap();

        let conn = fx.pool.get().unwrap();
        assert_eq!(posts_db_operations::count_views(&conn, post.post.id).unwrap(), 2);
        drop(conn);
        assert_eq!(get_post(&fx.pool, post.post.id).unwrap().post.views_count, 3);
        assert!(matches!(record_view(&fx.pool, 999, &info), Err(CmsError::NotFound(_))));
    }

    #[test]
    fn pages_cover_every_post_once() {
        let fx = test_support::fixture();
        for i in 0..13 {
            create_post(&fx.pool, &fx.admin, &input(&format!("Paged post {}", i), fx.category_id, PostStatus::Published))
                .unwrap();
        }
        let mut seen = Vec::new();
        let first = list_posts(&fx.pool, &PostFilter::published(), &PageRequest::new(Some(1), Some(5), 5)).unwrap();
        assert_eq!(first.pagination.total_pages, 3);
        for page in 1..=3 {
            let result = list_posts(&fx.pool, &PostFilter::published(), &PageRequest::new(Some(page), Some(5), 5)).unwrap();
            seen.extend(result.items.into_iter().map(|i| i.post.id));
        }
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(total, 13);
        assert_eq!(seen.len(), 13);

        let beyond = list_posts(&fx.pool, &PostFilter::published(), &PageRequest::new(Some(9), Some(5), 5)).unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.pagination.total_items, 13);
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let fx = test_support::fixture();
        create_post(&fx.pool, &fx.admin, &input("Learning Rust Ownership", fx.category_id, PostStatus::Published)).unwrap();
        create_post(&fx.pool, &fx.admin, &input("Gardening Notes", fx.category_id, PostStatus::Published)).unwrap();
        let filter = PostFilter {
            search: Some("rust".into()),
            ..PostFilter::published()
        };
        let result = list_posts(&fx.pool, &filter, &PageRequest::new(None, None, 6)).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].post.title, "Learning Rust Ownership");
    }

    #[test]
    fn published_detail_includes_related_posts() {
        let fx = test_support::fixture();
        let main = create_post(&fx.pool, &fx.admin, &input("Main Article", fx.category_id, PostStatus::Published)).unwrap();
        create_post(&fx.pool, &fx.admin, &input("Sibling Article", fx.category_id, PostStatus::Published)).unwrap();
        create_post(&fx.pool, &fx.admin, &input("Draft Sibling", fx.category_id, PostStatus::Draft)).unwrap();

        let detail = published_post_by_slug(&fx.pool, &main.post.slug).unwrap();
        let related: Vec<&str> = detail.related_posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(related, vec!["Sibling Article"]);
        assert!(matches!(published_post_by_slug(&fx.pool, "draft-sibling"), Err(CmsError::NotFound(_))));
    }
}
