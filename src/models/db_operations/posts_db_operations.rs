use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

use super::{count_where, now_db_time, optional_time_at, time_at, SqlFilter};
use crate::models::filters::PostFilter;
use crate::models::forms::ViewInfo;
use crate::models::{
    AuthorSummary, CategorySummary, Post, PostListItem, PostStatistics, PostStatus, Tag, TagWithCount,
};

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.excerpt, p.content, p.featured_image, p.status, \
     p.category_id, p.author_id, p.is_featured, p.views_count, p.likes_count, p.comments_count, \
     p.reading_time, p.published_at, p.meta_title, p.meta_description, p.meta_keywords, \
     p.created_at, p.updated_at";

const POST_FIELD_COUNT: usize = 20;

const LIST_ITEM_FROM: &str = "posts p \
     JOIN users u ON u.id = p.author_id \
     JOIN categories c ON c.id = p.category_id";

/// Column values written by create and update. Counters and timestamps are
/// owned by the store.
pub struct PostRecord<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub excerpt: &'a str,
    pub content: &'a str,
    pub featured_image: Option<&'a str>,
    pub status: PostStatus,
    pub category_id: i64,
    pub is_featured: bool,
    pub reading_time: i64,
    pub meta_title: Option<&'a str>,
    pub meta_description: Option<&'a str>,
    pub meta_keywords: Option<&'a str>,
}

fn row_to_post(row: &Row<'_>) -> RusqliteResult<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        content: row.get(4)?,
        featured_image: row.get(5)?,
        status: row.get(6)?,
        category_id: row.get(7)?,
        author_id: row.get(8)?,
        is_featured: row.get(9)?,
        views_count: row.get(10)?,
        likes_count: row.get(11)?,
        comments_count: row.get(12)?,
        reading_time: row.get(13)?,
        published_at: optional_time_at(row, 14)?,
        meta_title: row.get(15)?,
        meta_description: row.get(16)?,
        meta_keywords: row.get(17)?,
        created_at: time_at(row, 18)?,
        updated_at: time_at(row, 19)?,
    })
}

fn row_to_list_item(row: &Row<'_>) -> RusqliteResult<PostListItem> {
    let base = POST_FIELD_COUNT;
    Ok(PostListItem {
        post: row_to_post(row)?,
        author: AuthorSummary {
            id: row.get(base)?,
            username: row.get(base + 1)?,
            first_name: row.get(base + 2)?,
            last_name: row.get(base + 3)?,
            avatar: row.get(base + 4)?,
        },
        category: CategorySummary {
            id: row.get(base + 5)?,
            name: row.get(base + 6)?,
            slug: row.get(base + 7)?,
            color: row.get(base + 8)?,
        },
        tags: Vec::new(),
    })
}

fn list_item_select() -> String {
    format!(
        "SELECT {}, u.id, u.username, u.first_name, u.last_name, u.avatar, c.id, c.name, c.slug, c.color FROM {}",
        POST_COLUMNS, LIST_ITEM_FROM
    )
}

fn post_filter(filter: &PostFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    sql.eq_opt("p.status", filter.status)
        .eq_opt("p.category_id", filter.category_id)
        .eq_opt("p.author_id", filter.author_id)
        .eq_opt("p.is_featured", filter.is_featured)
        .search(&["p.title", "p.excerpt", "p.content"], filter.search.as_deref());
    sql
}

/// `publish_stamp` is only written when the row has no `published_at` yet.
pub fn insert_post(
    conn: &Connection,
    post: &PostRecord<'_>,
    author_id: i64,
    publish_stamp: Option<&str>,
) -> RusqliteResult<i64> {
    let now = now_db_time();
    conn.execute(
        "INSERT INTO posts (title, slug, excerpt, content, featured_image, status, category_id, author_id,
                            is_featured, reading_time, published_at, meta_title, meta_description,
                            meta_keywords, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        params![
            post.title,
            post.slug,
            post.excerpt,
            post.content,
            post.featured_image,
            post.status,
            post.category_id,
            author_id,
            post.is_featured,
            post.reading_time,
            publish_stamp,
            post.meta_title,
            post.meta_description,
            post.meta_keywords,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_post(
    conn: &Connection,
    post_id: i64,
    post: &PostRecord<'_>,
    publish_stamp: Option<&str>,
) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE posts SET title = ?1, slug = ?2, excerpt = ?3, content = ?4, featured_image = ?5, status = ?6,
                          category_id = ?7, is_featured = ?8, reading_time = ?9,
                          published_at = COALESCE(published_at, ?10),
                          meta_title = ?11, meta_description = ?12, meta_keywords = ?13, updated_at = ?14
         WHERE id = ?15",
        params![
            post.title,
            post.slug,
            post.excerpt,
            post.content,
            post.featured_image,
            post.status,
            post.category_id,
            post.is_featured,
            post.reading_time,
            publish_stamp,
            post.meta_title,
            post.meta_description,
            post.meta_keywords,
            now_db_time(),
            post_id
        ],
    )
}

pub fn find_post_by_id(conn: &Connection, post_id: i64) -> RusqliteResult<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS),
        [post_id],
        row_to_post,
    )
    .optional()
}

pub fn find_list_item_by_id(conn: &Connection, post_id: i64) -> RusqliteResult<Option<PostListItem>> {
    let item = conn
        .query_row(&format!("{} WHERE p.id = ?1", list_item_select()), [post_id], row_to_list_item)
        .optional()?;
    attach_tags(conn, item)
}

pub fn find_list_item_by_slug(
    conn: &Connection,
    slug: &str,
    status: PostStatus,
) -> RusqliteResult<Option<PostListItem>> {
    let item = conn
        .query_row(
            &format!("{} WHERE p.slug = ?1 AND p.status = ?2", list_item_select()),
            params![slug, status],
            row_to_list_item,
        )
        .optional()?;
    attach_tags(conn, item)
}

fn attach_tags(conn: &Connection, item: Option<PostListItem>) -> RusqliteResult<Option<PostListItem>> {
    match item {
        Some(mut item) => {
            item.tags = tags_for_post(conn, item.post.id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

pub fn post_exists(conn: &Connection, post_id: i64) -> RusqliteResult<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)", [post_id], |row| row.get(0))
}

pub fn slug_taken(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?1 AND id != ?2)",
        params![slug, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )
}

pub fn delete_post(conn: &Connection, post_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])
}

pub fn count_posts_in_category(conn: &Connection, category_id: i64) -> RusqliteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM posts WHERE category_id = ?1", [category_id], |row| row.get(0))
}

pub fn count_posts(conn: &Connection, filter: &PostFilter) -> RusqliteResult<i64> {
    count_where(conn, "posts p", &post_filter(filter))
}

pub fn list_posts(
    conn: &Connection,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> RusqliteResult<Vec<PostListItem>> {
    let sql_filter = post_filter(filter);
    let sql = format!(
        "{}{} ORDER BY {} LIMIT ? OFFSET ?",
        list_item_select(),
        sql_filter.where_clause(),
        filter.sort.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut items: Vec<PostListItem> = stmt
        .query_map(sql_filter.params_with_page(&limit, &offset).as_slice(), row_to_list_item)?
        .collect::<RusqliteResult<_>>()?;

    let ids: Vec<i64> = items.iter().map(|i| i.post.id).collect();
    let mut tags = tags_for_posts(conn, &ids)?;
    for item in items.iter_mut() {
        item.tags = tags.remove(&item.post.id).unwrap_or_default();
    }
    Ok(items)
}

/// Other published posts in the same category, newest first.
pub fn related_posts(conn: &Connection, post: &Post, limit: i64) -> RusqliteResult<Vec<Post>> {
    let sql = format!(
        "SELECT {} FROM posts p WHERE p.category_id = ?1 AND p.id != ?2 AND p.status = ?3
         ORDER BY p.published_at DESC, p.id DESC LIMIT ?4",
        POST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![post.category_id, post.id, PostStatus::Published, limit],
        row_to_post,
    )?;
    rows.collect()
}

pub fn post_statistics(conn: &Connection) -> RusqliteResult<PostStatistics> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'PUBLISHED'), 0),
                COALESCE(SUM(status = 'DRAFT'), 0),
                COALESCE(SUM(status = 'SCHEDULED'), 0),
                COALESCE(SUM(status = 'ARCHIVED'), 0)
         FROM posts",
        [],
        |row| {
            Ok(PostStatistics {
                total: row.get(0)?,
                published: row.get(1)?,
                draft: row.get(2)?,
                scheduled: row.get(3)?,
                archived: row.get(4)?,
            })
        },
    )
}

// --- Tags ---

fn row_to_tag(row: &Row<'_>) -> RusqliteResult<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

/// Returns the id of the tag with `slug`, creating it with `name` if absent.
pub fn find_or_create_tag(conn: &Connection, name: &str, slug: &str) -> RusqliteResult<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE slug = ?1", [slug], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO tags (name, slug, created_at) VALUES (?1, ?2, ?3)",
        params![name, slug, now_db_time()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Idempotent: an existing association is left untouched.
pub fn attach_tag(conn: &Connection, post_id: i64, tag_id: i64) -> RusqliteResult<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
        [post_id, tag_id],
    )
}

pub fn clear_post_tags(conn: &Connection, post_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", [post_id])
}

pub fn tags_for_post(conn: &Connection, post_id: i64) -> RusqliteResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?1 ORDER BY t.name",
    )?;
    let rows = stmt.query_map([post_id], row_to_tag)?;
    rows.collect()
}

fn tags_for_posts(conn: &Connection, post_ids: &[i64]) -> RusqliteResult<HashMap<i64, Vec<Tag>>> {
    let mut by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(by_post);
    }
    let mut filter = SqlFilter::new();
    filter.in_list("pt.post_id", post_ids);
    let sql = format!(
        "SELECT pt.post_id, t.id, t.name, t.slug FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id{} ORDER BY t.name",
        filter.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(filter.params().as_slice())?;
    while let Some(row) = rows.next()? {
        let post_id: i64 = row.get(0)?;
        by_post.entry(post_id).or_default().push(Tag {
            id: row.get(1)?,
            name: row.get(2)?,
            slug: row.get(3)?,
        });
    }
    Ok(by_post)
}

pub fn list_tags_with_counts(conn: &Connection) -> RusqliteResult<Vec<TagWithCount>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug, COUNT(pt.post_id) FROM tags t
         LEFT JOIN post_tags pt ON pt.tag_id = t.id
         GROUP BY t.id ORDER BY t.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(TagWithCount {
            tag: row_to_tag(row)?,
            post_count: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn delete_tag(conn: &Connection, tag_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM tags WHERE id = ?1", [tag_id])
}

// --- Views ---

pub fn insert_view(conn: &Connection, post_id: i64, ip_address: &str, info: &ViewInfo) -> RusqliteResult<i64> {
    conn.execute(
        "INSERT INTO post_views (post_id, user_id, ip_address, user_agent, referer, session_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post_id,
            info.user_id,
            ip_address,
            info.user_agent,
            info.referer,
            info.session_id,
            now_db_time()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn increment_views(conn: &Connection, post_id: i64) -> RusqliteResult<usize> {
    conn.execute("UPDATE posts SET views_count = views_count + 1 WHERE id = ?1", [post_id])
}

pub fn count_views(conn: &Connection, post_id: i64) -> RusqliteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM post_views WHERE post_id = ?1", [post_id], |row| row.get(0))
}
