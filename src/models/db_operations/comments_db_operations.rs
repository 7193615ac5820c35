use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row, ToSql};

use super::{count_where, now_db_time, optional_time_at, time_at, SqlFilter};
use crate::models::filters::CommentFilter;
use crate::models::{Comment, CommentListItem, CommentStatistics, CommentStatus, CommentThread};

const COMMENT_COLUMNS: &str = "cm.id, cm.content, cm.post_id, cm.parent_id, cm.author_name, cm.author_email, \
     cm.author_website, cm.author_ip, cm.user_id, cm.status, cm.moderated_at, cm.created_at";

const COMMENT_FIELD_COUNT: usize = 12;

pub struct CommentRecord<'a> {
    pub content: &'a str,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: &'a str,
    pub author_email: &'a str,
    pub author_website: Option<&'a str>,
    pub author_ip: Option<&'a str>,
    pub user_id: Option<i64>,
    pub status: CommentStatus,
}

fn row_to_comment(row: &Row<'_>) -> RusqliteResult<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        post_id: row.get(2)?,
        parent_id: row.get(3)?,
        author_name: row.get(4)?,
        author_email: row.get(5)?,
        author_website: row.get(6)?,
        author_ip: row.get(7)?,
        user_id: row.get(8)?,
        status: row.get(9)?,
        moderated_at: optional_time_at(row, 10)?,
        created_at: time_at(row, 11)?,
    })
}

fn row_to_list_item(row: &Row<'_>) -> RusqliteResult<CommentListItem> {
    let base = COMMENT_FIELD_COUNT;
    Ok(CommentListItem {
        comment: row_to_comment(row)?,
        post_title: row.get(base)?,
        post_slug: row.get(base + 1)?,
        parent_author_name: row.get(base + 2)?,
        reply_count: row.get(base + 3)?,
    })
}

fn comment_filter(filter: &CommentFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    sql.eq_opt("cm.status", filter.status)
        .eq_opt("cm.post_id", filter.post_id);
    if filter.top_level_only {
        sql.is_null("cm.parent_id");
    }
    sql.search(
        &["cm.content", "cm.author_name", "cm.author_email"],
        filter.search.as_deref(),
    );
    sql
}

/// Comments created in a moderated state are stamped immediately.
pub fn insert_comment(conn: &Connection, comment: &CommentRecord<'_>) -> RusqliteResult<i64> {
    let now = now_db_time();
    let moderated_at = (comment.status != CommentStatus::Pending).then(|| now.clone());
    conn.execute(
        "INSERT INTO comments (content, post_id, parent_id, author_name, author_email, author_website,
                               author_ip, user_id, status, moderated_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            comment.content,
            comment.post_id,
            comment.parent_id,
            comment.author_name,
            comment.author_email,
            comment.author_website,
            comment.author_ip,
            comment.user_id,
            comment.status,
            moderated_at,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_comment(conn: &Connection, comment_id: i64) -> RusqliteResult<Option<Comment>> {
    conn.query_row(
        &format!("SELECT {} FROM comments cm WHERE cm.id = ?1", COMMENT_COLUMNS),
        [comment_id],
        row_to_comment,
    )
    .optional()
}

pub fn set_status(conn: &Connection, comment_id: i64, status: CommentStatus) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE comments SET status = ?1, moderated_at = ?2 WHERE id = ?3",
        params![status, now_db_time(), comment_id],
    )
}

/// Moves every listed comment whose current status may legally reach
/// `status`. Rows that are missing or not eligible are left alone.
pub fn set_status_many(conn: &Connection, ids: &[i64], status: CommentStatus) -> RusqliteResult<usize> {
    let mut filter = SqlFilter::new();
    filter
        .in_list("id", ids)
        .in_list("status", &CommentStatus::sources_for(status));
    let sql = format!("UPDATE comments SET status = ?, moderated_at = ?{}", filter.where_clause());
    let now = now_db_time();
    let mut values: Vec<&dyn ToSql> = vec![&status, &now];
    values.extend(filter.params());
    conn.execute(&sql, values.as_slice())
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])
}

/// Counts only the listed rows; replies removed by cascade are not included.
pub fn delete_many(conn: &Connection, ids: &[i64]) -> RusqliteResult<usize> {
    let mut filter = SqlFilter::new();
    filter.in_list("id", ids);
    let sql = format!("DELETE FROM comments{}", filter.where_clause());
    conn.execute(&sql, filter.params().as_slice())
}

/// Distinct posts owning any of the listed comments.
pub fn post_ids_for(conn: &Connection, ids: &[i64]) -> RusqliteResult<Vec<i64>> {
    let mut filter = SqlFilter::new();
    filter.in_list("id", ids);
    let sql = format!("SELECT DISTINCT post_id FROM comments{} ORDER BY post_id", filter.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.params().as_slice(), |row| row.get(0))?;
    rows.collect()
}

/// Writes the number of APPROVED comments onto the post and returns it.
pub fn recompute_comments_count(conn: &Connection, post_id: i64) -> RusqliteResult<i64> {
    conn.execute(
        "UPDATE posts SET comments_count =
             (SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND status = 'APPROVED')
         WHERE id = ?1",
        [post_id],
    )?;
    conn.query_row("SELECT comments_count FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
}

/// Top-level comments in `status` oldest first, each with its direct
/// replies in the same status, oldest first. Deeper replies are not surfaced.
pub fn thread_for_post(conn: &Connection, post_id: i64, status: CommentStatus) -> RusqliteResult<Vec<CommentThread>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments cm WHERE cm.post_id = ?1 AND cm.status = ?2
         ORDER BY cm.created_at ASC, cm.id ASC",
        COMMENT_COLUMNS
    ))?;
    let comments = stmt
        .query_map(params![post_id, status], row_to_comment)?
        .collect::<RusqliteResult<Vec<_>>>()?;

    let mut threads: Vec<CommentThread> = Vec::new();
    let mut position: HashMap<i64, usize> = HashMap::new();
    let mut replies: Vec<Comment> = Vec::new();
    for comment in comments {
        if comment.parent_id.is_none() {
            position.insert(comment.id, threads.len());
            threads.push(CommentThread {
                comment,
                replies: Vec::new(),
            });
        } else {
            replies.push(comment);
        }
    }
    for reply in replies {
        let slot = reply.parent_id.and_then(|pid| position.get(&pid).copied());
        if let Some(idx) = slot {
            threads[idx].replies.push(reply);
        }
    }
    Ok(threads)
}

pub fn replies_of(conn: &Connection, parent_id: i64) -> RusqliteResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments cm WHERE cm.parent_id = ?1 ORDER BY cm.created_at ASC, cm.id ASC",
        COMMENT_COLUMNS
    ))?;
    let rows = stmt.query_map([parent_id], row_to_comment)?;
    rows.collect()
}

fn list_item_select() -> String {
    format!(
        "SELECT {}, p.title, p.slug, parent.author_name,
                (SELECT COUNT(*) FROM comments r WHERE r.parent_id = cm.id)
         FROM comments cm
         JOIN posts p ON p.id = cm.post_id
         LEFT JOIN comments parent ON parent.id = cm.parent_id",
        COMMENT_COLUMNS
    )
}

pub fn find_list_item(conn: &Connection, comment_id: i64) -> RusqliteResult<Option<CommentListItem>> {
    conn.query_row(
        &format!("{} WHERE cm.id = ?1", list_item_select()),
        [comment_id],
        row_to_list_item,
    )
    .optional()
}

pub fn count_comments(conn: &Connection, filter: &CommentFilter) -> RusqliteResult<i64> {
    count_where(conn, "comments cm", &comment_filter(filter))
}

pub fn list_comments(
    conn: &Connection,
    filter: &CommentFilter,
    limit: i64,
    offset: i64,
) -> RusqliteResult<Vec<CommentListItem>> {
    let sql_filter = comment_filter(filter);
    let sql = format!(
        "{}{} ORDER BY cm.created_at DESC, cm.id DESC LIMIT ? OFFSET ?",
        list_item_select(),
        sql_filter.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(sql_filter.params_with_page(&limit, &offset).as_slice(), row_to_list_item)?;
    rows.collect()
}

pub fn comment_statistics(conn: &Connection) -> RusqliteResult<CommentStatistics> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'PENDING'), 0),
                COALESCE(SUM(status = 'APPROVED'), 0),
                COALESCE(SUM(status = 'TRASH'), 0),
                COALESCE(SUM(status = 'SPAM'), 0)
         FROM comments",
        [],
        |row| {
            Ok(CommentStatistics {
                total: row.get(0)?,
                pending: row.get(1)?,
                approved: row.get(2)?,
                trash: row.get(3)?,
                spam: row.get(4)?,
            })
        },
    )
}
